use super::{AssetField, GatewayError, MediaField, RemoteGateway};
use crate::api::error::AppError;
use crate::models::{Asset, MediaItem, Principal, Profile};
use crate::services::gallery_service::GalleryService;
use crate::status::PreferenceStatus;
use async_trait::async_trait;
use std::sync::Arc;

/// [`RemoteGateway`] that calls the gallery service in-process, acting as a
/// fixed principal.
#[derive(Clone)]
pub struct LocalGateway {
    service: Arc<GalleryService>,
    principal: Principal,
}

impl LocalGateway {
    pub fn new(service: Arc<GalleryService>, principal: Principal) -> Self {
        Self { service, principal }
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }
}

impl From<AppError> for GatewayError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::NotFound(msg) => GatewayError::NotFound(msg),
            AppError::Unauthorized(msg)
            | AppError::Forbidden(msg)
            | AppError::BadRequest(msg)
            | AppError::Conflict(msg) => GatewayError::Rejected(msg),
            other => GatewayError::Transport(other.to_string()),
        }
    }
}

#[async_trait]
impl RemoteGateway for LocalGateway {
    async fn get_asset(&self, id: &str) -> Result<Asset, GatewayError> {
        Ok(self.service.get_asset(&self.principal, id).await?)
    }

    async fn get_associations(&self, asset_id: &str) -> Result<Vec<MediaItem>, GatewayError> {
        Ok(self
            .service
            .list_associations(&self.principal, asset_id)
            .await?)
    }

    async fn update_asset_field(&self, id: &str, field: AssetField) -> Result<(), GatewayError> {
        self.service
            .update_asset_field(&self.principal, id, field)
            .await?;
        Ok(())
    }

    async fn update_media_field(&self, id: &str, field: MediaField) -> Result<(), GatewayError> {
        self.service
            .update_media_field(&self.principal, id, field)
            .await?;
        Ok(())
    }

    async fn update_association_status(
        &self,
        asset_id: &str,
        media_id: &str,
        status: PreferenceStatus,
    ) -> Result<(), GatewayError> {
        self.service
            .update_association_status(&self.principal, asset_id, media_id, status)
            .await?;
        Ok(())
    }

    async fn delete_asset(&self, id: &str) -> Result<(), GatewayError> {
        Ok(self.service.delete_asset(&self.principal, id).await?)
    }

    async fn delete_media(&self, id: &str) -> Result<(), GatewayError> {
        Ok(self.service.delete_media(&self.principal, id).await?)
    }

    async fn resolve_playable_url(&self, locator: &str) -> Result<String, GatewayError> {
        Ok(self.service.resolve_playable_url(locator)?)
    }

    async fn get_profile(&self, user_id: &str) -> Result<Profile, GatewayError> {
        Ok(self.service.get_profile(user_id).await?)
    }
}

use crate::api::error::AppError;
use crate::entities::{self, prelude::*};
use crate::models::Principal;
use crate::utils::keyed_mutex::KeyedMutex;
use sea_orm::{DatabaseConnection, EntityTrait};
use url::Url;

pub mod assets;
pub mod links;
pub mod media;
pub mod types;
pub mod users;

pub use types::{NewAsset, NewMedia};

/// Server-side owner of the gallery tables. Every write re-checks the
/// caller's rights; writes touching one asset are serialized.
pub struct GalleryService {
    db: DatabaseConnection,
    media_base_url: Url,
    asset_lock: KeyedMutex,
}

impl GalleryService {
    pub fn new(db: DatabaseConnection, media_base_url: &str) -> anyhow::Result<Self> {
        // A base without a trailing slash would have its last segment
        // replaced by Url::join.
        let mut base = media_base_url.to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        Ok(Self {
            db,
            media_base_url: Url::parse(&base)?,
            asset_lock: KeyedMutex::new(),
        })
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    async fn find_asset(&self, id: &str) -> Result<entities::assets::Model, AppError> {
        Assets::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Asset {id} not found")))
    }

    async fn find_media(&self, id: &str) -> Result<entities::media::Model, AppError> {
        Media::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Media {id} not found")))
    }
}

/// Anonymous callers are asked to sign in; signed-in callers are refused.
fn deny(principal: &Principal, action: &str) -> AppError {
    if principal.user_id.is_none() {
        AppError::Unauthorized(format!("Sign in to {action}"))
    } else {
        AppError::Forbidden(format!("Not allowed to {action}"))
    }
}

fn ensure(allowed: bool, principal: &Principal, action: &str) -> Result<(), AppError> {
    if allowed {
        Ok(())
    } else {
        tracing::warn!(
            "🚫 Refused to {} for {:?}",
            action,
            principal.user_id.as_deref().unwrap_or("anonymous")
        );
        Err(deny(principal, action))
    }
}

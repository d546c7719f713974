//! Remote data-access contract consumed by the sync engine.

pub mod http;
pub mod local;

use crate::models::{Asset, MediaItem, Profile};
use crate::status::{ModerationStatus, PreferenceStatus};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

pub use http::HttpGateway;
pub use local::LocalGateway;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("not found: {0}")]
    NotFound(String),

    /// The backend refused the write (permissions, validation, conflict).
    #[error("rejected: {0}")]
    Rejected(String),

    /// Network error, timeout or server failure.
    #[error("transport error: {0}")]
    Transport(String),
}

/// A single writable asset column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum AssetField {
    ModerationStatus(ModerationStatus),
    PreferenceStatus(PreferenceStatus),
    PrimaryMediaId(String),
}

/// Body of `PUT /assets/:id/media/:media_id/status`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LinkStatusBody {
    pub status: PreferenceStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ResolvedUrl {
    pub url: String,
}

/// A single writable media column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum MediaField {
    ModerationStatus(ModerationStatus),
    PreferenceStatus(PreferenceStatus),
}

#[async_trait]
pub trait RemoteGateway: Send + Sync {
    async fn get_asset(&self, id: &str) -> Result<Asset, GatewayError>;

    /// Associations of `asset_id`, each with its media embedded.
    async fn get_associations(&self, asset_id: &str) -> Result<Vec<MediaItem>, GatewayError>;

    async fn update_asset_field(&self, id: &str, field: AssetField) -> Result<(), GatewayError>;

    async fn update_media_field(&self, id: &str, field: MediaField) -> Result<(), GatewayError>;

    async fn update_association_status(
        &self,
        asset_id: &str,
        media_id: &str,
        status: PreferenceStatus,
    ) -> Result<(), GatewayError>;

    async fn delete_asset(&self, id: &str) -> Result<(), GatewayError>;

    async fn delete_media(&self, id: &str) -> Result<(), GatewayError>;

    /// Opaque lookup from a storage locator to a playable URL.
    async fn resolve_playable_url(&self, locator: &str) -> Result<String, GatewayError>;

    async fn get_profile(&self, user_id: &str) -> Result<Profile, GatewayError>;
}

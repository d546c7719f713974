use crate::models::{AssetKind, Classification};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct NewAsset {
    #[validate(length(min = 1, max = 200, message = "Name must be between 1 and 200 characters"))]
    pub name: String,
    pub description: Option<String>,
    /// Free-text attribution for creators without an account.
    pub creator: Option<String>,
    pub kind: AssetKind,
    pub curator_id: Option<String>,
    /// Existing media to associate right away.
    #[serde(default)]
    pub media_ids: Vec<String>,
    /// Must be one of `media_ids`.
    pub primary_media_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct NewMedia {
    #[validate(length(min = 1, max = 1024, message = "Locator must be between 1 and 1024 characters"))]
    pub locator: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub creator: Option<String>,
    pub classification: Classification,
    #[schema(value_type = Object)]
    pub metadata: Option<serde_json::Value>,
}

use crate::entities::{asset_media, assets, media, users};
use crate::status::{ModerationStatus, PreferenceStatus};
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// The two kinds of shareable asset.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    /// Model-weight package.
    #[sea_orm(string_value = "lora")]
    Lora,
    /// Reusable pipeline definition.
    #[sea_orm(string_value = "workflow")]
    Workflow,
}

/// Mutually exclusive media categories. Each one is paginated separately.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(8))")]
pub enum Classification {
    #[sea_orm(string_value = "gen")]
    #[serde(rename = "gen")]
    Generation,
    #[sea_orm(string_value = "art")]
    #[serde(rename = "art")]
    Artwork,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Asset {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    /// Free-text attribution, used when no profile backs the asset.
    pub creator: Option<String>,
    pub kind: AssetKind,
    pub user_id: Option<String>,
    pub curator_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub moderation_status: ModerationStatus,
    pub preference_status: PreferenceStatus,
    pub primary_media_id: Option<String>,
    pub admin_reviewed: bool,
}

impl Asset {
    /// Whether `role` may see this asset at all.
    pub fn is_visible_to(&self, role: ViewerRole) -> bool {
        role.is_privileged()
            || (self.moderation_status.is_public() && !self.preference_status.is_hidden())
    }

    /// Creator attribution. The linked profile wins over the free-text label
    /// whenever the asset is owned by a member and the profile resolved.
    pub fn creator_display(&self, profile: Option<&Profile>) -> Option<String> {
        match (self.user_id.as_deref(), profile) {
            (Some(owner), Some(p)) if p.id == owner => Some(p.display().to_string()),
            _ => self.creator.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Media {
    pub id: String,
    /// Storage key or absolute URL; resolved into a playable URL by the gateway.
    pub locator: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub creator: Option<String>,
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub moderation_status: ModerationStatus,
    pub preference_status: PreferenceStatus,
    pub classification: Classification,
    #[schema(value_type = Object)]
    pub metadata: serde_json::Value,
}

/// Per-association metadata.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LinkInfo {
    pub status: PreferenceStatus,
    pub is_primary: bool,
}

impl Default for LinkInfo {
    fn default() -> Self {
        Self {
            status: PreferenceStatus::Listed,
            is_primary: false,
        }
    }
}

/// A media item as seen from one asset: the media record plus the link
/// metadata when the item is associated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MediaItem {
    pub media: Media,
    pub link: Option<LinkInfo>,
}

impl MediaItem {
    pub fn linked(media: Media, link: LinkInfo) -> Self {
        Self {
            media,
            link: Some(link),
        }
    }

    pub fn id(&self) -> &str {
        &self.media.id
    }

    /// Link display status when linked, else the owner's preference.
    pub fn effective_status(&self) -> PreferenceStatus {
        self.link
            .map(|l| l.status)
            .unwrap_or(self.media.preference_status)
    }

    pub fn is_primary(&self) -> bool {
        self.link.is_some_and(|l| l.is_primary)
    }

    pub fn classification(&self) -> Classification {
        self.media.classification
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Profile {
    pub id: String,
    pub username: String,
    pub display_name: Option<String>,
}

impl Profile {
    pub fn display(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.username)
    }
}

/// Who is looking, relative to one resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ViewerRole {
    Anonymous,
    Member,
    Owner,
    Administrator,
}

impl ViewerRole {
    pub fn is_privileged(&self) -> bool {
        matches!(self, Self::Owner | Self::Administrator)
    }
}

/// The authenticated (or anonymous) caller.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Option<String>,
    pub is_admin: bool,
}

impl Principal {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn member(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            is_admin: false,
        }
    }

    pub fn admin(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            is_admin: true,
        }
    }

    pub fn owns(&self, owner: Option<&str>) -> bool {
        matches!((self.user_id.as_deref(), owner), (Some(me), Some(o)) if me == o)
    }

    /// Ownership takes precedence over the admin flag so that owner-only
    /// rules can be checked on the returned role.
    pub fn role_for(&self, owner: Option<&str>) -> ViewerRole {
        if self.owns(owner) {
            ViewerRole::Owner
        } else if self.is_admin {
            ViewerRole::Administrator
        } else if self.user_id.is_some() {
            ViewerRole::Member
        } else {
            ViewerRole::Anonymous
        }
    }
}

impl From<assets::Model> for Asset {
    fn from(m: assets::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            description: m.description,
            creator: m.creator,
            kind: m.kind,
            user_id: m.user_id,
            curator_id: m.curator_id,
            created_at: m.created_at,
            moderation_status: m.moderation_status,
            preference_status: m.preference_status,
            primary_media_id: m.primary_media_id,
            admin_reviewed: m.admin_reviewed,
        }
    }
}

impl From<media::Model> for Media {
    fn from(m: media::Model) -> Self {
        Self {
            id: m.id,
            locator: m.locator,
            title: m.title,
            description: m.description,
            creator: m.creator,
            user_id: m.user_id,
            created_at: m.created_at,
            moderation_status: m.moderation_status,
            preference_status: m.preference_status,
            classification: m.classification,
            metadata: m.metadata,
        }
    }
}

impl From<(asset_media::Model, media::Model)> for MediaItem {
    fn from((link, media): (asset_media::Model, media::Model)) -> Self {
        Self::linked(
            media.into(),
            LinkInfo {
                status: link.status,
                is_primary: link.is_primary,
            },
        )
    }
}

impl From<users::Model> for Profile {
    fn from(m: users::Model) -> Self {
        Self {
            id: m.id,
            username: m.username,
            display_name: m.display_name,
        }
    }
}

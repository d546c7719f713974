use crate::models::Classification;
use crate::status::{ModerationStatus, PreferenceStatus};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "media")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub locator: String, // storage key or absolute URL
    pub title: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    pub creator: Option<String>,
    pub user_id: Option<String>,
    pub created_at: DateTimeUtc,
    pub moderation_status: ModerationStatus,
    pub preference_status: PreferenceStatus,
    pub classification: Classification,
    pub metadata: Json, // aspect ratio, thumbnail locator, ...
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id",
        on_update = "Cascade",
        on_delete = "SetNull"
    )]
    Users,
    #[sea_orm(has_many = "super::asset_media::Entity")]
    AssetMedia,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl Related<super::asset_media::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AssetMedia.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

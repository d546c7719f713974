use crate::models::AssetKind;
use crate::status::{ModerationStatus, PreferenceStatus};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "assets")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    pub creator: Option<String>, // free-text label for non-member creators
    pub kind: AssetKind,
    pub user_id: Option<String>,
    pub curator_id: Option<String>,
    pub created_at: DateTimeUtc,
    pub moderation_status: ModerationStatus,
    pub preference_status: PreferenceStatus,
    pub primary_media_id: Option<String>,
    #[sea_orm(default_expr = "Expr::value(false)")]
    pub admin_reviewed: bool,
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

impl Related<super::media::Entity> for Entity {
    fn to() -> RelationDef {
        super::asset_media::Relation::Media.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::asset_media::Relation::Assets.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}

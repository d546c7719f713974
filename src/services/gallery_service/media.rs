use super::{GalleryService, NewMedia, ensure};
use crate::api::error::AppError;
use crate::entities::{prelude::*, *};
use crate::gateway::MediaField;
use crate::models::{Media as MediaView, Principal};
use crate::status::{ModerationStatus, PreferenceStatus};
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, TransactionTrait,
};
use std::collections::BTreeSet;
use url::Url;
use validator::Validate;

impl GalleryService {
    pub async fn create_media(
        &self,
        principal: &Principal,
        req: NewMedia,
    ) -> Result<MediaView, AppError> {
        let Some(user_id) = principal.user_id.clone() else {
            return Err(AppError::Unauthorized("Sign in to upload media".to_string()));
        };
        req.validate()
            .map_err(|e| AppError::BadRequest(e.to_string()))?;

        let media = media::ActiveModel {
            id: Set(uuid::Uuid::new_v4().to_string()),
            locator: Set(req.locator.trim().to_string()),
            title: Set(req.title),
            description: Set(req.description),
            creator: Set(req.creator),
            user_id: Set(Some(user_id)),
            created_at: Set(Utc::now()),
            moderation_status: Set(ModerationStatus::Listed),
            preference_status: Set(PreferenceStatus::Listed),
            classification: Set(req.classification),
            metadata: Set(req.metadata.unwrap_or_else(|| serde_json::json!({}))),
        }
        .insert(&self.db)
        .await?;

        tracing::info!("🎞️ Media {} created", media.id);
        Ok(media.into())
    }

    pub async fn update_media_field(
        &self,
        principal: &Principal,
        id: &str,
        field: MediaField,
    ) -> Result<MediaView, AppError> {
        let _lock = self.asset_lock.lock(&media_key(id)).await;
        let media = self.find_media(id).await?;
        let owner = media.user_id.clone();
        let mut active: media::ActiveModel = media.into();

        match field {
            MediaField::ModerationStatus(status) => {
                ensure(principal.is_admin, principal, "moderate videos")?;
                active.moderation_status = Set(status);
            }
            MediaField::PreferenceStatus(status) => {
                ensure(
                    principal.owns(owner.as_deref()),
                    principal,
                    "change the visibility of this video",
                )?;
                active.preference_status = Set(status);
            }
        }

        let updated = active.update(&self.db).await?;
        tracing::info!("✏️ Media {} updated", id);
        Ok(updated.into())
    }

    /// Deletes the media, every association to it, and any primary pointer
    /// naming it.
    pub async fn delete_media(&self, principal: &Principal, id: &str) -> Result<(), AppError> {
        let _lock = self.asset_lock.lock(&media_key(id)).await;
        let media = self.find_media(id).await?;
        ensure(
            principal.owns(media.user_id.as_deref()) || principal.is_admin,
            principal,
            "delete this video",
        )?;

        // Every asset that links or points at the media is written below, so
        // take their locks too. Sorted keys keep the lock order fixed.
        let mut asset_ids: BTreeSet<String> = AssetMedia::find()
            .filter(asset_media::Column::MediaId.eq(id))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|link| link.asset_id)
            .collect();
        asset_ids.extend(
            Assets::find()
                .filter(assets::Column::PrimaryMediaId.eq(id))
                .all(&self.db)
                .await?
                .into_iter()
                .map(|asset| asset.id),
        );
        let mut asset_guards = Vec::with_capacity(asset_ids.len());
        for asset_id in &asset_ids {
            asset_guards.push(self.asset_lock.lock(asset_id).await);
        }

        let txn = self.db.begin().await.map_err(AppError::Database)?;

        Assets::update_many()
            .col_expr(
                assets::Column::PrimaryMediaId,
                Expr::value(Option::<String>::None),
            )
            .filter(assets::Column::PrimaryMediaId.eq(id))
            .exec(&txn)
            .await?;
        AssetMedia::delete_many()
            .filter(asset_media::Column::MediaId.eq(id))
            .exec(&txn)
            .await?;
        Media::delete_by_id(id).exec(&txn).await?;

        txn.commit().await.map_err(AppError::Database)?;

        self.asset_lock.cleanup();
        tracing::info!("🗑️ Media {} deleted", id);
        Ok(())
    }

    /// Absolute http(s) locators pass through; anything else is a storage
    /// key under the configured media base URL.
    pub fn resolve_playable_url(&self, locator: &str) -> Result<String, AppError> {
        let locator = locator.trim();
        if locator.is_empty() {
            return Err(AppError::BadRequest("Locator is empty".to_string()));
        }
        if let Ok(url) = Url::parse(locator)
            && matches!(url.scheme(), "http" | "https")
        {
            return Ok(locator.to_string());
        }
        self.media_base_url
            .join(locator.trim_start_matches('/'))
            .map(|url| url.to_string())
            .map_err(|e| AppError::BadRequest(format!("Invalid locator: {e}")))
    }
}

fn media_key(id: &str) -> String {
    format!("media:{id}")
}

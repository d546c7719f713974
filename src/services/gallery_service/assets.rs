use super::{GalleryService, NewAsset, ensure};
use crate::api::error::AppError;
use crate::entities::{prelude::*, *};
use crate::gateway::AssetField;
use crate::models::{Asset, Principal};
use crate::status::{ModerationStatus, PreferenceStatus};
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use std::collections::HashSet;
use validator::Validate;

impl GalleryService {
    /// The asset, if it exists and `principal` may see it.
    pub async fn get_asset(&self, principal: &Principal, id: &str) -> Result<Asset, AppError> {
        let asset: Asset = self.find_asset(id).await?.into();
        let role = principal.role_for(asset.user_id.as_deref());
        if !asset.is_visible_to(role) {
            return Err(AppError::NotFound(format!("Asset {id} not found")));
        }
        Ok(asset)
    }

    pub async fn create_asset(
        &self,
        principal: &Principal,
        req: NewAsset,
    ) -> Result<Asset, AppError> {
        let Some(user_id) = principal.user_id.clone() else {
            return Err(AppError::Unauthorized("Sign in to create assets".to_string()));
        };
        req.validate()
            .map_err(|e| AppError::BadRequest(e.to_string()))?;

        let unique: HashSet<&str> = req.media_ids.iter().map(String::as_str).collect();
        if unique.len() != req.media_ids.len() {
            return Err(AppError::BadRequest("Duplicate media ids".to_string()));
        }
        if let Some(primary) = &req.primary_media_id
            && !unique.contains(primary.as_str())
        {
            return Err(AppError::BadRequest(
                "Primary media must be one of the attached media".to_string(),
            ));
        }

        let txn = self.db.begin().await.map_err(AppError::Database)?;

        let asset = assets::ActiveModel {
            id: Set(uuid::Uuid::new_v4().to_string()),
            name: Set(req.name.trim().to_string()),
            description: Set(req.description),
            creator: Set(req.creator),
            kind: Set(req.kind),
            user_id: Set(Some(user_id)),
            curator_id: Set(req.curator_id),
            created_at: Set(Utc::now()),
            moderation_status: Set(ModerationStatus::Listed),
            preference_status: Set(PreferenceStatus::Listed),
            primary_media_id: Set(req.primary_media_id.clone()),
            admin_reviewed: Set(false),
        }
        .insert(&txn)
        .await?;

        for media_id in &req.media_ids {
            if Media::find_by_id(media_id.as_str()).one(&txn).await?.is_none() {
                return Err(AppError::BadRequest(format!("Media {media_id} not found")));
            }
            asset_media::ActiveModel {
                asset_id: Set(asset.id.clone()),
                media_id: Set(media_id.clone()),
                status: Set(PreferenceStatus::Listed),
                is_primary: Set(req.primary_media_id.as_deref() == Some(media_id.as_str())),
            }
            .insert(&txn)
            .await?;
        }

        txn.commit().await.map_err(AppError::Database)?;

        tracing::info!(
            "🆕 Asset {} created with {} media item(s)",
            asset.id,
            req.media_ids.len()
        );
        Ok(asset.into())
    }

    /// Writes one asset column. Moderation changes mark the asset as
    /// reviewed; a primary change goes through [`Self::set_primary`].
    pub async fn update_asset_field(
        &self,
        principal: &Principal,
        id: &str,
        field: AssetField,
    ) -> Result<Asset, AppError> {
        let lock = self.asset_lock.lock(id).await;
        let asset = self.find_asset(id).await?;
        let mut active: assets::ActiveModel = asset.clone().into();

        match field {
            AssetField::ModerationStatus(status) => {
                ensure(principal.is_admin, principal, "moderate assets")?;
                active.moderation_status = Set(status);
                active.admin_reviewed = Set(true);
            }
            AssetField::PreferenceStatus(status) => {
                ensure(
                    principal.owns(asset.user_id.as_deref()),
                    principal,
                    "change the visibility of this asset",
                )?;
                active.preference_status = Set(status);
            }
            AssetField::PrimaryMediaId(media_id) => {
                drop(lock);
                return self.set_primary(principal, id, &media_id).await;
            }
        }

        let updated = active.update(&self.db).await?;
        drop(lock);
        tracing::info!("✏️ Asset {} updated", id);
        Ok(updated.into())
    }

    /// Makes `media_id` the only primary media of the asset.
    pub async fn set_primary(
        &self,
        principal: &Principal,
        asset_id: &str,
        media_id: &str,
    ) -> Result<Asset, AppError> {
        let _lock = self.asset_lock.lock(asset_id).await;
        let asset = self.find_asset(asset_id).await?;
        ensure(
            principal.owns(asset.user_id.as_deref()) || principal.is_admin,
            principal,
            "choose the primary video",
        )?;

        let txn = self.db.begin().await.map_err(AppError::Database)?;

        if AssetMedia::find_by_id((asset_id.to_string(), media_id.to_string()))
            .one(&txn)
            .await?
            .is_none()
        {
            return Err(AppError::BadRequest(format!(
                "Media {media_id} is not associated with asset {asset_id}"
            )));
        }

        AssetMedia::update_many()
            .col_expr(asset_media::Column::IsPrimary, Expr::value(false))
            .filter(asset_media::Column::AssetId.eq(asset_id))
            .exec(&txn)
            .await?;
        AssetMedia::update_many()
            .col_expr(asset_media::Column::IsPrimary, Expr::value(true))
            .filter(asset_media::Column::AssetId.eq(asset_id))
            .filter(asset_media::Column::MediaId.eq(media_id))
            .exec(&txn)
            .await?;

        let mut active: assets::ActiveModel = asset.into();
        active.primary_media_id = Set(Some(media_id.to_string()));
        let updated = active.update(&txn).await?;

        txn.commit().await.map_err(AppError::Database)?;

        tracing::info!("⭐ Media {} is now primary for asset {}", media_id, asset_id);
        Ok(updated.into())
    }

    pub async fn delete_asset(&self, principal: &Principal, id: &str) -> Result<(), AppError> {
        let _lock = self.asset_lock.lock(id).await;
        let asset = self.find_asset(id).await?;
        ensure(
            principal.owns(asset.user_id.as_deref()) || principal.is_admin,
            principal,
            "delete this asset",
        )?;

        let txn = self.db.begin().await.map_err(AppError::Database)?;
        remove_asset_rows(&txn, id).await?;
        txn.commit().await.map_err(AppError::Database)?;

        self.asset_lock.cleanup();
        tracing::info!("🗑️ Asset {} deleted", id);
        Ok(())
    }
}

async fn remove_asset_rows<C: ConnectionTrait>(conn: &C, id: &str) -> Result<(), AppError> {
    AssetMedia::delete_many()
        .filter(asset_media::Column::AssetId.eq(id))
        .exec(conn)
        .await?;
    Assets::delete_by_id(id).exec(conn).await?;
    Ok(())
}

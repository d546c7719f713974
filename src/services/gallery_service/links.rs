use super::{GalleryService, ensure};
use crate::api::error::AppError;
use crate::entities::{prelude::*, *};
use crate::models::{MediaItem, Principal};
use crate::status::PreferenceStatus;
use crate::store::AssociationStore;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, TransactionTrait,
};

impl GalleryService {
    /// Media of a visible asset that `principal` may see, in display order.
    pub async fn list_associations(
        &self,
        principal: &Principal,
        asset_id: &str,
    ) -> Result<Vec<MediaItem>, AppError> {
        let asset = self.get_asset(principal, asset_id).await?;

        let rows = AssetMedia::find()
            .filter(asset_media::Column::AssetId.eq(asset_id))
            .find_also_related(Media)
            .all(&self.db)
            .await?;
        let items: Vec<MediaItem> = rows
            .into_iter()
            .filter_map(|(link, media)| media.map(|m| MediaItem::from((link, m))))
            .collect();

        Ok(AssociationStore::new(asset, items).visible_items(principal))
    }

    pub async fn attach_media(
        &self,
        principal: &Principal,
        asset_id: &str,
        media_id: &str,
    ) -> Result<MediaItem, AppError> {
        let _lock = self.asset_lock.lock(asset_id).await;
        let asset = self.find_asset(asset_id).await?;
        ensure(
            principal.owns(asset.user_id.as_deref()) || principal.is_admin,
            principal,
            "attach media to this asset",
        )?;
        let media = self.find_media(media_id).await?;

        let key = (asset_id.to_string(), media_id.to_string());
        if AssetMedia::find_by_id(key).one(&self.db).await?.is_some() {
            return Err(AppError::Conflict(format!(
                "Media {media_id} is already attached to asset {asset_id}"
            )));
        }

        let link = asset_media::ActiveModel {
            asset_id: Set(asset_id.to_string()),
            media_id: Set(media_id.to_string()),
            status: Set(PreferenceStatus::Listed),
            is_primary: Set(false),
        }
        .insert(&self.db)
        .await?;

        tracing::info!("🔗 Media {} attached to asset {}", media_id, asset_id);
        Ok((link, media).into())
    }

    /// Removes the association; the media itself is kept. Detaching the
    /// primary media clears the asset's primary pointer.
    pub async fn detach_media(
        &self,
        principal: &Principal,
        asset_id: &str,
        media_id: &str,
    ) -> Result<(), AppError> {
        let _lock = self.asset_lock.lock(asset_id).await;
        let asset = self.find_asset(asset_id).await?;
        ensure(
            principal.owns(asset.user_id.as_deref()) || principal.is_admin,
            principal,
            "detach media from this asset",
        )?;

        let txn = self.db.begin().await.map_err(AppError::Database)?;

        let result = AssetMedia::delete_by_id((asset_id.to_string(), media_id.to_string()))
            .exec(&txn)
            .await?;
        if result.rows_affected == 0 {
            return Err(AppError::NotFound(format!(
                "Media {media_id} is not attached to asset {asset_id}"
            )));
        }

        if asset.primary_media_id.as_deref() == Some(media_id) {
            let mut active: assets::ActiveModel = asset.into();
            active.primary_media_id = Set(None);
            active.update(&txn).await?;
        }

        txn.commit().await.map_err(AppError::Database)?;

        tracing::info!("✂️ Media {} detached from asset {}", media_id, asset_id);
        Ok(())
    }

    /// Per-link display status of one media within one asset.
    pub async fn update_association_status(
        &self,
        principal: &Principal,
        asset_id: &str,
        media_id: &str,
        status: PreferenceStatus,
    ) -> Result<MediaItem, AppError> {
        let _lock = self.asset_lock.lock(asset_id).await;
        let asset = self.find_asset(asset_id).await?;
        ensure(
            principal.owns(asset.user_id.as_deref()) || principal.is_admin,
            principal,
            "change the display status of this video",
        )?;

        let link = AssetMedia::find_by_id((asset_id.to_string(), media_id.to_string()))
            .one(&self.db)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "Media {media_id} is not attached to asset {asset_id}"
                ))
            })?;
        let media = self.find_media(media_id).await?;

        let mut active: asset_media::ActiveModel = link.into();
        active.status = Set(status);
        let link = active.update(&self.db).await?;

        tracing::info!(
            "🎚️ Link {}/{} set to {}",
            asset_id,
            media_id,
            status
        );
        Ok((link, media).into())
    }
}

use super::GalleryService;
use crate::api::error::AppError;
use crate::entities::prelude::*;
use crate::models::Profile;
use sea_orm::EntityTrait;

impl GalleryService {
    pub async fn get_profile(&self, user_id: &str) -> Result<Profile, AppError> {
        Users::find_by_id(user_id)
            .one(&self.db)
            .await?
            .map(Profile::from)
            .ok_or_else(|| AppError::NotFound(format!("User {user_id} not found")))
    }
}

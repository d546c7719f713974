use crate::AppState;
use crate::api::error::AppError;
use crate::gateway::{AssetField, LinkStatusBody};
use crate::models::{Asset, MediaItem, Principal};
use crate::services::gallery_service::NewAsset;
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};

#[utoipa::path(
    get,
    path = "/assets/{id}",
    params(
        ("id" = String, Path, description = "Asset ID")
    ),
    responses(
        (status = 200, description = "Asset", body = Asset),
        (status = 404, description = "Asset not found or not visible")
    ),
    tag = "assets"
)]
pub async fn get_asset(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> Result<Json<Asset>, AppError> {
    Ok(Json(state.gallery.get_asset(&principal, &id).await?))
}

#[utoipa::path(
    post,
    path = "/assets",
    request_body = NewAsset,
    responses(
        (status = 201, description = "Asset created", body = Asset),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "assets"
)]
pub async fn create_asset(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<NewAsset>,
) -> Result<(StatusCode, Json<Asset>), AppError> {
    let asset = state.gallery.create_asset(&principal, req).await?;
    Ok((StatusCode::CREATED, Json(asset)))
}

/// Body is `{"field": "moderation_status" | "preference_status" |
/// "primary_media_id", "value": ...}`.
#[utoipa::path(
    patch,
    path = "/assets/{id}",
    params(
        ("id" = String, Path, description = "Asset ID")
    ),
    responses(
        (status = 200, description = "Asset updated", body = Asset),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Asset not found")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "assets"
)]
pub async fn update_asset(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    Json(field): Json<AssetField>,
) -> Result<Json<Asset>, AppError> {
    Ok(Json(
        state
            .gallery
            .update_asset_field(&principal, &id, field)
            .await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/assets/{id}",
    params(
        ("id" = String, Path, description = "Asset ID")
    ),
    responses(
        (status = 204, description = "Asset deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Asset not found")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "assets"
)]
pub async fn delete_asset(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.gallery.delete_asset(&principal, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/assets/{id}/media",
    params(
        ("id" = String, Path, description = "Asset ID")
    ),
    responses(
        (status = 200, description = "Visible media in display order", body = Vec<MediaItem>),
        (status = 404, description = "Asset not found or not visible")
    ),
    tag = "assets"
)]
pub async fn list_asset_media(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> Result<Json<Vec<MediaItem>>, AppError> {
    Ok(Json(state.gallery.list_associations(&principal, &id).await?))
}

#[utoipa::path(
    post,
    path = "/assets/{id}/media/{media_id}",
    params(
        ("id" = String, Path, description = "Asset ID"),
        ("media_id" = String, Path, description = "Media ID")
    ),
    responses(
        (status = 201, description = "Media attached", body = MediaItem),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Asset or media not found"),
        (status = 409, description = "Already attached")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "assets"
)]
pub async fn attach_media(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path((id, media_id)): Path<(String, String)>,
) -> Result<(StatusCode, Json<MediaItem>), AppError> {
    let item = state
        .gallery
        .attach_media(&principal, &id, &media_id)
        .await?;
    Ok((StatusCode::CREATED, Json(item)))
}

#[utoipa::path(
    delete,
    path = "/assets/{id}/media/{media_id}",
    params(
        ("id" = String, Path, description = "Asset ID"),
        ("media_id" = String, Path, description = "Media ID")
    ),
    responses(
        (status = 204, description = "Media detached"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not attached")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "assets"
)]
pub async fn detach_media(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path((id, media_id)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    state
        .gallery
        .detach_media(&principal, &id, &media_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    put,
    path = "/assets/{id}/media/{media_id}/status",
    params(
        ("id" = String, Path, description = "Asset ID"),
        ("media_id" = String, Path, description = "Media ID")
    ),
    request_body = LinkStatusBody,
    responses(
        (status = 200, description = "Display status updated", body = MediaItem),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not attached")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "assets"
)]
pub async fn update_link_status(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path((id, media_id)): Path<(String, String)>,
    Json(body): Json<LinkStatusBody>,
) -> Result<Json<MediaItem>, AppError> {
    let item = state
        .gallery
        .update_association_status(&principal, &id, &media_id, body.status)
        .await?;
    Ok(Json(item))
}

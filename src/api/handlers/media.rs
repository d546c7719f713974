use crate::AppState;
use crate::api::error::AppError;
use crate::gateway::{MediaField, ResolvedUrl};
use crate::models::{Media, Principal};
use crate::services::gallery_service::NewMedia;
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use utoipa::IntoParams;

#[derive(Deserialize, IntoParams)]
pub struct ResolveQuery {
    /// Storage key or absolute URL
    pub locator: String,
}

#[utoipa::path(
    post,
    path = "/media",
    request_body = NewMedia,
    responses(
        (status = 201, description = "Media created", body = Media),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "media"
)]
pub async fn create_media(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<NewMedia>,
) -> Result<(StatusCode, Json<Media>), AppError> {
    let media = state.gallery.create_media(&principal, req).await?;
    Ok((StatusCode::CREATED, Json(media)))
}

/// Body is `{"field": "moderation_status" | "preference_status", "value": ...}`.
#[utoipa::path(
    patch,
    path = "/media/{id}",
    params(
        ("id" = String, Path, description = "Media ID")
    ),
    responses(
        (status = 200, description = "Media updated", body = Media),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Media not found")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "media"
)]
pub async fn update_media(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    Json(field): Json<MediaField>,
) -> Result<Json<Media>, AppError> {
    Ok(Json(
        state
            .gallery
            .update_media_field(&principal, &id, field)
            .await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/media/{id}",
    params(
        ("id" = String, Path, description = "Media ID")
    ),
    responses(
        (status = 204, description = "Media deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Media not found")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "media"
)]
pub async fn delete_media(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.gallery.delete_media(&principal, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/media/resolve",
    params(ResolveQuery),
    responses(
        (status = 200, description = "Playable URL", body = ResolvedUrl),
        (status = 400, description = "Invalid locator")
    ),
    tag = "media"
)]
pub async fn resolve_media(
    State(state): State<AppState>,
    Query(query): Query<ResolveQuery>,
) -> Result<Json<ResolvedUrl>, AppError> {
    let url = state.gallery.resolve_playable_url(&query.locator)?;
    Ok(Json(ResolvedUrl { url }))
}

pub mod api;
pub mod config;
pub mod entities;
pub mod gateway;
pub mod infrastructure;
pub mod models;
pub mod services;
pub mod status;
pub mod store;
pub mod sync;
pub mod utils;

use crate::config::GalleryConfig;
use crate::services::gallery_service::GalleryService;
use axum::{
    Router,
    http::HeaderValue,
    middleware::from_fn_with_state,
    routing::{get, patch, post, put},
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::health::health_check,
        api::handlers::assets::get_asset,
        api::handlers::assets::create_asset,
        api::handlers::assets::update_asset,
        api::handlers::assets::delete_asset,
        api::handlers::assets::list_asset_media,
        api::handlers::assets::attach_media,
        api::handlers::assets::detach_media,
        api::handlers::assets::update_link_status,
        api::handlers::media::create_media,
        api::handlers::media::update_media,
        api::handlers::media::delete_media,
        api::handlers::media::resolve_media,
        api::handlers::users::get_user,
    ),
    components(
        schemas(
            api::handlers::health::HealthResponse,
            models::Asset,
            models::AssetKind,
            models::Classification,
            models::LinkInfo,
            models::Media,
            models::MediaItem,
            models::Profile,
            status::ModerationStatus,
            status::PreferenceStatus,
            services::gallery_service::NewAsset,
            services::gallery_service::NewMedia,
            gateway::LinkStatusBody,
            gateway::ResolvedUrl,
        )
    ),
    tags(
        (name = "assets", description = "Assets and their media associations"),
        (name = "media", description = "Media items"),
        (name = "users", description = "Public profiles"),
        (name = "system", description = "Health")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub gallery: Arc<GalleryService>,
    pub config: GalleryConfig,
}

pub fn create_app(state: AppState) -> Router {
    let auth = from_fn_with_state(state.clone(), api::middleware::auth::auth_middleware);

    let gallery = Router::new()
        .route("/assets", post(api::handlers::assets::create_asset))
        .route(
            "/assets/:id",
            get(api::handlers::assets::get_asset)
                .patch(api::handlers::assets::update_asset)
                .delete(api::handlers::assets::delete_asset),
        )
        .route(
            "/assets/:id/media",
            get(api::handlers::assets::list_asset_media),
        )
        .route(
            "/assets/:id/media/:media_id",
            post(api::handlers::assets::attach_media).delete(api::handlers::assets::detach_media),
        )
        .route(
            "/assets/:id/media/:media_id/status",
            put(api::handlers::assets::update_link_status),
        )
        .route("/media", post(api::handlers::media::create_media))
        .route("/media/resolve", get(api::handlers::media::resolve_media))
        .route(
            "/media/:id",
            patch(api::handlers::media::update_media).delete(api::handlers::media::delete_media),
        )
        .route("/users/:id", get(api::handlers::users::get_user))
        .route_layer(auth);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(api::handlers::health::health_check))
        .merge(gallery)
        .layer(cors_layer(&state.config))
        .with_state(state)
}

fn cors_layer(config: &GalleryConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

use asset_gallery::config::GalleryConfig;
use asset_gallery::gateway::{AssetField, GatewayError, HttpGateway, RemoteGateway};
use asset_gallery::infrastructure::database;
use asset_gallery::models::{AssetKind, Classification, Principal};
use asset_gallery::services::gallery_service::{GalleryService, NewAsset, NewMedia};
use asset_gallery::status::{ModerationStatus, PreferenceStatus};
use asset_gallery::sync::{StatusChange, SyncEngine, SyncError, SyncOptions};
use asset_gallery::utils::auth::create_jwt;
use asset_gallery::{AppState, create_app};
use sea_orm::Database;
use std::sync::Arc;
use std::time::Duration;

struct Server {
    base_url: String,
    gallery: Arc<GalleryService>,
    owner_id: String,
    owner_token: String,
    stranger_token: String,
    asset_id: String,
    media_ids: Vec<String>,
}

async fn spawn_server() -> Server {
    let config = GalleryConfig::development();
    let db = Database::connect("sqlite::memory:").await.unwrap();
    database::run_migrations(&db).await.unwrap();

    let owner = database::ensure_user(&db, "owner", None, false).await.unwrap();
    let stranger = database::ensure_user(&db, "stranger", None, false)
        .await
        .unwrap();
    let gallery = Arc::new(GalleryService::new(db.clone(), "https://cdn.example.com/").unwrap());

    let principal = Principal::member(owner.id.clone());
    let mut media_ids = Vec::new();
    for name in ["one", "two", "three"] {
        let media = gallery
            .create_media(
                &principal,
                NewMedia {
                    locator: format!("videos/{name}.mp4"),
                    title: Some(name.to_string()),
                    description: None,
                    creator: None,
                    classification: Classification::Generation,
                    metadata: None,
                },
            )
            .await
            .unwrap();
        media_ids.push(media.id);
    }
    let asset = gallery
        .create_asset(
            &principal,
            NewAsset {
                name: "Wan Motion".to_string(),
                description: None,
                creator: None,
                kind: AssetKind::Workflow,
                curator_id: None,
                media_ids: media_ids.clone(),
                primary_media_id: None,
            },
        )
        .await
        .unwrap();

    let state = AppState {
        db,
        gallery: gallery.clone(),
        config: config.clone(),
    };
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, create_app(state)).await.unwrap();
    });

    Server {
        base_url: format!("http://{addr}"),
        gallery,
        owner_token: create_jwt(&owner.id, &config.jwt_secret, 1).unwrap(),
        stranger_token: create_jwt(&stranger.id, &config.jwt_secret, 1).unwrap(),
        owner_id: owner.id,
        asset_id: asset.id,
        media_ids,
    }
}

fn gateway(server: &Server, token: Option<&str>) -> HttpGateway {
    HttpGateway::new(&server.base_url, token, Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_http_gateway_reads() {
    let server = spawn_server().await;
    let gw = gateway(&server, None);

    let asset = gw.get_asset(&server.asset_id).await.unwrap();
    assert_eq!(asset.name, "Wan Motion");
    assert_eq!(asset.user_id.as_deref(), Some(server.owner_id.as_str()));

    let items = gw.get_associations(&server.asset_id).await.unwrap();
    assert_eq!(items.len(), 3);
    for id in &server.media_ids {
        assert!(items.iter().any(|item| item.id() == id));
    }

    let profile = gw.get_profile(&server.owner_id).await.unwrap();
    assert_eq!(profile.username, "owner");

    assert_eq!(
        gw.resolve_playable_url("videos/one.mp4").await.unwrap(),
        "https://cdn.example.com/videos/one.mp4"
    );

    assert!(matches!(
        gw.get_asset("missing").await,
        Err(GatewayError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_http_gateway_maps_refusals() {
    let server = spawn_server().await;

    let anonymous = gateway(&server, None);
    let err = anonymous
        .update_asset_field(
            &server.asset_id,
            AssetField::PreferenceStatus(PreferenceStatus::Hidden),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Rejected(_)));

    let stranger = gateway(&server, Some(&server.stranger_token));
    let err = stranger.delete_asset(&server.asset_id).await.unwrap_err();
    assert!(matches!(err, GatewayError::Rejected(_)));

    let owner = gateway(&server, Some(&server.owner_token));
    let err = owner
        .update_asset_field(
            &server.asset_id,
            AssetField::PrimaryMediaId("not-linked".to_string()),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Rejected(_)));
}

#[tokio::test]
async fn test_http_gateway_transport_failure() {
    let gw = HttpGateway::new("http://127.0.0.1:9", None, Duration::from_millis(500)).unwrap();
    assert!(matches!(
        gw.get_asset("a1").await,
        Err(GatewayError::Transport(_))
    ));
}

#[tokio::test]
async fn test_engine_over_http() {
    let server = spawn_server().await;
    let owner = Principal::member(server.owner_id.clone());
    let gw: Arc<dyn RemoteGateway> = Arc::new(gateway(&server, Some(&server.owner_token)));
    let opts = SyncOptions {
        refetch_after_commit: false,
        ..SyncOptions::default()
    };
    let engine = SyncEngine::open(gw, owner, &server.asset_id, opts)
        .await
        .unwrap();

    let target = server.media_ids[0].clone();
    engine.request_set_primary(&target).await.unwrap();
    engine
        .request_status_change(StatusChange::AssetPreference(PreferenceStatus::Pinned))
        .await
        .unwrap();

    let stored = server
        .gallery
        .get_asset(&Principal::anonymous(), &server.asset_id)
        .await
        .unwrap();
    assert_eq!(stored.primary_media_id.as_deref(), Some(target.as_str()));
    assert_eq!(stored.preference_status, PreferenceStatus::Pinned);

    // The owner is not an administrator: refused locally, nothing sent.
    let err = engine
        .request_status_change(StatusChange::AssetModeration(ModerationStatus::Featured))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Unauthorized(_)));

    engine.refresh().await.unwrap();
    assert_eq!(engine.visible_items()[0].id(), target);
}

#[tokio::test]
async fn test_engine_rolls_back_when_server_refuses() {
    let server = spawn_server().await;
    // The engine believes it acts as the owner, but the token belongs to a
    // stranger, so the server refuses the write.
    let believed = Principal::member(server.owner_id.clone());
    let gw: Arc<dyn RemoteGateway> = Arc::new(gateway(&server, Some(&server.stranger_token)));
    let engine = SyncEngine::open(gw, believed, &server.asset_id, SyncOptions::default())
        .await
        .unwrap();
    let before = engine.store();

    let err = engine
        .request_status_change(StatusChange::LinkStatus {
            media_id: server.media_ids[1].clone(),
            status: PreferenceStatus::Hidden,
        })
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SyncError::RemoteFailure {
            source: GatewayError::Rejected(_),
            ..
        }
    ));
    assert_eq!(engine.store(), before);
}

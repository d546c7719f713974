use asset_gallery::config::GalleryConfig;
use asset_gallery::entities::{prelude::Users, users};
use asset_gallery::gateway::HttpGateway;
use asset_gallery::infrastructure::database;
use asset_gallery::models::Principal;
use asset_gallery::services::gallery_service::GalleryService;
use asset_gallery::sync::SyncEngine;
use asset_gallery::utils::auth::{create_jwt, validate_jwt};
use asset_gallery::{AppState, create_app};
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the gallery API server
    Serve {
        /// Port for the API server
        #[arg(short, long, default_value_t = 3000)]
        port: u16,
    },
    /// Create a user (or print the existing one)
    User {
        #[arg(short, long)]
        username: String,
        #[arg(short, long)]
        display_name: Option<String>,
        #[arg(long)]
        admin: bool,
    },
    /// Mint a bearer token for an existing user (id or username)
    Token {
        #[arg(short, long)]
        user: String,
    },
    /// Open an asset through the HTTP API and print what the viewer sees
    Show {
        #[arg(short, long)]
        asset: String,
        #[arg(short, long, default_value = "http://localhost:3000")]
        server: String,
        #[arg(short, long)]
        token: Option<String>,
        /// Treat the token holder as an administrator
        #[arg(long)]
        admin: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initial Environment & Logging Setup
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "asset_gallery=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = GalleryConfig::from_env();

    match args.command {
        Command::Serve { port } => serve(config, port).await,
        Command::User {
            username,
            display_name,
            admin,
        } => {
            let db = database::setup_database(&config.database_url).await?;
            let user =
                database::ensure_user(&db, &username, display_name.as_deref(), admin).await?;
            println!("{}", user.id);
            Ok(())
        }
        Command::Token { user } => {
            let db = database::setup_database(&config.database_url).await?;
            let found = match Users::find_by_id(user.clone()).one(&db).await? {
                Some(found) => Some(found),
                None => {
                    Users::find()
                        .filter(users::Column::Username.eq(user.as_str()))
                        .one(&db)
                        .await?
                }
            };
            let Some(found) = found else {
                anyhow::bail!("no user with id or username {user}");
            };
            let token = create_jwt(&found.id, &config.jwt_secret, config.token_ttl_hours)?;
            println!("{token}");
            Ok(())
        }
        Command::Show {
            asset,
            server,
            token,
            admin,
        } => show(config, &server, &asset, token.as_deref(), admin).await,
    }
}

async fn serve(config: GalleryConfig, port: u16) -> anyhow::Result<()> {
    info!("🚀 Starting Asset Gallery...");

    // 2. Setup Common Infrastructure
    let db = database::setup_database(&config.database_url).await?;
    let gallery = Arc::new(GalleryService::new(db.clone(), &config.media_base_url)?);
    info!(
        "🎬 Media base: {}, page size: {}, conflicts: {:?}",
        config.media_base_url, config.page_size, config.conflict_policy
    );

    let state = AppState {
        db,
        gallery,
        config,
    };

    // Configure tracing layer for HTTP requests
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &axum::http::Request<_>| {
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
            )
        })
        .on_request(|request: &axum::http::Request<_>, _span: &tracing::Span| {
            info!("📥 {} {}", request.method(), request.uri());
        })
        .on_response(
            |response: &axum::http::Response<_>,
             latency: std::time::Duration,
             _span: &tracing::Span| {
                info!(
                    "📤 Finished in {:?} with status {}",
                    latency,
                    response.status()
                );
            },
        );

    let app = create_app(state).layer(trace_layer);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("✅ API Server listening on: http://0.0.0.0:{}", port);
    info!("📖 Swagger UI documentation: http://localhost:{}/swagger-ui", port);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("❌ Server runtime error: {}", e);
    }

    info!("👋 Gallery exited cleanly.");
    Ok(())
}

async fn show(
    config: GalleryConfig,
    server: &str,
    asset_id: &str,
    token: Option<&str>,
    admin: bool,
) -> anyhow::Result<()> {
    let principal = match token {
        Some(token) => {
            let user_id = match validate_jwt(token, &config.jwt_secret) {
                Ok(claims) => Some(claims.sub),
                Err(e) => {
                    warn!("Could not read token locally ({}); ownership is unknown", e);
                    None
                }
            };
            Principal {
                user_id,
                is_admin: admin,
            }
        }
        None => Principal::anonymous(),
    };

    let gateway = Arc::new(HttpGateway::new(server, token, config.gateway_timeout())?);
    let engine = SyncEngine::open(gateway, principal, asset_id, config.sync_options()).await?;
    let view = engine.ordered_visible_items();

    let Some(asset) = view.asset else {
        println!("Asset {asset_id} is not available");
        return Ok(());
    };
    println!("{} ({:?})", asset.name, asset.kind);
    if let Some(creator) = engine.creator_name().await {
        println!("by {creator}");
    }
    for section in view.sections {
        println!(
            "\n[{:?}] page {}/{} ({} item(s))",
            section.classification, section.page, section.total_pages, section.total_items
        );
        for item in section.items {
            let marker = if item.is_primary() { "*" } else { " " };
            println!(
                "{} {}  {}  {}",
                marker,
                item.id(),
                item.effective_status(),
                item.media.title.as_deref().unwrap_or("(untitled)")
            );
        }
    }

    engine.close();
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("⌨️  Ctrl+C received, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("💤 SIGTERM received, initiating graceful shutdown...");
        },
    }
}

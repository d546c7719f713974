use crate::entities::{asset_media, assets, media, prelude::*, users};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectOptions, ConnectionTrait, Database, DatabaseConnection,
    EntityTrait, QueryFilter, Schema, Set,
};
use std::time::Duration;
use tracing::info;

pub async fn setup_database(db_url: &str) -> anyhow::Result<DatabaseConnection> {
    info!("📂 Database: {}", db_url);

    let mut opt = ConnectOptions::new(db_url);
    opt.max_connections(20)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(30))
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .sqlx_logging(true)
        .sqlx_logging_level(log::LevelFilter::Debug);

    let db = Database::connect(opt).await?;

    info!("✅ Database connected successfully");

    run_migrations(&db).await?;

    Ok(db)
}

/// Creates the gallery tables from the entities if they are missing.
pub async fn run_migrations(db: &DatabaseConnection) -> anyhow::Result<()> {
    info!("🔄 Running SeaORM auto-migrations...");
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    // Parents before children so foreign keys resolve.
    let stmts = vec![
        schema
            .create_table_from_entity(users::Entity)
            .if_not_exists()
            .to_owned(),
        schema
            .create_table_from_entity(assets::Entity)
            .if_not_exists()
            .to_owned(),
        schema
            .create_table_from_entity(media::Entity)
            .if_not_exists()
            .to_owned(),
        schema
            .create_table_from_entity(asset_media::Entity)
            .if_not_exists()
            .to_owned(),
    ];

    for stmt in stmts {
        db.execute(builder.build(&stmt)).await?;
    }

    Ok(())
}

/// Returns the user named `username`, creating it if needed.
pub async fn ensure_user(
    db: &DatabaseConnection,
    username: &str,
    display_name: Option<&str>,
    is_admin: bool,
) -> anyhow::Result<users::Model> {
    if let Some(existing) = Users::find()
        .filter(users::Column::Username.eq(username))
        .one(db)
        .await?
    {
        return Ok(existing);
    }

    let user = users::ActiveModel {
        id: Set(uuid::Uuid::new_v4().to_string()),
        username: Set(username.to_string()),
        display_name: Set(display_name.map(str::to_string)),
        is_admin: Set(is_admin),
        created_at: Set(Utc::now()),
    }
    .insert(db)
    .await?;

    info!("👤 Created user {} ({})", user.username, user.id);
    Ok(user)
}

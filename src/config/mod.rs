use crate::sync::{ConflictPolicy, SyncOptions};
use std::env;
use std::time::Duration;

/// Server and sync configuration
#[derive(Debug, Clone)]
pub struct GalleryConfig {
    /// Database connection string (default: "sqlite:gallery.db?mode=rwc")
    pub database_url: String,

    /// JWT Secret Key
    pub jwt_secret: String,

    /// Lifetime of minted tokens in hours (default: 24)
    pub token_ttl_hours: i64,

    /// Base URL that storage locators are resolved against
    pub media_base_url: String,

    /// Items per classification page (default: 12, 0 disables paging)
    pub page_size: usize,

    /// Re-fetch associations after a committed membership change (default: true)
    pub refetch_after_commit: bool,

    /// What a second write to a pending field does: "queue" or "reject"
    pub conflict_policy: ConflictPolicy,

    /// Timeout for each remote gateway request in seconds (default: 15)
    pub gateway_timeout_secs: u64,

    /// Allowed CORS Origins (comma separated)
    pub allowed_origins: Vec<String>,
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite:gallery.db?mode=rwc".to_string(),
            jwt_secret: "secret".to_string(),
            token_ttl_hours: 24,
            media_base_url: "http://localhost:3000/files/".to_string(),
            page_size: 12,
            refetch_after_commit: true,
            conflict_policy: ConflictPolicy::Queue,
            gateway_timeout_secs: 15,
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(), // Vite default
                "http://127.0.0.1:3000".to_string(),
            ],
        }
    }
}

impl GalleryConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            database_url: env::var("DATABASE_URL").unwrap_or(default.database_url),

            jwt_secret: env::var("JWT_SECRET").unwrap_or(default.jwt_secret),

            token_ttl_hours: env::var("TOKEN_TTL_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.token_ttl_hours),

            media_base_url: env::var("MEDIA_BASE_URL").unwrap_or(default.media_base_url),

            page_size: env::var("PAGE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.page_size),

            refetch_after_commit: env::var("REFETCH_AFTER_COMMIT")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(default.refetch_after_commit),

            conflict_policy: env::var("CONFLICT_POLICY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.conflict_policy),

            gateway_timeout_secs: env::var("GATEWAY_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.gateway_timeout_secs),

            allowed_origins: env::var("ALLOWED_ORIGINS")
                .ok()
                .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(default.allowed_origins),
        }
    }

    /// In-memory database and no background re-fetch
    pub fn development() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            refetch_after_commit: false,
            ..Self::default()
        }
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            page_size: self.page_size,
            refetch_after_commit: self.refetch_after_commit,
            conflict_policy: self.conflict_policy,
        }
    }

    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_secs(self.gateway_timeout_secs)
    }
}

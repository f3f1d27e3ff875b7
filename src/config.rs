use anyhow::Result;
use config::{Config, ConfigError, Environment, File};
use ingest::{FetchOptions, Importer, IntegrationAppClient};
use moka::future::Cache;
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::schemas::AppState;

const CONFIG_FILE: &str = "config/glsync.toml";

/// Runtime settings for the integration API and webhook verification.
///
/// Read from the optional `config/glsync.toml` and from `GLSYNC__*`
/// environment variables (e.g. `GLSYNC__WORKSPACE_SECRET`).
#[derive(Clone, Deserialize)]
pub struct SyncSettings {
    /// Base URL of the integration API. Server-side imports are disabled without it.
    #[serde(default)]
    pub integration_api_url: Option<String>,
    #[serde(default)]
    pub integration_api_token: Option<String>,
    /// Secret the webhook tokens are signed with.
    #[serde(default)]
    pub workspace_secret: Option<String>,
    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Per-request limit on the HTTP routes. Import runs are exempt.
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            integration_api_url: None,
            integration_api_token: None,
            workspace_secret: None,
            page_delay_ms: default_page_delay_ms(),
            max_pages: default_max_pages(),
            request_timeout_secs: default_request_timeout_secs(),
            http_timeout_secs: default_http_timeout_secs(),
        }
    }
}

fn default_page_delay_ms() -> u64 {
    100
}

fn default_max_pages() -> usize {
    500
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_http_timeout_secs() -> u64 {
    30
}

impl fmt::Debug for SyncSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncSettings")
            .field("integration_api_url", &self.integration_api_url)
            .field("integration_api_token", &self.integration_api_token.as_ref().map(|_| "***"))
            .field("workspace_secret", &self.workspace_secret.as_ref().map(|_| "***"))
            .field("page_delay_ms", &self.page_delay_ms)
            .field("max_pages", &self.max_pages)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .finish()
    }
}

impl SyncSettings {
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(
                Environment::with_prefix("GLSYNC")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut loaded: SyncSettings = settings.try_deserialize()?;
        // empty env values mean "unset"
        for value in [
            &mut loaded.integration_api_url,
            &mut loaded.integration_api_token,
            &mut loaded.workspace_secret,
        ] {
            if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
                *value = None;
            }
        }
        Ok(loaded)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            page_delay: Duration::from_millis(self.page_delay_ms),
            max_pages: self.max_pages,
        }
    }
}

pub fn build_cache() -> Cache<String, crate::schemas::CachedData> {
    Cache::builder()
        .max_capacity(1000)
        .time_to_live(Duration::from_secs(300)) // 5 minutes
        .support_invalidation_closures()
        .build()
}

/// Loads settings and assembles the shared state around an open connection.
pub fn initialize_app_state(db: DatabaseConnection) -> Result<AppState> {
    dotenvy::dotenv().ok();
    let settings = SyncSettings::load()?;
    debug!("Loaded settings: {:?}", settings);
    build_state(db, settings)
}

pub fn build_state(db: DatabaseConnection, settings: SyncSettings) -> Result<AppState> {
    let importer = match &settings.integration_api_url {
        Some(url) => {
            info!("Server-side imports will call {}", url);
            let client = IntegrationAppClient::new(
                url.clone(),
                Duration::from_secs(settings.request_timeout_secs),
            )?
            .with_token(settings.integration_api_token.clone());
            Some(Importer::new(Arc::new(client), db.clone(), settings.fetch_options()))
        }
        None => {
            warn!("GLSYNC__INTEGRATION_API_URL is not set, server-side imports are disabled");
            None
        }
    };

    if settings.workspace_secret.is_none() {
        warn!("GLSYNC__WORKSPACE_SECRET is not set, every webhook will be rejected");
    }

    Ok(AppState {
        db,
        cache: build_cache(),
        settings: Arc::new(settings),
        importer,
        count_epochs: Arc::default(),
    })
}

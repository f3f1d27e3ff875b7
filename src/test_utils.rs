#[cfg(test)]
pub mod test_utils {
    use crate::auth::sign_token;
    use crate::config::{build_cache, SyncSettings};
    use crate::router::create_router;
    use crate::schemas::AppState;
    use axum::Router;
    use ingest::{ActionClient, ActionPage, ExternalRecord, FetchOptions, Importer};
    use migration::{Migrator, MigratorTrait};
    use sea_orm::{Database, DatabaseConnection};
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;
    use tracing::Level;
    use tracing_subscriber::FmtSubscriber;

    pub const TEST_SECRET: &str = "test-workspace-secret";

    /// Create an in-memory SQLite database for testing
    pub async fn setup_test_db() -> DatabaseConnection {
        let db = Database::connect("sqlite::memory:")
            .await
            .expect("Failed to connect to in-memory database");

        // Run migrations
        Migrator::up(&db, None)
            .await
            .expect("Failed to run migrations");

        db
    }

    /// Serves fixed single pages keyed by (connection id, action).
    #[derive(Default)]
    pub struct StaticClient {
        pages: HashMap<(String, String), Vec<ExternalRecord>>,
        delay: Duration,
    }

    impl StaticClient {
        /// Every action call waits `delay` before answering.
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        pub fn with_records(mut self, connection_id: &str, action: &str, records: Vec<Value>) -> Self {
            let records = records
                .into_iter()
                .map(|fields| {
                    let id = fields["id"].as_str().unwrap_or_default().to_string();
                    ExternalRecord::new(id, fields)
                })
                .collect();
            self.pages
                .insert((connection_id.to_string(), action.to_string()), records);
            self
        }
    }

    #[axum::async_trait]
    impl ActionClient for StaticClient {
        async fn run_action(
            &self,
            connection_id: &str,
            action: &str,
            _cursor: Option<&str>,
        ) -> ingest::Result<ActionPage> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let records = self
                .pages
                .get(&(connection_id.to_string(), action.to_string()))
                .cloned()
                .unwrap_or_default();
            Ok(ActionPage {
                records,
                cursor: None,
            })
        }
    }

    fn test_settings() -> SyncSettings {
        SyncSettings {
            workspace_secret: Some(TEST_SECRET.to_string()),
            page_delay_ms: 0,
            ..Default::default()
        }
    }

    /// Create AppState for testing; imports stay disabled
    pub async fn setup_test_app_state() -> AppState {
        let db = setup_test_db().await;
        AppState {
            db,
            cache: build_cache(),
            settings: Arc::new(test_settings()),
            importer: None,
            count_epochs: Arc::default(),
        }
    }

    /// Initialize tracing for tests with output to STDERR.
    ///
    /// The log level comes from RUST_LOG and defaults to WARN.
    fn init_test_tracing() -> tracing::subscriber::DefaultGuard {
        let log_level = std::env::var("RUST_LOG")
            .ok()
            .and_then(|level| match level.to_uppercase().as_str() {
                "ERROR" => Some(Level::ERROR),
                "WARN" => Some(Level::WARN),
                "INFO" => Some(Level::INFO),
                "DEBUG" => Some(Level::DEBUG),
                "TRACE" => Some(Level::TRACE),
                _ => None,
            })
            .unwrap_or(Level::WARN);

        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_writer(std::io::stderr) // Output to stderr, which is captured by tests
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    /// Create axum app for testing
    pub async fn setup_test_app() -> Router {
        let _ = init_test_tracing();
        create_router(setup_test_app_state().await)
    }

    /// Create axum app whose imports are served by `client`. Routes time out
    /// after one second.
    pub async fn setup_test_app_with_client(client: StaticClient) -> Router {
        let _ = init_test_tracing();
        let mut state = setup_test_app_state().await;
        state.settings = Arc::new(SyncSettings {
            http_timeout_secs: 1,
            ..test_settings()
        });
        let options = FetchOptions {
            page_delay: Duration::ZERO,
            max_pages: 10,
        };
        state.importer = Some(Importer::new(Arc::new(client), state.db.clone(), options));
        create_router(state)
    }

    /// A webhook token for `user_id`, signed with [`TEST_SECRET`]
    pub fn webhook_token(user_id: &str) -> String {
        sign_token(&json!({"iss": "test-workspace", "id": user_id}), TEST_SECRET)
    }
}

//! Test doubles shared by the unit tests of this crate.

use async_trait::async_trait;
use migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::error::{IngestError, Result};
use crate::source::{ActionClient, ActionPage, ExternalRecord};

pub async fn setup_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("Failed to connect to in-memory database");
    Migrator::up(&db, None).await.expect("Migrations failed.");
    db
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// In-memory [`ActionClient`] replaying scripted pages. Cursors are `p<N>`
/// where `N` is the index of the next page.
#[derive(Default)]
pub struct ScriptedClient {
    pages: HashMap<(String, String), Vec<Vec<ExternalRecord>>>,
    failing: HashSet<String>,
    endless: HashSet<String>,
    calls: Mutex<Vec<(String, String, Option<String>)>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pages(
        mut self,
        connection_id: &str,
        action: &str,
        pages: Vec<Vec<ExternalRecord>>,
    ) -> Self {
        self.pages
            .insert((connection_id.to_string(), action.to_string()), pages);
        self
    }

    /// Every call to `action` fails with a 502 from upstream.
    pub fn failing(mut self, action: &str) -> Self {
        self.failing.insert(action.to_string());
        self
    }

    /// `action` keeps returning a non-empty page with a cursor.
    pub fn endless(mut self, action: &str) -> Self {
        self.endless.insert(action.to_string());
        self
    }

    pub fn calls(&self) -> Vec<(String, String, Option<String>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ActionClient for ScriptedClient {
    async fn run_action(
        &self,
        connection_id: &str,
        action: &str,
        cursor: Option<&str>,
    ) -> Result<ActionPage> {
        self.calls.lock().unwrap().push((
            connection_id.to_string(),
            action.to_string(),
            cursor.map(str::to_string),
        ));

        if self.failing.contains(action) {
            return Err(IngestError::Upstream {
                action: action.to_string(),
                status: 502,
            });
        }
        if self.endless.contains(action) {
            return Ok(ActionPage {
                records: vec![ExternalRecord::new("loop", serde_json::json!({"id": "loop"}))],
                cursor: Some("again".to_string()),
            });
        }

        let index = cursor
            .and_then(|c| c.strip_prefix('p'))
            .and_then(|n| n.parse::<usize>().ok())
            .unwrap_or(0);
        let Some(pages) = self
            .pages
            .get(&(connection_id.to_string(), action.to_string()))
        else {
            return Ok(ActionPage::default());
        };
        let records = pages.get(index).cloned().unwrap_or_default();
        let cursor = (index + 1 < pages.len()).then(|| format!("p{}", index + 1));
        Ok(ActionPage { records, cursor })
    }
}

pub fn record(id: &str, fields: serde_json::Value) -> ExternalRecord {
    ExternalRecord::new(id, fields)
}

use ingest::Importer;
use moka::future::Cache;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use common::Resource;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use utoipa::{OpenApi, ToSchema};

use crate::config::SyncSettings;
use crate::handlers::records::{
    BulkUpsertRequest, BulkUpsertResponse, CountResponse, LedgerAccountPage,
    LedgerAccountResponse, LedgerEntryPage, LedgerEntryResponse,
};
use crate::handlers::imports::{ImportRequest, ImportResponse};
use crate::handlers::webhooks::{
    WebhookDeleteRequest, WebhookDeleteResponse, WebhookFields, WebhookStatusResponse,
    WebhookUpsertRequest, WebhookUpsertResponse,
};

/// Application state shared across handlers
#[derive(Clone, Debug)]
pub struct AppState {
    /// Database connection
    pub db: DatabaseConnection,
    /// Cache for count-only responses
    pub cache: Cache<String, CachedData>,
    pub settings: Arc<SyncSettings>,
    /// Server-side importer; `None` when no integration API is configured
    pub importer: Option<Importer>,
    pub count_epochs: Arc<CountEpochs>,
}

/// Per-resource write counters. A count computed across a write to the same
/// resource is not kept in the cache.
#[derive(Debug, Default)]
pub struct CountEpochs([AtomicU64; 3]);

impl CountEpochs {
    fn slot(&self, resource: Resource) -> &AtomicU64 {
        match resource {
            Resource::Transactions => &self.0[0],
            Resource::JournalEntries => &self.0[1],
            Resource::LedgerAccounts => &self.0[2],
        }
    }

    pub fn current(&self, resource: Resource) -> u64 {
        self.slot(resource).load(Ordering::SeqCst)
    }

    pub fn bump(&self, resource: Resource) {
        self.slot(resource).fetch_add(1, Ordering::SeqCst);
    }
}

/// Cached data types
#[derive(Clone, Debug)]
pub enum CachedData {
    Counts(CountResponse),
}

/// Error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
    /// Error code
    pub code: String,
    /// Success status (always false for errors)
    pub success: bool,
    /// Underlying cause, only reported by webhook endpoints
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub details: Option<String>,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service version
    pub version: String,
    /// Database connection status
    pub database: String,
    /// Whether server-side imports have an integration API to call
    pub imports_enabled: bool,
    /// Whether a webhook secret is configured
    pub webhooks_enabled: bool,
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::health::health_check,
        crate::handlers::transactions::upsert_transactions,
        crate::handlers::transactions::get_transactions,
        crate::handlers::journal_entries::upsert_journal_entries,
        crate::handlers::journal_entries::get_journal_entries,
        crate::handlers::ledger_accounts::upsert_ledger_accounts,
        crate::handlers::ledger_accounts::get_ledger_accounts,
        crate::handlers::imports::run_import,
        crate::handlers::webhooks::upsert_from_webhook,
        crate::handlers::webhooks::delete_from_webhook,
        crate::handlers::webhooks::webhook_status,
    ),
    components(
        schemas(
            ErrorResponse,
            HealthResponse,
            BulkUpsertRequest,
            BulkUpsertResponse,
            LedgerEntryResponse,
            LedgerEntryPage,
            LedgerAccountResponse,
            LedgerAccountPage,
            CountResponse,
            ImportRequest,
            ImportResponse,
            WebhookUpsertRequest,
            WebhookFields,
            WebhookUpsertResponse,
            WebhookDeleteRequest,
            WebhookDeleteResponse,
            WebhookStatusResponse,
            common::Classification,
            common::ImportContext,
            common::ImportResult,
            common::IntegrationCount,
            common::LineItem,
            common::LineItemType,
            common::AccountRef,
            common::Dimensions,
            common::DimensionTag,
            common::Resource,
            common::WriteAction,
            common::DeleteAction,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "transactions", description = "Imported transactions"),
        (name = "journal-entries", description = "Imported journal entries"),
        (name = "ledger-accounts", description = "Imported ledger accounts"),
        (name = "imports", description = "Server-side import runs"),
        (name = "webhooks", description = "Create, update and delete notifications from integrations"),
    ),
    info(
        title = "glsync API",
        description = "General ledger aggregation service for accounting integrations",
        version = "0.1.0",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    )
)]
pub struct ApiDoc;

//! Request/response shapes and helpers shared by the three record resources.

use axum::extract::rejection::JsonRejection;
use axum::response::Json;
use chrono::{DateTime, Utc};
use common::{Classification, ImportContext, IntegrationCount, LineItem, Resource};
use ingest::normalize::{NormalizeError, Normalizer};
use ingest::query::{self, ListFilter, Page, QueryTarget};
use ingest::{ExternalRecord, SyncTarget, upsert_batch};
use model::entities::{journal_entry, ledger_account, transaction};
use rust_decimal::Decimal;
use sea_orm::IntoActiveModel;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, trace, warn};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::error::ApiError;
use crate::schemas::{AppState, CachedData};

pub const DEFAULT_LIMIT: u64 = 50;

/// Bulk upsert of records already fetched by the caller
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BulkUpsertRequest {
    /// Records in the integration's unified field format
    #[schema(value_type = Vec<Object>)]
    pub records: Vec<Value>,
    #[validate(length(min = 1))]
    pub connection_id: String,
    #[validate(length(min = 1))]
    pub integration_id: String,
    pub integration_name: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BulkUpsertResponse {
    pub success: bool,
    /// Keys that did not exist before
    pub inserted: u64,
    /// Keys that existed and were overwritten
    pub modified: u64,
    /// Records submitted
    pub total: u64,
}

/// Query parameters for listing records
#[derive(Debug, Deserialize, ToSchema, IntoParams, Validate)]
#[serde(rename_all = "camelCase")]
#[into_params(rename_all = "camelCase", parameter_in = Query)]
pub struct ListQuery {
    /// Filter by integration (e.g. "quickbooks")
    pub integration_id: Option<String>,
    /// Filter by classification
    pub classification: Option<String>,
    /// Page size, 1 to 500 (default: 50)
    #[validate(range(min = 1, max = 500))]
    pub limit: Option<u64>,
    /// Rows to skip (default: 0)
    pub offset: Option<u64>,
    /// Return per-integration counts instead of rows
    pub count_only: Option<bool>,
}

/// A transaction or journal entry as stored
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntryResponse {
    pub id: i32,
    pub external_id: String,
    pub connection_id: String,
    pub integration_id: String,
    pub integration_name: Option<String>,
    pub user_id: Option<String>,
    pub classification: Option<Classification>,
    pub number: Option<String>,
    pub memo: Option<String>,
    pub currency: Option<String>,
    pub ledger_account_id: Option<String>,
    #[schema(value_type = Option<String>)]
    pub total_amount: Option<Decimal>,
    #[schema(value_type = Option<Vec<LineItem>>)]
    pub line_items: Option<Value>,
    pub transaction_date: Option<DateTime<Utc>>,
    pub created_time: Option<DateTime<Utc>>,
    pub updated_time: Option<DateTime<Utc>>,
    pub imported_at: Option<DateTime<Utc>>,
    pub synced_at: DateTime<Utc>,
    #[schema(value_type = Option<Object>)]
    pub raw_fields: Option<Value>,
}

macro_rules! entry_response_from {
    ($module:ident) => {
        impl From<$module::Model> for LedgerEntryResponse {
            fn from(model: $module::Model) -> Self {
                Self {
                    id: model.id,
                    external_id: model.external_id,
                    connection_id: model.connection_id,
                    integration_id: model.integration_id,
                    integration_name: model.integration_name,
                    user_id: model.user_id,
                    classification: model.classification,
                    number: model.number,
                    memo: model.memo,
                    currency: model.currency,
                    ledger_account_id: model.ledger_account_id,
                    total_amount: model.total_amount,
                    line_items: model.line_items,
                    transaction_date: model.transaction_date,
                    created_time: model.created_time,
                    updated_time: model.updated_time,
                    imported_at: model.imported_at,
                    synced_at: model.synced_at,
                    raw_fields: model.raw_fields,
                }
            }
        }

        impl StoredRow for $module::Model {
            fn row_id(&self) -> i32 {
                self.id
            }

            fn integration_name(&self) -> Option<String> {
                self.integration_name.clone()
            }

            fn integration_id(&self) -> String {
                self.integration_id.clone()
            }

            fn classification(&self) -> Option<String> {
                self.classification.map(|c| c.to_string())
            }
        }
    };
}

entry_response_from!(transaction);
entry_response_from!(journal_entry);

/// A ledger account as stored
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LedgerAccountResponse {
    pub id: i32,
    pub external_id: String,
    pub connection_id: String,
    pub integration_id: String,
    pub integration_name: Option<String>,
    pub user_id: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub account_type: Option<String>,
    pub status: Option<String>,
    pub classification: Option<String>,
    #[schema(value_type = Option<String>)]
    pub current_balance: Option<Decimal>,
    pub currency: Option<String>,
    pub created_time: Option<DateTime<Utc>>,
    pub updated_time: Option<DateTime<Utc>>,
    pub imported_at: Option<DateTime<Utc>>,
    pub synced_at: DateTime<Utc>,
    #[schema(value_type = Option<Object>)]
    pub raw_fields: Option<Value>,
}

impl From<ledger_account::Model> for LedgerAccountResponse {
    fn from(model: ledger_account::Model) -> Self {
        Self {
            id: model.id,
            external_id: model.external_id,
            connection_id: model.connection_id,
            integration_id: model.integration_id,
            integration_name: model.integration_name,
            user_id: model.user_id,
            name: model.name,
            account_type: model.account_type,
            status: model.status,
            classification: model.classification,
            current_balance: model.current_balance,
            currency: model.currency,
            created_time: model.created_time,
            updated_time: model.updated_time,
            imported_at: model.imported_at,
            synced_at: model.synced_at,
            raw_fields: model.raw_fields,
        }
    }
}

impl StoredRow for ledger_account::Model {
    fn row_id(&self) -> i32 {
        self.id
    }

    fn integration_name(&self) -> Option<String> {
        self.integration_name.clone()
    }

    fn integration_id(&self) -> String {
        self.integration_id.clone()
    }

    fn classification(&self) -> Option<String> {
        self.classification.clone()
    }
}

/// The few stored columns the webhook responses echo back.
pub trait StoredRow {
    fn row_id(&self) -> i32;
    fn integration_name(&self) -> Option<String>;
    fn integration_id(&self) -> String;
    fn classification(&self) -> Option<String>;
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LedgerEntryPage {
    pub records: Vec<LedgerEntryResponse>,
    pub total: u64,
    pub limit: u64,
    pub offset: u64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LedgerAccountPage {
    pub records: Vec<LedgerAccountResponse>,
    pub total: u64,
    pub limit: u64,
    pub offset: u64,
}

impl<M: Into<LedgerEntryResponse>> From<Page<M>> for LedgerEntryPage {
    fn from(page: Page<M>) -> Self {
        Self {
            records: page.records.into_iter().map(Into::into).collect(),
            total: page.total,
            limit: page.limit,
            offset: page.offset,
        }
    }
}

impl From<Page<ledger_account::Model>> for LedgerAccountPage {
    fn from(page: Page<ledger_account::Model>) -> Self {
        Self {
            records: page.records.into_iter().map(Into::into).collect(),
            total: page.total,
            limit: page.limit,
            offset: page.offset,
        }
    }
}

/// Per-integration counts (`countOnly=true`)
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CountResponse {
    pub counts: Vec<IntegrationCount>,
    /// Equals the sum of `counts`
    pub total: u64,
}

/// Unwraps a JSON body and runs its validation rules.
pub fn parse_body<T: Validate>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    let Json(body) = body.map_err(|e| ApiError::InvalidPayload(e.body_text()))?;
    body.validate()
        .map_err(|e| ApiError::InvalidPayload(e.to_string()))?;
    Ok(body)
}

pub fn parse_resource(raw: &str) -> Result<Resource, ApiError> {
    raw.parse::<Resource>()
        .map_err(|_| ApiError::UnknownResource(raw.to_string()))
}

/// Parses a transaction classification, rejecting unknown values.
pub fn parse_classification(raw: &str) -> Result<Classification, ApiError> {
    raw.parse::<Classification>()
        .map_err(|e| ApiError::InvalidClassification(e.to_string()))
}

/// Wraps a caller-supplied field object as an upstream record. A `rawFields`
/// key, when present, is the payload to keep for auditing.
pub fn to_external_record(value: Value, index: usize) -> Result<ExternalRecord, ApiError> {
    let Value::Object(mut fields) = value else {
        return Err(ApiError::InvalidPayload(format!(
            "records[{index}] is not an object"
        )));
    };
    let raw_fields = fields.remove("rawFields").filter(|raw| !raw.is_null());
    Ok(ExternalRecord {
        fields,
        raw_fields,
        ..Default::default()
    })
}

pub fn normalize_error(index: usize, error: NormalizeError) -> ApiError {
    match error {
        NormalizeError::InvalidClassification(_) => {
            ApiError::InvalidClassification(format!("records[{index}]: {error}"))
        }
        NormalizeError::MissingId => ApiError::InvalidPayload(format!("records[{index}]: {error}")),
    }
}

/// Signature shared by `Normalizer::entry` and `Normalizer::account`.
pub type NormalizeFn<R> = fn(&Normalizer, &ExternalRecord) -> Result<R, NormalizeError>;

/// Normalizes and writes a bulk request. Any invalid record rejects the
/// whole request before anything is written.
pub async fn bulk_upsert<E>(
    state: &AppState,
    resource: Resource,
    request: BulkUpsertRequest,
    normalize: NormalizeFn<E::Record>,
) -> Result<BulkUpsertResponse, ApiError>
where
    E: SyncTarget,
    E::Model: IntoActiveModel<E::Active>,
{
    trace!("Normalizing {} {} records", request.records.len(), resource);

    let normalizer = Normalizer::for_bulk();
    let mut records = Vec::with_capacity(request.records.len());
    for (index, value) in request.records.into_iter().enumerate() {
        let raw = to_external_record(value, index)?;
        records.push(normalize(&normalizer, &raw).map_err(|e| normalize_error(index, e))?);
    }

    let context = ImportContext::new(
        request.connection_id,
        request.integration_id,
        request.integration_name,
    )
    .with_user_id(request.user_id);

    let summary = upsert_batch::<E>(&state.db, &context, records).await?;
    invalidate_counts(state, resource);

    Ok(BulkUpsertResponse {
        success: true,
        inserted: summary.inserted,
        modified: summary.modified,
        total: summary.total,
    })
}

pub struct ListParams {
    pub filter: ListFilter,
    pub limit: u64,
    pub offset: u64,
    pub count_only: bool,
}

impl ListParams {
    /// `strict` rejects classifications outside the closed transaction set.
    pub fn from_query(query: ListQuery, strict: bool) -> Result<Self, ApiError> {
        let classification = match query.classification.filter(|c| !c.trim().is_empty()) {
            Some(raw) if strict => Some(parse_classification(&raw)?.to_string()),
            other => other,
        };
        Ok(Self {
            filter: ListFilter {
                integration_id: query.integration_id.filter(|i| !i.trim().is_empty()),
                classification,
            },
            limit: query.limit.unwrap_or(DEFAULT_LIMIT),
            offset: query.offset.unwrap_or(0),
            count_only: query.count_only.unwrap_or(false),
        })
    }
}

/// Grouped counts, served from the cache until the next write to `resource`.
pub async fn cached_counts<E: QueryTarget>(
    state: &AppState,
    resource: Resource,
    filter: &ListFilter,
) -> Result<CountResponse, ApiError>
where
    E::Model: Sync,
{
    let key = format!(
        "{}:counts:{}:{}",
        resource,
        filter.integration_id.as_deref().unwrap_or("*"),
        filter.classification.as_deref().unwrap_or("*")
    );

    if let Some(CachedData::Counts(cached)) = state.cache.get(&key).await {
        debug!("Serving {} from cache", key);
        return Ok(cached);
    }

    let epoch = state.count_epochs.current(resource);
    let counts = query::count_by_integration::<E>(&state.db, filter).await?;
    let response = CountResponse {
        counts: counts.counts,
        total: counts.total,
    };
    store_counts(state, resource, key, &response, epoch).await;
    Ok(response)
}

/// Caches `response` unless a write to `resource` happened after `epoch`
/// was read.
async fn store_counts(
    state: &AppState,
    resource: Resource,
    key: String,
    response: &CountResponse,
    epoch: u64,
) {
    state
        .cache
        .insert(key.clone(), CachedData::Counts(response.clone()))
        .await;
    // a write landed while counting; its invalidation may predate the insert
    if state.count_epochs.current(resource) != epoch {
        debug!("Dropping {} computed across a write", key);
        state.cache.invalidate(&key).await;
    }
}

/// Drops every cached count of `resource`.
pub fn invalidate_counts(state: &AppState, resource: Resource) {
    state.count_epochs.bump(resource);
    let prefix = format!("{}:", resource);
    if let Err(e) = state
        .cache
        .invalidate_entries_if(move |key, _| key.starts_with(&prefix))
    {
        warn!("Failed to invalidate cached counts for {}: {}", resource, e);
    }
}

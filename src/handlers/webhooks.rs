//! Single-record create/update/delete notifications pushed by integrations.
//!
//! Every route except the status check requires an `x-integration-app-token`.
//! The token is checked before the body is looked at.

use axum::{
    extract::{Path, State, rejection::JsonRejection},
    response::Json,
};
use chrono::Utc;
use common::{DeleteAction, ImportContext, Resource, WriteAction};
use ingest::normalize::{NormalizeError, Normalizer};
use ingest::query::find_by_key;
use ingest::{ExternalRecord, SyncTarget, delete_by_key, upsert_merge};
use model::entities::{journal_entry, ledger_account, transaction};
use sea_orm::IntoActiveModel;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, instrument, trace};
use utoipa::ToSchema;
use validator::Validate;

use super::records::{NormalizeFn, StoredRow, invalidate_counts, parse_body, parse_resource};
use crate::auth::IntegrationToken;
use crate::error::ApiError;
use crate::schemas::{AppState, ErrorResponse};

const UNKNOWN_INTEGRATION: &str = "unknown";

#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct WebhookUpsertRequest {
    #[validate(length(min = 1))]
    pub connection_id: String,
    #[validate(nested)]
    pub fields: WebhookFields,
}

#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct WebhookFields {
    /// Record id in the external system
    #[validate(length(min = 1))]
    pub id: String,
    /// Overrides `id` as the storage key when present
    #[serde(alias = "externalTransactionId")]
    pub external_id: Option<String>,
    /// The record in the unified field format
    #[schema(value_type = Object)]
    pub data: Map<String, Value>,
    pub integration_id: Option<String>,
    pub integration_name: Option<String>,
    pub classification: Option<String>,
}

impl WebhookFields {
    fn key(&self) -> String {
        self.external_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .unwrap_or(&self.id)
            .to_string()
    }

    /// The payload as an upstream record keyed by [`Self::key`]. A
    /// classification given next to `data` overrides the one inside it.
    fn to_external_record(&self) -> ExternalRecord {
        let key = self.key();
        let mut fields = self.data.clone();
        let raw_fields = fields
            .remove("rawFields")
            .filter(|raw| !raw.is_null())
            .or_else(|| Some(Value::Object(self.data.clone())));
        fields.insert("id".to_string(), Value::String(key.clone()));
        if let Some(classification) = &self.classification {
            fields.insert(
                "classification".to_string(),
                Value::String(classification.clone()),
            );
        }
        ExternalRecord {
            id: Some(key),
            fields,
            raw_fields,
            ..Default::default()
        }
    }

    fn integration_id(&self) -> Option<String> {
        self.integration_id
            .clone()
            .or_else(|| match self.data.get("integrationId") {
                Some(Value::String(id)) => Some(id.clone()),
                _ => None,
            })
            .filter(|id| !id.trim().is_empty())
    }
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WebhookUpsertResponse {
    pub success: bool,
    pub action: WriteAction,
    /// Row id
    pub id: i32,
    pub external_id: String,
    pub integration_name: Option<String>,
    pub classification: Option<String>,
    pub user_id: String,
}

#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct WebhookDeleteRequest {
    #[validate(length(min = 1))]
    pub connection_id: String,
    #[serde(alias = "externalTransactionId")]
    #[validate(length(min = 1))]
    pub external_id: String,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WebhookDeleteResponse {
    pub success: bool,
    pub action: DeleteAction,
    /// Row id of the deleted record
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i32>,
    pub external_id: String,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct WebhookStatusResponse {
    pub status: String,
    pub message: String,
    pub timestamp: String,
}

/// Create or update one record
#[utoipa::path(
    post,
    path = "/webhooks/{resource}",
    tag = "webhooks",
    params(
        ("resource" = String, Path, description = "transactions, journal-entries or ledger-accounts"),
        ("x-integration-app-token" = String, Header, description = "HS256 token signed with the workspace secret")
    ),
    request_body = WebhookUpsertRequest,
    responses(
        (status = 200, description = "Record created or updated", body = WebhookUpsertResponse),
        (status = 400, description = "Invalid payload or classification", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 404, description = "Unknown resource", body = ErrorResponse),
        (status = 500, description = "Failed to process webhook", body = ErrorResponse)
    )
)]
#[instrument(skip(state, token, body))]
pub async fn upsert_from_webhook(
    Path(resource): Path<String>,
    State(state): State<AppState>,
    IntegrationToken(token): IntegrationToken,
    body: Result<Json<WebhookUpsertRequest>, JsonRejection>,
) -> Result<Json<WebhookUpsertResponse>, ApiError> {
    trace!("Entering upsert_from_webhook function");
    let resource = parse_resource(&resource)?;
    let request = parse_body(body)?;
    let user_id = token.user_id();

    let response = match resource {
        Resource::Transactions => {
            merge_record::<transaction::Entity>(&state, request, user_id, Normalizer::entry).await
        }
        Resource::JournalEntries => {
            merge_record::<journal_entry::Entity>(&state, request, user_id, Normalizer::entry)
                .await
        }
        Resource::LedgerAccounts => {
            merge_record::<ledger_account::Entity>(&state, request, user_id, Normalizer::account)
                .await
        }
    }?;

    invalidate_counts(&state, resource);
    info!(
        "Webhook {:?} {} {} (row {})",
        response.action, resource, response.external_id, response.id
    );
    Ok(Json(response))
}

async fn merge_record<E>(
    state: &AppState,
    request: WebhookUpsertRequest,
    user_id: String,
    normalize: NormalizeFn<E::Record>,
) -> Result<WebhookUpsertResponse, ApiError>
where
    E: SyncTarget,
    E::Model: IntoActiveModel<E::Active> + StoredRow,
{
    let record = normalize(&Normalizer::for_webhook(), &request.fields.to_external_record())
        .map_err(webhook_normalize_error)?;
    let external_id = request.fields.key();

    let integration_id = match request.fields.integration_id() {
        Some(id) => id,
        None => find_by_key::<E, _>(&state.db, &external_id, &request.connection_id)
            .await
            .map_err(ApiError::Webhook)?
            .map(|existing| existing.integration_id())
            .unwrap_or_else(|| UNKNOWN_INTEGRATION.to_string()),
    };
    debug!("Merging {} into integration {}", external_id, integration_id);

    let context = ImportContext::new(
        request.connection_id,
        integration_id,
        request.fields.integration_name.clone(),
    )
    .with_user_id(Some(user_id.clone()));

    let (model, action) = upsert_merge::<E>(&state.db, &context, record)
        .await
        .map_err(ApiError::Webhook)?;

    Ok(WebhookUpsertResponse {
        success: true,
        action,
        id: model.row_id(),
        external_id,
        integration_name: model.integration_name(),
        classification: model.classification(),
        user_id,
    })
}

fn webhook_normalize_error(error: NormalizeError) -> ApiError {
    match error {
        NormalizeError::InvalidClassification(_) => ApiError::InvalidClassification(error.to_string()),
        NormalizeError::MissingId => ApiError::InvalidPayload(error.to_string()),
    }
}

/// Delete one record by its external id
#[utoipa::path(
    delete,
    path = "/webhooks/{resource}",
    tag = "webhooks",
    params(
        ("resource" = String, Path, description = "transactions, journal-entries or ledger-accounts"),
        ("x-integration-app-token" = String, Header, description = "HS256 token signed with the workspace secret")
    ),
    request_body = WebhookDeleteRequest,
    responses(
        (status = 200, description = "Record deleted, or nothing to delete", body = WebhookDeleteResponse),
        (status = 400, description = "Invalid payload", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 404, description = "Unknown resource", body = ErrorResponse),
        (status = 500, description = "Failed to process webhook", body = ErrorResponse)
    )
)]
#[instrument(skip(state, token, body))]
pub async fn delete_from_webhook(
    Path(resource): Path<String>,
    State(state): State<AppState>,
    IntegrationToken(token): IntegrationToken,
    body: Result<Json<WebhookDeleteRequest>, JsonRejection>,
) -> Result<Json<WebhookDeleteResponse>, ApiError> {
    trace!("Entering delete_from_webhook function");
    let resource = parse_resource(&resource)?;
    let request = parse_body(body)?;
    let user_id = token.user_id();

    let deleted = match resource {
        Resource::Transactions => remove_record::<transaction::Entity>(&state, &request).await,
        Resource::JournalEntries => remove_record::<journal_entry::Entity>(&state, &request).await,
        Resource::LedgerAccounts => {
            remove_record::<ledger_account::Entity>(&state, &request).await
        }
    }?;

    let response = match deleted {
        Some(id) => {
            invalidate_counts(&state, resource);
            info!("Webhook deleted {} {} (row {})", resource, request.external_id, id);
            WebhookDeleteResponse {
                success: true,
                action: DeleteAction::Deleted,
                id: Some(id),
                external_id: request.external_id,
                user_id,
                message: None,
            }
        }
        None => {
            debug!("Webhook delete of unknown {} {}", resource, request.external_id);
            WebhookDeleteResponse {
                success: true,
                action: DeleteAction::NotFound,
                id: None,
                message: Some(format!(
                    "No record found with externalId '{}' for connection '{}'",
                    request.external_id, request.connection_id
                )),
                external_id: request.external_id,
                user_id,
            }
        }
    };
    Ok(Json(response))
}

async fn remove_record<E>(
    state: &AppState,
    request: &WebhookDeleteRequest,
) -> Result<Option<i32>, ApiError>
where
    E: SyncTarget,
    E::Model: StoredRow,
{
    let deleted = delete_by_key::<E>(&state.db, &request.external_id, &request.connection_id)
        .await
        .map_err(ApiError::Webhook)?;
    Ok(deleted.map(|model| model.row_id()))
}

/// Webhook endpoint status
#[utoipa::path(
    get,
    path = "/webhooks/{resource}",
    tag = "webhooks",
    params(
        ("resource" = String, Path, description = "transactions, journal-entries or ledger-accounts")
    ),
    responses(
        (status = 200, description = "Endpoint is accepting webhooks", body = WebhookStatusResponse),
        (status = 404, description = "Unknown resource", body = ErrorResponse)
    )
)]
#[instrument]
pub async fn webhook_status(
    Path(resource): Path<String>,
) -> Result<Json<WebhookStatusResponse>, ApiError> {
    let resource = parse_resource(&resource)?;
    Ok(Json(WebhookStatusResponse {
        status: format!("{} webhook endpoint active", resource),
        message: "POST to create or update a record, DELETE to remove one".to_string(),
        timestamp: Utc::now().to_rfc3339(),
    }))
}

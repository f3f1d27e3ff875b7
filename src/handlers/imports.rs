use axum::{
    extract::{Path, State, rejection::JsonRejection},
    response::Json,
};
use common::{ImportContext, ImportResult};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, trace, warn};
use utoipa::ToSchema;
use validator::Validate;

use super::records::{invalidate_counts, parse_body, parse_resource};
use crate::error::ApiError;
use crate::schemas::{AppState, ErrorResponse};

/// Connections to pull from the integration API
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ImportRequest {
    #[validate(length(min = 1))]
    pub connections: Vec<ImportContext>,
    /// Stamped on every connection that does not name its own user
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImportResponse {
    pub success: bool,
    /// One entry per requested connection, in request order
    pub results: Vec<ImportResult>,
    pub total_imported: u64,
}

/// Run a server-side import of one resource for a set of connections
#[utoipa::path(
    post,
    path = "/api/imports/{resource}",
    tag = "imports",
    params(
        ("resource" = String, Path, description = "transactions, journal-entries or ledger-accounts")
    ),
    request_body = ImportRequest,
    responses(
        (status = 200, description = "Import finished; failures are reported per connection", body = ImportResponse),
        (status = 400, description = "Invalid payload", body = ErrorResponse),
        (status = 404, description = "Unknown resource", body = ErrorResponse),
        (status = 500, description = "Imports are not configured", body = ErrorResponse)
    )
)]
#[instrument(skip(state, body))]
pub async fn run_import(
    Path(resource): Path<String>,
    State(state): State<AppState>,
    body: Result<Json<ImportRequest>, JsonRejection>,
) -> Result<Json<ImportResponse>, ApiError> {
    trace!("Entering run_import function");
    let resource = parse_resource(&resource)?;
    let request = parse_body(body)?;

    let Some(importer) = state.importer.as_ref() else {
        warn!("Import of {} requested but no integration API is configured", resource);
        return Err(ApiError::ImportUnavailable);
    };

    let connections: Vec<ImportContext> = request
        .connections
        .into_iter()
        .map(|context| {
            if context.user_id.is_some() {
                context
            } else {
                context.with_user_id(request.user_id.clone())
            }
        })
        .collect();

    // Detached so a dropped request cannot cancel the run halfway
    let importer = importer.clone();
    let task_state = state.clone();
    let task = tokio::spawn(async move {
        let results = importer.import(resource, &connections).await;
        invalidate_counts(&task_state, resource);
        results
    });
    let results = task.await.map_err(|e| {
        error!("Import task for {} did not finish: {}", resource, e);
        ApiError::ImportAborted(e.to_string())
    })?;

    let total_imported = results.iter().map(|r| r.count).sum();
    let failed = results.iter().filter(|r| !r.success).count();
    info!(
        "Imported {} {} across {} connections ({} failed)",
        total_imported,
        resource,
        results.len(),
        failed
    );

    Ok(Json(ImportResponse {
        success: true,
        results,
        total_imported,
    }))
}

use axum::{
    extract::{Query, State, rejection::JsonRejection},
    response::{IntoResponse, Json, Response},
};
use axum_valid::Valid;
use common::Resource;
use ingest::normalize::Normalizer;
use ingest::query;
use model::entities::ledger_account;
use tracing::{debug, info, instrument, trace};

use super::records::{
    BulkUpsertRequest, BulkUpsertResponse, LedgerAccountPage, ListParams, ListQuery, bulk_upsert,
    cached_counts, parse_body,
};
use crate::error::ApiError;
use crate::schemas::{AppState, ErrorResponse};

/// Upsert a chart of accounts for one connection
#[utoipa::path(
    post,
    path = "/api/ledger-accounts",
    tag = "ledger-accounts",
    request_body = BulkUpsertRequest,
    responses(
        (status = 200, description = "Ledger accounts upserted", body = BulkUpsertResponse),
        (status = 400, description = "Invalid payload", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state, body))]
pub async fn upsert_ledger_accounts(
    State(state): State<AppState>,
    body: Result<Json<BulkUpsertRequest>, JsonRejection>,
) -> Result<Json<BulkUpsertResponse>, ApiError> {
    trace!("Entering upsert_ledger_accounts function");
    let request = parse_body(body)?;

    let response = bulk_upsert::<ledger_account::Entity>(
        &state,
        Resource::LedgerAccounts,
        request,
        Normalizer::account,
    )
    .await?;

    info!(
        "Upserted {} ledger accounts ({} inserted, {} modified)",
        response.total, response.inserted, response.modified
    );
    Ok(Json(response))
}

/// List ledger accounts by name. `classification` is the account class
/// reported upstream (asset, liability, ...) and is matched as given.
#[utoipa::path(
    get,
    path = "/api/ledger-accounts",
    tag = "ledger-accounts",
    params(ListQuery),
    responses(
        (status = 200, description = "A page of ledger accounts, or a CountResponse when countOnly=true", body = LedgerAccountPage),
        (status = 400, description = "Invalid query", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_ledger_accounts(
    Valid(Query(query)): Valid<Query<ListQuery>>,
    State(state): State<AppState>,
) -> Result<Response, ApiError> {
    trace!("Entering get_ledger_accounts function");
    let params = ListParams::from_query(query, false)?;

    if params.count_only {
        let counts = cached_counts::<ledger_account::Entity>(
            &state,
            Resource::LedgerAccounts,
            &params.filter,
        )
        .await?;
        return Ok(Json(counts).into_response());
    }

    let page = query::list_page::<ledger_account::Entity>(
        &state.db,
        &params.filter,
        params.limit,
        params.offset,
    )
    .await?;
    debug!("Returning {} of {} ledger accounts", page.records.len(), page.total);
    Ok(Json(LedgerAccountPage::from(page)).into_response())
}

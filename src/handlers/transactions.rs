use axum::{
    extract::{Query, State, rejection::JsonRejection},
    response::{IntoResponse, Json, Response},
};
use axum_valid::Valid;
use common::Resource;
use ingest::normalize::Normalizer;
use ingest::query;
use model::entities::transaction;
use tracing::{debug, info, instrument, trace};

use super::records::{
    BulkUpsertRequest, BulkUpsertResponse, CountResponse, LedgerEntryPage, ListParams, ListQuery,
    bulk_upsert, cached_counts, parse_body,
};
use crate::error::ApiError;
use crate::schemas::{AppState, ErrorResponse};

/// Upsert a batch of transactions for one connection
#[utoipa::path(
    post,
    path = "/api/transactions",
    tag = "transactions",
    request_body = BulkUpsertRequest,
    responses(
        (status = 200, description = "Transactions upserted", body = BulkUpsertResponse),
        (status = 400, description = "Invalid payload or classification", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state, body))]
pub async fn upsert_transactions(
    State(state): State<AppState>,
    body: Result<Json<BulkUpsertRequest>, JsonRejection>,
) -> Result<Json<BulkUpsertResponse>, ApiError> {
    trace!("Entering upsert_transactions function");
    let request = parse_body(body)?;
    debug!(
        "Upserting {} transactions for connection {} ({})",
        request.records.len(),
        request.connection_id,
        request.integration_id
    );

    let response = bulk_upsert::<transaction::Entity>(
        &state,
        Resource::Transactions,
        request,
        Normalizer::entry,
    )
    .await?;

    info!(
        "Upserted {} transactions ({} inserted, {} modified)",
        response.total, response.inserted, response.modified
    );
    Ok(Json(response))
}

/// List transactions, newest first, or count them per integration
#[utoipa::path(
    get,
    path = "/api/transactions",
    tag = "transactions",
    params(ListQuery),
    responses(
        (status = 200, description = "A page of transactions, or a CountResponse when countOnly=true", body = LedgerEntryPage),
        (status = 400, description = "Invalid query or classification", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_transactions(
    Valid(Query(query)): Valid<Query<ListQuery>>,
    State(state): State<AppState>,
) -> Result<Response, ApiError> {
    trace!("Entering get_transactions function");
    let params = ListParams::from_query(query, true)?;

    if params.count_only {
        let counts: CountResponse =
            cached_counts::<transaction::Entity>(&state, Resource::Transactions, &params.filter)
                .await?;
        debug!("Counted {} transactions", counts.total);
        return Ok(Json(counts).into_response());
    }

    let page = query::list_page::<transaction::Entity>(
        &state.db,
        &params.filter,
        params.limit,
        params.offset,
    )
    .await?;
    debug!("Returning {} of {} transactions", page.records.len(), page.total);
    Ok(Json(LedgerEntryPage::from(page)).into_response())
}

use axum::{
    extract::{Query, State, rejection::JsonRejection},
    response::{IntoResponse, Json, Response},
};
use axum_valid::Valid;
use common::Resource;
use ingest::normalize::Normalizer;
use ingest::query;
use model::entities::journal_entry;
use tracing::{debug, info, instrument, trace};

use super::records::{
    BulkUpsertRequest, BulkUpsertResponse, CountResponse, LedgerEntryPage, ListParams, ListQuery,
    bulk_upsert, cached_counts, parse_body,
};
use crate::error::ApiError;
use crate::schemas::{AppState, ErrorResponse};

/// Upsert a batch of journal entries for one connection
#[utoipa::path(
    post,
    path = "/api/journal-entries",
    tag = "journal-entries",
    request_body = BulkUpsertRequest,
    responses(
        (status = 200, description = "Journal entries upserted", body = BulkUpsertResponse),
        (status = 400, description = "Invalid payload or classification", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state, body))]
pub async fn upsert_journal_entries(
    State(state): State<AppState>,
    body: Result<Json<BulkUpsertRequest>, JsonRejection>,
) -> Result<Json<BulkUpsertResponse>, ApiError> {
    trace!("Entering upsert_journal_entries function");
    let request = parse_body(body)?;
    debug!(
        "Upserting {} journal entries for connection {} ({})",
        request.records.len(),
        request.connection_id,
        request.integration_id
    );

    let response = bulk_upsert::<journal_entry::Entity>(
        &state,
        Resource::JournalEntries,
        request,
        Normalizer::entry,
    )
    .await?;

    info!(
        "Upserted {} journal entries ({} inserted, {} modified)",
        response.total, response.inserted, response.modified
    );
    Ok(Json(response))
}

/// List journal entries, newest first, or count them per integration
#[utoipa::path(
    get,
    path = "/api/journal-entries",
    tag = "journal-entries",
    params(ListQuery),
    responses(
        (status = 200, description = "A page of journal entries, or a CountResponse when countOnly=true", body = LedgerEntryPage),
        (status = 400, description = "Invalid query or classification", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_journal_entries(
    Valid(Query(query)): Valid<Query<ListQuery>>,
    State(state): State<AppState>,
) -> Result<Response, ApiError> {
    trace!("Entering get_journal_entries function");
    let params = ListParams::from_query(query, true)?;

    if params.count_only {
        let counts: CountResponse =
            cached_counts::<journal_entry::Entity>(&state, Resource::JournalEntries, &params.filter)
                .await?;
        debug!("Counted {} journal entries", counts.total);
        return Ok(Json(counts).into_response());
    }

    let page = query::list_page::<journal_entry::Entity>(
        &state.db,
        &params.filter,
        params.limit,
        params.offset,
    )
    .await?;
    debug!("Returning {} of {} journal entries", page.records.len(), page.total);
    Ok(Json(LedgerEntryPage::from(page)).into_response())
}

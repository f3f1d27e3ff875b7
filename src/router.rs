use crate::handlers::{
    health::health_check,
    imports::run_import,
    journal_entries::{get_journal_entries, upsert_journal_entries},
    ledger_accounts::{get_ledger_accounts, upsert_ledger_accounts},
    transactions::{get_transactions, upsert_transactions},
    webhooks::{delete_from_webhook, upsert_from_webhook, webhook_status},
};
use crate::schemas::{ApiDoc, AppState};
use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Create application router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    let timed = Router::new()
        // Health check
        .route("/health", get(health_check))
        // Bulk upsert and listing
        .route(
            "/api/transactions",
            post(upsert_transactions).get(get_transactions),
        )
        .route(
            "/api/journal-entries",
            post(upsert_journal_entries).get(get_journal_entries),
        )
        .route(
            "/api/ledger-accounts",
            post(upsert_ledger_accounts).get(get_ledger_accounts),
        )
        // Webhooks
        .route(
            "/webhooks/:resource",
            post(upsert_from_webhook)
                .delete(delete_from_webhook)
                .get(webhook_status),
        )
        .layer(TimeoutLayer::new(state.settings.http_timeout()));

    let router = Router::new()
        .merge(timed)
        // Server-side imports run to completion, outside the request timeout
        .route("/api/imports/:resource", post(run_import))
        // Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // The metrics recorder is process-global, so tests run without it
    #[cfg(not(test))]
    let router = {
        let (prometheus_layer, metric_handle) = axum_prometheus::PrometheusMetricLayer::pair();
        router
            .route("/metrics", get(|| async move { metric_handle.render() }))
            .layer(prometheus_layer)
    };

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

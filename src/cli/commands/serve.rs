use anyhow::Result;
use tokio::net::TcpListener;
use tracing::{debug, error, info, trace};

use super::initdb::connect_and_migrate;
use crate::config::initialize_app_state;
use crate::router::create_router;

pub async fn serve(database_url: &str, bind_address: &str) -> Result<()> {
    trace!("Entering serve function");
    info!("glsync starting up");
    debug!("Bind address: {}", bind_address);

    let db = connect_and_migrate(database_url).await?;
    let state = initialize_app_state(db).map_err(|e| {
        error!("Failed to initialize application state: {}", e);
        e
    })?;
    info!(
        "Imports {}, webhooks {}",
        if state.importer.is_some() { "enabled" } else { "disabled" },
        if state.settings.workspace_secret.is_some() { "enabled" } else { "disabled" }
    );

    let app = create_router(state);

    let listener = TcpListener::bind(&bind_address).await.map_err(|e| {
        error!("Failed to bind to address {}: {}", bind_address, e);
        e
    })?;

    info!("glsync API server running on http://{}", bind_address);
    info!("Swagger UI available at http://{}/swagger-ui", bind_address);

    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
        return Err(e.into());
    }

    info!("Server shutdown gracefully");
    Ok(())
}

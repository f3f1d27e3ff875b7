use anyhow::{bail, Result};
use common::{ImportContext, Resource};
use tracing::{error, info, trace, warn};

use super::initdb::connect_and_migrate;
use crate::config::initialize_app_state;

/// One-off import run from the command line.
pub async fn import(resource: &str, context: ImportContext, database_url: &str) -> Result<()> {
    trace!("Entering import function");
    let resource: Resource = resource.parse().map_err(anyhow::Error::msg)?;

    let db = connect_and_migrate(database_url).await?;
    let state = initialize_app_state(db)?;
    let Some(importer) = state.importer else {
        bail!("GLSYNC__INTEGRATION_API_URL must be set to run imports");
    };

    info!(
        "Importing {} for connection {} ({})",
        resource, context.connection_id, context.integration_id
    );
    let results = importer.import(resource, std::slice::from_ref(&context)).await;

    let mut failed = false;
    for result in &results {
        match &result.error {
            Some(e) => {
                error!("Connection {} failed: {}", result.connection_id, e);
                failed = true;
            }
            None => info!("Connection {}: {} records", result.connection_id, result.count),
        }
    }
    if results.is_empty() {
        warn!("Nothing was imported");
    }
    if failed {
        bail!("import of {} failed", resource);
    }
    Ok(())
}

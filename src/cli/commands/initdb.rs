use anyhow::{Context, Result};
use migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection};
use std::path::Path;
use tracing::{debug, error, info, trace};

/// Creates the parent directory of a file-backed SQLite url.
fn ensure_sqlite_parent(database_url: &str) -> Result<()> {
    let Some(path) = database_url
        .strip_prefix("sqlite://")
        .map(|rest| rest.split('?').next().unwrap_or(rest))
        .filter(|path| !path.is_empty() && !path.starts_with(':'))
    else {
        return Ok(());
    };

    if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
        debug!("Ensuring database directory {} exists", parent.display());
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating database directory {}", parent.display()))?;
    }
    Ok(())
}

/// Connects and applies every pending migration.
pub async fn connect_and_migrate(database_url: &str) -> Result<DatabaseConnection> {
    trace!("Entering connect_and_migrate function");
    ensure_sqlite_parent(database_url)?;

    let db = Database::connect(database_url).await.map_err(|e| {
        error!("Failed to connect to database '{}': {}", database_url, e);
        e
    })?;
    debug!("Database connection established");

    let pending = Migrator::get_pending_migrations(&db).await?.len();
    if pending > 0 {
        info!("Applying {} pending migrations", pending);
        Migrator::up(&db, None).await.map_err(|e| {
            error!("Failed to run database migrations: {}", e);
            e
        })?;
    } else {
        debug!("Schema is up to date");
    }

    Ok(db)
}

pub async fn init_database(database_url: &str) -> Result<()> {
    trace!("Entering init_database function");
    info!("Initializing database");
    debug!("Database URL: {}", database_url);

    let db = connect_and_migrate(database_url).await?;
    db.close().await?;

    info!("Database initialization completed successfully!");
    Ok(())
}

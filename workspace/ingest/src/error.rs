use thiserror::Error;

/// Error types for the ingest crate
#[derive(Error, Debug)]
pub enum IngestError {
    /// Error from the database operations
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Transport error while talking to the integration API
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The integration API answered with a non-success status
    #[error("Integration API returned status {status} for action '{action}'")]
    Upstream { action: String, status: u16 },

    /// A paginated fetch did not terminate within the configured page limit
    #[error("Action '{action}' exceeded the limit of {max_pages} pages")]
    PageLimitExceeded { action: String, max_pages: usize },

    /// The connection does not belong to an accounting integration
    #[error("Integration '{0}' is not an accounting integration")]
    NotAccountingIntegration(String),

    /// A record could not be mapped onto a column
    #[error("Normalize error: {0}")]
    Normalize(String),

    /// Error serializing a value into a JSON column
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Type alias for Result with IngestError
pub type Result<T> = std::result::Result<T, IngestError>;

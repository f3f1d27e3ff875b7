//! Import side of glsync: pulls records out of the integration API, maps them
//! onto the allow-listed record shapes and writes them with idempotent upserts.
//! The read side (`query`) lives here as well so handlers never build SQL.

pub mod error;
pub mod fetcher;
pub mod normalize;
pub mod pipeline;
pub mod query;
pub mod resource;
pub mod sink;
pub mod source;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{IngestError, Result};
pub use fetcher::{FetchOptions, fetch_all};
pub use pipeline::Importer;
pub use sink::{SyncTarget, delete_by_key, upsert_batch, upsert_merge};
pub use source::{ActionClient, ActionPage, ExternalRecord, IntegrationAppClient};

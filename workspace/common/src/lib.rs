//! Common transport-layer types shared between the ingest pipeline and the
//! HTTP handlers. Records here are the allow-listed, normalized shapes that
//! reach the database; everything else from upstream only survives in
//! `raw_fields`.

mod imports;
mod records;

pub use imports::{
    DeleteAction, ImportContext, ImportResult, IntegrationCount, Resource, UpsertSummary,
    WriteAction,
};
pub use model::entities::Classification;
pub use records::{
    AccountRef, DimensionTag, Dimensions, LedgerAccountRecord, LedgerEntryRecord, LineItem,
    LineItemType, SyncRecord,
};

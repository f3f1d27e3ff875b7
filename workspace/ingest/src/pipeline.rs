//! Server-side import runs: fetch, normalize and upsert per connection.

use common::{ImportContext, ImportResult, LedgerEntryRecord, Resource};
use model::entities::{Classification, journal_entry, ledger_account, transaction};
use sea_orm::DatabaseConnection;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, instrument, trace, warn};

use crate::error::{IngestError, Result};
use crate::fetcher::{FetchOptions, fetch_all};
use crate::normalize::Normalizer;
use crate::resource::{
    JOURNAL_ENTRY_ACTION, LEDGER_ACCOUNT_ACTION, TRANSACTION_TYPES, is_accounting_integration,
};
use crate::sink::upsert_batch;
use crate::source::ActionClient;

/// Runs imports for a list of connections. Connections are processed one
/// after another and a failing connection never stops the others.
#[derive(Clone)]
pub struct Importer {
    client: Arc<dyn ActionClient>,
    db: DatabaseConnection,
    options: FetchOptions,
    normalizer: Normalizer,
}

impl fmt::Debug for Importer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Importer")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Importer {
    pub fn new(client: Arc<dyn ActionClient>, db: DatabaseConnection, options: FetchOptions) -> Self {
        Self {
            client,
            db,
            options,
            normalizer: Normalizer::for_import(),
        }
    }

    pub async fn import(&self, resource: Resource, connections: &[ImportContext]) -> Vec<ImportResult> {
        match resource {
            Resource::Transactions => self.import_transactions(connections).await,
            Resource::JournalEntries => self.import_journal_entries(connections).await,
            Resource::LedgerAccounts => self.import_ledger_accounts(connections).await,
        }
    }

    #[instrument(skip(self, connections), fields(connections = connections.len()))]
    pub async fn import_transactions(&self, connections: &[ImportContext]) -> Vec<ImportResult> {
        trace!("Entering import_transactions");
        let mut results = Vec::with_capacity(connections.len());
        for context in connections {
            let outcome = self.transactions_for(context).await;
            results.push(self.finish(context, outcome));
        }
        results
    }

    #[instrument(skip(self, connections), fields(connections = connections.len()))]
    pub async fn import_journal_entries(&self, connections: &[ImportContext]) -> Vec<ImportResult> {
        trace!("Entering import_journal_entries");
        let mut results = Vec::with_capacity(connections.len());
        for context in connections {
            let outcome = self.journal_entries_for(context).await;
            results.push(self.finish(context, outcome));
        }
        results
    }

    #[instrument(skip(self, connections), fields(connections = connections.len()))]
    pub async fn import_ledger_accounts(&self, connections: &[ImportContext]) -> Vec<ImportResult> {
        trace!("Entering import_ledger_accounts");
        let mut results = Vec::with_capacity(connections.len());
        for context in connections {
            let outcome = self.ledger_accounts_for(context).await;
            results.push(self.finish(context, outcome));
        }
        results
    }

    fn finish(&self, context: &ImportContext, outcome: Result<u64>) -> ImportResult {
        match outcome {
            Ok(count) => {
                info!(
                    "Imported {} records for connection {} ({})",
                    count, context.connection_id, context.integration_id
                );
                ImportResult::succeeded(context, count)
            }
            Err(e) => {
                error!(
                    "Import failed for connection {} ({}): {}",
                    context.connection_id, context.integration_id, e
                );
                ImportResult::failed(context, e.to_string())
            }
        }
    }

    fn ensure_accounting(context: &ImportContext) -> Result<()> {
        if is_accounting_integration(&context.integration_id) {
            Ok(())
        } else {
            Err(IngestError::NotAccountingIntegration(
                context.integration_id.clone(),
            ))
        }
    }

    /// Every transaction sub-type is fetched in turn. A sub-type that fails
    /// is skipped; whatever the others returned is still written.
    async fn transactions_for(&self, context: &ImportContext) -> Result<u64> {
        Self::ensure_accounting(context)?;

        let mut records: Vec<LedgerEntryRecord> = Vec::new();
        for (action, classification) in TRANSACTION_TYPES {
            match fetch_all(self.client.as_ref(), &context.connection_id, action, &self.options).await {
                Ok(raw) => {
                    records.extend(self.normalizer.entries(&raw, Some(classification)));
                }
                Err(e) => {
                    warn!(
                        "Skipping {} for connection {}: {}",
                        action, context.connection_id, e
                    );
                }
            }
        }

        let summary = upsert_batch::<transaction::Entity>(&self.db, context, records).await?;
        Ok(summary.total)
    }

    async fn journal_entries_for(&self, context: &ImportContext) -> Result<u64> {
        Self::ensure_accounting(context)?;

        let raw = fetch_all(
            self.client.as_ref(),
            &context.connection_id,
            JOURNAL_ENTRY_ACTION,
            &self.options,
        )
        .await?;
        let records = self
            .normalizer
            .entries(&raw, Some(Classification::JournalEntry));

        let summary = upsert_batch::<journal_entry::Entity>(&self.db, context, records).await?;
        Ok(summary.total)
    }

    async fn ledger_accounts_for(&self, context: &ImportContext) -> Result<u64> {
        Self::ensure_accounting(context)?;

        let raw = fetch_all(
            self.client.as_ref(),
            &context.connection_id,
            LEDGER_ACCOUNT_ACTION,
            &self.options,
        )
        .await?;
        let records = self.normalizer.accounts(&raw);

        let summary = upsert_batch::<ledger_account::Entity>(&self.db, context, records).await?;
        Ok(summary.total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedClient, init_tracing, record, setup_db};
    use sea_orm::{EntityTrait, PaginatorTrait};
    use serde_json::json;
    use std::time::Duration;

    fn options() -> FetchOptions {
        FetchOptions {
            page_delay: Duration::ZERO,
            max_pages: 10,
        }
    }

    fn quickbooks(connection_id: &str) -> ImportContext {
        ImportContext::new(connection_id, "quickbooks", Some("QuickBooks".to_string()))
    }

    #[tokio::test]
    async fn test_transactions_tagged_with_sub_type_and_failures_skipped() {
        init_tracing();
        let db = setup_db().await;
        let client = ScriptedClient::new()
            .with_pages(
                "c1",
                "get-invoices",
                vec![vec![record("1", json!({"id": "INV-1", "classification": "bill"}))]],
            )
            .with_pages(
                "c1",
                "get-payments",
                vec![vec![record("2", json!({"id": "PAY-1"}))]],
            )
            .failing("get-bills");
        let importer = Importer::new(Arc::new(client), db.clone(), options());

        let results = importer.import_transactions(&[quickbooks("c1")]).await;

        assert_eq!(results.len(), 1);
        assert!(results[0].success);
        assert_eq!(results[0].count, 2);

        let invoice = crate::sink::find_by_key::<transaction::Entity, _>(&db, "INV-1", "c1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(invoice.classification, Some(Classification::Invoice));
        assert_eq!(invoice.integration_name.as_deref(), Some("QuickBooks"));
    }

    #[tokio::test]
    async fn test_non_accounting_integration_fails_without_fetching() {
        let db = setup_db().await;
        let client = Arc::new(ScriptedClient::new());
        let importer = Importer::new(client.clone(), db, options());

        let hubspot = ImportContext::new("c9", "hubspot", None);
        let results = importer.import_ledger_accounts(&[hubspot]).await;

        assert!(!results[0].success);
        assert!(results[0].error.as_deref().unwrap().contains("not an accounting integration"));
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_failed_connection_does_not_stop_the_next() {
        let db = setup_db().await;
        let client = ScriptedClient::new()
            .failing("get-ledger-accounts")
            .with_pages("c2", "get-journal-entries", vec![vec![record("1", json!({"id": "JE-1"}))]]);
        let importer = Importer::new(Arc::new(client), db.clone(), options());

        let accounts = importer
            .import(Resource::LedgerAccounts, &[quickbooks("c1")])
            .await;
        assert!(!accounts[0].success);
        assert_eq!(accounts[0].count, 0);

        let entries = importer
            .import(Resource::JournalEntries, &[ImportContext::new("c9", "hubspot", None), quickbooks("c2")])
            .await;
        assert!(!entries[0].success);
        assert!(entries[1].success);
        assert_eq!(journal_entry::Entity::find().count(&db).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_reimport_is_idempotent() {
        let db = setup_db().await;
        let client = ScriptedClient::new().with_pages(
            "c1",
            "get-ledger-accounts",
            vec![
                vec![record("1", json!({"id": "A1", "name": "Bank"}))],
                vec![record("2", json!({"id": "A2", "name": "Sales"}))],
            ],
        );
        let importer = Importer::new(Arc::new(client), db.clone(), options());

        importer.import_ledger_accounts(&[quickbooks("c1")]).await;
        let results = importer.import_ledger_accounts(&[quickbooks("c1")]).await;

        assert_eq!(results[0].count, 2);
        assert_eq!(ledger_account::Entity::find().count(&db).await.unwrap(), 2);
    }
}

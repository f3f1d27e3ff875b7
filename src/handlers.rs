pub mod health;
pub mod imports;
pub mod journal_entries;
pub mod ledger_accounts;
pub mod records;
pub mod transactions;
pub mod webhooks;

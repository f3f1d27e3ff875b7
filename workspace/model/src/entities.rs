//! SeaORM entities for the imported general-ledger data.
//! Every table is keyed by the natural pair `(external_id, connection_id)`;
//! the surrogate `id` only exists for the ORM.

pub mod classification;
pub mod journal_entry;
pub mod ledger_account;
pub mod transaction;

pub use classification::Classification;

pub mod prelude {
    //! A prelude module for easy importing of all entities.
    pub use super::journal_entry::Entity as JournalEntry;
    pub use super::ledger_account::Entity as LedgerAccount;
    pub use super::transaction::Entity as Transaction;
}

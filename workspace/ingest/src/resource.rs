//! Fixed tables describing which integrations and actions are imported.

use model::entities::Classification;

/// Integrations treated as accounting systems. Imports for any other
/// integration are refused.
pub const ACCOUNTING_INTEGRATIONS: [&str; 5] =
    ["quickbooks", "xero", "sage", "freshbooks", "workday-soap"];

/// Transaction sub-types: the action that lists them and the classification
/// stamped onto every record it returns.
pub const TRANSACTION_TYPES: [(&str, Classification); 8] = [
    ("get-journal-entries", Classification::JournalEntry),
    ("get-sales-receipts", Classification::SalesReceipt),
    ("get-payments", Classification::Payment),
    ("get-credit-notes", Classification::CreditNote),
    ("get-bills", Classification::Bill),
    ("get-invoices", Classification::Invoice),
    ("get-refunds", Classification::Refund),
    ("get-bill-payments", Classification::BillPayment),
];

pub const JOURNAL_ENTRY_ACTION: &str = "get-journal-entries";

pub const LEDGER_ACCOUNT_ACTION: &str = "get-ledger-accounts";

pub fn is_accounting_integration(integration_id: &str) -> bool {
    ACCOUNTING_INTEGRATIONS
        .iter()
        .any(|known| known.eq_ignore_ascii_case(integration_id.trim()))
}

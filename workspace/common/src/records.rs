use chrono::{DateTime, Utc};
use model::entities::Classification;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A record that can be written by the upsert sink.
pub trait SyncRecord {
    /// Identifier of the record in the external system.
    fn external_id(&self) -> &str;
}

/// Debit or credit side of a line item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LineItemType {
    Debit,
    Credit,
}

impl LineItemType {
    /// Parses the loose spellings integrations use ("DEBIT", "Debit", "dr", ...).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "debit" | "dr" => Some(LineItemType::Debit),
            "credit" | "cr" => Some(LineItemType::Credit),
            _ => None,
        }
    }
}

/// Reference to a ledger account as the upstream system names it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AccountRef {
    pub value: String,
    pub name: Option<String>,
}

/// One dimension tag (customer, project, ...) on a line item.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
pub struct DimensionTag {
    pub name: Option<String>,
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct Dimensions {
    pub customer: Option<DimensionTag>,
    pub project: Option<DimensionTag>,
    pub class: Option<DimensionTag>,
    pub item: Option<DimensionTag>,
    pub location: Option<DimensionTag>,
}

impl Dimensions {
    pub fn is_empty(&self) -> bool {
        self.customer.is_none()
            && self.project.is_none()
            && self.class.is_none()
            && self.item.is_none()
            && self.location.is_none()
    }
}

/// A line item of a transaction or journal entry. Line items have no
/// identity across imports: the whole list is replaced on every write.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct LineItem {
    pub id: Option<String>,
    pub description: Option<String>,
    #[schema(value_type = Option<String>)]
    pub amount: Option<Decimal>,
    #[serde(rename = "type")]
    pub entry_type: Option<LineItemType>,
    pub posting_type: Option<String>,
    pub ledger_account_id: Option<String>,
    pub account_ref: Option<AccountRef>,
    #[schema(value_type = Option<String>)]
    pub exchange_rate: Option<Decimal>,
    pub dimension: Option<String>,
    #[serde(skip_serializing_if = "Dimensions::is_empty")]
    pub dimensions: Dimensions,
}

/// Normalized transaction or journal entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntryRecord {
    pub external_id: String,
    pub classification: Option<Classification>,
    pub number: Option<String>,
    pub memo: Option<String>,
    pub currency: Option<String>,
    pub ledger_account_id: Option<String>,
    #[schema(value_type = Option<String>)]
    pub total_amount: Option<Decimal>,
    /// `None` means "not supplied": a merge keeps the stored list.
    pub line_items: Option<Vec<LineItem>>,
    pub transaction_date: Option<DateTime<Utc>>,
    pub created_time: Option<DateTime<Utc>>,
    pub updated_time: Option<DateTime<Utc>>,
    #[schema(value_type = Option<Object>)]
    pub raw_fields: Option<serde_json::Value>,
}

impl LedgerEntryRecord {
    pub fn new(external_id: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            classification: None,
            number: None,
            memo: None,
            currency: None,
            ledger_account_id: None,
            total_amount: None,
            line_items: None,
            transaction_date: None,
            created_time: None,
            updated_time: None,
            raw_fields: None,
        }
    }
}

impl SyncRecord for LedgerEntryRecord {
    fn external_id(&self) -> &str {
        &self.external_id
    }
}

/// Normalized ledger account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LedgerAccountRecord {
    pub external_id: String,
    pub name: Option<String>,
    pub account_type: Option<String>,
    pub status: Option<String>,
    pub classification: Option<String>,
    #[schema(value_type = Option<String>)]
    pub current_balance: Option<Decimal>,
    pub currency: Option<String>,
    pub created_time: Option<DateTime<Utc>>,
    pub updated_time: Option<DateTime<Utc>>,
    #[schema(value_type = Option<Object>)]
    pub raw_fields: Option<serde_json::Value>,
}

impl LedgerAccountRecord {
    pub fn new(external_id: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            name: None,
            account_type: None,
            status: None,
            classification: None,
            current_balance: None,
            currency: None,
            created_time: None,
            updated_time: None,
            raw_fields: None,
        }
    }
}

impl SyncRecord for LedgerAccountRecord {
    fn external_id(&self) -> &str {
        &self.external_id
    }
}

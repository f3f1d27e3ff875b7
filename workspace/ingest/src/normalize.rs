//! Maps raw integration records onto the allow-listed record shapes.
//!
//! Only the fields named here ever reach a column. The upstream payload is
//! kept verbatim in `raw_fields` for auditing.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use common::{
    AccountRef, DimensionTag, Dimensions, LedgerAccountRecord, LedgerEntryRecord, LineItem,
    LineItemType,
};
use model::entities::Classification;
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, warn};

use crate::source::ExternalRecord;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("record has no id")]
    MissingId,

    #[error("unknown classification '{0}'")]
    InvalidClassification(String),
}

/// How an absent `lineItems` key is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineItemPolicy {
    /// Absent means "no line items": the stored list is replaced by `[]`.
    Replace,
    /// Absent means "not supplied": the stored list is left alone.
    KeepWhenAbsent,
}

#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    line_items: LineItemPolicy,
    strict_classification: bool,
}

impl Normalizer {
    /// Records pulled by the import pipeline. Classification is stamped by
    /// the caller, so an unknown upstream value is dropped.
    pub fn for_import() -> Self {
        Self {
            line_items: LineItemPolicy::Replace,
            strict_classification: false,
        }
    }

    /// Records pushed through the bulk upsert endpoint.
    pub fn for_bulk() -> Self {
        Self {
            line_items: LineItemPolicy::Replace,
            strict_classification: true,
        }
    }

    /// Single-record webhook updates.
    pub fn for_webhook() -> Self {
        Self {
            line_items: LineItemPolicy::KeepWhenAbsent,
            strict_classification: true,
        }
    }

    pub fn entry(&self, record: &ExternalRecord) -> Result<LedgerEntryRecord, NormalizeError> {
        let fields = &record.fields;
        let external_id = external_id(record)?;

        let classification = match text(fields, "classification") {
            Some(raw) => match Classification::from_str(&raw) {
                Ok(classification) => Some(classification),
                Err(_) if !self.strict_classification => {
                    debug!("Dropping unknown classification '{}' on {}", raw, external_id);
                    None
                }
                Err(_) => return Err(NormalizeError::InvalidClassification(raw)),
            },
            None => None,
        };

        let line_items = match (fields.get("lineItems"), self.line_items) {
            (None | Some(Value::Null), LineItemPolicy::KeepWhenAbsent) => None,
            (Some(Value::Array(items)), _) => Some(items.iter().filter_map(line_item).collect()),
            _ => Some(Vec::new()),
        };

        Ok(LedgerEntryRecord {
            classification,
            number: text(fields, "number"),
            memo: text(fields, "memo"),
            currency: text(fields, "currency").map(|c| canonical_currency(&c)),
            ledger_account_id: text(fields, "ledgerAccountId"),
            total_amount: decimal(fields.get("totalAmount")),
            line_items,
            transaction_date: timestamp(fields.get("transactionDate")),
            created_time: timestamp(fields.get("createdTime"))
                .or_else(|| record.created_time.as_deref().and_then(parse_timestamp)),
            updated_time: timestamp(fields.get("updatedTime"))
                .or_else(|| record.updated_time.as_deref().and_then(parse_timestamp)),
            raw_fields: Some(raw_fields(record)),
            external_id,
        })
    }

    pub fn account(&self, record: &ExternalRecord) -> Result<LedgerAccountRecord, NormalizeError> {
        let fields = &record.fields;
        Ok(LedgerAccountRecord {
            external_id: external_id(record)?,
            name: text(fields, "name"),
            account_type: text(fields, "type").or_else(|| text(fields, "accountType")),
            status: text(fields, "status"),
            classification: text(fields, "classification"),
            current_balance: decimal(fields.get("currentBalance")),
            currency: text(fields, "currency").map(|c| canonical_currency(&c)),
            created_time: timestamp(fields.get("createdTime"))
                .or_else(|| record.created_time.as_deref().and_then(parse_timestamp)),
            updated_time: timestamp(fields.get("updatedTime"))
                .or_else(|| record.updated_time.as_deref().and_then(parse_timestamp)),
            raw_fields: Some(raw_fields(record)),
        })
    }

    /// Normalizes a page of entries, skipping records that cannot be keyed.
    /// When `classification` is given it replaces whatever the record said.
    pub fn entries(
        &self,
        records: &[ExternalRecord],
        classification: Option<Classification>,
    ) -> Vec<LedgerEntryRecord> {
        records
            .iter()
            .filter_map(|record| match self.entry(record) {
                Ok(mut entry) => {
                    if classification.is_some() {
                        entry.classification = classification;
                    }
                    Some(entry)
                }
                Err(e) => {
                    warn!("Skipping record: {}", e);
                    None
                }
            })
            .collect()
    }

    pub fn accounts(&self, records: &[ExternalRecord]) -> Vec<LedgerAccountRecord> {
        records
            .iter()
            .filter_map(|record| match self.account(record) {
                Ok(account) => Some(account),
                Err(e) => {
                    warn!("Skipping ledger account: {}", e);
                    None
                }
            })
            .collect()
    }
}

fn external_id(record: &ExternalRecord) -> Result<String, NormalizeError> {
    text(&record.fields, "id")
        .or_else(|| record.id.clone().filter(|id| !id.trim().is_empty()))
        .ok_or(NormalizeError::MissingId)
}

fn raw_fields(record: &ExternalRecord) -> Value {
    record
        .raw_fields
        .clone()
        .unwrap_or_else(|| Value::Object(record.fields.clone()))
}

/// Reads a string-ish field. Numbers are accepted since several integrations
/// send document numbers and ids as integers.
fn text(fields: &Map<String, Value>, key: &str) -> Option<String> {
    match fields.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn decimal(value: Option<&Value>) -> Option<Decimal> {
    let raw = match value? {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().replace(',', ""),
        _ => return None,
    };
    Decimal::from_str(&raw)
        .or_else(|_| Decimal::from_scientific(&raw))
        .map_err(|e| debug!("Ignoring unparsable amount '{}': {}", raw, e))
        .ok()
}

fn timestamp(value: Option<&Value>) -> Option<DateTime<Utc>> {
    match value? {
        Value::String(s) => parse_timestamp(s),
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}

/// RFC 3339, then naive date-times and plain dates read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Upper-cases known ISO 4217 codes; anything else is kept as sent.
fn canonical_currency(raw: &str) -> String {
    match rusty_money::iso::find(&raw.to_ascii_uppercase()) {
        Some(currency) => currency.iso_alpha_code.to_string(),
        None => raw.to_string(),
    }
}

fn line_item(value: &Value) -> Option<LineItem> {
    let fields = value.as_object()?;
    Some(LineItem {
        id: text(fields, "id"),
        description: text(fields, "description"),
        amount: decimal(fields.get("amount")),
        entry_type: text(fields, "type").and_then(|t| LineItemType::parse(&t)),
        posting_type: text(fields, "postingType"),
        ledger_account_id: text(fields, "ledgerAccountId"),
        account_ref: fields
            .get("accountRef")
            .and_then(Value::as_object)
            .and_then(|account| {
                Some(AccountRef {
                    value: text(account, "value")?,
                    name: text(account, "name"),
                })
            }),
        exchange_rate: decimal(fields.get("exchangeRate")),
        dimension: text(fields, "dimension"),
        dimensions: Dimensions {
            customer: dimension_tag(fields, "customer"),
            project: dimension_tag(fields, "project"),
            class: dimension_tag(fields, "class"),
            item: dimension_tag(fields, "item"),
            location: dimension_tag(fields, "location"),
        },
    })
}

/// Reads `dimensions.<kind>` or the flattened `dimension_<kind>Name` /
/// `dimension_<kind>Value` pair.
fn dimension_tag(fields: &Map<String, Value>, kind: &str) -> Option<DimensionTag> {
    let tag = match fields
        .get("dimensions")
        .and_then(|d| d.get(kind))
        .and_then(Value::as_object)
    {
        Some(nested) => DimensionTag {
            name: text(nested, "name"),
            value: text(nested, "value"),
        },
        None => DimensionTag {
            name: text(fields, &format!("dimension_{kind}Name")),
            value: text(fields, &format!("dimension_{kind}Value")),
        },
    };
    (tag.name.is_some() || tag.value.is_some()).then_some(tag)
}

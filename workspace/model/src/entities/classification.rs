use sea_orm::entity::prelude::*;
use sea_orm::Iterable;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

/// Accounting document type of a transaction or journal entry.
///
/// Stored as the kebab-case string the integration actions use, so the
/// database value and the JSON value are identical.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "kebab-case")]
pub enum Classification {
    #[sea_orm(string_value = "journal-entry")]
    JournalEntry,
    #[sea_orm(string_value = "sales-receipt")]
    SalesReceipt,
    #[sea_orm(string_value = "payment")]
    Payment,
    #[sea_orm(string_value = "credit-note")]
    CreditNote,
    #[sea_orm(string_value = "bill")]
    Bill,
    #[sea_orm(string_value = "invoice")]
    Invoice,
    #[sea_orm(string_value = "refund")]
    Refund,
    #[sea_orm(string_value = "bill-payment")]
    BillPayment,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::JournalEntry => "journal-entry",
            Classification::SalesReceipt => "sales-receipt",
            Classification::Payment => "payment",
            Classification::CreditNote => "credit-note",
            Classification::Bill => "bill",
            Classification::Invoice => "invoice",
            Classification::Refund => "refund",
            Classification::BillPayment => "bill-payment",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string is not one of the known classifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownClassification(pub String);

impl fmt::Display for UnknownClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown classification '{}'", self.0)
    }
}

impl std::error::Error for UnknownClassification {}

impl FromStr for Classification {
    type Err = UnknownClassification;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Classification::iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownClassification(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_values_case_insensitively() {
        assert_eq!("bill-payment".parse::<Classification>(), Ok(Classification::BillPayment));
        assert_eq!(" Invoice ".parse::<Classification>(), Ok(Classification::Invoice));
    }

    #[test]
    fn rejects_unknown_values() {
        let err = "purchase-order".parse::<Classification>().unwrap_err();
        assert_eq!(err.to_string(), "unknown classification 'purchase-order'");
    }

    #[test]
    fn serde_and_database_values_agree() {
        for classification in Classification::iter() {
            let json = serde_json::to_value(classification).unwrap();
            assert_eq!(json, serde_json::Value::String(classification.to_value()));
        }
    }
}

use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;

use super::classification::Classification;

/// A transaction (invoice, bill, payment, ...) imported from an accounting
/// integration. Identified by `(external_id, connection_id)`.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    /// Identifier of the record in the external accounting system.
    pub external_id: String,
    /// Connection the record was pulled through.
    pub connection_id: String,
    pub integration_id: String,
    pub integration_name: Option<String>,
    pub user_id: Option<String>,
    pub classification: Option<Classification>,
    pub number: Option<String>,
    pub memo: Option<String>,
    /// ISO 4217 code when the upstream value is a known currency.
    pub currency: Option<String>,
    pub ledger_account_id: Option<String>,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))", nullable)]
    pub total_amount: Option<Decimal>,
    /// Line items as a JSON array. Replaced as a whole on every import.
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub line_items: Option<Json>,
    pub transaction_date: Option<DateTimeUtc>,
    pub created_time: Option<DateTimeUtc>,
    pub updated_time: Option<DateTimeUtc>,
    /// Set on first insert and never overwritten afterwards.
    pub imported_at: Option<DateTimeUtc>,
    /// Time of the most recent write by an import or webhook.
    pub synced_at: DateTimeUtc,
    /// The upstream payload as received, kept for auditing and debugging.
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub raw_fields: Option<Json>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;

use super::classification::Classification;

/// A manual journal entry imported from an accounting integration.
/// Same column layout as `transactions`, kept in its own table.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "journal_entries")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub external_id: String,
    pub connection_id: String,
    pub integration_id: String,
    pub integration_name: Option<String>,
    pub user_id: Option<String>,
    pub classification: Option<Classification>,
    pub number: Option<String>,
    pub memo: Option<String>,
    pub currency: Option<String>,
    pub ledger_account_id: Option<String>,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))", nullable)]
    pub total_amount: Option<Decimal>,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub line_items: Option<Json>,
    pub transaction_date: Option<DateTimeUtc>,
    pub created_time: Option<DateTimeUtc>,
    pub updated_time: Option<DateTimeUtc>,
    pub imported_at: Option<DateTimeUtc>,
    pub synced_at: DateTimeUtc,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub raw_fields: Option<Json>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;

/// A chart-of-accounts entry imported from an accounting integration.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "ledger_accounts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub external_id: String,
    pub connection_id: String,
    pub integration_id: String,
    pub integration_name: Option<String>,
    pub user_id: Option<String>,
    pub name: Option<String>,
    /// Account type as reported upstream (e.g. "Bank", "Expense").
    pub account_type: Option<String>,
    pub status: Option<String>,
    /// Free-form upstream classification (asset, liability, equity, ...).
    pub classification: Option<String>,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))", nullable)]
    pub current_balance: Option<Decimal>,
    pub currency: Option<String>,
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

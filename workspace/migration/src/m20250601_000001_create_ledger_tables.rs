use model::entities::prelude::{JournalEntry, LedgerAccount, Transaction};
use sea_orm_migration::{prelude::*, schema::*};

use crate::entity_iden::{EntityIden, TableIden};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // transactions and journal_entries share one layout
        for (prefix, table) in [
            ("transactions", Transaction::table()),
            ("journal_entries", JournalEntry::table()),
        ] {
            manager.create_table(ledger_entry_table(table.clone())).await?;

            manager
                .create_index(
                    index(&format!("uq_{prefix}_external_connection"), table.clone(), &[
                        LedgerEntry::ExternalId,
                        LedgerEntry::ConnectionId,
                    ])
                    .unique()
                    .to_owned(),
                )
                .await?;
            manager
                .create_index(index(&format!("idx_{prefix}_user_integration"), table.clone(), &[
                    LedgerEntry::UserId,
                    LedgerEntry::IntegrationId,
                ]))
                .await?;
            manager
                .create_index(index(&format!("idx_{prefix}_classification"), table.clone(), &[
                    LedgerEntry::Classification,
                ]))
                .await?;
            manager
                .create_index(index(&format!("idx_{prefix}_transaction_date"), table.clone(), &[
                    LedgerEntry::TransactionDate,
                    LedgerEntry::CreatedTime,
                ]))
                .await?;
            manager
                .create_index(index(&format!("idx_{prefix}_imported_at"), table, &[
                    LedgerEntry::ImportedAt,
                ]))
                .await?;
        }

        let accounts = LedgerAccount::table();
        manager
            .create_table(
                Table::create()
                    .table(accounts.clone())
                    .if_not_exists()
                    .col(pk_auto(LedgerAccountCol::Id))
                    .col(string(LedgerAccountCol::ExternalId))
                    .col(string(LedgerAccountCol::ConnectionId))
                    .col(string(LedgerAccountCol::IntegrationId))
                    .col(string_null(LedgerAccountCol::IntegrationName))
                    .col(string_null(LedgerAccountCol::UserId))
                    .col(string_null(LedgerAccountCol::Name))
                    .col(string_null(LedgerAccountCol::AccountType))
                    .col(string_null(LedgerAccountCol::Status))
                    .col(string_null(LedgerAccountCol::Classification))
                    .col(decimal_null(LedgerAccountCol::CurrentBalance).decimal_len(16, 4))
                    .col(string_null(LedgerAccountCol::Currency))
                    .col(timestamp_with_time_zone_null(LedgerAccountCol::CreatedTime))
                    .col(timestamp_with_time_zone_null(LedgerAccountCol::UpdatedTime))
                    .col(timestamp_with_time_zone_null(LedgerAccountCol::ImportedAt))
                    .col(timestamp_with_time_zone(LedgerAccountCol::SyncedAt))
                    .col(json_binary_null(LedgerAccountCol::RawFields))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                index("uq_ledger_accounts_external_connection", accounts.clone(), &[
                    LedgerAccountCol::ExternalId,
                    LedgerAccountCol::ConnectionId,
                ])
                .unique()
                .to_owned(),
            )
            .await?;
        manager
            .create_index(index("idx_ledger_accounts_user_integration", accounts.clone(), &[
                LedgerAccountCol::UserId,
                LedgerAccountCol::IntegrationId,
            ]))
            .await?;
        manager
            .create_index(index("idx_ledger_accounts_classification", accounts.clone(), &[
                LedgerAccountCol::Classification,
            ]))
            .await?;
        manager
            .create_index(index("idx_ledger_accounts_status", accounts, &[
                LedgerAccountCol::Status,
            ]))
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(LedgerAccount::table()).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(JournalEntry::table()).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Transaction::table()).to_owned())
            .await?;
        Ok(())
    }
}

fn ledger_entry_table(table: TableIden) -> TableCreateStatement {
    Table::create()
        .table(table)
        .if_not_exists()
        .col(pk_auto(LedgerEntry::Id))
        .col(string(LedgerEntry::ExternalId))
        .col(string(LedgerEntry::ConnectionId))
        .col(string(LedgerEntry::IntegrationId))
        .col(string_null(LedgerEntry::IntegrationName))
        .col(string_null(LedgerEntry::UserId))
        .col(string_len_null(LedgerEntry::Classification, 20))
        .col(string_null(LedgerEntry::Number))
        .col(string_null(LedgerEntry::Memo))
        .col(string_null(LedgerEntry::Currency))
        .col(string_null(LedgerEntry::LedgerAccountId))
        .col(decimal_null(LedgerEntry::TotalAmount).decimal_len(16, 4))
        .col(json_binary_null(LedgerEntry::LineItems))
        .col(timestamp_with_time_zone_null(LedgerEntry::TransactionDate))
        .col(timestamp_with_time_zone_null(LedgerEntry::CreatedTime))
        .col(timestamp_with_time_zone_null(LedgerEntry::UpdatedTime))
        .col(timestamp_with_time_zone_null(LedgerEntry::ImportedAt))
        .col(timestamp_with_time_zone(LedgerEntry::SyncedAt))
        .col(json_binary_null(LedgerEntry::RawFields))
        .to_owned()
}

fn index<C: IntoIden + Copy>(name: &str, table: TableIden, columns: &[C]) -> IndexCreateStatement {
    let mut index = Index::create();
    index.name(name).table(table).if_not_exists();
    for column in columns {
        index.col(*column);
    }
    index.to_owned()
}

/// Columns shared by `transactions` and `journal_entries`.
#[derive(DeriveIden, Clone, Copy)]
enum LedgerEntry {
    Id,
    ExternalId,
    ConnectionId,
    IntegrationId,
    IntegrationName,
    UserId,
    Classification,
    Number,
    Memo,
    Currency,
    LedgerAccountId,
    TotalAmount,
    LineItems,
    TransactionDate,
    CreatedTime,
    UpdatedTime,
    ImportedAt,
    SyncedAt,
    RawFields,
}

#[derive(DeriveIden, Clone, Copy)]
enum LedgerAccountCol {
    Id,
    ExternalId,
    ConnectionId,
    IntegrationId,
    IntegrationName,
    UserId,
    Name,
    AccountType,
    Status,
    Classification,
    CurrentBalance,
    Currency,
    CreatedTime,
    UpdatedTime,
    ImportedAt,
    SyncedAt,
    RawFields,
}

//! Idempotent writes keyed by `(external_id, connection_id)`.

use chrono::{DateTime, Utc};
use common::{
    ImportContext, LedgerAccountRecord, LedgerEntryRecord, SyncRecord, UpsertSummary, WriteAction,
};
use model::entities::{journal_entry, ledger_account, transaction};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityName,
    EntityTrait, IdenStatic, IntoActiveModel, QueryFilter, QuerySelect, Set, TransactionTrait,
};
use std::collections::HashSet;
use tracing::{debug, info, instrument, trace};

use crate::error::Result;

/// Rows per `INSERT` statement. Keeps the bind parameter count well under
/// SQLite's limit for the widest table.
const CHUNK_SIZE: usize = 100;

/// An entity the sink can write: a table keyed by
/// `(external_id, connection_id)` with an `imported_at` stamp.
pub trait SyncTarget: EntityTrait + Default {
    type Record: SyncRecord + Send + Sync;
    type Active: ActiveModelTrait<Entity = Self> + Clone + Send + 'static;

    fn external_id_column() -> Self::Column;
    fn connection_id_column() -> Self::Column;
    fn imported_at_column() -> Self::Column;

    /// Every column written besides the key, `id` and `imported_at`.
    fn data_columns() -> Vec<Self::Column>;

    /// Data columns that are never NULL and therefore always overwritten,
    /// even by a merge.
    fn required_columns() -> Vec<Self::Column>;

    fn to_active_model(
        record: Self::Record,
        context: &ImportContext,
        now: DateTime<Utc>,
    ) -> Result<Self::Active>;
}

fn quoted_column<E: SyncTarget>(table: &str, column: E::Column) -> String {
    format!(r#""{}"."{}""#, table, column.as_str())
}

/// `imported_at` keeps the stored value and only fills it in when missing.
fn keep_imported_at<E: SyncTarget>(on_conflict: &mut OnConflict) {
    let table = E::default().table_name().to_string();
    let column = E::imported_at_column();
    on_conflict.value(
        column,
        Expr::cust(format!(
            r#"COALESCE({}, "excluded"."{}")"#,
            quoted_column::<E>(&table, column),
            column.as_str()
        )),
    );
}

/// Writes `records` for one connection in a single database transaction.
///
/// Provenance comes from `context` and overrides anything the records carried.
/// When a key appears more than once the last occurrence wins. Existing rows
/// are overwritten column by column, including the line-item list.
#[instrument(skip(db, context, records), fields(connection_id = %context.connection_id, count = records.len()))]
pub async fn upsert_batch<E: SyncTarget>(
    db: &DatabaseConnection,
    context: &ImportContext,
    records: Vec<E::Record>,
) -> Result<UpsertSummary>
where
    E::Model: IntoActiveModel<E::Active>,
{
    trace!("Entering upsert_batch");

    let total = records.len() as u64;
    if records.is_empty() {
        debug!("Nothing to upsert");
        return Ok(UpsertSummary::default());
    }

    // keep the last occurrence of every key, in input order
    let mut seen = HashSet::new();
    let mut unique: Vec<E::Record> = records
        .into_iter()
        .rev()
        .filter(|record| seen.insert(record.external_id().to_string()))
        .collect();
    unique.reverse();

    let now = Utc::now();
    let mut rows = Vec::with_capacity(unique.len());
    for record in unique {
        let key = record.external_id().to_string();
        rows.push((key, E::to_active_model(record, context, now)?));
    }

    let mut on_conflict =
        OnConflict::columns([E::external_id_column(), E::connection_id_column()]);
    on_conflict.update_columns(E::data_columns());
    keep_imported_at::<E>(&mut on_conflict);

    let txn = db.begin().await?;
    let mut summary = UpsertSummary {
        total,
        ..Default::default()
    };

    let mut rows = rows.into_iter();
    loop {
        let chunk: Vec<(String, E::Active)> = rows.by_ref().take(CHUNK_SIZE).collect();
        if chunk.is_empty() {
            break;
        }

        let keys: Vec<String> = chunk.iter().map(|(key, _)| key.clone()).collect();
        let existing: Vec<String> = E::find()
            .select_only()
            .column(E::external_id_column())
            .filter(E::connection_id_column().eq(context.connection_id.as_str()))
            .filter(E::external_id_column().is_in(keys))
            .into_tuple()
            .all(&txn)
            .await?;

        summary.modified += existing.len() as u64;
        summary.inserted += (chunk.len() - existing.len()) as u64;

        E::insert_many(chunk.into_iter().map(|(_, model)| model))
            .on_conflict(on_conflict.clone())
            .exec_without_returning(&txn)
            .await?;
    }

    txn.commit().await?;

    info!(
        "Upserted {} records: {} inserted, {} modified",
        summary.total, summary.inserted, summary.modified
    );
    Ok(summary)
}

/// Writes a single record, keeping stored values for every nullable column
/// the record leaves empty. Used for webhook updates, which may carry a
/// partial field set.
#[instrument(skip(db, context, record), fields(connection_id = %context.connection_id, external_id = record.external_id()))]
pub async fn upsert_merge<E: SyncTarget>(
    db: &DatabaseConnection,
    context: &ImportContext,
    record: E::Record,
) -> Result<(E::Model, WriteAction)>
where
    E::Model: IntoActiveModel<E::Active>,
{
    trace!("Entering upsert_merge");

    let external_id = record.external_id().to_string();
    let model = E::to_active_model(record, context, Utc::now())?;

    let table = E::default().table_name().to_string();
    let required_columns = E::required_columns();
    let required: Vec<&str> = required_columns.iter().map(|c| c.as_str()).collect();

    let mut on_conflict =
        OnConflict::columns([E::external_id_column(), E::connection_id_column()]);
    for column in E::data_columns() {
        if required.contains(&column.as_str()) {
            on_conflict.update_column(column);
        } else {
            on_conflict.value(
                column,
                Expr::cust(format!(
                    r#"COALESCE("excluded"."{}", {})"#,
                    column.as_str(),
                    quoted_column::<E>(&table, column)
                )),
            );
        }
    }
    keep_imported_at::<E>(&mut on_conflict);

    let txn = db.begin().await?;
    // The insert that claims the key decides the action, so concurrent
    // deliveries of a new key report exactly one creation.
    let inserted = E::insert(model.clone())
        .on_conflict(
            OnConflict::columns([E::external_id_column(), E::connection_id_column()])
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(&txn)
        .await?;
    let existed = inserted == 0;

    if existed {
        E::insert(model)
            .on_conflict(on_conflict)
            .exec_without_returning(&txn)
            .await?;
    }

    let stored = find_by_key::<E, _>(&txn, &external_id, &context.connection_id)
        .await?
        .ok_or_else(|| DbErr::RecordNotFound(format!("{table} {external_id}")))?;
    txn.commit().await?;

    let action = if existed {
        WriteAction::Updated
    } else {
        WriteAction::Created
    };
    debug!("Merged {} into {} ({:?})", external_id, table, action);
    Ok((stored, action))
}

/// Removes the row with the given key, returning it when it existed.
#[instrument(skip(db))]
pub async fn delete_by_key<E: SyncTarget>(
    db: &DatabaseConnection,
    external_id: &str,
    connection_id: &str,
) -> Result<Option<E::Model>> {
    trace!("Entering delete_by_key");

    let txn = db.begin().await?;
    let Some(existing) = find_by_key::<E, _>(&txn, external_id, connection_id).await? else {
        txn.commit().await?;
        debug!("No row to delete");
        return Ok(None);
    };

    let result = E::delete_many()
        .filter(E::external_id_column().eq(external_id))
        .filter(E::connection_id_column().eq(connection_id))
        .exec(&txn)
        .await?;
    txn.commit().await?;

    info!("Deleted {} row(s)", result.rows_affected);
    Ok(Some(existing))
}

pub async fn find_by_key<E: SyncTarget, C: ConnectionTrait>(
    db: &C,
    external_id: &str,
    connection_id: &str,
) -> Result<Option<E::Model>> {
    Ok(E::find()
        .filter(E::external_id_column().eq(external_id))
        .filter(E::connection_id_column().eq(connection_id))
        .one(db)
        .await?)
}

/// Transactions and journal entries share one column set.
macro_rules! ledger_entry_target {
    ($module:ident) => {
        impl SyncTarget for $module::Entity {
            type Record = LedgerEntryRecord;
            type Active = $module::ActiveModel;

            fn external_id_column() -> Self::Column {
                $module::Column::ExternalId
            }

            fn connection_id_column() -> Self::Column {
                $module::Column::ConnectionId
            }

            fn imported_at_column() -> Self::Column {
                $module::Column::ImportedAt
            }

            fn data_columns() -> Vec<Self::Column> {
                use $module::Column::*;
                vec![
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
                    SyncedAt,
                    RawFields,
                ]
            }

            fn required_columns() -> Vec<Self::Column> {
                vec![$module::Column::IntegrationId, $module::Column::SyncedAt]
            }

            fn to_active_model(
                record: LedgerEntryRecord,
                context: &ImportContext,
                now: DateTime<Utc>,
            ) -> Result<$module::ActiveModel> {
                let line_items = record
                    .line_items
                    .map(serde_json::to_value)
                    .transpose()?;

                Ok($module::ActiveModel {
                    external_id: Set(record.external_id),
                    connection_id: Set(context.connection_id.clone()),
                    integration_id: Set(context.integration_id.clone()),
                    integration_name: Set(context.integration_name.clone()),
                    user_id: Set(context.user_id.clone()),
                    classification: Set(record.classification),
                    number: Set(record.number),
                    memo: Set(record.memo),
                    currency: Set(record.currency),
                    ledger_account_id: Set(record.ledger_account_id),
                    total_amount: Set(record.total_amount),
                    line_items: Set(line_items),
                    transaction_date: Set(record.transaction_date),
                    created_time: Set(record.created_time),
                    updated_time: Set(record.updated_time),
                    imported_at: Set(Some(now)),
                    synced_at: Set(now),
                    raw_fields: Set(record.raw_fields),
                    ..Default::default()
                })
            }
        }
    };
}

ledger_entry_target!(transaction);
ledger_entry_target!(journal_entry);

impl SyncTarget for ledger_account::Entity {
    type Record = LedgerAccountRecord;
    type Active = ledger_account::ActiveModel;

    fn external_id_column() -> Self::Column {
        ledger_account::Column::ExternalId
    }

    fn connection_id_column() -> Self::Column {
        ledger_account::Column::ConnectionId
    }

    fn imported_at_column() -> Self::Column {
        ledger_account::Column::ImportedAt
    }

    fn data_columns() -> Vec<Self::Column> {
        use ledger_account::Column::*;
        vec![
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
            SyncedAt,
            RawFields,
        ]
    }

    fn required_columns() -> Vec<Self::Column> {
        vec![
            ledger_account::Column::IntegrationId,
            ledger_account::Column::SyncedAt,
        ]
    }

    fn to_active_model(
        record: LedgerAccountRecord,
        context: &ImportContext,
        now: DateTime<Utc>,
    ) -> Result<ledger_account::ActiveModel> {
        Ok(ledger_account::ActiveModel {
            external_id: Set(record.external_id),
            connection_id: Set(context.connection_id.clone()),
            integration_id: Set(context.integration_id.clone()),
            integration_name: Set(context.integration_name.clone()),
            user_id: Set(context.user_id.clone()),
            name: Set(record.name),
            account_type: Set(record.account_type),
            status: Set(record.status),
            classification: Set(record.classification),
            current_balance: Set(record.current_balance),
            currency: Set(record.currency),
            created_time: Set(record.created_time),
            updated_time: Set(record.updated_time),
            imported_at: Set(Some(now)),
            synced_at: Set(now),
            raw_fields: Set(record.raw_fields),
            ..Default::default()
        })
    }
}

//! Read side: filtered, paginated listings and per-integration counts.

use common::IntegrationCount;
use model::entities::{journal_entry, ledger_account, transaction};
use sea_orm::sea_query::{Expr, NullOrdering, Order};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, FromQueryResult, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Select,
};
use tracing::{debug, instrument, trace};

use crate::error::Result;
use crate::sink::SyncTarget;

pub use crate::sink::find_by_key;

/// Optional filters shared by list and count queries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    pub integration_id: Option<String>,
    /// Stored classification value; callers validate it beforehand.
    pub classification: Option<String>,
}

/// A page of rows plus the total number of rows matching the filter.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<M> {
    pub records: Vec<M>,
    pub total: u64,
    pub limit: u64,
    pub offset: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IntegrationCounts {
    pub counts: Vec<IntegrationCount>,
    pub total: u64,
}

/// Columns and ordering the query facade needs on top of [`SyncTarget`].
pub trait QueryTarget: SyncTarget {
    fn integration_id_column() -> Self::Column;
    fn integration_name_column() -> Self::Column;
    fn classification_column() -> Self::Column;
    /// Stable listing order.
    fn order(select: Select<Self>) -> Select<Self>;
}

macro_rules! ledger_entry_query {
    ($module:ident) => {
        impl QueryTarget for $module::Entity {
            fn integration_id_column() -> Self::Column {
                $module::Column::IntegrationId
            }

            fn integration_name_column() -> Self::Column {
                $module::Column::IntegrationName
            }

            fn classification_column() -> Self::Column {
                $module::Column::Classification
            }

            fn order(select: Select<Self>) -> Select<Self> {
                // undated rows go last on every backend
                select
                    .order_by_with_nulls(
                        $module::Column::TransactionDate,
                        Order::Desc,
                        NullOrdering::Last,
                    )
                    .order_by_with_nulls($module::Column::CreatedTime, Order::Desc, NullOrdering::Last)
                    .order_by_desc($module::Column::Id)
            }
        }
    };
}

ledger_entry_query!(transaction);
ledger_entry_query!(journal_entry);

impl QueryTarget for ledger_account::Entity {
    fn integration_id_column() -> Self::Column {
        ledger_account::Column::IntegrationId
    }

    fn integration_name_column() -> Self::Column {
        ledger_account::Column::IntegrationName
    }

    fn classification_column() -> Self::Column {
        ledger_account::Column::Classification
    }

    fn order(select: Select<Self>) -> Select<Self> {
        select
            .order_by_asc(ledger_account::Column::Name)
            .order_by_asc(ledger_account::Column::Id)
    }
}

fn filtered<E: QueryTarget>(filter: &ListFilter) -> Select<E> {
    let mut query = E::find();
    if let Some(integration_id) = &filter.integration_id {
        query = query.filter(E::integration_id_column().eq(integration_id.as_str()));
    }
    if let Some(classification) = &filter.classification {
        query = query.filter(E::classification_column().eq(classification.as_str()));
    }
    query
}

/// Returns one page of rows in listing order together with the number of
/// rows matching `filter`. The two are separate queries, so a concurrent
/// write can make them disagree by a few rows.
#[instrument(skip(db))]
pub async fn list_page<E: QueryTarget>(
    db: &DatabaseConnection,
    filter: &ListFilter,
    limit: u64,
    offset: u64,
) -> Result<Page<E::Model>>
where
    E::Model: Sync,
{
    trace!("Entering list_page");

    let query = filtered::<E>(filter);
    let total = query.clone().count(db).await?;
    let records = E::order(query)
        .limit(limit)
        .offset(offset)
        .all(db)
        .await?;

    debug!("Listed {} of {} rows", records.len(), total);
    Ok(Page {
        records,
        total,
        limit,
        offset,
    })
}

#[derive(Debug, FromQueryResult)]
struct IntegrationCountRow {
    integration_id: String,
    integration_name: Option<String>,
    count: i64,
}

/// Number of rows per integration, plus the overall total.
#[instrument(skip(db))]
pub async fn count_by_integration<E: QueryTarget>(
    db: &DatabaseConnection,
    filter: &ListFilter,
) -> Result<IntegrationCounts>
where
    E::Model: Sync,
{
    trace!("Entering count_by_integration");

    let rows = filtered::<E>(filter)
        .select_only()
        .column(E::integration_id_column())
        .column_as(
            Expr::col(E::integration_name_column()).max(),
            "integration_name",
        )
        .column_as(Expr::col(E::integration_id_column()).count(), "count")
        .group_by(E::integration_id_column())
        .order_by_asc(E::integration_id_column())
        .into_model::<IntegrationCountRow>()
        .all(db)
        .await?;

    let total = filtered::<E>(filter).count(db).await?;

    let counts: Vec<IntegrationCount> = rows
        .into_iter()
        .map(|row| IntegrationCount {
            integration_id: row.integration_id,
            integration_name: row.integration_name,
            count: row.count.max(0) as u64,
        })
        .collect();

    debug!("Counted {} rows across {} integrations", total, counts.len());
    Ok(IntegrationCounts { counts, total })
}

// 📊 Aggregation Engine
// One grouping pass: (month, county, item) → sale dollars, cost, transactions

use crate::error::StoreError;
use crate::schema::CURRENCY_SCALE;
use crate::store::{GroupKey, GroupRow, GroupingQuery, Measure, Reduction, Store};
use crate::temporal::Month;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

/// One group of the monthly summary
///
/// Rows with a null county never reach a summary record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub month: Month,
    pub county: String,
    pub item_number: Option<String>,
    pub item_description: Option<String>,
    pub sale_dollars: Decimal,
    /// Σ unit cost × quantity sold
    pub cost: Decimal,
    pub transaction_count: i64,
}

/// The grouping query behind `aggregate`
pub fn summary_query() -> GroupingQuery {
    GroupingQuery::new()
        .group_by(GroupKey::Month)
        .group_by(GroupKey::County)
        .group_by(GroupKey::ItemNumber)
        .group_by(GroupKey::ItemDescription)
        .aggregate(Measure::SaleDollars, Reduction::Sum)
        .aggregate(Measure::Cost, Reduction::Sum)
        .aggregate(Measure::Rows, Reduction::Count)
        .require_present(GroupKey::County)
}

fn to_summary(row: GroupRow) -> Result<SummaryRecord, StoreError> {
    let mut keys = row.keys.into_iter();
    let mut next_key = || keys.next().flatten();

    let month_text = next_key().unwrap_or_default();
    let month = month_text
        .parse::<Month>()
        .map_err(|_| StoreError::InvalidStoredValue {
            column: "date",
            value: month_text.clone(),
        })?;
    let county = next_key().ok_or_else(|| StoreError::InvalidStoredValue {
        column: "county",
        value: String::new(),
    })?;
    let item_number = next_key();
    let item_description = next_key();

    match row.values[..] {
        [sale, cost, count] => Ok(SummaryRecord {
            month,
            county,
            item_number,
            item_description,
            sale_dollars: Decimal::new(sale, CURRENCY_SCALE),
            cost: Decimal::new(cost, CURRENCY_SCALE),
            transaction_count: count,
        }),
        _ => Err(StoreError::InvalidStoredValue {
            column: "summary",
            value: format!("{:?}", row.values),
        }),
    }
}

/// Produce every summary record in one grouping query
///
/// No output order is promised; SQLite happens to return key order.
pub fn aggregate<S: Store + ?Sized>(store: &S) -> Result<Vec<SummaryRecord>, StoreError> {
    let rows = store.group_by(&summary_query())?;
    let summary = rows.into_iter().map(to_summary).collect::<Result<Vec<_>, _>>()?;

    info!(groups = summary.len(), "aggregated monthly summary");
    Ok(summary)
}

/// Replace the derived `monthly_summary` table with `rows`
pub fn persist_summary<S: Store + ?Sized>(store: &mut S, rows: &[SummaryRecord]) -> Result<usize, StoreError> {
    let written = store.replace_summary(rows)?;
    info!(rows = written, "persisted monthly summary");
    Ok(written)
}

/// Latest month present in a summary
pub fn latest_month(rows: &[SummaryRecord]) -> Option<Month> {
    rows.iter().map(|r| r.month).max()
}

// ============================================================================
// TESTS
// ============================================================================

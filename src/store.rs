// 🗄️ Store - append-only sales table + grouping queries
// SQLite with WAL; decimals persisted as exact minor units

use crate::aggregation::SummaryRecord;
use crate::error::StoreError;
use crate::normalizer::NormalizedRow;
use crate::schema::{CURRENCY_SCALE, VOLUME_SCALE};
use crate::temporal::Month;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;
use serde::Serialize;
use std::path::Path;

// ============================================================================
// BATCH TYPES
// ============================================================================

/// Where a batch of rows came from
#[derive(Debug, Clone)]
pub struct BatchOrigin {
    pub load_id: String,
    pub partition: String,
}

/// A normalized row together with its 1-based line in the partition
#[derive(Debug, Clone)]
pub struct SourcedRow {
    pub line: u64,
    pub row: NormalizedRow,
}

/// One committed partition load
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadLogEntry {
    pub load_id: String,
    pub partition: String,
    pub checksum: String,
    pub accepted: usize,
    pub rejected: usize,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

// ============================================================================
// GROUPING QUERY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKey {
    /// `YYYY-MM` prefix of the date
    Month,
    County,
    CountyNumber,
    StoreNumber,
    ItemNumber,
    ItemDescription,
    VendorName,
    CategoryName,
}

impl GroupKey {
    fn expr(&self) -> &'static str {
        match self {
            GroupKey::Month => "substr(date, 1, 7)",
            GroupKey::County => "county",
            GroupKey::CountyNumber => "county_number",
            GroupKey::StoreNumber => "CAST(store_number AS TEXT)",
            GroupKey::ItemNumber => "item_number",
            GroupKey::ItemDescription => "item_description",
            GroupKey::VendorName => "vendor_name",
            GroupKey::CategoryName => "category_name",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Measure {
    /// Constant 1 per row
    Rows,
    SaleDollars,
    /// Unit cost × quantity sold
    Cost,
    BottlesSold,
    VolumeSoldLiters,
    VolumeSoldGallons,
}

impl Measure {
    fn expr(&self) -> &'static str {
        match self {
            Measure::Rows => "1",
            Measure::SaleDollars => "sale_dollars",
            Measure::Cost => "state_bottle_cost * bottles_sold",
            Measure::BottlesSold => "bottles_sold",
            Measure::VolumeSoldLiters => "volume_sold_liters",
            Measure::VolumeSoldGallons => "volume_sold_gallons",
        }
    }

    /// Fractional digits of the stored minor units, None for plain integers
    pub fn scale(&self) -> Option<u32> {
        match self {
            Measure::Rows | Measure::BottlesSold => None,
            Measure::SaleDollars | Measure::Cost => Some(CURRENCY_SCALE),
            Measure::VolumeSoldLiters | Measure::VolumeSoldGallons => Some(VOLUME_SCALE),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    /// Sum of non-null values, 0 for an empty group
    Sum,
    /// Number of non-null values
    Count,
}

/// Grouping key set + (measure, reduction) pairs
#[derive(Debug, Clone, Default)]
pub struct GroupingQuery {
    pub keys: Vec<GroupKey>,
    pub aggregates: Vec<(Measure, Reduction)>,
    /// Rows where any of these keys is null are excluded
    pub require_present: Vec<GroupKey>,
}

impl GroupingQuery {
    pub fn new() -> Self {
        GroupingQuery::default()
    }

    /// Builder: add grouping key
    pub fn group_by(mut self, key: GroupKey) -> Self {
        self.keys.push(key);
        self
    }

    /// Builder: add output column
    pub fn aggregate(mut self, measure: Measure, reduction: Reduction) -> Self {
        self.aggregates.push((measure, reduction));
        self
    }

    /// Builder: exclude rows with a null key
    pub fn require_present(mut self, key: GroupKey) -> Self {
        self.require_present.push(key);
        self
    }

    pub fn to_sql(&self) -> String {
        let mut columns: Vec<String> = self.keys.iter().map(|k| k.expr().to_string()).collect();
        for (measure, reduction) in &self.aggregates {
            columns.push(match reduction {
                Reduction::Sum => format!("COALESCE(SUM({}), 0)", measure.expr()),
                Reduction::Count => format!("COUNT({})", measure.expr()),
            });
        }

        let mut sql = format!("SELECT {} FROM sales", columns.join(", "));

        if !self.require_present.is_empty() {
            let conditions: Vec<String> = self
                .require_present
                .iter()
                .map(|k| format!("{} IS NOT NULL", k.expr()))
                .collect();
            sql.push_str(&format!(" WHERE {}", conditions.join(" AND ")));
        }

        if !self.keys.is_empty() {
            let positions: Vec<String> = (1..=self.keys.len()).map(|i| i.to_string()).collect();
            let positions = positions.join(", ");
            sql.push_str(&format!(" GROUP BY {} ORDER BY {}", positions, positions));
        }

        sql
    }
}

/// One result row: key values in query order, then aggregate values
///
/// Decimal measures come back as minor units, see `Measure::scale`.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupRow {
    pub keys: Vec<Option<String>>,
    pub values: Vec<i64>,
}

// ============================================================================
// STORE INTERFACE
// ============================================================================

/// Persistent table of sales records
///
/// Writes happen inside a partition transaction: `begin_partition`, any
/// number of `append_batch`, then `commit_partition` or `rollback_partition`.
pub trait Store {
    fn begin_partition(&mut self) -> Result<(), StoreError>;

    fn append_batch(&mut self, origin: &BatchOrigin, rows: &[SourcedRow]) -> Result<usize, StoreError>;

    fn commit_partition(&mut self) -> Result<(), StoreError>;

    fn rollback_partition(&mut self) -> Result<(), StoreError>;

    fn group_by(&self, query: &GroupingQuery) -> Result<Vec<GroupRow>, StoreError>;

    fn row_count(&self) -> Result<i64, StoreError>;

    /// Record a partition load (inside the partition transaction)
    fn record_load(&mut self, entry: &LoadLogEntry) -> Result<(), StoreError>;

    /// Load id of the earliest load with this partition checksum
    fn find_load_by_checksum(&self, checksum: &str) -> Result<Option<String>, StoreError>;

    /// Replace the derived summary table wholesale
    fn replace_summary(&mut self, rows: &[SummaryRecord]) -> Result<usize, StoreError>;

    fn read_summary(&self) -> Result<Vec<SummaryRecord>, StoreError>;
}

// ============================================================================
// SQLITE STORE
// ============================================================================

const INSERT_SALE: &str = "INSERT INTO sales (
        invoice_item_number, date, store_number, store_name, address, city,
        zip_code, store_location, county_number, county, category, category_name,
        vendor_number, vendor_name, item_number, item_description, pack,
        bottle_volume_ml, state_bottle_cost, state_bottle_retail, bottles_sold,
        sale_dollars, volume_sold_liters, volume_sold_gallons,
        load_id, partition_id, line_number
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
              ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27)";

pub struct SqliteStore {
    conn: Connection,
    in_partition: bool,
}

impl SqliteStore {
    /// Open (or create) a store file
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    pub fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        setup_database(&conn)?;
        Ok(SqliteStore {
            conn,
            in_partition: false,
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Every committed load, oldest first
    pub fn load_log(&self) -> Result<Vec<LoadLogEntry>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT load_id, partition_id, checksum, accepted, rejected, started_at, elapsed_ms
             FROM load_log
             ORDER BY started_at, rowid",
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, i64>(6)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(load_id, partition, checksum, accepted, rejected, started_at, elapsed_ms)| {
                let started_at = DateTime::parse_from_rfc3339(&started_at)
                    .map_err(|_| StoreError::InvalidStoredValue {
                        column: "started_at",
                        value: started_at.clone(),
                    })?
                    .with_timezone(&Utc);

                Ok(LoadLogEntry {
                    load_id,
                    partition,
                    checksum,
                    accepted: accepted as usize,
                    rejected: rejected as usize,
                    started_at,
                    elapsed_ms: elapsed_ms as u64,
                })
            })
            .collect()
    }
}

pub fn setup_database(conn: &Connection) -> Result<(), StoreError> {
    // WAL for crash recovery (in-memory databases report "memory")
    conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;

    // ==========================================================================
    // Sales table (append-only)
    // Decimal columns hold minor units: cents for currency, millionths of a
    // liter / gallon for volume
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS sales (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            invoice_item_number TEXT NOT NULL,
            date TEXT NOT NULL,
            store_number INTEGER,
            store_name TEXT,
            address TEXT,
            city TEXT,
            zip_code TEXT,
            store_location TEXT,
            county_number TEXT,
            county TEXT,
            category TEXT,
            category_name TEXT,
            vendor_number TEXT,
            vendor_name TEXT,
            item_number TEXT,
            item_description TEXT,
            pack INTEGER,
            bottle_volume_ml INTEGER,
            state_bottle_cost INTEGER,
            state_bottle_retail INTEGER,
            bottles_sold INTEGER,
            sale_dollars INTEGER,
            volume_sold_liters INTEGER,
            volume_sold_gallons INTEGER,
            load_id TEXT NOT NULL,
            partition_id TEXT NOT NULL,
            line_number INTEGER NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Load log (one row per committed partition)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS load_log (
            load_id TEXT PRIMARY KEY,
            partition_id TEXT NOT NULL,
            checksum TEXT NOT NULL,
            accepted INTEGER NOT NULL,
            rejected INTEGER NOT NULL,
            started_at TEXT NOT NULL,
            elapsed_ms INTEGER NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Derived monthly summary (regenerated wholesale)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS monthly_summary (
            month TEXT NOT NULL,
            county TEXT NOT NULL,
            item_number TEXT,
            item_description TEXT,
            sale_dollars INTEGER NOT NULL,
            cost INTEGER NOT NULL,
            transaction_count INTEGER NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute("CREATE INDEX IF NOT EXISTS idx_sales_date ON sales(date)", [])?;
    conn.execute("CREATE INDEX IF NOT EXISTS idx_sales_county ON sales(county)", [])?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_load_log_checksum ON load_log(checksum)",
        [],
    )?;

    Ok(())
}

/// Exact minor units of a decimal at `scale`
fn minor_units(column: &'static str, value: Option<Decimal>, scale: u32) -> Result<Option<i64>, StoreError> {
    value
        .map(|d| {
            let unrepresentable = || StoreError::Unrepresentable {
                column,
                value: d.to_string(),
            };

            if d.normalize().scale() > scale {
                return Err(unrepresentable());
            }
            let mut scaled = d;
            scaled.rescale(scale);
            i64::try_from(scaled.mantissa()).map_err(|_| unrepresentable())
        })
        .transpose()
}

impl Store for SqliteStore {
    fn begin_partition(&mut self) -> Result<(), StoreError> {
        if self.in_partition {
            return Err(StoreError::PartitionAlreadyOpen);
        }
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        self.in_partition = true;
        Ok(())
    }

    fn append_batch(&mut self, origin: &BatchOrigin, rows: &[SourcedRow]) -> Result<usize, StoreError> {
        if !self.in_partition {
            return Err(StoreError::NoOpenPartition);
        }

        let mut stmt = self.conn.prepare_cached(INSERT_SALE)?;

        for sourced in rows {
            let r = &sourced.row;
            stmt.execute(params![
                r.invoice_item_number,
                r.date.format("%Y-%m-%d").to_string(),
                r.store_number,
                r.store_name,
                r.address,
                r.city,
                r.zip_code,
                r.store_location,
                r.county_number,
                r.county,
                r.category,
                r.category_name,
                r.vendor_number,
                r.vendor_name,
                r.item_number,
                r.item_description,
                r.pack,
                r.bottle_volume_ml,
                minor_units("state_bottle_cost", r.state_bottle_cost, CURRENCY_SCALE)?,
                minor_units("state_bottle_retail", r.state_bottle_retail, CURRENCY_SCALE)?,
                r.bottles_sold,
                minor_units("sale_dollars", r.sale_dollars, CURRENCY_SCALE)?,
                minor_units("volume_sold_liters", r.volume_sold_liters, VOLUME_SCALE)?,
                minor_units("volume_sold_gallons", r.volume_sold_gallons, VOLUME_SCALE)?,
                origin.load_id,
                origin.partition,
                sourced.line as i64,
            ])?;
        }

        Ok(rows.len())
    }

    fn commit_partition(&mut self) -> Result<(), StoreError> {
        if !self.in_partition {
            return Err(StoreError::NoOpenPartition);
        }
        self.conn.execute_batch("COMMIT")?;
        self.in_partition = false;
        Ok(())
    }

    fn rollback_partition(&mut self) -> Result<(), StoreError> {
        if !self.in_partition {
            return Err(StoreError::NoOpenPartition);
        }
        self.in_partition = false;
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }

    fn group_by(&self, query: &GroupingQuery) -> Result<Vec<GroupRow>, StoreError> {
        let key_count = query.keys.len();
        let value_count = query.aggregates.len();

        let mut stmt = self.conn.prepare(&query.to_sql())?;
        let rows = stmt
            .query_map([], |row| {
                let mut keys = Vec::with_capacity(key_count);
                for i in 0..key_count {
                    keys.push(row.get::<_, Option<String>>(i)?);
                }
                let mut values = Vec::with_capacity(value_count);
                for j in 0..value_count {
                    values.push(row.get::<_, i64>(key_count + j)?);
                }
                Ok(GroupRow { keys, values })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    fn row_count(&self) -> Result<i64, StoreError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM sales", [], |row| row.get(0))?;
        Ok(count)
    }

    fn record_load(&mut self, entry: &LoadLogEntry) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO load_log (
                load_id, partition_id, checksum, accepted, rejected, started_at, elapsed_ms
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                entry.load_id,
                entry.partition,
                entry.checksum,
                entry.accepted as i64,
                entry.rejected as i64,
                entry.started_at.to_rfc3339(),
                entry.elapsed_ms as i64,
            ],
        )?;
        Ok(())
    }

    fn find_load_by_checksum(&self, checksum: &str) -> Result<Option<String>, StoreError> {
        let load_id = self
            .conn
            .query_row(
                "SELECT load_id FROM load_log WHERE checksum = ?1 ORDER BY started_at LIMIT 1",
                [checksum],
                |row| row.get(0),
            )
            .optional()?;
        Ok(load_id)
    }

    fn replace_summary(&mut self, rows: &[SummaryRecord]) -> Result<usize, StoreError> {
        if self.in_partition {
            return Err(StoreError::PartitionAlreadyOpen);
        }

        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM monthly_summary", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO monthly_summary (
                    month, county, item_number, item_description,
                    sale_dollars, cost, transaction_count
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for r in rows {
                stmt.execute(params![
                    r.month.to_string(),
                    r.county,
                    r.item_number,
                    r.item_description,
                    minor_units("sale_dollars", Some(r.sale_dollars), CURRENCY_SCALE)?,
                    minor_units("cost", Some(r.cost), CURRENCY_SCALE)?,
                    r.transaction_count,
                ])?;
            }
        }
        tx.commit()?;

        Ok(rows.len())
    }

    fn read_summary(&self) -> Result<Vec<SummaryRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT month, county, item_number, item_description,
                    sale_dollars, cost, transaction_count
             FROM monthly_summary
             ORDER BY month, county, item_number, item_description",
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, i64>(5)?,
                    row.get::<_, i64>(6)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(month, county, item_number, item_description, sale, cost, count)| {
                let month = month
                    .parse::<Month>()
                    .map_err(|_| StoreError::InvalidStoredValue {
                        column: "month",
                        value: month.clone(),
                    })?;

                Ok(SummaryRecord {
                    month,
                    county,
                    item_number,
                    item_description,
                    sale_dollars: Decimal::new(sale, CURRENCY_SCALE),
                    cost: Decimal::new(cost, CURRENCY_SCALE),
                    transaction_count: count,
                })
            })
            .collect()
    }
}

// ============================================================================
// TESTS
// ============================================================================

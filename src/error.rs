// ⚠️ Error Taxonomy
// Row-level failures are values (CoercionError), everything else aborts its unit of work

use serde::Serialize;
use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// ROW LEVEL (recovered locally by the loader)
// ============================================================================

/// Why a single field could not be converted to its declared type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CoercionReason {
    MissingRequired,
    NotAnInteger,
    NotADecimal,
    ExcessPrecision { scale: u32 },
    NotADate,
    OutOfRange,
    /// Field bytes are not valid UTF-8
    InvalidText,
}

impl fmt::Display for CoercionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoercionReason::MissingRequired => write!(f, "missing required value"),
            CoercionReason::NotAnInteger => write!(f, "not an integer"),
            CoercionReason::NotADecimal => write!(f, "not a decimal number"),
            CoercionReason::ExcessPrecision { scale } => {
                write!(f, "more than {} fractional digits", scale)
            }
            CoercionReason::NotADate => write!(f, "not a recognized date"),
            CoercionReason::OutOfRange => write!(f, "value out of range"),
            CoercionReason::InvalidText => write!(f, "not valid UTF-8 text"),
        }
    }
}

/// A field value that failed schema coercion. Rejects the whole row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("column '{column}': {reason} (value '{value}')")]
pub struct CoercionError {
    pub column: &'static str,
    pub value: String,
    pub reason: CoercionReason,
}

// ============================================================================
// PARTITION / STORE LEVEL
// ============================================================================

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("missing required column '{0}'")]
    MissingColumn(&'static str),

    #[error("column '{field}' matched by both '{first}' and '{second}'")]
    DuplicateColumn {
        field: &'static str,
        first: String,
        second: String,
    },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error("a partition transaction is already open")]
    PartitionAlreadyOpen,

    #[error("no partition transaction is open")]
    NoOpenPartition,

    #[error("value '{value}' in column '{column}' cannot be stored exactly")]
    Unrepresentable { column: &'static str, value: String },

    #[error("stored value '{value}' in column '{column}' is invalid")]
    InvalidStoredValue { column: &'static str, value: String },
}

/// Failure of one partition load. Earlier partitions stay committed.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("partition '{partition}': cannot open: {source}")]
    Open {
        partition: String,
        #[source]
        source: io::Error,
    },

    #[error("partition '{partition}': read failed at line {line}: {source}")]
    PartitionRead {
        partition: String,
        line: u64,
        #[source]
        source: csv::Error,
    },

    #[error("partition '{partition}': {source}")]
    Schema {
        partition: String,
        #[source]
        source: SchemaError,
    },

    #[error("partition '{partition}': store write failed: {source}")]
    StoreWrite {
        partition: String,
        #[source]
        source: StoreError,
    },
}

impl LoadError {
    /// Identifier of the partition this failure belongs to
    pub fn partition(&self) -> &str {
        match self {
            LoadError::Open { partition, .. }
            | LoadError::PartitionRead { partition, .. }
            | LoadError::Schema { partition, .. }
            | LoadError::StoreWrite { partition, .. } => partition,
        }
    }
}

// ============================================================================
// REFERENCE / CONFIG
// ============================================================================

#[derive(Debug, Error)]
pub enum ReferenceError {
    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error("reference line {line}: expected a county and a taxable flag")]
    MissingColumns { line: u64 },

    #[error("reference line {line}: county name is empty")]
    EmptyCounty { line: u64 },

    #[error("reference line {line}: unrecognized taxable flag '{value}'")]
    InvalidFlag { line: u64, value: String },

    #[error("reference line {line}: county '{county}' is listed more than once")]
    DuplicateCounty { line: u64, county: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

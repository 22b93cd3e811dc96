// County Sales ETL - Core Library
// Exposes all modules for use in the CLI and tests

pub mod error;
pub mod config;
pub mod schema;         // Column declarations + header resolution
pub mod temporal;       // Calendar months
pub mod normalizer;     // Raw text → typed rows
pub mod store;          // Store trait + SQLite backend
pub mod loader;         // Partitioned batch loads
pub mod aggregation;    // Monthly summary
pub mod jurisdiction;   // Taxable reference + county classification
pub mod report;

// Re-export commonly used types
pub use error::{
    CoercionError, CoercionReason, ConfigError, LoadError, ReferenceError, SchemaError, StoreError,
};
pub use config::EtlConfig;
pub use schema::{
    ColumnDefinition, ColumnType, Field, HeaderMap, SchemaRegistry, CURRENCY_SCALE, VOLUME_SCALE,
};
pub use temporal::Month;
pub use normalizer::{canonicalize_county, NormalizedRow, RawRow, RecordNormalizer};
pub use store::{
    setup_database, BatchOrigin, GroupKey, GroupRow, GroupingQuery, LoadLogEntry, Measure,
    Reduction, SourcedRow, SqliteStore, Store,
};
pub use loader::{
    BatchLoader, CancellationFlag, LoadReport, LoadSummary, LoaderOptions, PartitionSource,
    Rejection,
};
pub use aggregation::{aggregate, latest_month, persist_summary, summary_query, SummaryRecord};
pub use jurisdiction::{classify, CountyClassification, JurisdictionReference, TaxFlag};
pub use report::{write_csv, write_json, write_report, ClassificationTally, FlagTotals, ReportFormat};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

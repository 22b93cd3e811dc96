// 📥 Batch Loader
// Streams one partition at a time: CSV → Normalizer → bounded batches → Store
//
// A partition commits atomically. Reloading the same partition appends its
// rows again; the load log only lets us warn about it.

use crate::config::EtlConfig;
use crate::error::{CoercionError, ConfigError, LoadError};
use crate::normalizer::{RawRow, RecordNormalizer};
use crate::store::{BatchOrigin, LoadLogEntry, SourcedRow, Store};
use chrono::Utc;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

// ============================================================================
// PARTITION SOURCE
// ============================================================================

#[derive(Debug, Clone)]
enum SourceKind {
    File(PathBuf),
    Bytes(Vec<u8>),
}

/// One independently readable chunk of the dataset
#[derive(Debug, Clone)]
pub struct PartitionSource {
    id: String,
    kind: SourceKind,
}

impl PartitionSource {
    /// Partition backed by a file; the id is the file name
    pub fn file(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let id = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .unwrap_or_else(|| path.display().to_string());
        PartitionSource {
            id,
            kind: SourceKind::File(path),
        }
    }

    /// In-memory partition (tests, stdin)
    pub fn from_bytes(id: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        PartitionSource {
            id: id.into(),
            kind: SourceKind::Bytes(bytes.into()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.kind {
            SourceKind::File(path) => Some(path),
            SourceKind::Bytes(_) => None,
        }
    }

    fn open(&self) -> io::Result<Box<dyn Read + '_>> {
        match &self.kind {
            SourceKind::File(path) => Ok(Box::new(File::open(path)?)),
            SourceKind::Bytes(bytes) => Ok(Box::new(bytes.as_slice())),
        }
    }
}

/// Read adapter computing SHA-256 of everything read through it
struct HashingReader<R> {
    inner: R,
    hasher: Sha256,
}

impl<R: Read> HashingReader<R> {
    fn new(inner: R) -> Self {
        HashingReader {
            inner,
            hasher: Sha256::new(),
        }
    }

    fn finalize_hex(self) -> String {
        format!("{:x}", self.hasher.finalize())
    }
}

impl<R: Read> Read for HashingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }
}

// ============================================================================
// OPTIONS & REPORTS
// ============================================================================

#[derive(Debug, Clone)]
pub struct LoaderOptions {
    /// Accepted rows buffered before each append
    pub batch_size: usize,
    pub delimiter: u8,
    /// Rejections kept in a report; the count is always exact
    pub rejection_sample: usize,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        LoaderOptions {
            batch_size: 10_000,
            delimiter: b',',
            rejection_sample: 100,
        }
    }
}

impl TryFrom<&EtlConfig> for LoaderOptions {
    type Error = ConfigError;

    fn try_from(config: &EtlConfig) -> Result<Self, Self::Error> {
        config.validate()?;
        let delimiter = u8::try_from(config.delimiter)
            .map_err(|_| ConfigError::Invalid(format!("delimiter {:?} is not ASCII", config.delimiter)))?;

        Ok(LoaderOptions {
            batch_size: config.batch_size,
            delimiter,
            rejection_sample: config.rejection_sample,
        })
    }
}

/// A row excluded by schema coercion
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rejection {
    pub partition: String,
    pub line: u64,
    pub error: CoercionError,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    pub load_id: String,
    pub partition: String,
    /// SHA-256 of the partition bytes
    pub checksum: String,
    pub accepted_count: usize,
    pub rejected_count: usize,
    pub elapsed: Duration,
    /// First `rejection_sample` rejections
    pub rejections: Vec<Rejection>,
    /// Earlier load of byte-identical input, if any
    pub previously_loaded_by: Option<String>,
}

impl LoadReport {
    pub fn read_count(&self) -> usize {
        self.accepted_count + self.rejected_count
    }
}

/// Outcome of a multi-partition load
#[derive(Debug, Default)]
pub struct LoadSummary {
    pub reports: Vec<LoadReport>,
    pub failures: Vec<LoadError>,
    /// Partitions not attempted because of cancellation
    pub skipped: Vec<String>,
}

impl LoadSummary {
    pub fn accepted_total(&self) -> usize {
        self.reports.iter().map(|r| r.accepted_count).sum()
    }

    pub fn rejected_total(&self) -> usize {
        self.reports.iter().map(|r| r.rejected_count).sum()
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.skipped.is_empty()
    }
}

/// Coarse cancellation, honoured between partitions
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        CancellationFlag::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ============================================================================
// BATCH LOADER
// ============================================================================

struct StreamCounts {
    accepted: usize,
    rejected: usize,
    rejections: Vec<Rejection>,
}

pub struct BatchLoader {
    normalizer: RecordNormalizer,
    options: LoaderOptions,
}

impl BatchLoader {
    pub fn new(normalizer: RecordNormalizer, options: LoaderOptions) -> Self {
        BatchLoader { normalizer, options }
    }

    pub fn options(&self) -> &LoaderOptions {
        &self.options
    }

    /// Load one partition inside a single store transaction
    ///
    /// Row coercion failures are counted and skipped. Any partition-level
    /// failure rolls back every row of this partition.
    pub fn load<S: Store + ?Sized>(&self, store: &mut S, source: &PartitionSource) -> Result<LoadReport, LoadError> {
        let started = Instant::now();
        let started_at = Utc::now();
        let load_id = uuid::Uuid::new_v4().to_string();
        let partition = source.id().to_string();

        info!(partition = %partition, %load_id, "loading partition");

        let reader = source.open().map_err(|e| LoadError::Open {
            partition: partition.clone(),
            source: e,
        })?;
        let mut hashing = HashingReader::new(reader);

        store.begin_partition().map_err(|e| LoadError::StoreWrite {
            partition: partition.clone(),
            source: e,
        })?;

        let origin = BatchOrigin {
            load_id: load_id.clone(),
            partition: partition.clone(),
        };

        let outcome = self
            .stream(store, &mut hashing, &origin)
            .and_then(|counts| {
                let checksum = hashing.finalize_hex();
                let elapsed = started.elapsed();
                let store_err = |e| LoadError::StoreWrite {
                    partition: partition.clone(),
                    source: e,
                };

                let previously_loaded_by = store.find_load_by_checksum(&checksum).map_err(store_err)?;
                store
                    .record_load(&LoadLogEntry {
                        load_id: load_id.clone(),
                        partition: partition.clone(),
                        checksum: checksum.clone(),
                        accepted: counts.accepted,
                        rejected: counts.rejected,
                        started_at,
                        elapsed_ms: elapsed.as_millis() as u64,
                    })
                    .map_err(store_err)?;
                store.commit_partition().map_err(store_err)?;

                Ok(LoadReport {
                    load_id: load_id.clone(),
                    partition: partition.clone(),
                    checksum,
                    accepted_count: counts.accepted,
                    rejected_count: counts.rejected,
                    elapsed,
                    rejections: counts.rejections,
                    previously_loaded_by,
                })
            });

        match outcome {
            Ok(report) => {
                if let Some(earlier) = &report.previously_loaded_by {
                    warn!(
                        partition = %partition,
                        earlier_load = %earlier,
                        "identical partition loaded before; rows were appended again"
                    );
                }
                info!(
                    partition = %partition,
                    accepted = report.accepted_count,
                    rejected = report.rejected_count,
                    elapsed_ms = report.elapsed.as_millis() as u64,
                    "partition committed"
                );
                Ok(report)
            }
            Err(err) => {
                if let Err(rollback_err) = store.rollback_partition() {
                    warn!(partition = %partition, error = %rollback_err, "rollback failed");
                }
                warn!(partition = %partition, error = %err, "partition rolled back");
                Err(err)
            }
        }
    }

    fn stream<S: Store + ?Sized, R: Read>(
        &self,
        store: &mut S,
        input: R,
        origin: &BatchOrigin,
    ) -> Result<StreamCounts, LoadError> {
        let partition = origin.partition.as_str();
        let read_err = |line: u64, e: csv::Error| LoadError::PartitionRead {
            partition: partition.to_string(),
            line: e.position().map(|p| p.line()).unwrap_or(line),
            source: e,
        };

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .delimiter(self.options.delimiter)
            .from_reader(input);

        let headers = reader.headers().map_err(|e| read_err(1, e))?.clone();
        let header_map = self
            .normalizer
            .registry()
            .resolve_headers(headers.iter())
            .map_err(|e| LoadError::Schema {
                partition: partition.to_string(),
                source: e,
            })?;

        let batch_size = self.options.batch_size.max(1);
        let mut batch: Vec<SourcedRow> = Vec::with_capacity(batch_size);
        let mut counts = StreamCounts {
            accepted: 0,
            rejected: 0,
            rejections: Vec::new(),
        };
        // Fields are decoded per row, see RawRow::from_record
        let mut record = csv::ByteRecord::new();
        let mut last_line = 1;

        loop {
            let has_record = reader
                .read_byte_record(&mut record)
                .map_err(|e| read_err(last_line + 1, e))?;
            if !has_record {
                break;
            }

            let line = record.position().map(|p| p.line()).unwrap_or(last_line + 1);
            last_line = line;

            let normalized = RawRow::from_record(&header_map, &record)
                .and_then(|raw| self.normalizer.normalize(&raw));
            match normalized {
                Ok(row) => {
                    counts.accepted += 1;
                    batch.push(SourcedRow { line, row });
                }
                Err(error) => {
                    counts.rejected += 1;
                    debug!(partition, line, %error, "row rejected");
                    if counts.rejections.len() < self.options.rejection_sample {
                        counts.rejections.push(Rejection {
                            partition: partition.to_string(),
                            line,
                            error,
                        });
                    }
                }
            }

            if batch.len() >= batch_size {
                self.flush(store, origin, &mut batch)?;
            }
        }

        self.flush(store, origin, &mut batch)?;

        if counts.rejected > 0 {
            warn!(partition, rejected = counts.rejected, "rows rejected by schema coercion");
        }

        Ok(counts)
    }

    fn flush<S: Store + ?Sized>(
        &self,
        store: &mut S,
        origin: &BatchOrigin,
        batch: &mut Vec<SourcedRow>,
    ) -> Result<(), LoadError> {
        if batch.is_empty() {
            return Ok(());
        }

        let written = store
            .append_batch(origin, batch)
            .map_err(|e| LoadError::StoreWrite {
                partition: origin.partition.clone(),
                source: e,
            })?;
        debug!(partition = %origin.partition, rows = written, "appended batch");

        batch.clear();
        Ok(())
    }

    /// Load partitions in sequence; each failure is isolated to its partition
    pub fn load_all<S: Store + ?Sized>(
        &self,
        store: &mut S,
        sources: &[PartitionSource],
        cancel: &CancellationFlag,
    ) -> LoadSummary {
        let mut summary = LoadSummary::default();

        for (index, source) in sources.iter().enumerate() {
            if cancel.is_cancelled() {
                summary.skipped = sources[index..].iter().map(|s| s.id().to_string()).collect();
                warn!(skipped = summary.skipped.len(), "load cancelled");
                break;
            }

            match self.load(store, source) {
                Ok(report) => summary.reports.push(report),
                Err(err) => summary.failures.push(err),
            }
        }

        summary
    }
}

impl Default for BatchLoader {
    fn default() -> Self {
        Self::new(RecordNormalizer::default(), LoaderOptions::default())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::SummaryRecord;
    use crate::error::{CoercionReason, SchemaError, StoreError};
    use crate::store::{GroupRow, GroupingQuery, SqliteStore};

    const HEADER: &str = "Invoice/Item Number,Date,County,Item Number,Item Description,State Bottle Cost,Bottles Sold,Sale (Dollars)\n";

    fn partition(id: &str, rows: &[&str]) -> PartitionSource {
        let mut body = HEADER.to_string();
        for row in rows {
            body.push_str(row);
            body.push('\n');
        }
        PartitionSource::from_bytes(id, body)
    }

    fn loader(batch_size: usize) -> BatchLoader {
        BatchLoader::new(
            RecordNormalizer::default(),
            LoaderOptions {
                batch_size,
                ..LoaderOptions::default()
            },
        )
    }

    #[test]
    fn test_load_counts_accepted_and_rejected() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let source = partition(
            "p1.csv",
            &[
                "INV-1,2020-01-05,fayette,100,Vodka,3.00,2,10.00",
                "INV-2,2020-01-20,FAYETTE,100,Vodka,3.00,1,5.00",
                "INV-3,2020-01-21,POLK,100,Vodka,3.00,1,abc",
            ],
        );

        let report = loader(10).load(&mut store, &source).unwrap();

        assert_eq!(report.accepted_count, 2);
        assert_eq!(report.rejected_count, 1);
        assert_eq!(report.read_count(), 3);
        assert_eq!(store.row_count().unwrap(), 2);

        let rejection = &report.rejections[0];
        assert_eq!(rejection.line, 4);
        assert_eq!(rejection.error.column, "sale_dollars");
        assert_eq!(rejection.error.reason, CoercionReason::NotADecimal);
    }

    #[test]
    fn test_small_batches_load_everything() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let rows: Vec<String> = (0..25)
            .map(|i| format!("INV-{},2020-02-01,POLK,100,Vodka,1.00,1,2.00", i))
            .collect();
        let refs: Vec<&str> = rows.iter().map(String::as_str).collect();

        let report = loader(4).load(&mut store, &partition("p.csv", &refs)).unwrap();

        assert_eq!(report.accepted_count, 25);
        assert_eq!(store.row_count().unwrap(), 25);
    }

    #[test]
    fn test_reload_duplicates_rows_and_is_flagged() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let source = partition("p1.csv", &["INV-1,2020-01-05,POLK,100,Vodka,3.00,2,10.00"]);
        let loader = loader(10);

        let first = loader.load(&mut store, &source).unwrap();
        let second = loader.load(&mut store, &source).unwrap();

        assert_eq!(store.row_count().unwrap(), 2);
        assert_eq!(first.previously_loaded_by, None);
        assert_eq!(second.previously_loaded_by.as_deref(), Some(first.load_id.as_str()));
        assert_eq!(first.checksum, second.checksum);
        assert_eq!(store.load_log().unwrap().len(), 2);
    }

    #[test]
    fn test_corrupt_partition_rolls_back() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let source = partition(
            "bad.csv",
            &[
                "INV-1,2020-01-05,POLK,100,Vodka,3.00,2,10.00",
                "INV-2,2020-01-05,POLK,100",
            ],
        );

        let err = loader(1).load(&mut store, &source).unwrap_err();

        assert!(matches!(err, LoadError::PartitionRead { line: 3, .. }));
        assert_eq!(err.partition(), "bad.csv");
        assert_eq!(store.row_count().unwrap(), 0);
        assert!(store.load_log().unwrap().is_empty());
    }

    #[test]
    fn test_missing_required_header_fails_partition() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let source = PartitionSource::from_bytes("nodate.csv", "Invoice/Item Number,County\nINV-1,POLK\n");

        let err = loader(10).load(&mut store, &source).unwrap_err();

        assert!(matches!(
            err,
            LoadError::Schema { source: SchemaError::MissingColumn("date"), .. }
        ));
    }

    #[test]
    fn test_missing_file_fails_partition() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let source = PartitionSource::file("/nonexistent/partition_2020.csv");

        let err = loader(10).load(&mut store, &source).unwrap_err();

        assert!(matches!(err, LoadError::Open { .. }));
        assert_eq!(err.partition(), "partition_2020.csv");
    }

    #[test]
    fn test_load_all_isolates_failures() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let sources = vec![
            partition("a.csv", &["INV-1,2020-01-05,POLK,100,Vodka,3.00,2,10.00"]),
            PartitionSource::file("/nonexistent/b.csv"),
            partition("c.csv", &["INV-3,2020-01-06,LINN,100,Vodka,3.00,1,5.00"]),
        ];

        let summary = loader(10).load_all(&mut store, &sources, &CancellationFlag::new());

        assert_eq!(summary.reports.len(), 2);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].partition(), "b.csv");
        assert_eq!(summary.accepted_total(), 2);
        assert!(!summary.is_complete());
        assert_eq!(store.row_count().unwrap(), 2);
    }

    #[test]
    fn test_cancellation_between_partitions() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let sources = vec![
            partition("a.csv", &["INV-1,2020-01-05,POLK,100,Vodka,3.00,2,10.00"]),
            partition("b.csv", &["INV-2,2020-01-05,POLK,100,Vodka,3.00,2,10.00"]),
        ];
        let cancel = CancellationFlag::new();
        cancel.cancel();

        let summary = loader(10).load_all(&mut store, &sources, &cancel);

        assert!(summary.reports.is_empty());
        assert_eq!(summary.skipped, vec!["a.csv".to_string(), "b.csv".to_string()]);
        assert_eq!(store.row_count().unwrap(), 0);
    }

    #[test]
    fn test_rejection_sample_is_bounded_but_count_exact() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let rows: Vec<String> = (0..10)
            .map(|i| format!("INV-{},not-a-date,POLK,100,Vodka,1.00,1,2.00", i))
            .collect();
        let refs: Vec<&str> = rows.iter().map(String::as_str).collect();
        let loader = BatchLoader::new(
            RecordNormalizer::default(),
            LoaderOptions {
                rejection_sample: 3,
                ..LoaderOptions::default()
            },
        );

        let report = loader.load(&mut store, &partition("p.csv", &refs)).unwrap();

        assert_eq!(report.rejected_count, 10);
        assert_eq!(report.rejections.len(), 3);
        assert_eq!(report.accepted_count, 0);
    }

    #[test]
    fn test_semicolon_delimiter() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let source = PartitionSource::from_bytes(
            "semi.csv",
            "Invoice/Item Number;Date;County;Sale (Dollars)\nINV-1;2020-01-05;POLK;1,234.50\n",
        );
        let loader = BatchLoader::new(
            RecordNormalizer::default(),
            LoaderOptions {
                delimiter: b';',
                ..LoaderOptions::default()
            },
        );

        let report = loader.load(&mut store, &source).unwrap();
        assert_eq!(report.accepted_count, 1);
    }

    #[test]
    fn test_fractional_liter_volumes_are_accepted() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let source = PartitionSource::from_bytes(
            "half_pints.csv",
            "Invoice/Item Number,Date,County,Bottle Volume (ml),Bottles Sold,Sale (Dollars),Volume Sold (Liters)\n\
             INV-1,2020-01-05,POLK,375,1,4.50,0.375\n\
             INV-2,2020-01-05,POLK,375,3,13.50,1.125\n",
        );

        let report = BatchLoader::default().load(&mut store, &source).unwrap();

        assert_eq!(report.accepted_count, 2);
        assert_eq!(report.rejected_count, 0);
        let micro_liters: i64 = store
            .connection()
            .query_row("SELECT SUM(volume_sold_liters) FROM sales", [], |row| row.get(0))
            .unwrap();
        assert_eq!(micro_liters, 1_500_000);
    }

    #[test]
    fn test_undecodable_text_rejects_only_its_row() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let mut body = b"Invoice/Item Number,Date,Store Name,County,Sale (Dollars)\n".to_vec();
        body.extend_from_slice(b"INV-1,2020-01-05,Hy-Vee,POLK,10.00\n");
        body.extend_from_slice(b"INV-2,2020-01-05,Caf\xe9 Liquor,POLK,5.00\n");
        body.extend_from_slice(b"INV-3,2020-01-06,Hy-Vee,POLK,7.00\n");
        let source = PartitionSource::from_bytes("latin1.csv", body);

        let report = loader(1).load(&mut store, &source).unwrap();

        assert_eq!(report.accepted_count, 2);
        assert_eq!(report.rejected_count, 1);
        assert_eq!(report.rejections[0].line, 3);
        assert_eq!(report.rejections[0].error.column, "store_name");
        assert_eq!(report.rejections[0].error.reason, CoercionReason::InvalidText);
        assert_eq!(store.row_count().unwrap(), 2);
    }

    #[test]
    fn test_options_from_config_require_valid_config() {
        let config = EtlConfig {
            delimiter: ';',
            batch_size: 250,
            ..EtlConfig::default()
        };
        let options = LoaderOptions::try_from(&config).unwrap();
        assert_eq!(options.delimiter, b';');
        assert_eq!(options.batch_size, 250);

        let non_ascii = EtlConfig {
            delimiter: '§',
            ..EtlConfig::default()
        };
        assert!(matches!(
            LoaderOptions::try_from(&non_ascii),
            Err(ConfigError::Invalid(_))
        ));

        let zero_batch = EtlConfig {
            batch_size: 0,
            ..EtlConfig::default()
        };
        assert!(LoaderOptions::try_from(&zero_batch).is_err());
    }

    /// Store whose appends always fail
    struct FailingStore {
        began: bool,
        rolled_back: bool,
    }

    impl Store for FailingStore {
        fn begin_partition(&mut self) -> Result<(), StoreError> {
            self.began = true;
            Ok(())
        }

        fn append_batch(&mut self, _origin: &BatchOrigin, _rows: &[SourcedRow]) -> Result<usize, StoreError> {
            Err(StoreError::Sqlite(rusqlite::Error::InvalidQuery))
        }

        fn commit_partition(&mut self) -> Result<(), StoreError> {
            Ok(())
        }

        fn rollback_partition(&mut self) -> Result<(), StoreError> {
            self.rolled_back = true;
            Ok(())
        }

        fn group_by(&self, _query: &GroupingQuery) -> Result<Vec<GroupRow>, StoreError> {
            Ok(Vec::new())
        }

        fn row_count(&self) -> Result<i64, StoreError> {
            Ok(0)
        }

        fn record_load(&mut self, _entry: &LoadLogEntry) -> Result<(), StoreError> {
            Ok(())
        }

        fn find_load_by_checksum(&self, _checksum: &str) -> Result<Option<String>, StoreError> {
            Ok(None)
        }

        fn replace_summary(&mut self, rows: &[SummaryRecord]) -> Result<usize, StoreError> {
            Ok(rows.len())
        }

        fn read_summary(&self) -> Result<Vec<SummaryRecord>, StoreError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_store_write_error_aborts_partition() {
        let mut store = FailingStore {
            began: false,
            rolled_back: false,
        };
        let source = partition("p.csv", &["INV-1,2020-01-05,POLK,100,Vodka,3.00,2,10.00"]);

        let err = loader(10).load(&mut store, &source).unwrap_err();

        assert!(matches!(err, LoadError::StoreWrite { .. }));
        assert!(store.began);
        assert!(store.rolled_back);
    }
}

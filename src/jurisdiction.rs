// 🏷️ Jurisdiction Classifier
// County totals over a trailing window, left-joined against the taxable list

use crate::aggregation::SummaryRecord;
use crate::error::ReferenceError;
use crate::normalizer::canonicalize_county;
use crate::temporal::Month;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

// ============================================================================
// TAX FLAG
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaxFlag {
    Taxable,
    Exempt,
    /// County missing from the reference list
    Unknown,
}

impl TaxFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaxFlag::Taxable => "taxable",
            TaxFlag::Exempt => "exempt",
            TaxFlag::Unknown => "unknown",
        }
    }

    /// Reference-file spelling of the flag
    pub fn parse_reference(value: &str) -> Option<bool> {
        match value.trim().to_ascii_lowercase().as_str() {
            "yes" | "y" | "true" | "1" | "taxable" => Some(true),
            "no" | "n" | "false" | "0" | "exempt" => Some(false),
            _ => None,
        }
    }
}

impl fmt::Display for TaxFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// JURISDICTION REFERENCE
// ============================================================================

/// County name → taxable, keyed by canonical (uppercase) county name
#[derive(Debug, Clone, Default)]
pub struct JurisdictionReference {
    flags: HashMap<String, bool>,
}

impl JurisdictionReference {
    pub fn new() -> Self {
        JurisdictionReference::default()
    }

    /// Two-column CSV with a header row: county, taxable flag
    pub fn from_path(path: &Path) -> Result<Self, ReferenceError> {
        let reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(path)?;
        let reference = Self::from_csv(reader)?;

        info!(path = %path.display(), counties = reference.len(), "loaded jurisdiction reference");
        Ok(reference)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, ReferenceError> {
        let reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);
        Self::from_csv(reader)
    }

    fn from_csv<R: Read>(mut reader: csv::Reader<R>) -> Result<Self, ReferenceError> {
        let mut reference = JurisdictionReference::new();

        for (index, result) in reader.records().enumerate() {
            let record = result?;
            let line = record.position().map(|p| p.line()).unwrap_or(index as u64 + 2);

            let (county, flag) = match (record.get(0), record.get(1)) {
                (Some(county), Some(flag)) => (county, flag),
                _ => return Err(ReferenceError::MissingColumns { line }),
            };
            let taxable = TaxFlag::parse_reference(flag).ok_or_else(|| ReferenceError::InvalidFlag {
                line,
                value: flag.to_string(),
            })?;

            reference.insert(county, taxable, line)?;
        }

        Ok(reference)
    }

    /// Add one county; at most one flag per canonical name
    pub fn insert(&mut self, county: &str, taxable: bool, line: u64) -> Result<(), ReferenceError> {
        let canonical = canonicalize_county(county).ok_or(ReferenceError::EmptyCounty { line })?;

        if self.flags.contains_key(&canonical) {
            return Err(ReferenceError::DuplicateCounty {
                line,
                county: canonical,
            });
        }
        self.flags.insert(canonical, taxable);
        Ok(())
    }

    /// Flag for a county, matched case-insensitively
    pub fn flag_for(&self, county: &str) -> TaxFlag {
        match canonicalize_county(county).and_then(|c| self.flags.get(&c).copied()) {
            Some(true) => TaxFlag::Taxable,
            Some(false) => TaxFlag::Exempt,
            None => TaxFlag::Unknown,
        }
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}

// ============================================================================
// CLASSIFICATION
// ============================================================================

/// County totals within the window plus their tax flag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountyClassification {
    pub county: String,
    pub total_sale_dollars: Decimal,
    pub transaction_count: i64,
    pub tax_flag: TaxFlag,
}

/// Re-aggregate summary rows with `month >= as_of` by county and tag each
/// county from the reference
///
/// One entry per county present in the window. Output order is not part of
/// the contract.
pub fn classify(
    summary: &[SummaryRecord],
    reference: &JurisdictionReference,
    as_of: Month,
) -> Vec<CountyClassification> {
    let mut by_county: BTreeMap<&str, (Decimal, i64)> = BTreeMap::new();

    for record in summary.iter().filter(|r| r.month >= as_of) {
        let entry = by_county
            .entry(record.county.as_str())
            .or_insert((Decimal::ZERO, 0));
        entry.0 += record.sale_dollars;
        entry.1 += record.transaction_count;
    }

    let classified: Vec<CountyClassification> = by_county
        .into_iter()
        .map(|(county, (total_sale_dollars, transaction_count))| CountyClassification {
            county: county.to_string(),
            total_sale_dollars,
            transaction_count,
            tax_flag: reference.flag_for(county),
        })
        .collect();

    let unknown = classified
        .iter()
        .filter(|c| c.tax_flag == TaxFlag::Unknown)
        .count();
    if unknown > 0 {
        warn!(counties = unknown, "counties missing from jurisdiction reference");
    }
    info!(%as_of, counties = classified.len(), "classified counties");

    classified
}

// ============================================================================
// TESTS
// ============================================================================

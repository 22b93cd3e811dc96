// 📤 Report Export
// Classified counties → CSV / JSON for whoever renders the report

use crate::jurisdiction::{CountyClassification, TaxFlag};
use anyhow::{Context, Result};
use rust_decimal::Decimal;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Csv,
    Json,
}

impl ReportFormat {
    /// `.json` → JSON, anything else → CSV
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ReportFormat::Json,
            _ => ReportFormat::Csv,
        }
    }
}

pub fn write_csv<W: Write>(writer: W, rows: &[CountyClassification]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_json<W: Write>(writer: W, rows: &[CountyClassification]) -> Result<()> {
    serde_json::to_writer_pretty(writer, rows)?;
    Ok(())
}

/// Write `rows` to `path` in the format implied by its extension
pub fn write_report(path: &Path, rows: &[CountyClassification]) -> Result<ReportFormat> {
    let format = ReportFormat::from_path(path);
    let file = File::create(path).with_context(|| format!("Failed to create report: {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    match format {
        ReportFormat::Csv => write_csv(&mut writer, rows)?,
        ReportFormat::Json => write_json(&mut writer, rows)?,
    }
    writer.flush()?;

    Ok(format)
}

// ============================================================================
// TALLY
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FlagTotals {
    pub counties: usize,
    pub sale_dollars: Decimal,
    pub transactions: i64,
}

/// Per-flag totals for the closing printout
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassificationTally {
    pub taxable: FlagTotals,
    pub exempt: FlagTotals,
    pub unknown: FlagTotals,
}

impl ClassificationTally {
    pub fn from_rows(rows: &[CountyClassification]) -> Self {
        let mut tally = ClassificationTally::default();
        for row in rows {
            let totals = match row.tax_flag {
                TaxFlag::Taxable => &mut tally.taxable,
                TaxFlag::Exempt => &mut tally.exempt,
                TaxFlag::Unknown => &mut tally.unknown,
            };
            totals.counties += 1;
            totals.sale_dollars += row.total_sale_dollars;
            totals.transactions += row.transaction_count;
        }
        tally
    }

    pub fn counties(&self) -> usize {
        self.taxable.counties + self.exempt.counties + self.unknown.counties
    }

    pub fn sale_dollars(&self) -> Decimal {
        self.taxable.sale_dollars + self.exempt.sale_dollars + self.unknown.sale_dollars
    }
}

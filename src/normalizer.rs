// 🧹 Record Normalizer
// Untyped CSV row → fully typed NormalizedRow, or an explicit rejection

use crate::error::{CoercionError, CoercionReason};
use crate::schema::{ColumnType, Field, HeaderMap, SchemaRegistry};
use chrono::NaiveDate;
use csv::ByteRecord;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

// ============================================================================
// RAW ROW
// ============================================================================

/// Column → untyped text, as parsed from one input line
#[derive(Debug, Clone, Default)]
pub struct RawRow {
    values: HashMap<Field, String>,
}

impl RawRow {
    pub fn new() -> Self {
        RawRow::default()
    }

    /// Builder: set a field value
    pub fn with(mut self, field: Field, value: impl Into<String>) -> Self {
        self.set(field, value);
        self
    }

    pub fn set(&mut self, field: Field, value: impl Into<String>) {
        self.values.insert(field, value.into());
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.values.get(&field).map(String::as_str)
    }

    /// Pick the mapped columns out of a CSV record
    ///
    /// Unmapped columns are never decoded. A mapped field that is not UTF-8
    /// rejects the row.
    pub fn from_record(headers: &HeaderMap, record: &ByteRecord) -> Result<Self, CoercionError> {
        let mut row = RawRow::new();
        for field in Field::ALL {
            let Some(bytes) = headers.position(field).and_then(|pos| record.get(pos)) else {
                continue;
            };
            let value = std::str::from_utf8(bytes).map_err(|_| CoercionError {
                column: field.name(),
                value: String::from_utf8_lossy(bytes).into_owned(),
                reason: CoercionReason::InvalidText,
            })?;
            row.set(field, value);
        }
        Ok(row)
    }
}

// ============================================================================
// NORMALIZED ROW
// ============================================================================

/// One sales line with every field coerced to its declared type
///
/// Text fields are kept exactly as read; only `county` is canonicalized.
/// Empty optional values are `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRow {
    pub invoice_item_number: String,
    pub date: NaiveDate,
    pub store_number: Option<i64>,
    pub store_name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub zip_code: Option<String>,
    pub store_location: Option<String>,
    pub county_number: Option<String>,
    pub county: Option<String>,
    pub category: Option<String>,
    pub category_name: Option<String>,
    pub vendor_number: Option<String>,
    pub vendor_name: Option<String>,
    pub item_number: Option<String>,
    pub item_description: Option<String>,
    pub pack: Option<i64>,
    pub bottle_volume_ml: Option<i64>,
    pub state_bottle_cost: Option<Decimal>,
    pub state_bottle_retail: Option<Decimal>,
    pub bottles_sold: Option<i64>,
    pub sale_dollars: Option<Decimal>,
    pub volume_sold_liters: Option<Decimal>,
    pub volume_sold_gallons: Option<Decimal>,
}

impl NormalizedRow {
    /// Row with only the required fields set
    pub fn new(invoice_item_number: impl Into<String>, date: NaiveDate) -> Self {
        NormalizedRow {
            invoice_item_number: invoice_item_number.into(),
            date,
            store_number: None,
            store_name: None,
            address: None,
            city: None,
            zip_code: None,
            store_location: None,
            county_number: None,
            county: None,
            category: None,
            category_name: None,
            vendor_number: None,
            vendor_name: None,
            item_number: None,
            item_description: None,
            pack: None,
            bottle_volume_ml: None,
            state_bottle_cost: None,
            state_bottle_retail: None,
            bottles_sold: None,
            sale_dollars: None,
            volume_sold_liters: None,
            volume_sold_gallons: None,
        }
    }
}

// ============================================================================
// FIELD PARSERS
// ============================================================================

/// Trim and uppercase a county name; blank means no county
pub fn canonicalize_county(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_uppercase())
    }
}

/// Integer column value. `750.0` is accepted, `750.5` is not.
pub fn parse_integer(value: &str) -> Result<i64, CoercionReason> {
    let trimmed = value.trim();
    if let Ok(v) = trimmed.parse::<i64>() {
        return Ok(v);
    }

    match Decimal::from_str(trimmed) {
        Ok(d) if d.fract().is_zero() => d.to_i64().ok_or(CoercionReason::OutOfRange),
        _ => Err(CoercionReason::NotAnInteger),
    }
}

/// Decimal column value with at most `scale` fractional digits
///
/// Accepts a leading `$` (also after a minus sign) and `,` thousands
/// separators. The result always carries exactly `scale` digits and its
/// minor-unit mantissa fits in an i64.
pub fn parse_decimal(value: &str, scale: u32) -> Result<Decimal, CoercionReason> {
    let trimmed = value.trim();
    let unsigned = if let Some(rest) = trimmed.strip_prefix("-$") {
        format!("-{}", rest)
    } else {
        trimmed.strip_prefix('$').unwrap_or(trimmed).to_string()
    };
    let cleaned = unsigned.replace(',', "");

    let mut decimal = Decimal::from_str(&cleaned).map_err(|_| CoercionReason::NotADecimal)?;

    if decimal.normalize().scale() > scale {
        return Err(CoercionReason::ExcessPrecision { scale });
    }
    decimal.rescale(scale);

    if i64::try_from(decimal.mantissa()).is_err() {
        return Err(CoercionReason::OutOfRange);
    }

    Ok(decimal)
}

/// Date-only value: `YYYY-MM-DD`, `MM/DD/YYYY`, or an ISO timestamp whose
/// time part is discarded
pub fn parse_date(value: &str) -> Result<NaiveDate, CoercionReason> {
    let trimmed = value.trim();

    for format in ["%Y-%m-%d", "%m/%d/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Ok(date);
        }
    }

    // 2020-01-05T00:00:00 / 2020-01-05 00:00:00
    let bytes = trimmed.as_bytes();
    if bytes.len() > 10 && matches!(bytes[10], b'T' | b' ') {
        if let Ok(date) = NaiveDate::parse_from_str(&trimmed[..10], "%Y-%m-%d") {
            return Ok(date);
        }
    }

    Err(CoercionReason::NotADate)
}

// ============================================================================
// RECORD NORMALIZER
// ============================================================================

pub struct RecordNormalizer {
    registry: SchemaRegistry,
}

impl RecordNormalizer {
    pub fn new(registry: SchemaRegistry) -> Self {
        RecordNormalizer { registry }
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Coerce every field; the first failing field rejects the row
    pub fn normalize(&self, raw: &RawRow) -> Result<NormalizedRow, CoercionError> {
        let r = FieldReader {
            registry: &self.registry,
            raw,
        };

        Ok(NormalizedRow {
            invoice_item_number: r.required(Field::InvoiceItemNumber, r.text(Field::InvoiceItemNumber)?)?,
            date: r.required(Field::Date, r.date(Field::Date)?)?,
            store_number: r.integer(Field::StoreNumber)?,
            store_name: r.text(Field::StoreName)?,
            address: r.text(Field::Address)?,
            city: r.text(Field::City)?,
            zip_code: r.text(Field::ZipCode)?,
            store_location: r.text(Field::StoreLocation)?,
            county_number: r.text(Field::CountyNumber)?,
            county: r.present(Field::County)?.and_then(canonicalize_county),
            category: r.text(Field::Category)?,
            category_name: r.text(Field::CategoryName)?,
            vendor_number: r.text(Field::VendorNumber)?,
            vendor_name: r.text(Field::VendorName)?,
            item_number: r.text(Field::ItemNumber)?,
            item_description: r.text(Field::ItemDescription)?,
            pack: r.integer(Field::Pack)?,
            bottle_volume_ml: r.integer(Field::BottleVolumeMl)?,
            state_bottle_cost: r.decimal(Field::StateBottleCost)?,
            state_bottle_retail: r.decimal(Field::StateBottleRetail)?,
            bottles_sold: r.integer(Field::BottlesSold)?,
            sale_dollars: r.decimal(Field::SaleDollars)?,
            volume_sold_liters: r.decimal(Field::VolumeSoldLiters)?,
            volume_sold_gallons: r.decimal(Field::VolumeSoldGallons)?,
        })
    }
}

impl Default for RecordNormalizer {
    fn default() -> Self {
        Self::new(SchemaRegistry::new())
    }
}

struct FieldReader<'a> {
    registry: &'a SchemaRegistry,
    raw: &'a RawRow,
}

impl<'a> FieldReader<'a> {
    fn fail(&self, field: Field, reason: CoercionReason) -> CoercionError {
        CoercionError {
            column: field.name(),
            value: self.raw.get(field).unwrap_or("").to_string(),
            reason,
        }
    }

    /// Non-blank raw value; blank in a required column is a rejection
    fn present(&self, field: Field) -> Result<Option<&'a str>, CoercionError> {
        match self.raw.get(field) {
            Some(value) if !value.trim().is_empty() => Ok(Some(value)),
            _ if self.registry.column(field).required => {
                Err(self.fail(field, CoercionReason::MissingRequired))
            }
            _ => Ok(None),
        }
    }

    fn required<T>(&self, field: Field, value: Option<T>) -> Result<T, CoercionError> {
        value.ok_or_else(|| self.fail(field, CoercionReason::MissingRequired))
    }

    fn text(&self, field: Field) -> Result<Option<String>, CoercionError> {
        Ok(self.present(field)?.map(str::to_string))
    }

    fn integer(&self, field: Field) -> Result<Option<i64>, CoercionError> {
        self.present(field)?
            .map(|v| parse_integer(v).map_err(|reason| self.fail(field, reason)))
            .transpose()
    }

    fn decimal(&self, field: Field) -> Result<Option<Decimal>, CoercionError> {
        let scale = match self.registry.column(field).type_ {
            ColumnType::Decimal { scale } => scale,
            _ => 0,
        };
        self.present(field)?
            .map(|v| parse_decimal(v, scale).map_err(|reason| self.fail(field, reason)))
            .transpose()
    }

    fn date(&self, field: Field) -> Result<Option<NaiveDate>, CoercionError> {
        self.present(field)?
            .map(|v| parse_date(v).map_err(|reason| self.fail(field, reason)))
            .transpose()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn full_row() -> RawRow {
        RawRow::new()
            .with(Field::InvoiceItemNumber, "INV-16035500001")
            .with(Field::Date, "01/05/2020")
            .with(Field::StoreNumber, "2633")
            .with(Field::StoreName, "Hy-Vee #3 / BDI / Des Moines")
            .with(Field::Address, "3221 SE 14th St")
            .with(Field::City, "Des Moines")
            .with(Field::ZipCode, "50320")
            .with(Field::StoreLocation, "POINT (-93.596754 41.554101)")
            .with(Field::CountyNumber, "77")
            .with(Field::County, " polk ")
            .with(Field::Category, "1031100")
            .with(Field::CategoryName, "American Vodkas")
            .with(Field::VendorNumber, "260")
            .with(Field::VendorName, "Diageo Americas")
            .with(Field::ItemNumber, "100")
            .with(Field::ItemDescription, "Smirnoff 80prf")
            .with(Field::Pack, "12")
            .with(Field::BottleVolumeMl, "750")
            .with(Field::StateBottleCost, "$6.00")
            .with(Field::StateBottleRetail, "9.00")
            .with(Field::BottlesSold, "2")
            .with(Field::SaleDollars, "18.00")
            .with(Field::VolumeSoldLiters, "1.50")
            .with(Field::VolumeSoldGallons, "0.39")
    }

    #[test]
    fn test_normalize_full_row() {
        let normalizer = RecordNormalizer::default();
        let row = normalizer.normalize(&full_row()).unwrap();

        assert_eq!(row.date, NaiveDate::from_ymd_opt(2020, 1, 5).unwrap());
        assert_eq!(row.county.as_deref(), Some("POLK"));
        assert_eq!(row.store_number, Some(2633));
        assert_eq!(row.state_bottle_cost, Some(Decimal::new(600, 2)));
        assert_eq!(row.sale_dollars, Some(Decimal::new(1800, 2)));
        assert_eq!(row.volume_sold_gallons, Some(Decimal::new(39, 2)));
    }

    #[test]
    fn test_normalize_preserves_untouched_text_fields() {
        let normalizer = RecordNormalizer::default();
        let raw = full_row();
        let row = normalizer.normalize(&raw).unwrap();

        let pairs = [
            (Field::InvoiceItemNumber, Some(row.invoice_item_number.as_str())),
            (Field::StoreName, row.store_name.as_deref()),
            (Field::Address, row.address.as_deref()),
            (Field::City, row.city.as_deref()),
            (Field::ZipCode, row.zip_code.as_deref()),
            (Field::StoreLocation, row.store_location.as_deref()),
            (Field::CountyNumber, row.county_number.as_deref()),
            (Field::Category, row.category.as_deref()),
            (Field::CategoryName, row.category_name.as_deref()),
            (Field::VendorNumber, row.vendor_number.as_deref()),
            (Field::VendorName, row.vendor_name.as_deref()),
            (Field::ItemNumber, row.item_number.as_deref()),
            (Field::ItemDescription, row.item_description.as_deref()),
        ];

        for (field, normalized) in pairs {
            assert_eq!(normalized, raw.get(field), "field {} changed", field.name());
        }
    }

    #[test]
    fn test_county_case_variants_collapse() {
        let normalizer = RecordNormalizer::default();

        let lower = normalizer.normalize(&full_row().with(Field::County, "fayette")).unwrap();
        let upper = normalizer.normalize(&full_row().with(Field::County, "FAYETTE")).unwrap();
        let mixed = normalizer.normalize(&full_row().with(Field::County, "Fayette")).unwrap();

        assert_eq!(lower.county, upper.county);
        assert_eq!(mixed.county.as_deref(), Some("FAYETTE"));
    }

    #[test]
    fn test_null_county_is_preserved() {
        let normalizer = RecordNormalizer::default();

        let blank = normalizer.normalize(&full_row().with(Field::County, "  ")).unwrap();
        assert_eq!(blank.county, None);

        let mut raw = RawRow::new()
            .with(Field::InvoiceItemNumber, "INV-1")
            .with(Field::Date, "2020-01-05");
        let absent = normalizer.normalize(&raw).unwrap();
        assert_eq!(absent.county, None);

        raw.set(Field::County, "");
        assert_eq!(normalizer.normalize(&raw).unwrap().county, None);
    }

    #[test]
    fn test_non_numeric_decimal_rejects_row() {
        let normalizer = RecordNormalizer::default();
        let raw = full_row().with(Field::SaleDollars, "twelve");

        let err = normalizer.normalize(&raw).unwrap_err();

        assert_eq!(err.column, "sale_dollars");
        assert_eq!(err.value, "twelve");
        assert_eq!(err.reason, CoercionReason::NotADecimal);
    }

    #[test]
    fn test_non_numeric_integer_rejects_row() {
        let normalizer = RecordNormalizer::default();
        let raw = full_row().with(Field::BottlesSold, "two");

        let err = normalizer.normalize(&raw).unwrap_err();
        assert_eq!(err.column, "bottles_sold");
        assert_eq!(err.reason, CoercionReason::NotAnInteger);
    }

    #[test]
    fn test_bad_date_rejects_row() {
        let normalizer = RecordNormalizer::default();
        let raw = full_row().with(Field::Date, "2020-02-30");

        let err = normalizer.normalize(&raw).unwrap_err();
        assert_eq!(err.column, "date");
        assert_eq!(err.reason, CoercionReason::NotADate);
    }

    #[test]
    fn test_missing_required_rejects_row() {
        let normalizer = RecordNormalizer::default();

        let no_date = full_row().with(Field::Date, "");
        let err = normalizer.normalize(&no_date).unwrap_err();
        assert_eq!(err.reason, CoercionReason::MissingRequired);
        assert_eq!(err.column, "date");

        let no_invoice = RawRow::new().with(Field::Date, "2020-01-05");
        let err = normalizer.normalize(&no_invoice).unwrap_err();
        assert_eq!(err.column, "invoice_item_number");
    }

    #[test]
    fn test_blank_optional_numbers_become_null() {
        let normalizer = RecordNormalizer::default();
        let raw = full_row()
            .with(Field::SaleDollars, "")
            .with(Field::Pack, " ");

        let row = normalizer.normalize(&raw).unwrap();
        assert_eq!(row.sale_dollars, None);
        assert_eq!(row.pack, None);
    }

    #[test]
    fn test_parse_decimal_variants() {
        assert_eq!(parse_decimal("10", 2), Ok(Decimal::new(1000, 2)));
        assert_eq!(parse_decimal("$1,234.50", 2), Ok(Decimal::new(123450, 2)));
        assert_eq!(parse_decimal("-$5.25", 2), Ok(Decimal::new(-525, 2)));
        assert_eq!(parse_decimal("-3.10", 2), Ok(Decimal::new(-310, 2)));
        assert_eq!(parse_decimal("4.500", 2), Ok(Decimal::new(450, 2)));
        assert_eq!(
            parse_decimal("4.505", 2),
            Err(CoercionReason::ExcessPrecision { scale: 2 })
        );
        assert_eq!(parse_decimal("1.2.3", 2), Err(CoercionReason::NotADecimal));
        assert_eq!(parse_decimal("N/A", 2), Err(CoercionReason::NotADecimal));
    }

    #[test]
    fn test_parse_decimal_keeps_declared_scale() {
        let value = parse_decimal("7", 2).unwrap();

        assert_eq!(value.scale(), 2);
        assert_eq!(value.to_string(), "7.00");
    }

    #[test]
    fn test_parse_integer_variants() {
        assert_eq!(parse_integer(" 750 "), Ok(750));
        assert_eq!(parse_integer("-3"), Ok(-3));
        assert_eq!(parse_integer("750.0"), Ok(750));
        assert_eq!(parse_integer("750.5"), Err(CoercionReason::NotAnInteger));
        assert_eq!(parse_integer("abc"), Err(CoercionReason::NotAnInteger));
        assert_eq!(
            parse_integer("99999999999999999999"),
            Err(CoercionReason::OutOfRange)
        );
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2020, 1, 5).unwrap();

        assert_eq!(parse_date("2020-01-05"), Ok(expected));
        assert_eq!(parse_date("01/05/2020"), Ok(expected));
        assert_eq!(parse_date("2020-01-05T00:00:00.000"), Ok(expected));
        assert_eq!(parse_date("2020-01-05 13:45:00"), Ok(expected));
        assert_eq!(parse_date("Jan 5 2020"), Err(CoercionReason::NotADate));
    }

    #[test]
    fn test_zero_and_negative_values_accepted() {
        let normalizer = RecordNormalizer::default();
        let raw = full_row()
            .with(Field::BottlesSold, "-2")
            .with(Field::SaleDollars, "-18.00")
            .with(Field::Pack, "0");

        let row = normalizer.normalize(&raw).unwrap();
        assert_eq!(row.bottles_sold, Some(-2));
        assert_eq!(row.sale_dollars, Some(Decimal::new(-1800, 2)));
        assert_eq!(row.pack, Some(0));
    }

    #[test]
    fn test_from_record_uses_header_positions() {
        let registry = SchemaRegistry::new();
        let headers = registry
            .resolve_headers(["Date", "County", "Invoice/Item Number"])
            .unwrap();
        let record = ByteRecord::from(vec!["2020-01-20", "FAYETTE", "INV-2"]);

        let raw = RawRow::from_record(&headers, &record).unwrap();

        assert_eq!(raw.get(Field::Date), Some("2020-01-20"));
        assert_eq!(raw.get(Field::County), Some("FAYETTE"));
        assert_eq!(raw.get(Field::InvoiceItemNumber), Some("INV-2"));
        assert_eq!(raw.get(Field::SaleDollars), None);
    }

    #[test]
    fn test_from_record_rejects_invalid_utf8() {
        let registry = SchemaRegistry::new();
        let headers = registry
            .resolve_headers(["Invoice/Item Number", "Date", "Store Name"])
            .unwrap();
        let mut record = ByteRecord::new();
        record.push_field(b"INV-3");
        record.push_field(b"2020-01-20");
        record.push_field(b"Caf\xe9 Liquor");

        let err = RawRow::from_record(&headers, &record).unwrap_err();

        assert_eq!(err.column, "store_name");
        assert_eq!(err.reason, CoercionReason::InvalidText);
        assert_eq!(err.value, "Caf\u{FFFD} Liquor");
    }

    #[test]
    fn test_from_record_ignores_invalid_bytes_in_unmapped_columns() {
        let registry = SchemaRegistry::new();
        let headers = registry
            .resolve_headers(["Invoice/Item Number", "Date", "Notes"])
            .unwrap();
        let mut record = ByteRecord::new();
        record.push_field(b"INV-4");
        record.push_field(b"2020-01-21");
        record.push_field(b"\xff\xfe");

        let raw = RawRow::from_record(&headers, &record).unwrap();

        assert_eq!(raw.get(Field::InvoiceItemNumber), Some("INV-4"));
    }

    #[test]
    fn test_volume_columns_keep_milliliter_precision() {
        let normalizer = RecordNormalizer::default();
        let raw = RawRow::new()
            .with(Field::InvoiceItemNumber, "INV-5")
            .with(Field::Date, "2020-01-22")
            .with(Field::BottleVolumeMl, "375")
            .with(Field::VolumeSoldLiters, "1.125")
            .with(Field::VolumeSoldGallons, "0.297185");

        let row = normalizer.normalize(&raw).unwrap();

        assert_eq!(row.volume_sold_liters, Some(Decimal::new(1125, 3)));
        assert_eq!(row.volume_sold_gallons, Some(Decimal::new(297185, 6)));
        assert_eq!(
            parse_decimal("0.375", crate::schema::VOLUME_SCALE),
            Ok(Decimal::new(375, 3))
        );
    }
}

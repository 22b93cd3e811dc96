// 🏛️ Schema Registry
// Single source of truth for every input column: type, requiredness, headers

use crate::error::SchemaError;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Fractional digits carried by currency columns (cents)
pub const CURRENCY_SCALE: u32 = 2;

/// Fractional digits carried by volume columns (liters, gallons), e.g. 0.375 L
pub const VOLUME_SCALE: u32 = 6;

// ============================================================================
// FIELDS
// ============================================================================

/// Every column of a sales record, in storage order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    InvoiceItemNumber,
    Date,
    StoreNumber,
    StoreName,
    Address,
    City,
    ZipCode,
    StoreLocation,
    CountyNumber,
    County,
    Category,
    CategoryName,
    VendorNumber,
    VendorName,
    ItemNumber,
    ItemDescription,
    Pack,
    BottleVolumeMl,
    StateBottleCost,
    StateBottleRetail,
    BottlesSold,
    SaleDollars,
    VolumeSoldLiters,
    VolumeSoldGallons,
}

impl Field {
    pub const COUNT: usize = 24;

    pub const ALL: [Field; Field::COUNT] = [
        Field::InvoiceItemNumber,
        Field::Date,
        Field::StoreNumber,
        Field::StoreName,
        Field::Address,
        Field::City,
        Field::ZipCode,
        Field::StoreLocation,
        Field::CountyNumber,
        Field::County,
        Field::Category,
        Field::CategoryName,
        Field::VendorNumber,
        Field::VendorName,
        Field::ItemNumber,
        Field::ItemDescription,
        Field::Pack,
        Field::BottleVolumeMl,
        Field::StateBottleCost,
        Field::StateBottleRetail,
        Field::BottlesSold,
        Field::SaleDollars,
        Field::VolumeSoldLiters,
        Field::VolumeSoldGallons,
    ];

    /// snake_case name, also used as the SQL column name
    pub fn name(&self) -> &'static str {
        match self {
            Field::InvoiceItemNumber => "invoice_item_number",
            Field::Date => "date",
            Field::StoreNumber => "store_number",
            Field::StoreName => "store_name",
            Field::Address => "address",
            Field::City => "city",
            Field::ZipCode => "zip_code",
            Field::StoreLocation => "store_location",
            Field::CountyNumber => "county_number",
            Field::County => "county",
            Field::Category => "category",
            Field::CategoryName => "category_name",
            Field::VendorNumber => "vendor_number",
            Field::VendorName => "vendor_name",
            Field::ItemNumber => "item_number",
            Field::ItemDescription => "item_description",
            Field::Pack => "pack",
            Field::BottleVolumeMl => "bottle_volume_ml",
            Field::StateBottleCost => "state_bottle_cost",
            Field::StateBottleRetail => "state_bottle_retail",
            Field::BottlesSold => "bottles_sold",
            Field::SaleDollars => "sale_dollars",
            Field::VolumeSoldLiters => "volume_sold_liters",
            Field::VolumeSoldGallons => "volume_sold_gallons",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

// ============================================================================
// COLUMN TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Text,
    Integer,
    /// Exact decimal with at most `scale` fractional digits
    Decimal { scale: u32 },
    /// Calendar date, no time of day, no timezone
    Date,
}

// ============================================================================
// COLUMN DEFINITION
// ============================================================================

#[derive(Debug, Clone)]
pub struct ColumnDefinition {
    pub field: Field,

    /// Header as published in the source export (e.g. "Sale (Dollars)")
    pub header: &'static str,

    /// Other accepted headers (API exports use short snake_case names)
    pub aliases: Vec<&'static str>,

    pub type_: ColumnType,

    /// Empty value rejects the row when true, becomes null otherwise
    pub required: bool,

    pub description: &'static str,
}

impl ColumnDefinition {
    pub fn new(field: Field, header: &'static str, type_: ColumnType) -> Self {
        ColumnDefinition {
            field,
            header,
            aliases: Vec::new(),
            type_,
            required: false,
            description: "",
        }
    }

    /// Builder: mark column as required
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Builder: add accepted header alias
    pub fn with_alias(mut self, alias: &'static str) -> Self {
        self.aliases.push(alias);
        self
    }

    /// Builder: add description
    pub fn with_description(mut self, desc: &'static str) -> Self {
        self.description = desc;
        self
    }

    /// Whether a header cell names this column (trimmed, ASCII case-insensitive)
    pub fn matches_header(&self, header: &str) -> bool {
        let header = header.trim();
        header.eq_ignore_ascii_case(self.header)
            || header.eq_ignore_ascii_case(self.field.name())
            || self.aliases.iter().any(|a| header.eq_ignore_ascii_case(a))
    }
}

// ============================================================================
// HEADER MAP
// ============================================================================

/// Field → position of its column in one partition's header row
#[derive(Debug, Clone)]
pub struct HeaderMap {
    positions: [Option<usize>; Field::COUNT],
}

impl HeaderMap {
    pub fn position(&self, field: Field) -> Option<usize> {
        self.positions[field.index()]
    }

    pub fn contains(&self, field: Field) -> bool {
        self.position(field).is_some()
    }
}

// ============================================================================
// SCHEMA REGISTRY
// ============================================================================

pub struct SchemaRegistry {
    columns: Vec<ColumnDefinition>,
    partition_key: Field,
}

impl SchemaRegistry {
    /// Registry with every sales column
    pub fn new() -> Self {
        let mut registry = SchemaRegistry {
            columns: Vec::with_capacity(Field::COUNT),
            partition_key: Field::Date,
        };

        registry.register_sales_columns();
        registry
    }

    fn register_sales_columns(&mut self) {
        use ColumnType::*;

        // ====================================================================
        // IDENTITY & TIME
        // ====================================================================

        self.register(
            ColumnDefinition::new(Field::InvoiceItemNumber, "Invoice/Item Number", Text)
                .required()
                .with_alias("invoice_and_item_number")
                .with_description("Invoice line identifier, not enforced unique"),
        );

        self.register(
            ColumnDefinition::new(Field::Date, "Date", Date)
                .required()
                .with_description("Date of the order, MM/DD/YYYY or YYYY-MM-DD"),
        );

        // ====================================================================
        // STORE
        // ====================================================================

        self.register(
            ColumnDefinition::new(Field::StoreNumber, "Store Number", Integer).with_alias("store"),
        );
        self.register(ColumnDefinition::new(Field::StoreName, "Store Name", Text).with_alias("name"));
        self.register(ColumnDefinition::new(Field::Address, "Address", Text));
        self.register(ColumnDefinition::new(Field::City, "City", Text));
        self.register(ColumnDefinition::new(Field::ZipCode, "Zip Code", Text).with_alias("zipcode"));
        self.register(
            ColumnDefinition::new(Field::StoreLocation, "Store Location", Text)
                .with_description("Free-form point notation, e.g. POINT (-91.5 41.6)"),
        );

        // ====================================================================
        // JURISDICTION
        // ====================================================================

        self.register(ColumnDefinition::new(Field::CountyNumber, "County Number", Text));
        self.register(
            ColumnDefinition::new(Field::County, "County", Text)
                .with_description("County name, canonicalized to uppercase"),
        );

        // ====================================================================
        // PRODUCT
        // ====================================================================

        self.register(ColumnDefinition::new(Field::Category, "Category", Text));
        self.register(ColumnDefinition::new(Field::CategoryName, "Category Name", Text));
        self.register(
            ColumnDefinition::new(Field::VendorNumber, "Vendor Number", Text).with_alias("vendor_no"),
        );
        self.register(ColumnDefinition::new(Field::VendorName, "Vendor Name", Text));
        self.register(
            ColumnDefinition::new(Field::ItemNumber, "Item Number", Text).with_alias("itemno"),
        );
        self.register(
            ColumnDefinition::new(Field::ItemDescription, "Item Description", Text)
                .with_alias("im_desc"),
        );
        self.register(ColumnDefinition::new(Field::Pack, "Pack", Integer));
        self.register(ColumnDefinition::new(Field::BottleVolumeMl, "Bottle Volume (ml)", Integer));

        // ====================================================================
        // MONETARY & QUANTITY
        // ====================================================================

        let currency = Decimal { scale: CURRENCY_SCALE };
        let volume = Decimal { scale: VOLUME_SCALE };

        self.register(
            ColumnDefinition::new(Field::StateBottleCost, "State Bottle Cost", currency)
                .with_description("Unit cost paid by the store"),
        );
        self.register(ColumnDefinition::new(
            Field::StateBottleRetail,
            "State Bottle Retail",
            currency,
        ));
        self.register(
            ColumnDefinition::new(Field::BottlesSold, "Bottles Sold", Integer)
                .with_alias("sale_bottles"),
        );
        self.register(ColumnDefinition::new(Field::SaleDollars, "Sale (Dollars)", currency));
        self.register(
            ColumnDefinition::new(Field::VolumeSoldLiters, "Volume Sold (Liters)", volume)
                .with_alias("sale_liters"),
        );
        self.register(
            ColumnDefinition::new(Field::VolumeSoldGallons, "Volume Sold (Gallons)", volume)
                .with_alias("sale_gallons"),
        );
    }

    fn register(&mut self, column: ColumnDefinition) {
        debug_assert_eq!(column.field.index(), self.columns.len());
        self.columns.push(column);
    }

    pub fn column(&self, field: Field) -> &ColumnDefinition {
        &self.columns[field.index()]
    }

    pub fn columns(&self) -> &[ColumnDefinition] {
        &self.columns
    }

    /// Column used for time-based filtering
    pub fn partition_key(&self) -> Field {
        self.partition_key
    }

    pub fn required_fields(&self) -> impl Iterator<Item = Field> + '_ {
        self.columns.iter().filter(|c| c.required).map(|c| c.field)
    }

    /// Map a partition's header row onto fields
    ///
    /// Unknown headers are ignored. A missing required column, or two headers
    /// naming the same field, fail the whole partition.
    pub fn resolve_headers<'h, I>(&self, headers: I) -> Result<HeaderMap, SchemaError>
    where
        I: IntoIterator<Item = &'h str>,
    {
        let mut positions = [None; Field::COUNT];
        let mut matched: [Option<&'h str>; Field::COUNT] = [None; Field::COUNT];

        for (pos, raw_header) in headers.into_iter().enumerate() {
            // Exports sometimes start with a UTF-8 BOM
            let header = raw_header.trim_start_matches('\u{feff}');

            match self.columns.iter().find(|c| c.matches_header(header)) {
                Some(column) => {
                    let idx = column.field.index();
                    if let Some(first) = matched[idx] {
                        return Err(SchemaError::DuplicateColumn {
                            field: column.field.name(),
                            first: first.to_string(),
                            second: header.to_string(),
                        });
                    }
                    matched[idx] = Some(header);
                    positions[idx] = Some(pos);
                }
                None => debug!(header, "ignoring unknown column"),
            }
        }

        if let Some(missing) = self.required_fields().find(|f| positions[f.index()].is_none()) {
            return Err(SchemaError::MissingColumn(missing.name()));
        }

        Ok(HeaderMap { positions })
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================

//! Flatten a receipt document into one CSV row per line item.
//!
//! Every column is described once in [`COLUMNS`]: its header name, the scope
//! it is read from (the root for shared receipt fields, the `<item>` for
//! line-item fields), and its path within that scope. A missing node reads
//! as an empty string, so the flattener never fails on a missing optional
//! field. [`crate::document`] reads its typed fields through the same table.
//!
//! Unlike the validator there is no degraded mode here: a string that does
//! not parse, or a document missing one of [`REQUIRED_SECTIONS`], is a
//! [`HarinaError::Schema`].

use crate::config::CsvQuoting;
use crate::error::HarinaError;
use crate::pipeline::extract::ROOT_TAG;
use crate::pipeline::markup::Element;
use crate::pipeline::validate::parse_with_repair;
use csv::{QuoteStyle, Terminator, WriterBuilder};
use serde::ser::{Serialize, SerializeMap, Serializer};
use tracing::debug;

/// Number of columns in every row.
pub const COLUMN_COUNT: usize = 18;

/// Root-level sections every document must carry (possibly empty).
pub const REQUIRED_SECTIONS: [&str; 3] = ["store_info", "transaction_info", "totals"];

/// Root-level section whose absence reads as empty columns.
pub const OPTIONAL_SECTION: &str = "payment_info";

/// Path from the root to the repeated line-item element.
pub const ITEMS_PATH: &str = "items";
pub const ITEM_TAG: &str = "item";

/// Where a column's value is looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Relative to the document root.
    Receipt,
    /// Relative to one `<item>` element.
    Item,
}

/// One CSV column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub header: &'static str,
    pub scope: Scope,
    pub path: &'static str,
}

impl Column {
    /// Text of this column's node, `None` when absent. `item` is ignored for
    /// receipt-scoped columns.
    pub fn read(&self, root: &Element, item: Option<&Element>) -> Option<String> {
        let scope = match self.scope {
            Scope::Receipt => Some(root),
            Scope::Item => item,
        };
        scope.and_then(|el| el.find(self.path)).map(Element::text)
    }
}

const fn col(header: &'static str, scope: Scope, path: &'static str) -> Column {
    Column {
        header,
        scope,
        path,
    }
}

/// The fixed column table, in output order.
pub const COLUMNS: [Column; COLUMN_COUNT] = [
    col("store_name", Scope::Receipt, "store_info/name"),
    col("store_address", Scope::Receipt, "store_info/address"),
    col("store_phone", Scope::Receipt, "store_info/phone"),
    col("transaction_date", Scope::Receipt, "transaction_info/date"),
    col("transaction_time", Scope::Receipt, "transaction_info/time"),
    col("receipt_number", Scope::Receipt, "transaction_info/receipt_number"),
    col("item_name", Scope::Item, "name"),
    col("item_category", Scope::Item, "category"),
    col("item_subcategory", Scope::Item, "subcategory"),
    col("item_quantity", Scope::Item, "quantity"),
    col("item_unit_price", Scope::Item, "unit_price"),
    col("item_total_price", Scope::Item, "total_price"),
    col("subtotal", Scope::Receipt, "totals/subtotal"),
    col("tax", Scope::Receipt, "totals/tax"),
    col("total", Scope::Receipt, "totals/total"),
    col("payment_method", Scope::Receipt, "payment_info/method"),
    col("amount_paid", Scope::Receipt, "payment_info/amount_paid"),
    col("change", Scope::Receipt, "payment_info/change"),
];

/// Column with header `header`.
pub fn column(header: &str) -> Option<&'static Column> {
    COLUMNS.iter().find(|c| c.header == header)
}

/// Header names in output order.
pub fn headers() -> [&'static str; COLUMN_COUNT] {
    COLUMNS.map(|c| c.header)
}

/// The header line, joined with commas.
pub fn csv_header() -> String {
    headers().join(",")
}

/// One data row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatRow {
    values: [String; COLUMN_COUNT],
}

impl FlatRow {
    /// Values in [`COLUMNS`] order.
    pub fn values(&self) -> &[String; COLUMN_COUNT] {
        &self.values
    }

    /// Value of the column with header `header`.
    pub fn get(&self, header: &str) -> Option<&str> {
        COLUMNS
            .iter()
            .position(|c| c.header == header)
            .map(|i| self.values[i].as_str())
    }
}

impl Serialize for FlatRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(COLUMN_COUNT))?;
        for (column, value) in COLUMNS.iter().zip(self.values.iter()) {
            map.serialize_entry(column.header, value)?;
        }
        map.end()
    }
}

// ── Flattening ───────────────────────────────────────────────────────────────

/// Flatten a parsed document.
///
/// Yields one row per `<items>/<item>` in source order, or a single row with
/// empty item columns when there are none.
pub fn flatten_tree(root: &Element) -> Result<Vec<FlatRow>, HarinaError> {
    if root.name != ROOT_TAG {
        return Err(HarinaError::schema(format!(
            "root element is <{}>, expected <{ROOT_TAG}>",
            root.name
        )));
    }
    let missing: Vec<String> = REQUIRED_SECTIONS
        .iter()
        .filter(|s| root.child(s).is_none())
        .map(|s| format!("<{s}>"))
        .collect();
    if !missing.is_empty() {
        return Err(HarinaError::schema(format!(
            "document is missing {}",
            missing.join(", ")
        )));
    }
    if root.child(OPTIONAL_SECTION).is_none() {
        debug!("No <{OPTIONAL_SECTION}>, payment columns left empty");
    }

    let items: Vec<&Element> = root
        .find(ITEMS_PATH)
        .map(|list| list.children_named(ITEM_TAG).collect())
        .unwrap_or_default();
    debug!("Flattening document with {} items", items.len());

    let row_for = |item: Option<&Element>| FlatRow {
        values: COLUMNS.map(|c| c.read(root, item).unwrap_or_default()),
    };

    if items.is_empty() {
        Ok(vec![row_for(None)])
    } else {
        Ok(items.into_iter().map(|item| row_for(Some(item))).collect())
    }
}

/// Parse `document` (retrying once on its sanitised form) and flatten it.
pub fn flatten_str(document: &str) -> Result<Vec<FlatRow>, HarinaError> {
    let (root, _) = parse_with_repair(document).map_err(|failures| {
        HarinaError::schema(format!(
            "document does not parse: {}",
            failures
                .last()
                .map(|f| f.message.as_str())
                .unwrap_or("unknown error")
        ))
    })?;
    flatten_tree(&root)
}

// ── CSV ──────────────────────────────────────────────────────────────────────

/// Header line plus one line per row, LF-separated, no trailing newline.
///
/// [`CsvQuoting::None`] writes every value verbatim; [`CsvQuoting::Rfc4180`]
/// quotes only fields holding a comma, quote or line break.
pub fn rows_to_csv(rows: &[FlatRow], quoting: CsvQuoting) -> Result<String, HarinaError> {
    let style = match quoting {
        CsvQuoting::None => QuoteStyle::Never,
        CsvQuoting::Rfc4180 => QuoteStyle::Necessary,
    };
    let csv_err = |e: &dyn std::fmt::Display| HarinaError::Internal(format!("CSV writer: {e}"));

    let mut writer = WriterBuilder::new()
        .quote_style(style)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer.write_record(headers()).map_err(|e| csv_err(&e))?;
    for row in rows {
        writer.write_record(row.values()).map_err(|e| csv_err(&e))?;
    }
    let bytes = writer.into_inner().map_err(|e| csv_err(&e))?;
    let mut text = String::from_utf8(bytes).map_err(|e| csv_err(&e))?;
    if text.ends_with('\n') {
        text.pop();
    }
    Ok(text)
}

/// [`flatten_str`] followed by [`rows_to_csv`].
pub fn document_to_csv(document: &str, quoting: CsvQuoting) -> Result<String, HarinaError> {
    rows_to_csv(&flatten_str(document)?, quoting)
}

/// Flatten an already-parsed tree to CSV text.
pub fn tree_to_csv(root: &Element, quoting: CsvQuoting) -> Result<String, HarinaError> {
    rows_to_csv(&flatten_tree(root)?, quoting)
}

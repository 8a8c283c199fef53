//! Typed view of a receipt document.
//!
//! Every leaf is `Option<String>`: `None` when the element is absent,
//! `Some("")` when it is present but empty. Values are kept as the model
//! wrote them; no numeric coercion happens here.

use crate::error::HarinaError;
use crate::pipeline::flatten::{self, ITEMS_PATH, ITEM_TAG};
use crate::pipeline::markup::Element;
use crate::pipeline::validate::parse_with_repair;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreInfo {
    pub name: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionInfo {
    pub date: Option<String>,
    pub time: Option<String>,
    pub receipt_number: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub name: Option<String>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub quantity: Option<String>,
    pub unit_price: Option<String>,
    pub total_price: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub subtotal: Option<String>,
    pub tax: Option<String>,
    pub total: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentInfo {
    pub method: Option<String>,
    pub amount_paid: Option<String>,
    pub change: Option<String>,
}

/// A whole receipt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptDocument {
    pub store_info: StoreInfo,
    pub transaction_info: TransactionInfo,
    pub items: Vec<LineItem>,
    pub totals: Totals,
    pub payment_info: PaymentInfo,
}

impl ReceiptDocument {
    /// Read the typed fields out of a parsed tree. Unknown elements are ignored.
    ///
    /// Every field is looked up through [`flatten::column`] by its CSV
    /// header, so the typed view and the CSV rows read the same nodes.
    pub fn from_element(root: &Element) -> Self {
        let at = |header: &str| read(root, None, header);

        let items = root
            .find(ITEMS_PATH)
            .map(|list| {
                list.children_named(ITEM_TAG)
                    .map(|item| {
                        let of = |header: &str| read(root, Some(item), header);
                        LineItem {
                            name: of("item_name"),
                            category: of("item_category"),
                            subcategory: of("item_subcategory"),
                            quantity: of("item_quantity"),
                            unit_price: of("item_unit_price"),
                            total_price: of("item_total_price"),
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            store_info: StoreInfo {
                name: at("store_name"),
                address: at("store_address"),
                phone: at("store_phone"),
            },
            transaction_info: TransactionInfo {
                date: at("transaction_date"),
                time: at("transaction_time"),
                receipt_number: at("receipt_number"),
            },
            items,
            totals: Totals {
                subtotal: at("subtotal"),
                tax: at("tax"),
                total: at("total"),
            },
            payment_info: PaymentInfo {
                method: at("payment_method"),
                amount_paid: at("amount_paid"),
                change: at("change"),
            },
        }
    }
}

fn read(root: &Element, item: Option<&Element>, header: &str) -> Option<String> {
    let column = flatten::column(header);
    debug_assert!(column.is_some(), "unknown column {header}");
    column.and_then(|c| c.read(root, item))
}

/// Parse `text` (retrying once on its sanitised form) into a typed document.
pub fn parse_document(text: &str) -> Result<ReceiptDocument, HarinaError> {
    let (root, _) = parse_with_repair(text).map_err(|failures| {
        HarinaError::schema(
            failures
                .into_iter()
                .last()
                .map(|f| f.message)
                .unwrap_or_else(|| "document does not parse".to_string()),
        )
    })?;
    Ok(ReceiptDocument::from_element(&root))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_and_empty_are_distinct() {
        let doc = parse_document(
            "<receipt><store_info><name>Cafe</name><phone></phone></store_info></receipt>",
        )
        .unwrap();
        assert_eq!(doc.store_info.name.as_deref(), Some("Cafe"));
        assert_eq!(doc.store_info.phone.as_deref(), Some(""));
        assert_eq!(doc.store_info.address, None);
        assert_eq!(doc.payment_info, PaymentInfo::default());
    }

    #[test]
    fn items_keep_source_order() {
        let doc = parse_document(
            "<receipt><items><item><name>A</name></item><note/><item><name>B</name><quantity>2</quantity></item></items></receipt>",
        )
        .unwrap();
        let names: Vec<_> = doc.items.iter().map(|i| i.name.as_deref()).collect();
        assert_eq!(names, vec![Some("A"), Some("B")]);
        assert_eq!(doc.items[1].quantity.as_deref(), Some("2"));
    }

    #[test]
    fn values_are_not_coerced() {
        let doc = parse_document("<receipt><totals><total>01,200</total></totals></receipt>").unwrap();
        assert_eq!(doc.totals.total.as_deref(), Some("01,200"));
    }

    #[test]
    fn every_column_has_a_typed_field() {
        let doc = parse_document(
            "<receipt>\
             <store_info><name>a</name><address>b</address><phone>c</phone></store_info>\
             <transaction_info><date>d</date><time>e</time><receipt_number>f</receipt_number></transaction_info>\
             <items><item><name>g</name><category>h</category><subcategory>i</subcategory>\
             <quantity>j</quantity><unit_price>k</unit_price><total_price>l</total_price></item></items>\
             <totals><subtotal>m</subtotal><tax>n</tax><total>o</total></totals>\
             <payment_info><method>p</method><amount_paid>q</amount_paid><change>r</change></payment_info>\
             </receipt>",
        )
        .unwrap();

        let json = serde_json::to_value(&doc).unwrap();
        let item = &json["items"][0];
        let mut leaves: Vec<String> = Vec::new();
        for section in ["store_info", "transaction_info", "totals", "payment_info"] {
            for value in json[section].as_object().unwrap().values() {
                leaves.push(value.as_str().expect("field populated").to_string());
            }
        }
        for value in item.as_object().unwrap().values() {
            leaves.push(value.as_str().expect("field populated").to_string());
        }
        leaves.sort();
        let expected: Vec<String> = ('a'..='r').map(String::from).collect();
        assert_eq!(leaves, expected);
        assert_eq!(leaves.len(), flatten::COLUMN_COUNT);
    }

    #[test]
    fn unparseable_text_is_schema_error() {
        assert!(matches!(
            parse_document("<receipt>"),
            Err(HarinaError::Schema { .. })
        ));
    }
}

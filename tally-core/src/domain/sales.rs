//! Sales record types
//!
//! Records arrive from the sales data source as loosely typed rows. Required
//! fields are optional here so that engines can report missing columns as a
//! validation failure instead of the row being rejected during decoding.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};

/// One order line from the retail dataset
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SalesRecord {
    #[serde(default, alias = "CustomerID", alias = "Customer ID")]
    pub customer_id: Option<String>,

    #[serde(
        default,
        alias = "OrderDate",
        alias = "Order Date",
        deserialize_with = "lenient_date"
    )]
    pub order_date: Option<NaiveDate>,

    #[serde(default, alias = "Sales", alias = "Revenue", alias = "revenue")]
    pub sales: Option<f64>,

    #[serde(default, alias = "Category")]
    pub category: Option<String>,

    #[serde(default, alias = "Product Name", alias = "ProductName")]
    pub product: Option<String>,

    #[serde(default, alias = "Quantity")]
    pub quantity: Option<f64>,

    #[serde(default, alias = "Discount")]
    pub discount: Option<f64>,
}

impl SalesRecord {
    pub fn new(customer_id: &str, order_date: NaiveDate, sales: f64) -> Self {
        Self {
            customer_id: Some(customer_id.to_string()),
            order_date: Some(order_date),
            sales: Some(sales),
            ..Default::default()
        }
    }

    pub fn with_category(mut self, category: &str) -> Self {
        self.category = Some(category.to_string());
        self
    }

    pub fn with_product(mut self, product: &str, quantity: f64, discount: f64) -> Self {
        self.product = Some(product.to_string());
        self.quantity = Some(quantity);
        self.discount = Some(discount);
        self
    }
}

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%m/%d/%Y", "%d-%m-%Y", "%Y/%m/%d"];
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Parse the date formats seen in retail exports
///
/// Unparseable values become `None` rather than failing the whole batch.
pub fn parse_order_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt.date());
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
}

fn lenient_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_order_date))
}

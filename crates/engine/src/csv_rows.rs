//! CSV formats exchanged with clients and admins.
//!
//! Every uploaded file is parsed and validated completely before anything is
//! written: the first bad record rejects the whole file, and the error names
//! its line (the header is line 1).

use csv::{ReaderBuilder, Trim, Writer};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{EngineError, MoneyCents, ResultEngine, products::normalize_sku};

/// A raw CSV record that can be checked into a domain value.
pub trait CsvRow: DeserializeOwned {
    type Item;

    fn validate(self) -> ResultEngine<Self::Item>;
}

/// Row of a product listing file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ListingRow {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "SKU")]
    pub sku: String,
    #[serde(rename = "Description", default)]
    pub description: Option<String>,
    #[serde(rename = "Quantity")]
    pub quantity: i64,
    #[serde(rename = "Price", default)]
    pub price: Option<String>,
    /// Grams.
    #[serde(rename = "Weight")]
    pub weight: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListingItem {
    pub name: String,
    pub sku: String,
    pub description: Option<String>,
    pub quantity: i64,
    pub price_minor: Option<i64>,
    pub weight_grams: i64,
}

impl CsvRow for ListingRow {
    type Item = ListingItem;

    fn validate(self) -> ResultEngine<ListingItem> {
        let name = required(&self.name, "Name")?;
        let sku = normalize_sku(&self.sku)?;
        if self.quantity <= 0 {
            return Err(EngineError::InvalidInput(
                "Quantity must be positive".to_string(),
            ));
        }
        if self.weight <= 0 {
            return Err(EngineError::InvalidInput(
                "Weight must be positive".to_string(),
            ));
        }
        let price_minor = match optional(self.price) {
            Some(raw) => {
                let price: MoneyCents = raw.parse()?;
                if !price.is_positive() {
                    return Err(EngineError::InvalidAmount(
                        "Price must be positive".to_string(),
                    ));
                }
                Some(price.cents())
            }
            None => None,
        };

        Ok(ListingItem {
            name,
            sku,
            description: optional(self.description),
            quantity: self.quantity,
            price_minor,
            weight_grams: self.weight,
        })
    }
}

impl From<&ListingItem> for ListingRow {
    fn from(item: &ListingItem) -> Self {
        Self {
            name: item.name.clone(),
            sku: item.sku.clone(),
            description: item.description.clone(),
            quantity: item.quantity,
            price: item.price_minor.map(|p| MoneyCents::new(p).to_string()),
            weight: item.weight_grams,
        }
    }
}

/// Row of an order file: one product shipped to one buyer.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct OrderRow {
    #[serde(rename = "BuyerName")]
    pub buyer_name: String,
    #[serde(rename = "BuyerAddress1")]
    pub buyer_address1: String,
    #[serde(rename = "BuyerAddress2", default)]
    pub buyer_address2: Option<String>,
    #[serde(rename = "BuyerCity")]
    pub buyer_city: String,
    #[serde(rename = "BuyerCountry")]
    pub buyer_country: String,
    #[serde(rename = "BuyerPostCode")]
    pub buyer_post_code: String,
    #[serde(rename = "ProductSKU")]
    pub product_sku: String,
    #[serde(rename = "ProductQuantity")]
    pub product_quantity: i64,
}

impl CsvRow for OrderRow {
    type Item = OrderRow;

    fn validate(self) -> ResultEngine<OrderRow> {
        if self.product_quantity <= 0 {
            return Err(EngineError::InvalidInput(
                "ProductQuantity must be positive".to_string(),
            ));
        }
        Ok(OrderRow {
            buyer_name: required(&self.buyer_name, "BuyerName")?,
            buyer_address1: required(&self.buyer_address1, "BuyerAddress1")?,
            buyer_address2: optional(self.buyer_address2),
            buyer_city: required(&self.buyer_city, "BuyerCity")?,
            buyer_country: required(&self.buyer_country, "BuyerCountry")?,
            buyer_post_code: required(&self.buyer_post_code, "BuyerPostCode")?,
            product_sku: normalize_sku(&self.product_sku)?,
            product_quantity: self.product_quantity,
        })
    }
}

/// Row of a tracking import file.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct TrackingRow {
    #[serde(rename = "Orderline")]
    pub order_line: i64,
    #[serde(rename = "Tracking_company", default)]
    pub tracking_company: Option<String>,
    #[serde(rename = "Tracking_number", default)]
    pub tracking_number: Option<String>,
}

impl CsvRow for TrackingRow {
    type Item = TrackingRow;

    fn validate(self) -> ResultEngine<TrackingRow> {
        Ok(TrackingRow {
            order_line: self.order_line,
            tracking_company: optional(self.tracking_company),
            tracking_number: optional(self.tracking_number),
        })
    }
}

/// Row of the order lines export handed to the warehouse.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ExportRow {
    #[serde(rename = "Orderline")]
    pub order_line: i64,
    #[serde(rename = "ProductSKU")]
    pub product_sku: String,
    #[serde(rename = "ProductQuantity")]
    pub product_quantity: i64,
    #[serde(rename = "Location")]
    pub location: Option<String>,
    #[serde(rename = "BuyerName")]
    pub buyer_name: String,
    #[serde(rename = "BuyerAddress1")]
    pub buyer_address1: String,
    #[serde(rename = "BuyerAddress2")]
    pub buyer_address2: Option<String>,
    #[serde(rename = "BuyerCity")]
    pub buyer_city: String,
    #[serde(rename = "BuyerCountry")]
    pub buyer_country: String,
    #[serde(rename = "BuyerPostCode")]
    pub buyer_post_code: String,
    #[serde(rename = "SharedPostcode")]
    pub shared_postcode: bool,
    #[serde(rename = "Tracking_company")]
    pub tracking_company: Option<String>,
    #[serde(rename = "Tracking_number")]
    pub tracking_number: Option<String>,
}

/// Parses and validates every record of `bytes`.
pub fn parse_rows<T: CsvRow>(bytes: &[u8]) -> ResultEngine<Vec<T::Item>> {
    let mut reader = ReaderBuilder::new().trim(Trim::All).from_reader(bytes);

    let mut items = Vec::new();
    for (idx, record) in reader.deserialize::<T>().enumerate() {
        let line = idx + 2;
        let row = record.map_err(|err| EngineError::InvalidCsv(format!("line {line}: {err}")))?;
        let item = row.validate().map_err(|err| match err {
            EngineError::InvalidInput(msg)
            | EngineError::InvalidAmount(msg)
            | EngineError::InvalidCsv(msg) => EngineError::InvalidCsv(format!("line {line}: {msg}")),
            other => other,
        })?;
        items.push(item);
    }

    if items.is_empty() {
        return Err(EngineError::InvalidCsv("file contains no rows".to_string()));
    }
    Ok(items)
}

/// Serializes `rows` with a header line.
pub fn write_rows<T: Serialize>(rows: &[T]) -> ResultEngine<Vec<u8>> {
    let mut writer = Writer::from_writer(vec![]);
    for row in rows {
        writer
            .serialize(row)
            .map_err(|err| EngineError::Storage(format!("failed to serialize row: {err}")))?;
    }
    writer
        .into_inner()
        .map_err(|err| EngineError::Storage(format!("failed to finalize csv: {err}")))
}

fn required(value: &str, column: &str) -> ResultEngine<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::InvalidInput(format!("{column} is required")));
    }
    Ok(trimmed.to_string())
}

fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

//! Product display attributes cached by the cart.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::ProductId;
use super::price::Price;

/// Denormalized display attributes of a product.
///
/// The cart keeps one of these per line for rendering only. It is refreshed
/// whenever the line is enriched and may be stale relative to the catalog;
/// checkout pricing is always decided by the server.
///
/// Unknown fields in catalog payloads (stock, description, ...) are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    /// Catalog identifier. Accepts the document-database `_id` key as well.
    #[serde(alias = "_id")]
    pub id: ProductId,
    /// Display name (album title, merch name, ...).
    pub name: String,
    /// Unit price in the store currency. A plain JSON number on the wire.
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    /// Product type, e.g. `vinyl`, `cd`, `merch`.
    #[serde(rename = "type", default)]
    pub product_type: String,
    /// Thumbnail image URL.
    #[serde(default)]
    pub thumbnail: Option<String>,
}

impl ProductSnapshot {
    /// Unit price with currency.
    #[must_use]
    pub fn unit_price(&self) -> Price {
        Price::usd(self.price)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_catalog_payload() {
        let json = r#"{
            "_id": "65f1",
            "name": "Kind of Blue",
            "price": 24.99,
            "type": "vinyl",
            "thumbnail": "https://cdn.example.com/kob.jpg",
            "stock": 12
        }"#;
        let product: ProductSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(product.id, ProductId::new("65f1"));
        assert_eq!(product.price, Decimal::new(2499, 2));
        assert_eq!(product.product_type, "vinyl");
        assert_eq!(product.unit_price().display(), "$24.99");
    }

    #[test]
    fn test_optional_fields_default() {
        let json = r#"{"id": "p1", "name": "Tote Bag", "price": 15}"#;
        let product: ProductSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(product.price, Decimal::new(15, 0));
        assert!(product.product_type.is_empty());
        assert!(product.thumbnail.is_none());
    }

    #[test]
    fn test_serializes_type_key() {
        let product = ProductSnapshot {
            id: ProductId::new("p1"),
            name: "Blue Train".to_string(),
            price: Decimal::new(30, 0),
            product_type: "vinyl".to_string(),
            thumbnail: None,
        };
        let value = serde_json::to_value(&product).unwrap();
        assert_eq!(value["type"], "vinyl");
        assert!(value.get("product_type").is_none());
    }
}

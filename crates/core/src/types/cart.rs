//! Cart line types.
//!
//! A cart is an ordered list of lines with at most one line per product.
//! [`CartLine`] is the bare `{productId, quantity}` pair that guest carts
//! persist; [`CartItem`] is the same line joined with the product's display
//! attributes, which is what the cart engine publishes.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::ProductId;
use super::product::ProductSnapshot;

/// A product reference and quantity, without display attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

impl CartLine {
    /// Create a new line.
    #[must_use]
    pub fn new(product_id: impl Into<ProductId>, quantity: u32) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
        }
    }
}

/// A cart line with its cached product snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_id: ProductId,
    pub quantity: u32,
    pub product: ProductSnapshot,
}

impl CartItem {
    /// Join a line with its product snapshot.
    #[must_use]
    pub fn from_line(line: CartLine, product: ProductSnapshot) -> Self {
        Self {
            product_id: line.product_id,
            quantity: line.quantity,
            product,
        }
    }

    /// The line without its product snapshot.
    #[must_use]
    pub fn line(&self) -> CartLine {
        CartLine {
            product_id: self.product_id.clone(),
            quantity: self.quantity,
        }
    }

    /// Unit price multiplied by quantity.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.product.price * Decimal::from(self.quantity)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn snapshot(id: &str, cents: i64) -> ProductSnapshot {
        ProductSnapshot {
            id: ProductId::new(id),
            name: format!("Record {id}"),
            price: Decimal::new(cents, 2),
            product_type: "vinyl".to_string(),
            thumbnail: None,
        }
    }

    #[test]
    fn test_line_uses_camel_case_keys() {
        let json = serde_json::to_string(&CartLine::new("p1", 2)).unwrap();
        assert_eq!(json, r#"{"productId":"p1","quantity":2}"#);
    }

    #[test]
    fn test_item_strips_to_line() {
        let item = CartItem::from_line(CartLine::new("p1", 3), snapshot("p1", 1999));
        assert_eq!(item.line(), CartLine::new("p1", 3));
        assert_eq!(item.line_total(), Decimal::new(5997, 2));
    }
}

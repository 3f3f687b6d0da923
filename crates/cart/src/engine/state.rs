//! State published by the cart engine.

use rust_decimal::Decimal;
use vinyl_vibe_core::{CartItem, Price, ProductId};

use crate::error::CartError;
use crate::session::SessionMode;

/// Snapshot of the cart as the UI should render it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CartState {
    /// Items in display order, at most one per product.
    pub items: Vec<CartItem>,
    /// An operation is in progress.
    pub is_loading: bool,
    /// The most recent operation failure, cleared when the next operation starts.
    pub error: Option<CartError>,
    /// Mode resolved by the most recent operation, `None` before the first one.
    pub mode: Option<SessionMode>,
}

impl CartState {
    /// The item for `product_id`, if present.
    #[must_use]
    pub fn item(&self, product_id: &ProductId) -> Option<&CartItem> {
        self.items.iter().find(|item| &item.product_id == product_id)
    }

    /// Quantity of `product_id`, if present.
    #[must_use]
    pub fn quantity_of(&self, product_id: &ProductId) -> Option<u32> {
        self.item(product_id).map(|item| item.quantity)
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items
            .iter()
            .fold(0_u32, |total, item| total.saturating_add(item.quantity))
    }

    /// Sum of line totals, from cached snapshots (display only).
    #[must_use]
    pub fn subtotal(&self) -> Price {
        Price::usd(self.items.iter().map(CartItem::line_total).sum::<Decimal>())
    }

    /// The error message for display.
    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }

    /// Whether the cart has no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

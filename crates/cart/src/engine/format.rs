//! Server cart formatting.
//!
//! Flattens the gateway's nested `{product, quantity}` entries into the
//! engine's flat item list.

use tracing::warn;
use vinyl_vibe_core::{CartItem, CartLine};

use crate::gateway::CartPayload;

/// Flatten a server cart into items.
///
/// Entries without a resolvable product are dropped. Duplicate product ids
/// are folded into the first occurrence so published state keeps one line
/// per product.
#[must_use]
pub fn format_server_cart(payload: CartPayload) -> Vec<CartItem> {
    let mut items: Vec<CartItem> = Vec::with_capacity(payload.items.len());

    for entry in payload.items {
        let Some(product) = entry.product else {
            warn!("Server cart entry has no product, skipping");
            continue;
        };
        if product.id.is_blank() {
            warn!(name = %product.name, "Server cart entry has a blank product id, skipping");
            continue;
        }

        if let Some(existing) = items.iter_mut().find(|item| item.product_id == product.id) {
            existing.quantity = existing.quantity.saturating_add(entry.quantity);
            continue;
        }

        items.push(CartItem::from_line(
            CartLine::new(product.id.clone(), entry.quantity),
            product,
        ));
    }

    items
}

/// Flatten a server cart into bare lines, for re-enrichment.
#[must_use]
pub fn server_cart_lines(payload: CartPayload) -> Vec<CartLine> {
    format_server_cart(payload)
        .iter()
        .map(CartItem::line)
        .collect()
}

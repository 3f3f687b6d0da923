//! Enrichment: joining bare lines with product display attributes.

use futures::future::join_all;
use tracing::{debug, warn};
use vinyl_vibe_core::{CartItem, CartLine};

use crate::gateway::ProductLookup;

/// Resolve every line's product concurrently.
///
/// Lines with a blank product id and lines whose lookup fails are dropped;
/// one failure never aborts the rest. Output keeps input order.
pub async fn enrich(lookup: &dyn ProductLookup, lines: Vec<CartLine>) -> Vec<CartItem> {
    let requested = lines.len();

    let lookups = lines
        .into_iter()
        .filter(|line| {
            if line.product_id.is_blank() {
                warn!(quantity = line.quantity, "Dropping cart line with blank product id");
                return false;
            }
            true
        })
        .map(|line| async move {
            match lookup.get_product(&line.product_id).await {
                Ok(product) => Some(CartItem::from_line(line, product)),
                Err(e) => {
                    warn!(
                        product_id = %line.product_id,
                        error = %e,
                        "Product lookup failed, dropping line from cart"
                    );
                    None
                }
            }
        });

    let items: Vec<CartItem> = join_all(lookups).await.into_iter().flatten().collect();
    debug!(requested, enriched = items.len(), "Enriched cart lines");
    items
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::testing::{FakeProductLookup, sample_product};

    #[tokio::test]
    async fn test_enriches_in_input_order() {
        let lookup = FakeProductLookup::with_products([
            sample_product("p1", 1999),
            sample_product("p2", 2499),
        ]);

        let items = enrich(
            &lookup,
            vec![CartLine::new("p2", 1), CartLine::new("p1", 2)],
        )
        .await;

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].product_id.as_str(), "p2");
        assert_eq!(items[0].product.name, "Record p2");
        assert_eq!(items[1].quantity, 2);
    }

    #[tokio::test]
    async fn test_drops_unknown_and_failing_products() {
        let lookup = FakeProductLookup::with_products([
            sample_product("p1", 1999),
            sample_product("p3", 999),
        ]);
        lookup.fail_for("p3");

        let items = enrich(
            &lookup,
            vec![
                CartLine::new("p1", 1),
                CartLine::new("missing", 1),
                CartLine::new("p3", 1),
                CartLine::new(" ", 5),
            ],
        )
        .await;

        assert_eq!(
            items.iter().map(CartItem::line).collect::<Vec<_>>(),
            vec![CartLine::new("p1", 1)]
        );
        // blank ids never reach the lookup
        assert_eq!(lookup.lookup_count(), 3);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let lookup = FakeProductLookup::default();
        assert!(enrich(&lookup, Vec::new()).await.is_empty());
        assert_eq!(lookup.lookup_count(), 0);
    }
}

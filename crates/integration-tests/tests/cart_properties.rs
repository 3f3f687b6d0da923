//! Property tests: arbitrary add sequences keep one line per product.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::sync::Arc;

use proptest::prelude::*;
use serde_json::Value;
use vinyl_vibe_cart::session::{MemoryCredentialStore, SessionResolver};
use vinyl_vibe_cart::storage::MemoryCartStore;
use vinyl_vibe_cart::testing::{
    FakeCartGateway, FakeProductLookup, ManualClock, mint_token, sample_product,
};
use vinyl_vibe_cart::{CartEngine, EngineSettings};
use vinyl_vibe_core::ProductId;

const NOW: i64 = 1_700_000_000_000;
const CATALOG: [&str; 4] = ["p1", "p2", "p3", "p4"];

struct Shop {
    engine: CartEngine,
    local: MemoryCartStore,
}

fn shop(signed_in: bool) -> Shop {
    let lookup = FakeProductLookup::with_products(
        CATALOG
            .iter()
            .zip(1..)
            .map(|(id, cents)| sample_product(id, cents * 1000 - 1)),
    );
    let gateway = FakeCartGateway::new(lookup.clone());
    let local = MemoryCartStore::new();
    let credentials = MemoryCredentialStore::new();
    if signed_in {
        credentials.set(mint_token(NOW / 1000 + 3600));
    }
    let session = SessionResolver::new(
        Arc::new(credentials),
        Arc::new(ManualClock::new(NOW)),
    );

    let engine = CartEngine::new(
        Arc::new(gateway),
        Arc::new(lookup),
        Arc::new(local.clone()),
        session,
        EngineSettings::default(),
    );
    Shop { engine, local }
}

/// `(catalog index, quantity)` pairs; `None` adds the default of one.
fn adds_strategy() -> impl Strategy<Value = Vec<(usize, Option<u32>)>> {
    proptest::collection::vec(
        (0..CATALOG.len(), proptest::option::of(1..10_u32)),
        0..24,
    )
}

/// Lines in first-add order, each summing every quantity added.
fn expected_lines(adds: &[(usize, Option<u32>)]) -> Vec<(&'static str, u32)> {
    let mut expected: Vec<(&str, u32)> = Vec::new();
    for &(index, quantity) in adds {
        let id = CATALOG[index];
        let quantity = quantity.unwrap_or(1);
        match expected.iter_mut().find(|(existing, _)| *existing == id) {
            Some((_, total)) => *total += quantity,
            None => expected.push((id, quantity)),
        }
    }
    expected
}

fn run_adds(shop: &Shop, adds: &[(usize, Option<u32>)]) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    runtime.block_on(async {
        for &(index, quantity) in adds {
            shop.engine
                .add_item(ProductId::new(CATALOG[index]), quantity)
                .await;
        }
    });
}

fn published_lines(shop: &Shop) -> Vec<(String, u32)> {
    shop.engine
        .state()
        .items
        .iter()
        .map(|item| (item.product_id.as_str().to_string(), item.quantity))
        .collect()
}

fn owned(lines: Vec<(&str, u32)>) -> Vec<(String, u32)> {
    lines
        .into_iter()
        .map(|(id, quantity)| (id.to_string(), quantity))
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn guest_adds_sum_into_one_line_per_product(adds in adds_strategy()) {
        let shop = shop(false);
        run_adds(&shop, &adds);

        let expected = expected_lines(&adds);
        prop_assert!(shop.engine.state().error.is_none());
        prop_assert_eq!(published_lines(&shop), owned(expected.clone()));

        let Some(raw) = shop.local.contents() else {
            prop_assert!(adds.is_empty());
            return Ok(());
        };
        let persisted: Vec<Value> = serde_json::from_str(&raw).unwrap();
        prop_assert_eq!(persisted.len(), expected.len());
        for (entry, &(id, quantity)) in persisted.iter().zip(&expected) {
            let object = entry.as_object().unwrap();
            prop_assert!(!object.contains_key("product"));
            prop_assert_eq!(object.len(), 2);
            prop_assert_eq!(object.get("productId").and_then(Value::as_str), Some(id));
            prop_assert_eq!(
                object.get("quantity").and_then(Value::as_u64),
                Some(u64::from(quantity))
            );
        }
    }

    #[test]
    fn signed_in_adds_sum_into_one_line_per_product(adds in adds_strategy()) {
        let shop = shop(true);
        run_adds(&shop, &adds);

        prop_assert!(shop.engine.state().error.is_none());
        prop_assert_eq!(published_lines(&shop), owned(expected_lines(&adds)));
        prop_assert!(shop.local.contents().is_none());
    }
}

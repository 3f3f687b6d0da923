//! End-to-end tests: cart engine, HTTP clients and a mock shop API.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::sync::Arc;
use std::time::Duration;

use vinyl_vibe_cart::api::{ApiClient, HttpCartGateway, HttpProductLookup};
use vinyl_vibe_cart::session::{MemoryCredentialStore, SessionResolver};
use vinyl_vibe_cart::storage::{LocalCartStore, MemoryCartStore};
use vinyl_vibe_cart::testing::{ManualClock, mint_token, sample_product};
use vinyl_vibe_cart::{CartEngine, CartErrorKind, EngineSettings, SessionMode};
use vinyl_vibe_core::{CartLine, ProductId};
use vinyl_vibe_integration_tests::MockShop;

const NOW: i64 = 1_700_000_000_000;

struct Shopper {
    engine: CartEngine,
    local: MemoryCartStore,
    credentials: MemoryCredentialStore,
    token: String,
}

async fn shopper(shop: &MockShop, debounce: Duration) -> Shopper {
    let base_url = shop.serve().await.unwrap();
    let api = ApiClient::new(base_url);

    let local = MemoryCartStore::new();
    let credentials = MemoryCredentialStore::new();
    let gateway = HttpCartGateway::new(api.clone(), Arc::new(credentials.clone()));
    let lookup = HttpProductLookup::new(api);
    let session = SessionResolver::new(
        Arc::new(credentials.clone()),
        Arc::new(ManualClock::new(NOW)),
    );

    let engine = CartEngine::new(
        Arc::new(gateway),
        Arc::new(lookup),
        Arc::new(local.clone()),
        session,
        EngineSettings { debounce },
    );

    Shopper {
        engine,
        local,
        credentials,
        token: mint_token(NOW / 1000 + 3600),
    }
}

fn record_shop() -> MockShop {
    MockShop::with_products([
        sample_product("p1", 2499),
        sample_product("p2", 1999),
        sample_product("p3", 3500),
    ])
}

fn count(requests: &[String], request: &str) -> usize {
    requests.iter().filter(|r| r.as_str() == request).count()
}

// =============================================================================
// Guest to signed-in
// =============================================================================

#[tokio::test]
async fn test_guest_cart_merges_into_account_on_login() {
    let shop = record_shop();
    let s = shopper(&shop, Duration::from_secs(1)).await;
    shop.seed_cart(&s.token, "p2", 1);

    s.engine.add_item(ProductId::new("p1"), Some(2)).await;
    assert_eq!(s.engine.state().mode, Some(SessionMode::Guest));
    assert_eq!(
        s.local.contents().unwrap(),
        r#"[{"productId":"p1","quantity":2}]"#
    );
    assert_eq!(count(&shop.requests(), "GET /cart"), 0);

    s.credentials.set(s.token.clone());
    s.engine.sync_cart_on_login().await;

    let state = s.engine.state();
    assert!(state.error.is_none());
    assert_eq!(state.mode, Some(SessionMode::Authenticated));
    assert_eq!(state.items.len(), 2);
    assert_eq!(state.quantity_of(&ProductId::new("p1")), Some(2));
    assert_eq!(state.quantity_of(&ProductId::new("p2")), Some(1));

    assert!(s.local.contents().is_none());
    assert_eq!(count(&shop.requests(), "POST /cart/items"), 1);
    assert_eq!(
        shop.cart_for(&s.token),
        vec![CartLine::new("p2", 1), CartLine::new("p1", 2)]
    );
}

#[tokio::test]
async fn test_login_merge_is_additive_with_server_quantities() {
    let shop = record_shop();
    let s = shopper(&shop, Duration::from_secs(1)).await;
    shop.seed_cart(&s.token, "p1", 1);

    s.engine.add_item(ProductId::new("p1"), Some(2)).await;
    s.credentials.set(s.token.clone());
    s.engine.sync_cart_on_login().await;

    assert_eq!(
        s.engine.state().quantity_of(&ProductId::new("p1")),
        Some(3)
    );
}

// =============================================================================
// Signed-in operations
// =============================================================================

#[tokio::test]
async fn test_authenticated_edits_round_trip() {
    let shop = record_shop();
    let s = shopper(&shop, Duration::from_secs(1)).await;
    s.credentials.set(s.token.clone());

    s.engine.init_cart().await;
    assert!(s.engine.state().is_empty());

    s.engine.add_item(ProductId::new("p1"), None).await;
    s.engine.add_item(ProductId::new("p3"), Some(2)).await;
    s.engine.update_quantity(ProductId::new("p1"), 4).await;

    let state = s.engine.state();
    assert!(state.error.is_none());
    assert_eq!(state.item_count(), 6);
    assert_eq!(state.items[0].product.name, "Record p1");
    assert_eq!(state.subtotal().display(), "$169.96");

    s.engine.remove_item(ProductId::new("p1")).await;
    assert_eq!(shop.cart_for(&s.token), vec![CartLine::new("p3", 2)]);
    assert!(s.local.contents().is_none());
}

#[tokio::test]
async fn test_removing_absent_item_succeeds() {
    let shop = record_shop();
    let s = shopper(&shop, Duration::from_secs(1)).await;
    s.credentials.set(s.token.clone());
    shop.seed_cart(&s.token, "p2", 1);

    s.engine.init_cart().await;
    s.engine.remove_item(ProductId::new("p1")).await;

    let state = s.engine.state();
    assert!(state.error.is_none());
    assert_eq!(state.items.len(), 1);
    assert_eq!(count(&shop.requests(), "DELETE /cart/items/p1"), 1);
}

#[tokio::test]
async fn test_adding_unknown_product_publishes_not_found() {
    let shop = record_shop();
    let s = shopper(&shop, Duration::from_secs(1)).await;
    s.credentials.set(s.token.clone());
    shop.seed_cart(&s.token, "p2", 1);

    s.engine.init_cart().await;
    s.engine.add_item(ProductId::new("ghost"), None).await;

    let state = s.engine.state();
    assert_eq!(state.error.unwrap().kind(), CartErrorKind::NotFound);
    assert_eq!(state.items.len(), 1);
}

#[tokio::test]
async fn test_revoked_token_publishes_network_failure() {
    let shop = record_shop();
    let s = shopper(&shop, Duration::from_secs(1)).await;
    s.credentials.set(s.token.clone());
    shop.revoke(&s.token);

    s.engine.init_cart().await;

    let state = s.engine.state();
    assert_eq!(state.error.unwrap().kind(), CartErrorKind::NetworkFailure);
    assert!(state.items.is_empty());
}

#[tokio::test]
async fn test_outage_keeps_items_until_next_success() {
    let shop = record_shop();
    let s = shopper(&shop, Duration::from_secs(1)).await;
    s.credentials.set(s.token.clone());
    shop.seed_cart(&s.token, "p1", 1);
    s.engine.init_cart().await;

    shop.set_unavailable(true);
    s.engine.update_quantity(ProductId::new("p1"), 5).await;
    let state = s.engine.state();
    assert!(state.error.is_some());
    assert_eq!(state.quantity_of(&ProductId::new("p1")), Some(1));

    shop.set_unavailable(false);
    s.engine.update_quantity(ProductId::new("p1"), 5).await;
    let state = s.engine.state();
    assert!(state.error.is_none());
    assert_eq!(state.quantity_of(&ProductId::new("p1")), Some(5));
}

#[tokio::test]
async fn test_debounced_edits_send_one_request() {
    let shop = record_shop();
    let s = shopper(&shop, Duration::from_millis(50)).await;
    s.credentials.set(s.token.clone());
    shop.seed_cart(&s.token, "p2", 1);
    s.engine.init_cart().await;

    for quantity in [2, 3, 7] {
        s.engine
            .debounced_update_quantity(ProductId::new("p2"), quantity)
            .await;
    }
    assert_eq!(s.engine.state().quantity_of(&ProductId::new("p2")), Some(7));

    tokio::time::sleep(Duration::from_millis(400)).await;

    assert_eq!(count(&shop.requests(), "PATCH /cart/items/p2"), 1);
    assert_eq!(shop.cart_for(&s.token), vec![CartLine::new("p2", 7)]);
    assert!(!s.engine.has_pending_commit(&ProductId::new("p2")));
}

// =============================================================================
// Product lookup
// =============================================================================

#[tokio::test]
async fn test_product_lookups_are_cached() {
    let shop = record_shop();
    let s = shopper(&shop, Duration::from_secs(1)).await;
    s.local
        .write(r#"[{"productId":"p1","quantity":1},{"productId":"p2","quantity":2}]"#)
        .unwrap();

    s.engine.init_cart().await;
    s.engine.init_cart().await;

    assert_eq!(s.engine.state().item_count(), 3);
    let requests = shop.requests();
    assert_eq!(count(&requests, "GET /products/p1"), 1);
    assert_eq!(count(&requests, "GET /products/p2"), 1);
}

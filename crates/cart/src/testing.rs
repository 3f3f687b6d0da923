//! Test doubles for the cart engine's collaborators.
//!
//! Enabled for this crate's own tests and, through the `test-support`
//! feature, for other crates' tests.

#![allow(clippy::missing_panics_doc)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rust_decimal::Decimal;
use vinyl_vibe_core::{CartLine, ProductId, ProductSnapshot};

use crate::gateway::{CartPayload, CartPayloadEntry, GatewayError, ProductLookup, RemoteCartGateway};
use crate::session::Clock;

/// A vinyl product named `Record {id}` priced at `cents`.
#[must_use]
pub fn sample_product(id: &str, cents: i64) -> ProductSnapshot {
    ProductSnapshot {
        id: ProductId::new(id),
        name: format!("Record {id}"),
        price: Decimal::new(cents, 2),
        product_type: "vinyl".to_string(),
        thumbnail: Some(format!("https://cdn.example.com/{id}.jpg")),
    }
}

/// An unsigned three-segment token expiring at `exp` (seconds since epoch).
#[must_use]
pub fn mint_token(exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
    let claims = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"user-1","exp":{exp}}}"#));
    format!("{header}.{claims}.c2lnbmF0dXJl")
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// Clock
// =============================================================================

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    /// Create a clock reading `now_millis`.
    #[must_use]
    pub const fn new(now_millis: i64) -> Self {
        Self {
            now: AtomicI64::new(now_millis),
        }
    }

    /// Move the clock forward.
    pub fn advance_millis(&self, millis: i64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }

    /// Set the clock.
    pub fn set_millis(&self, now_millis: i64) {
        self.now.store(now_millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

// =============================================================================
// Product Lookup
// =============================================================================

#[derive(Debug, Default)]
struct LookupInner {
    products: HashMap<ProductId, ProductSnapshot>,
    failing: HashSet<ProductId>,
    lookups: usize,
}

/// In-memory catalog that counts lookups.
///
/// Unknown products fail with `NotFound`; products marked with
/// [`fail_for`](Self::fail_for) fail with a 503.
#[derive(Debug, Default, Clone)]
pub struct FakeProductLookup {
    inner: Arc<Mutex<LookupInner>>,
}

impl FakeProductLookup {
    /// Create a catalog holding `products`.
    #[must_use]
    pub fn with_products(products: impl IntoIterator<Item = ProductSnapshot>) -> Self {
        let lookup = Self::default();
        for product in products {
            lookup.insert(product);
        }
        lookup
    }

    /// Add or replace a product.
    pub fn insert(&self, product: ProductSnapshot) {
        lock(&self.inner).products.insert(product.id.clone(), product);
    }

    /// Make lookups of `product_id` fail with a transient error.
    pub fn fail_for(&self, product_id: &str) {
        lock(&self.inner).failing.insert(ProductId::new(product_id));
    }

    /// Stop failing lookups.
    pub fn heal(&self) {
        lock(&self.inner).failing.clear();
    }

    /// Number of lookups performed.
    #[must_use]
    pub fn lookup_count(&self) -> usize {
        lock(&self.inner).lookups
    }

    /// Read a product without counting a lookup.
    #[must_use]
    pub fn peek(&self, product_id: &ProductId) -> Option<ProductSnapshot> {
        lock(&self.inner).products.get(product_id).cloned()
    }
}

#[async_trait]
impl ProductLookup for FakeProductLookup {
    async fn get_product(&self, product_id: &ProductId) -> Result<ProductSnapshot, GatewayError> {
        let mut inner = lock(&self.inner);
        inner.lookups += 1;
        if inner.failing.contains(product_id) {
            return Err(GatewayError::Status {
                status: 503,
                body: "catalog unavailable".to_string(),
            });
        }
        inner
            .products
            .get(product_id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(format!("product {product_id} not found")))
    }
}

// =============================================================================
// Cart Gateway
// =============================================================================

/// Gateway operation, for scripting failures and counting calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayOp {
    Fetch,
    Add,
    SetQuantity,
    Remove,
}

/// A recorded gateway call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    Fetch,
    Add(ProductId, u32),
    SetQuantity(ProductId, u32),
    Remove(ProductId),
}

impl GatewayCall {
    /// The call's operation.
    #[must_use]
    pub const fn op(&self) -> GatewayOp {
        match self {
            Self::Fetch => GatewayOp::Fetch,
            Self::Add(..) => GatewayOp::Add,
            Self::SetQuantity(..) => GatewayOp::SetQuantity,
            Self::Remove(_) => GatewayOp::Remove,
        }
    }

    fn product_id(&self) -> Option<&ProductId> {
        match self {
            Self::Fetch => None,
            Self::Add(id, _) | Self::SetQuantity(id, _) | Self::Remove(id) => Some(id),
        }
    }
}

#[derive(Debug)]
struct FailureRule {
    op: GatewayOp,
    product: Option<ProductId>,
}

#[derive(Debug, Default)]
struct GatewayInner {
    lines: Vec<CartLine>,
    calls: Vec<GatewayCall>,
    failures: Vec<FailureRule>,
    latency: Duration,
}

/// In-memory server cart that records every call.
///
/// Adds merge additively, like the real server. Product snapshots in
/// responses come from the shared catalog.
#[derive(Debug, Clone)]
pub struct FakeCartGateway {
    catalog: FakeProductLookup,
    inner: Arc<Mutex<GatewayInner>>,
}

impl FakeCartGateway {
    /// Create an empty server cart resolving products from `catalog`.
    #[must_use]
    pub fn new(catalog: FakeProductLookup) -> Self {
        Self {
            catalog,
            inner: Arc::new(Mutex::new(GatewayInner::default())),
        }
    }

    /// Put a line in the server cart without recording a call.
    pub fn seed(&self, product_id: &str, quantity: u32) {
        lock(&self.inner)
            .lines
            .push(CartLine::new(product_id, quantity));
    }

    /// Current server-side lines.
    #[must_use]
    pub fn server_lines(&self) -> Vec<CartLine> {
        lock(&self.inner).lines.clone()
    }

    /// Every call received, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<GatewayCall> {
        lock(&self.inner).calls.clone()
    }

    /// Number of calls of `op`.
    #[must_use]
    pub fn calls_of(&self, op: GatewayOp) -> usize {
        lock(&self.inner)
            .calls
            .iter()
            .filter(|call| call.op() == op)
            .count()
    }

    /// `(product, quantity)` of every set-quantity call.
    #[must_use]
    pub fn set_quantity_calls(&self) -> Vec<(ProductId, u32)> {
        lock(&self.inner)
            .calls
            .iter()
            .filter_map(|call| match call {
                GatewayCall::SetQuantity(id, quantity) => Some((id.clone(), *quantity)),
                _ => None,
            })
            .collect()
    }

    /// `(product, quantity)` of every add call.
    #[must_use]
    pub fn add_calls(&self) -> Vec<(ProductId, u32)> {
        lock(&self.inner)
            .calls
            .iter()
            .filter_map(|call| match call {
                GatewayCall::Add(id, quantity) => Some((id.clone(), *quantity)),
                _ => None,
            })
            .collect()
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        lock(&self.inner).calls.clear();
    }

    /// Fail every call of `op`.
    pub fn fail_on(&self, op: GatewayOp) {
        lock(&self.inner)
            .failures
            .push(FailureRule { op, product: None });
    }

    /// Fail calls of `op` for one product.
    pub fn fail_on_product(&self, op: GatewayOp, product_id: &str) {
        lock(&self.inner).failures.push(FailureRule {
            op,
            product: Some(ProductId::new(product_id)),
        });
    }

    /// Stop failing calls.
    pub fn heal(&self) {
        lock(&self.inner).failures.clear();
    }

    /// Delay every response, failed or not, by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        lock(&self.inner).latency = latency;
    }

    /// Record the call, wait out the latency, then fail if a rule matched.
    async fn receive(&self, call: GatewayCall) -> Result<(), GatewayError> {
        let (latency, fails) = {
            let mut inner = lock(&self.inner);
            let fails = inner.failures.iter().any(|rule| {
                rule.op == call.op()
                    && rule
                        .product
                        .as_ref()
                        .is_none_or(|product| call.product_id() == Some(product))
            });
            inner.calls.push(call);
            (inner.latency, fails)
        };

        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if fails {
            return Err(GatewayError::Status {
                status: 503,
                body: "service unavailable".to_string(),
            });
        }
        Ok(())
    }

    fn payload(&self, lines: &[CartLine]) -> CartPayload {
        CartPayload::new(
            lines
                .iter()
                .map(|line| CartPayloadEntry {
                    product: self.catalog.peek(&line.product_id),
                    quantity: line.quantity,
                })
                .collect(),
        )
    }

    fn snapshot(&self) -> CartPayload {
        let lines = lock(&self.inner).lines.clone();
        self.payload(&lines)
    }
}

#[async_trait]
impl RemoteCartGateway for FakeCartGateway {
    async fn fetch_cart(&self) -> Result<CartPayload, GatewayError> {
        self.receive(GatewayCall::Fetch).await?;
        Ok(self.snapshot())
    }

    async fn add_item(
        &self,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<CartPayload, GatewayError> {
        self.receive(GatewayCall::Add(product_id.clone(), quantity)).await?;

        if self.catalog.peek(product_id).is_none() {
            return Err(GatewayError::NotFound(format!(
                "product {product_id} not found"
            )));
        }
        {
            let mut inner = lock(&self.inner);
            let lines = &mut inner.lines;
            if let Some(position) = lines.iter().position(|line| &line.product_id == product_id) {
                if let Some(line) = lines.get_mut(position) {
                    line.quantity = line.quantity.saturating_add(quantity);
                }
            } else {
                lines.push(CartLine::new(product_id.clone(), quantity));
            }
        }
        Ok(self.snapshot())
    }

    async fn set_quantity(
        &self,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<CartPayload, GatewayError> {
        self.receive(GatewayCall::SetQuantity(product_id.clone(), quantity)).await?;

        {
            let mut inner = lock(&self.inner);
            let Some(line) = inner
                .lines
                .iter_mut()
                .find(|line| &line.product_id == product_id)
            else {
                return Err(GatewayError::NotFound(format!(
                    "cart item {product_id} not found"
                )));
            };
            line.quantity = quantity;
        }
        Ok(self.snapshot())
    }

    async fn remove_item(&self, product_id: &ProductId) -> Result<CartPayload, GatewayError> {
        self.receive(GatewayCall::Remove(product_id.clone())).await?;

        lock(&self.inner)
            .lines
            .retain(|line| &line.product_id != product_id);
        Ok(self.snapshot())
    }
}

//! The cart engine.
//!
//! Owns the canonical item list and routes every operation to the guest
//! backend (local persistence) or the server cart, depending on the session
//! mode at the moment the operation runs.
//!
//! # Example
//!
//! ```rust,ignore
//! let engine = CartEngine::new(gateway, lookup, local, session, EngineSettings::default());
//! engine.init_cart().await;
//! engine.add_item(ProductId::new("p1"), None).await;
//!
//! let state = engine.state();
//! println!("{} items, {}", state.item_count(), state.subtotal());
//! ```

mod debounce;
mod enrich;
mod format;
mod state;

pub use debounce::{DebounceLanes, FailedCommit};
pub use enrich::enrich;
pub use format::{format_server_cart, server_cart_lines};
pub use state::CartState;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};
use vinyl_vibe_core::{CartItem, CartLine, ProductId};

use crate::error::{CartError, Result};
use crate::gateway::{CartPayload, GatewayError, ProductLookup, RemoteCartGateway};
use crate::session::{SessionMode, SessionResolver};
use crate::storage::{LocalCartStore, load_guest_lines, parse_guest_lines, save_guest_lines};

/// Default quiet period before a debounced quantity edit is committed.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1000);

/// Engine tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    /// Quiet period before a debounced quantity edit is committed.
    pub debounce: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

/// Client-side cart state manager.
///
/// Cheaply cloneable; clones share state. Operations never return errors:
/// failures are logged and published in [`CartState::error`].
#[derive(Clone)]
pub struct CartEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    gateway: Arc<dyn RemoteCartGateway>,
    lookup: Arc<dyn ProductLookup>,
    local: Arc<dyn LocalCartStore>,
    session: SessionResolver,
    settings: EngineSettings,
    state: watch::Sender<CartState>,
    lanes: DebounceLanes,
}

impl CartEngine {
    /// Create an engine with an empty cart.
    #[must_use]
    pub fn new(
        gateway: Arc<dyn RemoteCartGateway>,
        lookup: Arc<dyn ProductLookup>,
        local: Arc<dyn LocalCartStore>,
        session: SessionResolver,
        settings: EngineSettings,
    ) -> Self {
        let (state, _) = watch::channel(CartState::default());
        Self {
            inner: Arc::new(EngineInner {
                gateway,
                lookup,
                local,
                session,
                settings,
                state,
                lanes: DebounceLanes::new(),
            }),
        }
    }

    // =========================================================================
    // Observation
    // =========================================================================

    /// Snapshot of the current state.
    #[must_use]
    pub fn state(&self) -> CartState {
        self.inner.state.borrow().clone()
    }

    /// Current items.
    #[must_use]
    pub fn items(&self) -> Vec<CartItem> {
        self.inner.state.borrow().items.clone()
    }

    /// Subscribe to state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartState> {
        self.inner.state.subscribe()
    }

    /// Whether a debounced commit for `product_id` is scheduled or in flight.
    #[must_use]
    pub fn has_pending_commit(&self, product_id: &ProductId) -> bool {
        self.inner.lanes.is_pending(product_id)
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Load the cart from the active backend.
    ///
    /// On failure the published cart is empty.
    #[instrument(skip(self))]
    pub async fn init_cart(&self) {
        self.begin();

        let result = match self.resolve_mode() {
            SessionMode::Authenticated => self.fetch_server_cart().await,
            SessionMode::Guest => {
                let lines = load_guest_lines(self.inner.local.as_ref());
                Ok(enrich(self.inner.lookup.as_ref(), lines).await)
            }
        };

        if let Err(e) = &result {
            error!(error = %e, "Failed to initialize cart");
            self.inner.state.send_modify(|state| {
                state.items.clear();
                state.is_loading = false;
                state.error = Some(e.clone());
            });
            return;
        }
        self.settle(result);
    }

    /// Add `quantity` (default 1) of a product.
    ///
    /// Authenticated: the server's resulting cart replaces the item list.
    /// Guest: merges into an existing line or appends a new one.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn add_item(&self, product_id: ProductId, quantity: Option<u32>) {
        let quantity = quantity.unwrap_or(1);
        self.begin();

        let result = match self.resolve_mode() {
            SessionMode::Authenticated => {
                match self.inner.gateway.add_item(&product_id, quantity).await {
                    Ok(payload) => Ok(self.enrich_payload(payload).await),
                    Err(e) => Err(e.into()),
                }
            }
            SessionMode::Guest => self.add_guest_item(product_id, quantity).await,
        };

        self.settle(result);
    }

    /// Set a line's quantity immediately.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn update_quantity(&self, product_id: ProductId, quantity: u32) {
        self.begin();

        let result = match self.resolve_mode() {
            SessionMode::Authenticated => self
                .inner
                .gateway
                .set_quantity(&product_id, quantity)
                .await
                .map(format_server_cart)
                .map_err(CartError::from),
            SessionMode::Guest => {
                let mut items = self.items();
                for item in items.iter_mut().filter(|item| item.product_id == product_id) {
                    item.quantity = quantity;
                }
                self.persist_guest(&items).map(|()| items)
            }
        };

        self.settle(result);
    }

    /// Remove a line. Removing a product that is not in the cart succeeds.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn remove_item(&self, product_id: ProductId) {
        self.begin();

        let result = match self.resolve_mode() {
            SessionMode::Authenticated => self.remove_server_item(&product_id).await,
            SessionMode::Guest => {
                let mut items = self.items();
                items.retain(|item| item.product_id != product_id);
                self.persist_guest(&items).map(|()| items)
            }
        };

        self.settle(result);
    }

    /// Set a line's quantity, coalescing rapid edits.
    ///
    /// Guest: same as [`update_quantity`](Self::update_quantity).
    ///
    /// Authenticated: the new quantity is published immediately and a commit
    /// is scheduled after the debounce window, replacing any commit pending
    /// for the same product. On commit failure the product's quantity is
    /// restored to its value just before this edit, unless a newer edit of
    /// the same product is still unsettled.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn debounced_update_quantity(&self, product_id: ProductId, quantity: u32) {
        if self.resolve_mode() == SessionMode::Guest {
            self.update_quantity(product_id, quantity).await;
            return;
        }

        let quantity_before = self.inner.state.borrow().quantity_of(&product_id);
        self.inner.state.send_modify(|state| {
            for item in state.items.iter_mut().filter(|item| item.product_id == product_id) {
                item.quantity = quantity;
            }
            state.error = None;
        });

        let superseded = self
            .inner
            .lanes
            .supersede(&product_id, quantity, quantity_before, |generation| {
                let engine = self.clone();
                let product_id = product_id.clone();
                tokio::spawn(async move {
                    engine
                        .commit_quantity(product_id, quantity, generation)
                        .await;
                })
                .abort_handle()
            });

        debug!(quantity, superseded, "Scheduled quantity commit");
    }

    /// Merge the guest cart into the signed-in user's server cart.
    ///
    /// Called once authentication succeeds. The guest cart is taken out of
    /// local persistence before merging; if an add fails, the lines that were
    /// not confirmed are written back so a retry only re-sends those.
    ///
    /// An empty or corrupt guest cart is discarded without merging; the
    /// server cart is still fetched so the published items match the account.
    #[instrument(skip(self))]
    pub async fn sync_cart_on_login(&self) {
        self.begin();

        if self.resolve_mode() == SessionMode::Guest {
            warn!("Login sync requested without a live credential, keeping guest cart");
            let lines = load_guest_lines(self.inner.local.as_ref());
            let items = enrich(self.inner.lookup.as_ref(), lines).await;
            self.settle(Ok(items));
            return;
        }

        let raw = match self.inner.local.read() {
            Ok(raw) => raw.filter(|raw| !raw.trim().is_empty()),
            Err(e) => {
                warn!(error = %e, "Failed to read guest cart for merge, skipping merge");
                None
            }
        };

        let Some(raw) = raw else {
            debug!("No guest cart to merge");
            let result = self.fetch_server_cart().await;
            self.settle(result);
            return;
        };

        let lines: Vec<CartLine> = match parse_guest_lines(&raw) {
            Some(lines) if !lines.is_empty() => lines
                .into_iter()
                .filter(|line| !line.product_id.is_blank())
                .collect(),
            _ => {
                warn!("Guest cart is empty or corrupt, discarding it");
                self.clear_local();
                let result = self.fetch_server_cart().await;
                self.settle(result);
                return;
            }
        };

        let result = self.merge_guest_lines(lines).await;
        self.settle(result);
    }

    /// Empty the cart view and the guest cart; pending commits are cancelled.
    ///
    /// Does not touch the server cart.
    #[instrument(skip(self))]
    pub fn clear_cart(&self) {
        let cancelled = self.inner.lanes.cancel_all();
        if cancelled > 0 {
            info!(cancelled, "Cancelled pending quantity commits");
        }

        self.clear_local();
        self.inner.state.send_modify(|state| {
            state.items.clear();
            state.error = None;
            state.is_loading = false;
        });
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Resolve the session mode for this operation and publish it.
    fn resolve_mode(&self) -> SessionMode {
        let mode = self.inner.session.mode();
        let previous = self.inner.state.borrow().mode;

        if let Some(previous) = previous
            && previous != mode
        {
            info!(from = %previous, to = %mode, "Session mode changed");
        }
        if previous != Some(mode) {
            self.inner.state.send_modify(|state| state.mode = Some(mode));
        }
        mode
    }

    fn begin(&self) {
        self.inner.state.send_modify(|state| {
            state.is_loading = true;
            state.error = None;
        });
    }

    /// Publish an operation's outcome. Failures leave items untouched.
    fn settle(&self, result: Result<Vec<CartItem>>) {
        match result {
            Ok(items) => {
                debug!(count = items.len(), "Cart updated");
                self.inner.state.send_modify(|state| {
                    state.items = items;
                    state.is_loading = false;
                    state.error = None;
                });
            }
            Err(e) => {
                error!(error = %e, kind = ?e.kind(), "Cart operation failed");
                self.inner.state.send_modify(|state| {
                    state.is_loading = false;
                    state.error = Some(e);
                });
            }
        }
    }

    async fn fetch_server_cart(&self) -> Result<Vec<CartItem>> {
        let payload = self.inner.gateway.fetch_cart().await?;
        Ok(self.enrich_payload(payload).await)
    }

    async fn enrich_payload(&self, payload: CartPayload) -> Vec<CartItem> {
        enrich(self.inner.lookup.as_ref(), server_cart_lines(payload)).await
    }

    async fn remove_server_item(&self, product_id: &ProductId) -> Result<Vec<CartItem>> {
        match self.inner.gateway.remove_item(product_id).await {
            Ok(payload) => Ok(format_server_cart(payload)),
            Err(GatewayError::NotFound(_)) => {
                debug!("Item already absent from server cart");
                let payload = self.inner.gateway.fetch_cart().await?;
                Ok(format_server_cart(payload))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn add_guest_item(&self, product_id: ProductId, quantity: u32) -> Result<Vec<CartItem>> {
        let mut items = self.items();

        if let Some(item) = items.iter_mut().find(|item| item.product_id == product_id) {
            item.quantity = item.quantity.saturating_add(quantity);
        } else {
            let product = self.inner.lookup.get_product(&product_id).await?;
            items.push(CartItem::from_line(
                CartLine::new(product_id, quantity),
                product,
            ));
        }

        self.persist_guest(&items)?;
        Ok(items)
    }

    fn persist_guest(&self, items: &[CartItem]) -> Result<()> {
        let lines: Vec<CartLine> = items.iter().map(CartItem::line).collect();
        save_guest_lines(self.inner.local.as_ref(), &lines)?;
        Ok(())
    }

    fn clear_local(&self) {
        if let Err(e) = self.inner.local.clear() {
            warn!(error = %e, "Failed to clear guest cart");
        }
    }

    async fn merge_guest_lines(&self, mut lines: Vec<CartLine>) -> Result<Vec<CartItem>> {
        // Checkpoint: the guest cart leaves local persistence before any add
        self.inner.local.clear()?;

        let mut merged = 0;
        let mut failure = None;
        for line in &lines {
            match self
                .inner
                .gateway
                .add_item(&line.product_id, line.quantity)
                .await
            {
                Ok(_) => merged += 1,
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        if let Some(e) = failure {
            let remaining = lines.split_off(merged);
            warn!(
                merged,
                remaining = remaining.len(),
                error = %e,
                "Guest cart merge interrupted, keeping unmerged lines"
            );
            if let Err(save_err) = save_guest_lines(self.inner.local.as_ref(), &remaining) {
                error!(error = %save_err, "Failed to restore unmerged guest lines");
            }
            return Err(e.into());
        }

        info!(merged, "Merged guest cart into server cart");
        self.fetch_server_cart().await
    }

    /// Body of a scheduled debounced commit.
    async fn commit_quantity(&self, product_id: ProductId, quantity: u32, generation: u64) {
        tokio::time::sleep(self.inner.settings.debounce).await;

        if !self.inner.lanes.take_if_current(&product_id, generation) {
            return;
        }

        debug!(product_id = %product_id, quantity, "Committing debounced quantity");
        match self.inner.gateway.set_quantity(&product_id, quantity).await {
            Ok(payload) => {
                if !self.inner.lanes.complete(&product_id, generation) {
                    debug!(
                        product_id = %product_id,
                        "Cart cleared during commit, dropping response"
                    );
                    return;
                }
                let mut items = format_server_cart(payload);
                // edits still waiting on their own commit stay visible
                for (pending, quantity) in self.inner.lanes.pending_quantities() {
                    for item in items.iter_mut().filter(|item| item.product_id == pending) {
                        item.quantity = quantity;
                    }
                }
                self.inner.state.send_modify(|state| state.items = items);
            }
            Err(e) => {
                let e = CartError::from(e);
                let restore = match self.inner.lanes.fail(&product_id, generation) {
                    FailedCommit::Restore(previous) => {
                        error!(
                            product_id = %product_id,
                            error = %e,
                            "Quantity commit failed, rolling back"
                        );
                        previous
                    }
                    FailedCommit::HandedOff => {
                        error!(
                            product_id = %product_id,
                            error = %e,
                            "Quantity commit failed, newer edit still pending"
                        );
                        None
                    }
                    FailedCommit::Cancelled => {
                        warn!(
                            product_id = %product_id,
                            error = %e,
                            "Quantity commit failed after cart was cleared"
                        );
                        return;
                    }
                };
                self.inner.state.send_modify(|state| {
                    if let Some(previous) = restore {
                        for item in state
                            .items
                            .iter_mut()
                            .filter(|item| item.product_id == product_id)
                        {
                            item.quantity = previous;
                        }
                    }
                    state.error = Some(e);
                });
            }
        }
    }
}

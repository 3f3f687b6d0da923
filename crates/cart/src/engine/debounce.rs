//! Per-product debounce lanes for quantity commits.
//!
//! Each product has at most one pending commit. Scheduling a new commit for a
//! product supersedes (aborts) the pending one; products never debounce
//! against each other. A commit whose timer has fired claims its lane with
//! [`DebounceLanes::take_if_current`] before issuing its request, after which
//! it can no longer be aborted and stays in the lane as in flight until it
//! settles with [`DebounceLanes::complete`] or [`DebounceLanes::fail`].
//!
//! Every commit carries the quantity to restore if it fails: the product's
//! quantity just before the optimistic edit that scheduled it. A failed
//! commit only restores it when no newer commit for the product is
//! unsettled; otherwise the rollback quantity is handed to the next newer
//! commit, so the newest edit stays visible and a later failure still lands
//! on a quantity the server accepted.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::task::AbortHandle;
use vinyl_vibe_core::ProductId;

/// A scheduled, not yet fired, quantity commit.
#[derive(Debug)]
struct PendingCommit {
    generation: u64,
    quantity: u32,
    rollback: Option<u32>,
    handle: AbortHandle,
}

/// A claimed commit whose request has not settled.
#[derive(Debug, Clone, Copy)]
struct InFlightCommit {
    quantity: u32,
    rollback: Option<u32>,
}

/// Unsettled commits for one product.
#[derive(Debug, Default)]
struct Lane {
    pending: Option<PendingCommit>,
    in_flight: BTreeMap<u64, InFlightCommit>,
}

impl Lane {
    fn is_idle(&self) -> bool {
        self.pending.is_none() && self.in_flight.is_empty()
    }

    /// Target quantity of the newest unsettled commit.
    fn latest_quantity(&self) -> Option<u32> {
        self.pending.as_ref().map_or_else(
            || self.in_flight.values().next_back().map(|commit| commit.quantity),
            |pending| Some(pending.quantity),
        )
    }

    /// Give `rollback` to the first commit newer than `generation`.
    ///
    /// Returns `false` if there is none.
    fn hand_off(&mut self, generation: u64, rollback: Option<u32>) -> bool {
        if let Some((_, next)) = self
            .in_flight
            .range_mut((Bound::Excluded(generation), Bound::Unbounded))
            .next()
        {
            next.rollback = rollback;
            return true;
        }
        match &mut self.pending {
            Some(pending) => {
                pending.rollback = rollback;
                true
            }
            None => false,
        }
    }
}

/// What a failed commit should do to the published quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailedCommit {
    /// No newer edit is unsettled. Restore this quantity; `None` means the
    /// product had no line when the edit was made.
    Restore(Option<u32>),
    /// A newer commit for the product took over the rollback quantity.
    HandedOff,
    /// The lanes were cleared while the request was in flight.
    Cancelled,
}

/// Unsettled commits keyed by product.
#[derive(Debug, Default)]
pub struct DebounceLanes {
    lanes: Mutex<HashMap<ProductId, Lane>>,
    next_generation: AtomicU64,
}

impl DebounceLanes {
    /// Create empty lanes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel any pending commit for `product_id` and schedule a new one
    /// committing `quantity`.
    ///
    /// `quantity_before` is the product's quantity before the caller's
    /// optimistic update, restored if this commit fails.
    ///
    /// `schedule` receives the new lane generation and must return the
    /// spawned task's abort handle. The lane is locked while it runs, so the
    /// task cannot claim the lane before it is recorded.
    ///
    /// Returns `true` if a pending commit was superseded.
    pub fn supersede<F>(
        &self,
        product_id: &ProductId,
        quantity: u32,
        quantity_before: Option<u32>,
        schedule: F,
    ) -> bool
    where
        F: FnOnce(u64) -> AbortHandle,
    {
        let mut lanes = self.lock();
        let lane = lanes.entry(product_id.clone()).or_default();

        let superseded = match lane.pending.take() {
            Some(previous) => {
                previous.handle.abort();
                true
            }
            None => false,
        };

        let generation = self.bump_generation();
        let handle = schedule(generation);
        lane.pending = Some(PendingCommit {
            generation,
            quantity,
            rollback: quantity_before,
            handle,
        });

        superseded
    }

    /// Claim the lane for a fired commit, moving it in flight.
    ///
    /// Returns `false` if the commit was superseded in the meantime.
    pub fn take_if_current(&self, product_id: &ProductId, generation: u64) -> bool {
        let mut lanes = self.lock();
        let Some(lane) = lanes.get_mut(product_id) else {
            return false;
        };
        match lane.pending.take() {
            Some(pending) if pending.generation == generation => {
                lane.in_flight.insert(
                    generation,
                    InFlightCommit {
                        quantity: pending.quantity,
                        rollback: pending.rollback,
                    },
                );
                true
            }
            other => {
                lane.pending = other;
                false
            }
        }
    }

    /// Settle an in-flight commit that succeeded.
    ///
    /// Returns `false` if the lanes were cleared while it was in flight.
    pub fn complete(&self, product_id: &ProductId, generation: u64) -> bool {
        let mut lanes = self.lock();
        let Some(lane) = lanes.get_mut(product_id) else {
            return false;
        };
        let known = lane.in_flight.remove(&generation).is_some();
        if lane.is_idle() {
            lanes.remove(product_id);
        }
        known
    }

    /// Settle an in-flight commit that failed.
    pub fn fail(&self, product_id: &ProductId, generation: u64) -> FailedCommit {
        let mut lanes = self.lock();
        let Some(lane) = lanes.get_mut(product_id) else {
            return FailedCommit::Cancelled;
        };
        let Some(commit) = lane.in_flight.remove(&generation) else {
            return FailedCommit::Cancelled;
        };

        let outcome = if lane.hand_off(generation, commit.rollback) {
            FailedCommit::HandedOff
        } else {
            FailedCommit::Restore(commit.rollback)
        };
        if lane.is_idle() {
            lanes.remove(product_id);
        }
        outcome
    }

    /// Target quantity of the newest unsettled commit of every product.
    #[must_use]
    pub fn pending_quantities(&self) -> Vec<(ProductId, u32)> {
        self.lock()
            .iter()
            .filter_map(|(product_id, lane)| {
                lane.latest_quantity()
                    .map(|quantity| (product_id.clone(), quantity))
            })
            .collect()
    }

    /// Abort every pending commit and forget in-flight ones.
    ///
    /// Returns the number of pending commits cancelled.
    pub fn cancel_all(&self) -> usize {
        let mut lanes = self.lock();
        let mut cancelled = 0;
        for (_, lane) in lanes.drain() {
            if let Some(pending) = lane.pending {
                pending.handle.abort();
                cancelled += 1;
            }
        }
        cancelled
    }

    /// Whether a commit for `product_id` is pending or in flight.
    #[must_use]
    pub fn is_pending(&self, product_id: &ProductId) -> bool {
        self.lock().contains_key(product_id)
    }

    /// Number of products with a pending or in-flight commit.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.lock().len()
    }

    fn bump_generation(&self) -> u64 {
        self.next_generation.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ProductId, Lane>> {
        self.lanes
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

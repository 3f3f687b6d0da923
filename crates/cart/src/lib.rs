//! Vinyl Vibe cart engine library.
//!
//! Reconciles a shopping cart across two backends: a device-local store used
//! while the shopper is a guest, and the per-user server cart once they are
//! signed in. The [`engine::CartEngine`] exposes one item list regardless of
//! which backend is active.
//!
//! # Modules
//!
//! - [`engine`] - The cart engine, its published state and debounce lanes
//! - [`gateway`] - Collaborator traits for the server cart and product lookup
//! - [`api`] - HTTP implementations of the collaborator traits
//! - [`session`] - Credential storage and guest/authenticated resolution
//! - [`storage`] - Guest cart persistence
//! - [`config`] - Environment configuration
//! - [`error`] - Error types published to the UI

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod session;
pub mod storage;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use engine::{CartEngine, CartState, EngineSettings};
pub use error::{CartError, CartErrorKind};
pub use session::SessionMode;

//! Vinyl Vibe Core - Shared types library.
//!
//! This crate provides common types used across all Vinyl Vibe components:
//! - `cart` - Client-side cart engine (guest and authenticated carts)
//! - `cli` - Command-line driver for the cart engine
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients, no storage.
//! This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Product identifiers, prices, product snapshots and cart lines

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;

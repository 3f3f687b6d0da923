//! Core types for Vinyl Vibe.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod cart;
pub mod id;
pub mod price;
pub mod product;

pub use cart::{CartItem, CartLine};
pub use id::ProductId;
pub use price::{CurrencyCode, Price};
pub use product::ProductSnapshot;

//! Collaborator contracts consumed by the cart engine.
//!
//! The engine talks to the server cart through [`RemoteCartGateway`] and
//! resolves display attributes through [`ProductLookup`]. HTTP
//! implementations live in [`crate::api`]; tests substitute recording fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use vinyl_vibe_core::{ProductId, ProductSnapshot};

/// Errors that can occur when calling the shop API.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status {
        /// Response status code.
        status: u16,
        /// Truncated response body.
        body: String,
    },

    /// The credential was missing, expired or rejected.
    #[error("Not authorized")]
    Unauthorized,

    /// Resource not found.
    #[error("{0}")]
    NotFound(String),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// A request URL could not be built.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// One entry of a server cart: a nested product and its quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartPayloadEntry {
    /// The product, or `None` if the server no longer resolves it.
    #[serde(default)]
    pub product: Option<ProductSnapshot>,
    pub quantity: u32,
}

/// The server's representation of a user's cart.
///
/// Accepts `{"items": [...]}` as well as a `{"cart": {...}}` wrapper; a
/// missing or null cart is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawCartPayload")]
pub struct CartPayload {
    pub items: Vec<CartPayloadEntry>,
}

impl CartPayload {
    /// Build a payload from entries.
    #[must_use]
    pub const fn new(items: Vec<CartPayloadEntry>) -> Self {
        Self { items }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawCartPayload {
    // `items` is required here so wrapped payloads fall through to `Wrapped`
    Bare { items: Vec<CartPayloadEntry> },
    Wrapped { cart: Option<RawCartBody> },
}

#[derive(Deserialize, Default)]
struct RawCartBody {
    #[serde(default)]
    items: Vec<CartPayloadEntry>,
}

impl From<RawCartPayload> for CartPayload {
    fn from(raw: RawCartPayload) -> Self {
        let items = match raw {
            RawCartPayload::Bare { items } => items,
            RawCartPayload::Wrapped { cart } => cart.unwrap_or_default().items,
        };
        Self { items }
    }
}

/// The per-user server cart.
#[async_trait]
pub trait RemoteCartGateway: Send + Sync {
    /// Fetch the current cart.
    async fn fetch_cart(&self) -> Result<CartPayload, GatewayError>;

    /// Add `quantity` of a product; the server merges with any existing line.
    async fn add_item(
        &self,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<CartPayload, GatewayError>;

    /// Set a line's quantity.
    async fn set_quantity(
        &self,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<CartPayload, GatewayError>;

    /// Remove a line.
    async fn remove_item(&self, product_id: &ProductId) -> Result<CartPayload, GatewayError>;
}

/// Resolves product display attributes.
#[async_trait]
pub trait ProductLookup: Send + Sync {
    /// Look up a product.
    ///
    /// Fails with [`GatewayError::NotFound`] for unknown or deleted products.
    async fn get_product(&self, product_id: &ProductId) -> Result<ProductSnapshot, GatewayError>;
}

//! CLI command implementations.

pub mod cart;

use std::sync::Arc;

use thiserror::Error;
use vinyl_vibe_cart::api::{ApiClient, HttpCartGateway, HttpProductLookup};
use vinyl_vibe_cart::config::{CartConfig, ConfigError};
use vinyl_vibe_cart::session::{FileCredentialStore, SessionResolver, SystemClock};
use vinyl_vibe_cart::storage::FileCartStore;
use vinyl_vibe_cart::{CartEngine, CartError};

/// Errors that end a command with a non-zero exit code.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The token file could not be written or removed.
    #[error("Credential file error: {0}")]
    Credential(#[from] std::io::Error),

    /// The cart engine published an error.
    #[error(transparent)]
    Cart(#[from] CartError),
}

/// A cart engine wired to the file stores and the shop API.
pub struct CartSession {
    pub engine: CartEngine,
    pub credentials: FileCredentialStore,
}

impl CartSession {
    /// Build the engine from configuration.
    #[must_use]
    pub fn open(config: &CartConfig) -> Self {
        let credentials = FileCredentialStore::new(&config.token_file);
        let api = ApiClient::new(config.api_url.clone());

        let gateway = HttpCartGateway::new(api.clone(), Arc::new(credentials.clone()));
        let lookup = HttpProductLookup::with_ttl(api, config.product_cache_ttl);
        let local = FileCartStore::new(&config.cart_file);
        let session = SessionResolver::new(Arc::new(credentials.clone()), Arc::new(SystemClock));

        let engine = CartEngine::new(
            Arc::new(gateway),
            Arc::new(lookup),
            Arc::new(local),
            session,
            config.engine_settings(),
        );

        Self {
            engine,
            credentials,
        }
    }
}

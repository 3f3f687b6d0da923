//! Product lookup over HTTP with an in-memory cache.

use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use reqwest::Method;
use tracing::{debug, instrument};
use vinyl_vibe_core::{ProductId, ProductSnapshot};

use super::ApiClient;
use crate::gateway::{GatewayError, ProductLookup};

const DEFAULT_CACHE_CAPACITY: u64 = 1000;
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// [`ProductLookup`] backed by `GET products/{id}`.
///
/// Successful lookups are cached; failures are not.
#[derive(Clone)]
pub struct HttpProductLookup {
    api: ApiClient,
    cache: Cache<ProductId, ProductSnapshot>,
}

impl HttpProductLookup {
    /// Create a lookup with the default cache (1000 entries, 5 minutes).
    #[must_use]
    pub fn new(api: ApiClient) -> Self {
        Self::with_ttl(api, DEFAULT_CACHE_TTL)
    }

    /// Create a lookup whose cache entries live for `ttl`.
    #[must_use]
    pub fn with_ttl(api: ApiClient, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(DEFAULT_CACHE_CAPACITY)
            .time_to_live(ttl)
            .build();
        Self { api, cache }
    }

    async fn fetch(&self, product_id: &ProductId) -> Result<ProductSnapshot, GatewayError> {
        let url = self.api.url(&["products", product_id.as_str()])?;
        let request = self.api.request(Method::GET, url);
        self.api
            .send(request, &format!("product {product_id}"))
            .await
    }
}

#[async_trait]
impl ProductLookup for HttpProductLookup {
    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn get_product(&self, product_id: &ProductId) -> Result<ProductSnapshot, GatewayError> {
        if let Some(product) = self.cache.get(product_id).await {
            debug!("Product cache hit");
            return Ok(product);
        }

        let product = self.fetch(product_id).await?;
        self.cache.insert(product_id.clone(), product.clone()).await;
        Ok(product)
    }
}

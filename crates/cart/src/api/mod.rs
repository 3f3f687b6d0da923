//! HTTP clients for the shop REST API.
//!
//! # Architecture
//!
//! - `reqwest` with JSON bodies against a configurable base URL
//! - Cart requests authenticate with the stored bearer token
//! - Product lookups are cached in memory via `moka` (5 minute TTL)
//!
//! # Endpoints
//!
//! | Operation | Request |
//! |-----------|---------|
//! | fetch cart | `GET cart` |
//! | add item | `POST cart/items` `{"productId", "quantity"}` |
//! | set quantity | `PATCH cart/items/{productId}` `{"quantity"}` |
//! | remove item | `DELETE cart/items/{productId}` |
//! | product | `GET products/{productId}` |

mod cart;
mod catalog;

pub use cart::HttpCartGateway;
pub use catalog::HttpProductLookup;

use std::sync::Arc;

use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{error, instrument};
use url::Url;

use crate::gateway::GatewayError;

/// Maximum number of response body characters kept in error messages.
const ERROR_BODY_LIMIT: usize = 200;

/// Shared HTTP plumbing for the shop API.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a client for the API rooted at `base_url`.
    ///
    /// `base_url` should end with `/`; [`CartConfig`](crate::config::CartConfig)
    /// normalizes it that way.
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Create a client reusing an existing `reqwest::Client`.
    #[must_use]
    pub fn with_client(client: reqwest::Client, base_url: Url) -> Self {
        Self {
            inner: Arc::new(ApiClientInner { client, base_url }),
        }
    }

    /// The API base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Resolve a path relative to the base URL, percent-encoding each segment.
    fn url(&self, segments: &[&str]) -> Result<Url, GatewayError> {
        let mut url = self.inner.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| GatewayError::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: reqwest::Method, url: Url) -> RequestBuilder {
        self.inner
            .client
            .request(method, url)
            .header("X-Request-Id", uuid::Uuid::new_v4().to_string())
    }

    /// Send a request and decode a JSON response.
    #[instrument(skip(self, request), fields(status = tracing::field::Empty))]
    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        resource: &str,
    ) -> Result<T, GatewayError> {
        let response = request.send().await?;
        let status = response.status();
        tracing::Span::current().record("status", status.as_u16());

        // Get response body as text first for better error diagnostics
        let body = response.text().await?;

        match status {
            s if s.is_success() => {}
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(GatewayError::Unauthorized);
            }
            StatusCode::NOT_FOUND => {
                return Err(GatewayError::NotFound(format!("{resource} not found")));
            }
            _ => {
                error!(
                    status = %status,
                    body = %body.chars().take(500).collect::<String>(),
                    "Shop API returned non-success status"
                );
                return Err(GatewayError::Status {
                    status: status.as_u16(),
                    body: body.chars().take(ERROR_BODY_LIMIT).collect(),
                });
            }
        }

        serde_json::from_str(&body).map_err(|e| {
            error!(
                error = %e,
                body = %body.chars().take(500).collect::<String>(),
                "Failed to parse shop API response"
            );
            GatewayError::Parse(e)
        })
    }
}

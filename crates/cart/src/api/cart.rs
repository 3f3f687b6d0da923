//! Server cart over HTTP.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use secrecy::ExposeSecret;
use serde::Serialize;
use tracing::instrument;
use vinyl_vibe_core::ProductId;

use super::ApiClient;
use crate::gateway::{CartPayload, GatewayError, RemoteCartGateway};
use crate::session::CredentialStore;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AddItemBody<'a> {
    product_id: &'a ProductId,
    quantity: u32,
}

#[derive(Serialize)]
struct SetQuantityBody {
    quantity: u32,
}

/// [`RemoteCartGateway`] backed by the shop REST API.
///
/// Every request carries the credential store's current token; the server
/// identifies the cart by the token's user.
#[derive(Clone)]
pub struct HttpCartGateway {
    api: ApiClient,
    credentials: Arc<dyn CredentialStore>,
}

impl HttpCartGateway {
    /// Create a gateway using `credentials` for bearer authentication.
    #[must_use]
    pub fn new(api: ApiClient, credentials: Arc<dyn CredentialStore>) -> Self {
        Self { api, credentials }
    }

    fn authorized(
        &self,
        method: Method,
        segments: &[&str],
    ) -> Result<reqwest::RequestBuilder, GatewayError> {
        let token = self.credentials.get().ok_or(GatewayError::Unauthorized)?;
        let url = self.api.url(segments)?;
        Ok(self
            .api
            .request(method, url)
            .bearer_auth(token.expose_secret()))
    }
}

#[async_trait]
impl RemoteCartGateway for HttpCartGateway {
    #[instrument(skip(self))]
    async fn fetch_cart(&self) -> Result<CartPayload, GatewayError> {
        let request = self.authorized(Method::GET, &["cart"])?;
        self.api.send(request, "cart").await
    }

    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn add_item(
        &self,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<CartPayload, GatewayError> {
        let request = self
            .authorized(Method::POST, &["cart", "items"])?
            .json(&AddItemBody {
                product_id,
                quantity,
            });
        self.api
            .send(request, &format!("product {product_id}"))
            .await
    }

    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn set_quantity(
        &self,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<CartPayload, GatewayError> {
        let request = self
            .authorized(Method::PATCH, &["cart", "items", product_id.as_str()])?
            .json(&SetQuantityBody { quantity });
        self.api
            .send(request, &format!("cart item {product_id}"))
            .await
    }

    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn remove_item(&self, product_id: &ProductId) -> Result<CartPayload, GatewayError> {
        let request = self.authorized(Method::DELETE, &["cart", "items", product_id.as_str()])?;
        self.api
            .send(request, &format!("cart item {product_id}"))
            .await
    }
}

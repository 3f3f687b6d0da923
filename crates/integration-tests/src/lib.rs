//! Integration tests for the Vinyl Vibe cart engine.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p vinyl-vibe-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `http_gateway` - Engine against the HTTP clients and a mock shop API
//! - `cart_engine` - Engine behaviour against recording fakes
//! - `cart_properties` - Property tests over arbitrary add sequences
//!
//! The mock shop in this crate serves the same REST surface as the real
//! shop API: a product endpoint and a per-user cart keyed by bearer token.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use url::Url;
use vinyl_vibe_core::{CartLine, ProductId, ProductSnapshot};

type Reply = Result<Json<Value>, (StatusCode, String)>;

#[derive(Debug, Default)]
struct ShopState {
    products: HashMap<ProductId, ProductSnapshot>,
    carts: HashMap<String, Vec<CartLine>>,
    requests: Vec<String>,
    revoked: HashSet<String>,
    unavailable: bool,
}

/// In-memory shop API.
#[derive(Debug, Clone, Default)]
pub struct MockShop {
    state: Arc<Mutex<ShopState>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddItemBody {
    product_id: ProductId,
    quantity: u32,
}

#[derive(Deserialize)]
struct SetQuantityBody {
    quantity: u32,
}

impl MockShop {
    /// Create a shop selling `products`.
    #[must_use]
    pub fn with_products(products: impl IntoIterator<Item = ProductSnapshot>) -> Self {
        let shop = Self::default();
        {
            let mut state = shop.lock();
            for product in products {
                state.products.insert(product.id.clone(), product);
            }
        }
        shop
    }

    /// Put a line in `token`'s cart.
    pub fn seed_cart(&self, token: &str, product_id: &str, quantity: u32) {
        self.lock()
            .carts
            .entry(token.to_string())
            .or_default()
            .push(CartLine::new(product_id, quantity));
    }

    /// Lines in `token`'s cart.
    #[must_use]
    pub fn cart_for(&self, token: &str) -> Vec<CartLine> {
        self.lock().carts.get(token).cloned().unwrap_or_default()
    }

    /// `METHOD path` of every request received, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<String> {
        self.lock().requests.clone()
    }

    /// Reject `token` with 401 from now on.
    pub fn revoke(&self, token: &str) {
        self.lock().revoked.insert(token.to_string());
    }

    /// Answer every request with 503 while set.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    /// Serve the shop on an ephemeral local port.
    ///
    /// Returns the API base URL, ending in `/`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the listener cannot be bound.
    pub async fn serve(&self) -> std::io::Result<Url> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let app = self.router();

        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Url::parse(&format!("http://{addr}/api/"))
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))
    }

    fn router(&self) -> Router {
        let api = Router::new()
            .route("/products/{id}", get(product))
            .route("/cart", get(fetch_cart))
            .route("/cart/items", post(add_item))
            .route("/cart/items/{id}", patch(set_quantity).delete(remove_item))
            .with_state(self.clone());

        Router::new().nest("/api", api)
    }

    fn lock(&self) -> MutexGuard<'_, ShopState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the request and reject it if the shop is down.
    fn receive(&self, request: String) -> Result<MutexGuard<'_, ShopState>, (StatusCode, String)> {
        let mut state = self.lock();
        state.requests.push(request);
        if state.unavailable {
            return Err((
                StatusCode::SERVICE_UNAVAILABLE,
                "shop unavailable".to_string(),
            ));
        }
        Ok(state)
    }
}

fn bearer(state: &ShopState, headers: &HeaderMap) -> Result<String, (StatusCode, String)> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .filter(|token| !token.is_empty())
        .ok_or((StatusCode::UNAUTHORIZED, "missing bearer token".to_string()))?;
    if state.revoked.contains(token) {
        return Err((StatusCode::UNAUTHORIZED, "token revoked".to_string()));
    }
    Ok(token.to_string())
}

fn cart_json(state: &ShopState, token: &str) -> Json<Value> {
    let items: Vec<Value> = state
        .carts
        .get(token)
        .map(Vec::as_slice)
        .unwrap_or_default()
        .iter()
        .map(|line| {
            json!({
                "product": state.products.get(&line.product_id),
                "quantity": line.quantity,
            })
        })
        .collect();
    Json(json!({ "cart": { "items": items } }))
}

fn not_found(what: &str) -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, format!("{what} not found"))
}

async fn product(State(shop): State<MockShop>, Path(id): Path<ProductId>) -> Reply {
    let state = shop.receive(format!("GET /products/{id}"))?;
    state
        .products
        .get(&id)
        .map(|product| Json(json!(product)))
        .ok_or_else(|| not_found("product"))
}

async fn fetch_cart(State(shop): State<MockShop>, headers: HeaderMap) -> Reply {
    let state = shop.receive("GET /cart".to_string())?;
    let token = bearer(&state, &headers)?;
    Ok(cart_json(&state, &token))
}

async fn add_item(
    State(shop): State<MockShop>,
    headers: HeaderMap,
    Json(body): Json<AddItemBody>,
) -> Reply {
    let mut state = shop.receive("POST /cart/items".to_string())?;
    let token = bearer(&state, &headers)?;
    if !state.products.contains_key(&body.product_id) {
        return Err(not_found("product"));
    }

    let cart = state.carts.entry(token.clone()).or_default();
    match cart
        .iter()
        .position(|line| line.product_id == body.product_id)
        .and_then(|position| cart.get_mut(position))
    {
        Some(line) => line.quantity = line.quantity.saturating_add(body.quantity),
        None => cart.push(CartLine::new(body.product_id, body.quantity)),
    }
    Ok(cart_json(&state, &token))
}

async fn set_quantity(
    State(shop): State<MockShop>,
    headers: HeaderMap,
    Path(id): Path<ProductId>,
    Json(body): Json<SetQuantityBody>,
) -> Reply {
    let mut state = shop.receive(format!("PATCH /cart/items/{id}"))?;
    let token = bearer(&state, &headers)?;

    let line = state
        .carts
        .get_mut(&token)
        .and_then(|cart| cart.iter_mut().find(|line| line.product_id == id))
        .ok_or_else(|| not_found("cart item"))?;
    line.quantity = body.quantity;
    Ok(cart_json(&state, &token))
}

async fn remove_item(
    State(shop): State<MockShop>,
    headers: HeaderMap,
    Path(id): Path<ProductId>,
) -> Reply {
    let mut state = shop.receive(format!("DELETE /cart/items/{id}"))?;
    let token = bearer(&state, &headers)?;

    let cart = state
        .carts
        .get_mut(&token)
        .ok_or_else(|| not_found("cart item"))?;
    let before = cart.len();
    cart.retain(|line| line.product_id != id);
    if cart.len() == before {
        return Err(not_found("cart item"));
    }
    Ok(cart_json(&state, &token))
}

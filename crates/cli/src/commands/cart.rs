//! Cart commands.
//!
//! Every command loads the cart from the active backend first, runs one
//! engine operation and prints the resulting cart. A published engine error
//! fails the command.
//!
//! # Environment Variables
//!
//! - `VINYL_VIBE_API_URL` - Base URL of the shop API
//! - `VINYL_VIBE_CART_FILE` - Guest cart file
//! - `VINYL_VIBE_TOKEN_FILE` - Access token file

use vinyl_vibe_cart::CartState;
use vinyl_vibe_core::ProductId;

use super::{CartSession, CommandError};

/// Print the cart.
pub async fn show(session: &CartSession) -> Result<(), CommandError> {
    session.engine.init_cart().await;
    finish(session)
}

/// Add `quantity` (default 1) of a product.
pub async fn add(
    session: &CartSession,
    product_id: String,
    quantity: Option<u32>,
) -> Result<(), CommandError> {
    load(session).await?;
    session
        .engine
        .add_item(ProductId::new(product_id), quantity)
        .await;
    finish(session)
}

/// Set a line's quantity.
pub async fn update(
    session: &CartSession,
    product_id: String,
    quantity: u32,
) -> Result<(), CommandError> {
    load(session).await?;
    session
        .engine
        .update_quantity(ProductId::new(product_id), quantity)
        .await;
    finish(session)
}

/// Remove a line.
pub async fn remove(session: &CartSession, product_id: String) -> Result<(), CommandError> {
    load(session).await?;
    session.engine.remove_item(ProductId::new(product_id)).await;
    finish(session)
}

/// Store the token and merge the guest cart into the account cart.
pub async fn login(session: &CartSession, token: &str) -> Result<(), CommandError> {
    session.credentials.store(token)?;
    tracing::info!("Stored access token");

    session.engine.sync_cart_on_login().await;
    finish(session)
}

/// Drop the token and the local cart view.
pub async fn logout(session: &CartSession) -> Result<(), CommandError> {
    session.credentials.remove()?;
    session.engine.clear_cart();
    tracing::info!("Signed out");

    session.engine.init_cart().await;
    finish(session)
}

/// Empty the local cart.
pub fn clear(session: &CartSession) -> Result<(), CommandError> {
    session.engine.clear_cart();
    finish(session)
}

/// Load the cart, failing if the active backend is unreachable.
async fn load(session: &CartSession) -> Result<(), CommandError> {
    session.engine.init_cart().await;
    match session.engine.state().error {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

fn finish(session: &CartSession) -> Result<(), CommandError> {
    let state = session.engine.state();
    print_cart(&state);
    match state.error {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

#[allow(clippy::print_stdout)]
fn print_cart(state: &CartState) {
    let mode = state
        .mode
        .map_or_else(|| "unknown".to_string(), |mode| mode.to_string());

    if state.is_empty() {
        println!("Cart is empty ({mode})");
        return;
    }

    println!("Cart ({mode}):");
    for item in &state.items {
        println!(
            "  {:>3} x {:<40} {:>10}",
            item.quantity,
            item.product.name,
            vinyl_vibe_core::Price::usd(item.line_total()).display()
        );
    }
    println!("  {} items, subtotal {}", state.item_count(), state.subtotal());
}

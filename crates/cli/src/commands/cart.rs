//! Cart commands.

use sitebuilder_core::{CustomerId, SessionId, StoreId, VariantId};
use tracing::info;

use super::{CommandError, connect, print_json};

/// Print a session's cart.
///
/// # Errors
///
/// Returns `CommandError` if the engine cannot connect or the query fails.
pub async fn show(store: i64, session: SessionId) -> Result<(), CommandError> {
    let engine = connect().await?;
    let cart = engine.carts().get_cart(StoreId::new(store), session).await?;
    print_json(&cart)
}

/// Add a variant to a session's cart, then print the cart.
///
/// # Errors
///
/// Returns `CommandError` if the engine rejects the add (bad session, variant
/// or quantity, or not enough stock) or a query fails.
pub async fn add(
    store: i64,
    session: SessionId,
    variant: i64,
    quantity: i32,
) -> Result<(), CommandError> {
    let engine = connect().await?;
    let store_id = StoreId::new(store);
    engine
        .carts()
        .add_item(store_id, session, VariantId::new(variant), quantity)
        .await?;

    let cart = engine.carts().get_cart(store_id, session).await?;
    print_json(&cart)
}

/// Merge a session's cart into a customer's cart and print the outcome.
///
/// # Errors
///
/// Returns `CommandError` if the customer or session is invalid or a query
/// fails.
pub async fn merge(store: i64, customer: i64, session: SessionId) -> Result<(), CommandError> {
    let engine = connect().await?;
    let outcome = engine
        .carts()
        .merge_on_login(StoreId::new(store), CustomerId::new(customer), session)
        .await?;
    info!(outcome = ?outcome, "Cart merge finished");
    print_json(&outcome)
}

//! Carts and cart items.
//!
//! Carts are addressed by store and [`CartOwner`]. The owner is stored as a
//! nullable `(session_id, customer_id)` pair with exactly one side set.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sitebuilder_core::{
    CartId, CartItemId, CartOwner, CustomerId, ProductId, SessionId, StoreId, VariantId,
};
use sqlx::PgExecutor;

use super::RepositoryError;
use crate::models::{Cart, CartItemView};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct CartRow {
    cart_id: CartId,
    store_id: StoreId,
    session_id: Option<SessionId>,
    customer_id: Option<CustomerId>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CartRow> for Cart {
    type Error = RepositoryError;

    fn try_from(row: CartRow) -> Result<Self, Self::Error> {
        let owner = CartOwner::from_columns(row.session_id, row.customer_id).ok_or_else(|| {
            RepositoryError::DataCorruption(format!("cart {} has no single owner", row.cart_id))
        })?;

        Ok(Self {
            id: row.cart_id,
            store_id: row.store_id,
            owner,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CartItemRow {
    cart_item_id: CartItemId,
    variant_id: VariantId,
    product_id: ProductId,
    product_name: String,
    sku: String,
    quantity: i32,
    unit_price: Decimal,
    image_url: Option<String>,
}

impl From<CartItemRow> for CartItemView {
    fn from(row: CartItemRow) -> Self {
        Self {
            id: row.cart_item_id,
            variant_id: row.variant_id,
            product_id: row.product_id,
            product_name: row.product_name,
            sku: row.sku,
            quantity: row.quantity,
            unit_price: row.unit_price,
            line_total: row.unit_price * Decimal::from(row.quantity),
            image_url: row.image_url,
        }
    }
}

const CART_COLUMNS: &str = "cart_id, store_id, session_id, customer_id, created_at, updated_at";

fn owner_predicate(owner: CartOwner) -> &'static str {
    match owner {
        CartOwner::Session(_) => "session_id = $2",
        CartOwner::Customer(_) => "customer_id = $2",
    }
}

async fn fetch_cart<'e, E>(
    executor: E,
    store_id: StoreId,
    owner: CartOwner,
    lock: bool,
) -> Result<Option<Cart>, RepositoryError>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        "SELECT {CART_COLUMNS} FROM carts WHERE store_id = $1 AND {}{}",
        owner_predicate(owner),
        if lock { " FOR UPDATE" } else { "" }
    );
    let query = sqlx::query_as::<_, CartRow>(&sql).bind(store_id);
    let query = match owner {
        CartOwner::Session(session_id) => query.bind(session_id),
        CartOwner::Customer(customer_id) => query.bind(customer_id),
    };

    query.fetch_optional(executor).await?.map(Cart::try_from).transpose()
}

// =============================================================================
// Carts
// =============================================================================

/// Find the owner's cart without locking it.
///
/// # Errors
///
/// Returns error if the database query fails or the row is corrupt.
pub async fn find_cart<'e, E>(
    executor: E,
    store_id: StoreId,
    owner: CartOwner,
) -> Result<Option<Cart>, RepositoryError>
where
    E: PgExecutor<'e>,
{
    fetch_cart(executor, store_id, owner, false).await
}

/// Find and lock the owner's cart.
///
/// # Errors
///
/// Returns error if the database query fails or the row is corrupt.
pub async fn lock_cart<'e, E>(
    executor: E,
    store_id: StoreId,
    owner: CartOwner,
) -> Result<Option<Cart>, RepositoryError>
where
    E: PgExecutor<'e>,
{
    fetch_cart(executor, store_id, owner, true).await
}

/// Create a cart for the owner unless one exists.
///
/// Returns `true` when a row was inserted. Concurrent creators race on the
/// per-owner unique index; the loser inserts nothing.
///
/// # Errors
///
/// Returns error if the database insert fails.
pub async fn insert_cart_if_absent<'e, E>(
    executor: E,
    store_id: StoreId,
    owner: CartOwner,
) -> Result<bool, RepositoryError>
where
    E: PgExecutor<'e>,
{
    let (session_id, customer_id) = owner.to_columns();
    let result = sqlx::query(
        r"
        INSERT INTO carts (store_id, session_id, customer_id)
        VALUES ($1, $2, $3)
        ON CONFLICT DO NOTHING
        ",
    )
    .bind(store_id)
    .bind(session_id)
    .bind(customer_id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Lock the session's and the customer's carts, in cart ID order.
///
/// # Errors
///
/// Returns error if the database query fails or a row is corrupt.
pub async fn lock_carts_for_merge<'e, E>(
    executor: E,
    store_id: StoreId,
    session_id: SessionId,
    customer_id: CustomerId,
) -> Result<Vec<Cart>, RepositoryError>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        "SELECT {CART_COLUMNS} FROM carts \
         WHERE store_id = $1 AND (session_id = $2 OR customer_id = $3) \
         ORDER BY cart_id \
         FOR UPDATE"
    );
    let rows = sqlx::query_as::<_, CartRow>(&sql)
        .bind(store_id)
        .bind(session_id)
        .bind(customer_id)
        .fetch_all(executor)
        .await?;

    rows.into_iter().map(Cart::try_from).collect()
}

/// Hand a session cart over to a customer in place.
///
/// # Errors
///
/// Returns `NotFound` if the cart row does not exist.
pub async fn reassign_to_customer<'e, E>(
    executor: E,
    cart_id: CartId,
    customer_id: CustomerId,
) -> Result<(), RepositoryError>
where
    E: PgExecutor<'e>,
{
    let result = sqlx::query(
        r"
        UPDATE carts
        SET session_id = NULL, customer_id = $2, updated_at = NOW()
        WHERE cart_id = $1
        ",
    )
    .bind(cart_id)
    .bind(customer_id)
    .execute(executor)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound);
    }
    Ok(())
}

/// Bump the cart's `updated_at`.
///
/// # Errors
///
/// Returns error if the database update fails.
pub async fn touch_cart<'e, E>(executor: E, cart_id: CartId) -> Result<(), RepositoryError>
where
    E: PgExecutor<'e>,
{
    sqlx::query("UPDATE carts SET updated_at = NOW() WHERE cart_id = $1")
        .bind(cart_id)
        .execute(executor)
        .await?;

    Ok(())
}

/// Delete a cart and, by cascade, its items.
///
/// # Errors
///
/// Returns error if the database delete fails.
pub async fn delete_cart<'e, E>(executor: E, cart_id: CartId) -> Result<(), RepositoryError>
where
    E: PgExecutor<'e>,
{
    sqlx::query("DELETE FROM carts WHERE cart_id = $1")
        .bind(cart_id)
        .execute(executor)
        .await?;

    Ok(())
}

// =============================================================================
// Items
// =============================================================================

/// Add `quantity` of a variant to the cart.
///
/// A new line takes `unit_price` as its price snapshot; an existing line keeps
/// its snapshot and only grows in quantity.
///
/// # Errors
///
/// Returns error if the database upsert fails.
pub async fn upsert_item<'e, E>(
    executor: E,
    cart_id: CartId,
    variant_id: VariantId,
    quantity: i32,
    unit_price: Decimal,
) -> Result<(), RepositoryError>
where
    E: PgExecutor<'e>,
{
    sqlx::query(
        r"
        INSERT INTO cart_items (cart_id, variant_id, quantity, unit_price)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (cart_id, variant_id)
        DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity
        ",
    )
    .bind(cart_id)
    .bind(variant_id)
    .bind(quantity)
    .bind(unit_price)
    .execute(executor)
    .await?;

    Ok(())
}

/// Fold every item of `from` into `into`.
///
/// Overlapping variants add quantities and keep the target's price snapshot.
/// Returns the number of source items merged.
///
/// # Errors
///
/// Returns error if the database insert fails.
pub async fn merge_items<'e, E>(
    executor: E,
    from: CartId,
    into: CartId,
) -> Result<u64, RepositoryError>
where
    E: PgExecutor<'e>,
{
    let result = sqlx::query(
        r"
        INSERT INTO cart_items (cart_id, variant_id, quantity, unit_price)
        SELECT $2, variant_id, quantity, unit_price
        FROM cart_items
        WHERE cart_id = $1
        ON CONFLICT (cart_id, variant_id)
        DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity
        ",
    )
    .bind(from)
    .bind(into)
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

/// List a cart's items in the order they were first added.
///
/// # Errors
///
/// Returns error if the database query fails.
pub async fn list_items<'e, E>(
    executor: E,
    cart_id: CartId,
) -> Result<Vec<CartItemView>, RepositoryError>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query_as::<_, CartItemRow>(
        r"
        SELECT
            ci.cart_item_id, ci.variant_id, p.product_id, p.name AS product_name,
            v.sku, ci.quantity, ci.unit_price, v.primary_image_url AS image_url
        FROM cart_items ci
        JOIN product_variants v ON v.variant_id = ci.variant_id
        JOIN products p ON p.product_id = v.product_id
        WHERE ci.cart_id = $1
        ORDER BY ci.cart_item_id
        ",
    )
    .bind(cart_id)
    .fetch_all(executor)
    .await?;

    Ok(rows.into_iter().map(CartItemView::from).collect())
}

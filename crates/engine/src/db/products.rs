//! Product rows.
//!
//! `lock_*` functions take `FOR UPDATE` row locks and must be called with a
//! transaction as the executor.

use sitebuilder_core::{CategoryId, ProductId, StoreId, VariantId};
use sqlx::PgExecutor;

use super::RepositoryError;
use crate::models::Product;

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    product_id: ProductId,
    store_id: StoreId,
    category_id: CategoryId,
    name: String,
    slug: Option<String>,
    description: Option<String>,
    brand: Option<String>,
    stock_quantity: i32,
    default_variant_id: Option<VariantId>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.product_id,
            store_id: row.store_id,
            category_id: row.category_id,
            name: row.name,
            slug: row.slug,
            description: row.description,
            brand: row.brand,
            stock_quantity: row.stock_quantity,
            default_variant: row.default_variant_id,
        }
    }
}

/// Identity and descriptive fields of a product to insert.
#[derive(Debug, Clone, Copy)]
pub struct ProductIdentity<'a> {
    pub store_id: StoreId,
    pub category_id: CategoryId,
    pub name: &'a str,
    pub brand: Option<&'a str>,
    pub slug: Option<&'a str>,
    pub description: Option<&'a str>,
}

const PRODUCT_COLUMNS: &str = "product_id, store_id, category_id, name, slug, description, \
                               brand, stock_quantity, default_variant_id";

// =============================================================================
// Queries
// =============================================================================

/// Get a product of the store.
///
/// # Errors
///
/// Returns error if the database query fails.
pub async fn find_product<'e, E>(
    executor: E,
    store_id: StoreId,
    product_id: ProductId,
) -> Result<Option<Product>, RepositoryError>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE product_id = $1 AND store_id = $2"
    );
    let row = sqlx::query_as::<_, ProductRow>(&sql)
        .bind(product_id)
        .bind(store_id)
        .fetch_optional(executor)
        .await?;

    Ok(row.map(Product::from))
}

/// Lock a product of the store for the rest of the transaction.
///
/// # Errors
///
/// Returns error if the database query fails.
pub async fn lock_product<'e, E>(
    executor: E,
    store_id: StoreId,
    product_id: ProductId,
) -> Result<Option<Product>, RepositoryError>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        "SELECT {PRODUCT_COLUMNS} FROM products \
         WHERE product_id = $1 AND store_id = $2 \
         FOR UPDATE"
    );
    let row = sqlx::query_as::<_, ProductRow>(&sql)
        .bind(product_id)
        .bind(store_id)
        .fetch_optional(executor)
        .await?;

    Ok(row.map(Product::from))
}

/// Insert a product unless one with the same identity already exists.
///
/// Returns `true` when a row was inserted.
///
/// # Errors
///
/// Returns error if the database insert fails.
pub async fn insert_product_if_absent<'e, E>(
    executor: E,
    identity: ProductIdentity<'_>,
) -> Result<bool, RepositoryError>
where
    E: PgExecutor<'e>,
{
    let result = sqlx::query(
        r"
        INSERT INTO products (store_id, category_id, name, brand, slug, description)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT DO NOTHING
        ",
    )
    .bind(identity.store_id)
    .bind(identity.category_id)
    .bind(identity.name)
    .bind(identity.brand)
    .bind(identity.slug)
    .bind(identity.description)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Lock the product with the given identity.
///
/// A missing brand and an empty brand are the same identity.
///
/// # Errors
///
/// Returns error if the database query fails.
pub async fn lock_product_by_identity<'e, E>(
    executor: E,
    identity: ProductIdentity<'_>,
) -> Result<Option<Product>, RepositoryError>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        "SELECT {PRODUCT_COLUMNS} FROM products \
         WHERE store_id = $1 AND category_id = $2 AND name = $3 \
           AND COALESCE(brand, '') = COALESCE($4::TEXT, '') \
         FOR UPDATE"
    );
    let row = sqlx::query_as::<_, ProductRow>(&sql)
        .bind(identity.store_id)
        .bind(identity.category_id)
        .bind(identity.name)
        .bind(identity.brand)
        .fetch_optional(executor)
        .await?;

    Ok(row.map(Product::from))
}

/// Add `delta` to the product's aggregate stock and set its default variant.
///
/// # Errors
///
/// Returns `NotFound` if the product row does not exist.
pub async fn apply_stock_delta<'e, E>(
    executor: E,
    product_id: ProductId,
    delta: i32,
    default_variant: Option<VariantId>,
) -> Result<Product, RepositoryError>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        "UPDATE products \
         SET stock_quantity = stock_quantity + $2, default_variant_id = $3, updated_at = NOW() \
         WHERE product_id = $1 \
         RETURNING {PRODUCT_COLUMNS}"
    );
    let row = sqlx::query_as::<_, ProductRow>(&sql)
        .bind(product_id)
        .bind(delta)
        .bind(default_variant)
        .fetch_optional(executor)
        .await?
        .ok_or(RepositoryError::NotFound)?;

    Ok(row.into())
}

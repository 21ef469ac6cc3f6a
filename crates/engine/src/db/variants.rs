//! Variant rows, their attribute values and images.

use rust_decimal::Decimal;
use sitebuilder_core::{AttributeHash, AttributeId, AttributeValue, ProductId, StoreId, VariantId};
use sqlx::PgExecutor;

use super::RepositoryError;
use crate::models::{Variant, VariantAttribute};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct VariantRow {
    variant_id: VariantId,
    product_id: ProductId,
    store_id: StoreId,
    sku: String,
    price: Decimal,
    stock_quantity: i32,
    attribute_hash: String,
    primary_image_url: Option<String>,
}

impl From<VariantRow> for Variant {
    fn from(row: VariantRow) -> Self {
        Self {
            id: row.variant_id,
            product_id: row.product_id,
            store_id: row.store_id,
            sku: row.sku,
            price: row.price,
            stock_quantity: row.stock_quantity,
            attribute_hash: AttributeHash::from_stored(row.attribute_hash),
            primary_image_url: row.primary_image_url,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct VariantAttributeRow {
    variant_id: VariantId,
    attribute_id: AttributeId,
    name: String,
    value: String,
}

#[derive(Debug, sqlx::FromRow)]
struct VariantImageRow {
    variant_id: VariantId,
    image_url: String,
}

/// Fields of a variant to insert.
#[derive(Debug, Clone, Copy)]
pub struct NewVariantRecord<'a> {
    pub product_id: ProductId,
    pub store_id: StoreId,
    pub sku: &'a str,
    pub price: Decimal,
    pub stock_quantity: i32,
    pub attribute_hash: &'a AttributeHash,
}

const VARIANT_COLUMNS: &str = "variant_id, product_id, store_id, sku, price, stock_quantity, \
                               attribute_hash, primary_image_url";

// =============================================================================
// Lookups
// =============================================================================

/// Find the variant of a product with the given attribute hash.
///
/// # Errors
///
/// Returns error if the database query fails.
pub async fn find_by_hash<'e, E>(
    executor: E,
    product_id: ProductId,
    hash: &AttributeHash,
) -> Result<Option<Variant>, RepositoryError>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        "SELECT {VARIANT_COLUMNS} FROM product_variants \
         WHERE product_id = $1 AND attribute_hash = $2"
    );
    let row = sqlx::query_as::<_, VariantRow>(&sql)
        .bind(product_id)
        .bind(hash.as_str())
        .fetch_optional(executor)
        .await?;

    Ok(row.map(Variant::from))
}

/// Find a variant scoped to the store.
///
/// # Errors
///
/// Returns error if the database query fails.
pub async fn find_in_store<'e, E>(
    executor: E,
    store_id: StoreId,
    variant_id: VariantId,
) -> Result<Option<Variant>, RepositoryError>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        "SELECT {VARIANT_COLUMNS} FROM product_variants \
         WHERE variant_id = $1 AND store_id = $2"
    );
    let row = sqlx::query_as::<_, VariantRow>(&sql)
        .bind(variant_id)
        .bind(store_id)
        .fetch_optional(executor)
        .await?;

    Ok(row.map(Variant::from))
}

/// Find a variant that belongs to the given product of the store.
///
/// # Errors
///
/// Returns error if the database query fails.
pub async fn find_for_product<'e, E>(
    executor: E,
    store_id: StoreId,
    product_id: ProductId,
    variant_id: VariantId,
) -> Result<Option<Variant>, RepositoryError>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        "SELECT {VARIANT_COLUMNS} FROM product_variants \
         WHERE variant_id = $1 AND product_id = $2 AND store_id = $3"
    );
    let row = sqlx::query_as::<_, VariantRow>(&sql)
        .bind(variant_id)
        .bind(product_id)
        .bind(store_id)
        .fetch_optional(executor)
        .await?;

    Ok(row.map(Variant::from))
}

/// List a product's variants, oldest first.
///
/// # Errors
///
/// Returns error if the database query fails.
pub async fn list_for_product<'e, E>(
    executor: E,
    product_id: ProductId,
) -> Result<Vec<Variant>, RepositoryError>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        "SELECT {VARIANT_COLUMNS} FROM product_variants \
         WHERE product_id = $1 ORDER BY variant_id"
    );
    let rows = sqlx::query_as::<_, VariantRow>(&sql)
        .bind(product_id)
        .fetch_all(executor)
        .await?;

    Ok(rows.into_iter().map(Variant::from).collect())
}

/// Attribute values of the given variants, with definition names.
///
/// # Errors
///
/// Returns error if the database query fails.
pub async fn list_attribute_values<'e, E>(
    executor: E,
    variant_ids: &[VariantId],
) -> Result<Vec<(VariantId, VariantAttribute)>, RepositoryError>
where
    E: PgExecutor<'e>,
{
    let ids: Vec<i64> = variant_ids.iter().map(VariantId::as_i64).collect();
    let rows = sqlx::query_as::<_, VariantAttributeRow>(
        r"
        SELECT vav.variant_id, vav.attribute_id, ca.name, vav.value
        FROM variant_attribute_values vav
        JOIN category_attributes ca ON ca.attribute_id = vav.attribute_id
        WHERE vav.variant_id = ANY($1)
        ORDER BY vav.variant_id, vav.attribute_id
        ",
    )
    .bind(ids)
    .fetch_all(executor)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            (
                row.variant_id,
                VariantAttribute {
                    attribute_id: row.attribute_id,
                    name: row.name,
                    value: row.value,
                },
            )
        })
        .collect())
}

/// Gallery image URLs of the given variants, oldest first.
///
/// # Errors
///
/// Returns error if the database query fails.
pub async fn list_gallery_images<'e, E>(
    executor: E,
    variant_ids: &[VariantId],
) -> Result<Vec<(VariantId, String)>, RepositoryError>
where
    E: PgExecutor<'e>,
{
    let ids: Vec<i64> = variant_ids.iter().map(VariantId::as_i64).collect();
    let rows = sqlx::query_as::<_, VariantImageRow>(
        r"
        SELECT variant_id, image_url
        FROM variant_images
        WHERE variant_id = ANY($1)
        ORDER BY variant_id, image_id
        ",
    )
    .bind(ids)
    .fetch_all(executor)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| (row.variant_id, row.image_url))
        .collect())
}

// =============================================================================
// Writes
// =============================================================================

/// Insert a variant row.
///
/// # Errors
///
/// Returns `Conflict` if the product already has a variant with this hash.
pub async fn insert_variant<'e, E>(
    executor: E,
    record: NewVariantRecord<'_>,
) -> Result<Variant, RepositoryError>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        "INSERT INTO product_variants \
             (product_id, store_id, sku, price, stock_quantity, attribute_hash) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING {VARIANT_COLUMNS}"
    );
    let row = sqlx::query_as::<_, VariantRow>(&sql)
        .bind(record.product_id)
        .bind(record.store_id)
        .bind(record.sku)
        .bind(record.price)
        .bind(record.stock_quantity)
        .bind(record.attribute_hash.as_str())
        .fetch_one(executor)
        .await
        .map_err(|e| {
            if e.as_database_error().is_some_and(|db| db.is_unique_violation()) {
                RepositoryError::Conflict(format!(
                    "product {} already has variant {}",
                    record.product_id, record.attribute_hash
                ))
            } else {
                RepositoryError::Database(e)
            }
        })?;

    Ok(row.into())
}

/// Insert the attribute values of a new variant in one statement.
///
/// # Errors
///
/// Returns error if the database insert fails.
pub async fn insert_attribute_values<'e, E>(
    executor: E,
    variant_id: VariantId,
    attributes: &[AttributeValue],
) -> Result<(), RepositoryError>
where
    E: PgExecutor<'e>,
{
    if attributes.is_empty() {
        return Ok(());
    }
    let (ids, values): (Vec<i64>, Vec<String>) = attributes
        .iter()
        .map(|a| (a.attribute_id.as_i64(), a.value.clone()))
        .unzip();

    sqlx::query(
        r"
        INSERT INTO variant_attribute_values (variant_id, attribute_id, value)
        SELECT $1, t.attribute_id, t.value
        FROM UNNEST($2::BIGINT[], $3::TEXT[]) AS t(attribute_id, value)
        ",
    )
    .bind(variant_id)
    .bind(ids)
    .bind(values)
    .execute(executor)
    .await?;

    Ok(())
}

/// Add `delta` to a variant's stock.
///
/// # Errors
///
/// Returns `NotFound` if the variant row does not exist.
pub async fn add_stock<'e, E>(
    executor: E,
    variant_id: VariantId,
    delta: i32,
) -> Result<Variant, RepositoryError>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        "UPDATE product_variants SET stock_quantity = stock_quantity + $2 \
         WHERE variant_id = $1 \
         RETURNING {VARIANT_COLUMNS}"
    );
    let row = sqlx::query_as::<_, VariantRow>(&sql)
        .bind(variant_id)
        .bind(delta)
        .fetch_optional(executor)
        .await?
        .ok_or(RepositoryError::NotFound)?;

    Ok(row.into())
}

/// Set the primary image only if the variant has none.
///
/// Returns `true` when the URL was stored.
///
/// # Errors
///
/// Returns error if the database update fails.
pub async fn set_primary_image_if_absent<'e, E>(
    executor: E,
    variant_id: VariantId,
    url: &str,
) -> Result<bool, RepositoryError>
where
    E: PgExecutor<'e>,
{
    let result = sqlx::query(
        r"
        UPDATE product_variants
        SET primary_image_url = $2
        WHERE variant_id = $1 AND primary_image_url IS NULL
        ",
    )
    .bind(variant_id)
    .bind(url)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Replace the variant's primary image.
///
/// # Errors
///
/// Returns `NotFound` if the variant row does not exist.
pub async fn set_primary_image<'e, E>(
    executor: E,
    variant_id: VariantId,
    url: &str,
) -> Result<(), RepositoryError>
where
    E: PgExecutor<'e>,
{
    let result = sqlx::query("UPDATE product_variants SET primary_image_url = $2 WHERE variant_id = $1")
        .bind(variant_id)
        .bind(url)
        .execute(executor)
        .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound);
    }
    Ok(())
}

/// Append an image to the variant's gallery.
///
/// # Errors
///
/// Returns error if the database insert fails.
pub async fn insert_gallery_image<'e, E>(
    executor: E,
    variant_id: VariantId,
    url: &str,
) -> Result<(), RepositoryError>
where
    E: PgExecutor<'e>,
{
    sqlx::query("INSERT INTO variant_images (variant_id, image_url) VALUES ($1, $2)")
        .bind(variant_id)
        .bind(url)
        .execute(executor)
        .await?;

    Ok(())
}

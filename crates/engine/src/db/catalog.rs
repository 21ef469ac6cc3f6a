//! Categories, attribute definitions and the product listing.

use rust_decimal::Decimal;
use sitebuilder_core::{AttributeId, CategoryId, Pagination, ProductId, StoreId, VariantId};
use sqlx::PgExecutor;

use super::RepositoryError;
use crate::models::{AttributeDefinition, Category, ProductSummary};
use crate::services::catalog::template::ListingQuery;

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct CategoryRow {
    category_id: CategoryId,
    store_id: StoreId,
    name: String,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: row.category_id,
            store_id: row.store_id,
            name: row.name,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AttributeDefinitionRow {
    attribute_id: AttributeId,
    category_id: CategoryId,
    name: String,
    data_type: String,
    is_required: bool,
}

impl From<AttributeDefinitionRow> for AttributeDefinition {
    fn from(row: AttributeDefinitionRow) -> Self {
        Self {
            id: row.attribute_id,
            category_id: row.category_id,
            name: row.name,
            data_type: row.data_type,
            is_required: row.is_required,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ListingRow {
    product_id: ProductId,
    category_id: CategoryId,
    name: String,
    slug: Option<String>,
    brand: Option<String>,
    total_stock: i32,
    variant_id: Option<VariantId>,
    item_stock: Option<i32>,
    price: Option<Decimal>,
    image_url: Option<String>,
    in_stock: bool,
}

impl From<ListingRow> for ProductSummary {
    fn from(row: ListingRow) -> Self {
        Self {
            id: row.product_id,
            category_id: row.category_id,
            name: row.name,
            slug: row.slug,
            brand: row.brand,
            total_stock: row.total_stock,
            variant_id: row.variant_id,
            item_stock: row.item_stock,
            price: row.price,
            image_url: row.image_url,
            in_stock: row.in_stock,
        }
    }
}

// =============================================================================
// Queries
// =============================================================================

/// Run an assembled listing query for one page of a store's products.
///
/// # Errors
///
/// Returns error if the query fails or a row does not decode.
pub async fn list_products<'e, E>(
    executor: E,
    store_id: StoreId,
    pagination: Pagination,
    listing: &ListingQuery,
) -> Result<Vec<ProductSummary>, RepositoryError>
where
    E: PgExecutor<'e>,
{
    let query = sqlx::query_as::<_, ListingRow>(&listing.sql)
        .bind(store_id)
        .bind(i64::from(pagination.limit()))
        .bind(pagination.offset());
    let rows = listing.bind_params(query).fetch_all(executor).await?;

    Ok(rows.into_iter().map(ProductSummary::from).collect())
}

/// List a store's categories ordered by name.
///
/// # Errors
///
/// Returns error if the database query fails.
pub async fn list_categories<'e, E>(
    executor: E,
    store_id: StoreId,
) -> Result<Vec<Category>, RepositoryError>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query_as::<_, CategoryRow>(
        r"
        SELECT category_id, store_id, name
        FROM categories
        WHERE store_id = $1
        ORDER BY name, category_id
        ",
    )
    .bind(store_id)
    .fetch_all(executor)
    .await?;

    Ok(rows.into_iter().map(Category::from).collect())
}

/// Find a category of the store by ID.
///
/// # Errors
///
/// Returns error if the database query fails.
pub async fn find_category<'e, E>(
    executor: E,
    store_id: StoreId,
    category_id: CategoryId,
) -> Result<Option<Category>, RepositoryError>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query_as::<_, CategoryRow>(
        r"
        SELECT category_id, store_id, name
        FROM categories
        WHERE category_id = $1 AND store_id = $2
        ",
    )
    .bind(category_id)
    .bind(store_id)
    .fetch_optional(executor)
    .await?;

    Ok(row.map(Category::from))
}

/// Find a category of the store by its name (case-insensitive).
///
/// # Errors
///
/// Returns error if the database query fails.
pub async fn find_category_by_name<'e, E>(
    executor: E,
    store_id: StoreId,
    name: &str,
) -> Result<Option<Category>, RepositoryError>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query_as::<_, CategoryRow>(
        r"
        SELECT category_id, store_id, name
        FROM categories
        WHERE store_id = $1 AND LOWER(name) = LOWER($2)
        ORDER BY category_id
        LIMIT 1
        ",
    )
    .bind(store_id)
    .bind(name)
    .fetch_optional(executor)
    .await?;

    Ok(row.map(Category::from))
}

/// List the attribute definitions of a store's category.
///
/// # Errors
///
/// Returns error if the database query fails.
pub async fn list_category_attributes<'e, E>(
    executor: E,
    store_id: StoreId,
    category_id: CategoryId,
) -> Result<Vec<AttributeDefinition>, RepositoryError>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query_as::<_, AttributeDefinitionRow>(
        r"
        SELECT ca.attribute_id, ca.category_id, ca.name, ca.data_type, ca.is_required
        FROM category_attributes ca
        JOIN categories c ON c.category_id = ca.category_id
        WHERE ca.category_id = $1 AND c.store_id = $2
        ORDER BY ca.attribute_id
        ",
    )
    .bind(category_id)
    .bind(store_id)
    .fetch_all(executor)
    .await?;

    Ok(rows.into_iter().map(AttributeDefinition::from).collect())
}

/// Resolve attribute names to definitions within a store.
///
/// With a category, only that category's definitions match. Without one, a
/// name shared by several categories resolves to its lowest attribute ID.
/// Names with no definition are absent from the result.
///
/// # Errors
///
/// Returns error if the database query fails.
pub async fn find_attributes_by_name<'e, E>(
    executor: E,
    store_id: StoreId,
    category_id: Option<CategoryId>,
    names: &[String],
) -> Result<Vec<AttributeDefinition>, RepositoryError>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query_as::<_, AttributeDefinitionRow>(
        r"
        SELECT DISTINCT ON (LOWER(ca.name))
            ca.attribute_id, ca.category_id, ca.name, ca.data_type, ca.is_required
        FROM category_attributes ca
        JOIN categories c ON c.category_id = ca.category_id
        WHERE c.store_id = $1
          AND ($2::BIGINT IS NULL OR ca.category_id = $2)
          AND LOWER(ca.name) = ANY (SELECT LOWER(n) FROM UNNEST($3::TEXT[]) AS n)
        ORDER BY LOWER(ca.name), ca.attribute_id
        ",
    )
    .bind(store_id)
    .bind(category_id)
    .bind(names)
    .fetch_all(executor)
    .await?;

    Ok(rows.into_iter().map(AttributeDefinition::from).collect())
}

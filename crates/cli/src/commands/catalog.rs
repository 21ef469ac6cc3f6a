//! Catalog commands: categories, product listing and catalog writes.

use std::path::PathBuf;

use rust_decimal::Decimal;
use sitebuilder_core::{AttributeId, AttributeValue, CategoryId, Pagination, ProductId, StoreId};
use sitebuilder_engine::media::ImageUpload;
use sitebuilder_engine::models::{NewProduct, ProductFilters, VariantInput};
use tracing::{info, warn};

use super::{CommandError, connect, print_json};

/// Listing filters as given on the command line.
#[derive(Debug)]
pub struct ListRequest {
    pub store: i64,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub in_stock: Option<bool>,
    /// Raw `name=v1,v2` pairs.
    pub attributes: Vec<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// Variant fields as given on the command line.
#[derive(Debug)]
pub struct VariantRequest {
    /// Raw `attribute_id=value` pairs.
    pub attributes: Vec<String>,
    pub sku: String,
    pub price: Decimal,
    pub stock: i32,
    pub image: Option<PathBuf>,
}

#[derive(Debug)]
pub struct CreateRequest {
    pub store: i64,
    pub category: i64,
    pub name: String,
    pub brand: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub variant: VariantRequest,
}

/// Print a store's categories.
///
/// # Errors
///
/// Returns `CommandError` if the engine cannot connect or the query fails.
pub async fn list_categories(store: i64) -> Result<(), CommandError> {
    let engine = connect().await?;
    let categories = engine.catalog().list_categories(StoreId::new(store)).await?;
    print_json(&categories)
}

/// Print a category's attribute definitions.
///
/// # Errors
///
/// Returns `CommandError` if the engine cannot connect or the query fails.
pub async fn list_attributes(store: i64, category: i64) -> Result<(), CommandError> {
    let engine = connect().await?;
    let attributes = engine
        .catalog()
        .list_category_attributes(StoreId::new(store), CategoryId::new(category))
        .await?;
    print_json(&attributes)
}

/// Print one page of products matching the request.
///
/// An unknown category name yields an empty page; unknown attribute names
/// are ignored.
///
/// # Errors
///
/// Returns `CommandError` if an attribute filter is malformed, the engine
/// cannot connect, or the query fails.
pub async fn list_products(request: ListRequest) -> Result<(), CommandError> {
    let requested = request
        .attributes
        .iter()
        .map(|raw| parse_attribute_filter(raw))
        .collect::<Result<Vec<_>, _>>()?;

    let engine = connect().await?;
    let store_id = StoreId::new(request.store);
    let pagination = Pagination::new(request.page, request.limit);

    let category = match &request.category {
        Some(name) => {
            let Some(id) = engine.catalog().resolve_category_id(store_id, name).await? else {
                warn!(category = %name, "Unknown category");
                return print_json(&serde_json::json!({
                    "items": [],
                    "page": pagination.page(),
                    "limit": pagination.limit(),
                }));
            };
            Some(id)
        }
        None => None,
    };

    let attributes = engine
        .catalog()
        .resolve_attribute_filters(store_id, category, &requested)
        .await?;

    let filters = ProductFilters {
        pagination,
        category,
        brand: request.brand,
        min_price: request.min_price,
        max_price: request.max_price,
        in_stock: request.in_stock,
        attributes,
    };
    let page = engine.catalog().list_products(store_id, &filters).await?;
    print_json(&page)
}

/// Print a product with its variants.
///
/// # Errors
///
/// Returns `CommandError` if the product is not in the store or the query fails.
pub async fn show_product(store: i64, product: i64) -> Result<(), CommandError> {
    let engine = connect().await?;
    let detail = engine
        .catalog()
        .get_product(StoreId::new(store), ProductId::new(product))
        .await?;
    print_json(&detail)
}

/// Create a product with its first variant and print the result.
///
/// # Errors
///
/// Returns `CommandError` if an argument is malformed, the image cannot be
/// read or is rejected, or the engine rejects the write.
pub async fn create_product(request: CreateRequest) -> Result<(), CommandError> {
    let (attributes, variant) = variant_input(request.variant).await?;

    let engine = connect().await?;
    let creation = engine
        .variants()
        .create_product(
            StoreId::new(request.store),
            NewProduct {
                category_id: CategoryId::new(request.category),
                name: request.name,
                slug: request.slug,
                description: request.description,
                brand: request.brand,
                attributes,
                variant,
            },
        )
        .await?;

    if let Some(warning) = creation.resolution.image.warning() {
        warn!(warning, "Image was not attached");
    }
    info!(
        product_id = %creation.product.id,
        variant_id = %creation.resolution.variant.id,
        product_created = creation.product_created,
        "Product written"
    );
    print_json(&creation)
}

/// Resolve an attribute set on an existing product and print the result.
///
/// # Errors
///
/// Returns `CommandError` if an argument is malformed, the image cannot be
/// read or is rejected, or the engine rejects the write.
pub async fn resolve_variant(
    store: i64,
    product: i64,
    request: VariantRequest,
) -> Result<(), CommandError> {
    let (attributes, variant) = variant_input(request).await?;

    let engine = connect().await?;
    let resolution = engine
        .variants()
        .resolve_variant(StoreId::new(store), ProductId::new(product), attributes, variant)
        .await?;

    if let Some(warning) = resolution.image.warning() {
        warn!(warning, "Image was not attached");
    }
    print_json(&resolution)
}

async fn variant_input(
    request: VariantRequest,
) -> Result<(Vec<AttributeValue>, VariantInput), CommandError> {
    let attributes = request
        .attributes
        .iter()
        .map(|raw| parse_attribute_value(raw))
        .collect::<Result<Vec<_>, _>>()?;

    let image = match request.image {
        Some(path) => {
            let bytes = tokio::fs::read(&path).await.map_err(|source| CommandError::Io {
                path: path.display().to_string(),
                source,
            })?;
            Some(ImageUpload::from_bytes(bytes).map_err(sitebuilder_engine::EngineError::from)?)
        }
        None => None,
    };

    Ok((
        attributes,
        VariantInput {
            sku: request.sku,
            price: request.price,
            stock_delta: request.stock,
            image,
        },
    ))
}

/// Parse `name=v1,v2` into an attribute name and its accepted values.
fn parse_attribute_filter(raw: &str) -> Result<(String, Vec<String>), CommandError> {
    let (name, values) = raw
        .split_once('=')
        .ok_or_else(|| CommandError::InvalidArgument(format!("expected name=values, got {raw:?}")))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(CommandError::InvalidArgument(format!(
            "missing attribute name in {raw:?}"
        )));
    }
    let values = values
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
        .collect();
    Ok((name.to_owned(), values))
}

/// Parse `attribute_id=value` into an attribute value.
fn parse_attribute_value(raw: &str) -> Result<AttributeValue, CommandError> {
    let (id, value) = raw
        .split_once('=')
        .ok_or_else(|| CommandError::InvalidArgument(format!("expected id=value, got {raw:?}")))?;
    let id: i64 = id
        .trim()
        .parse()
        .map_err(|_| CommandError::InvalidArgument(format!("invalid attribute id in {raw:?}")))?;
    Ok(AttributeValue::new(AttributeId::new(id), value))
}

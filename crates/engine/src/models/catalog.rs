//! Catalog models: categories, products, variants and listing results.

use rust_decimal::Decimal;
use serde::Serialize;
use sitebuilder_core::{
    AttributeHash, AttributeId, AttributeValue, CategoryId, Pagination, ProductId, StoreId,
    VariantId,
};

use crate::media::ImageUpload;

// =============================================================================
// Categories
// =============================================================================

/// A store category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Category {
    pub id: CategoryId,
    pub store_id: StoreId,
    pub name: String,
}

/// An attribute a product in a category may (or must) carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttributeDefinition {
    pub id: AttributeId,
    pub category_id: CategoryId,
    pub name: String,
    pub data_type: String,
    pub is_required: bool,
}

// =============================================================================
// Products and variants
// =============================================================================

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub store_id: StoreId,
    pub category_id: CategoryId,
    pub name: String,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub brand: Option<String>,
    /// Sum of the variants' stock.
    pub stock_quantity: i32,
    /// `None` until some variant has made the product sellable.
    pub default_variant: Option<VariantId>,
}

impl Product {
    /// Whether any variant currently has stock.
    #[must_use]
    pub const fn is_sellable(&self) -> bool {
        self.stock_quantity > 0
    }
}

/// A purchasable SKU of a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Variant {
    pub id: VariantId,
    pub product_id: ProductId,
    pub store_id: StoreId,
    pub sku: String,
    pub price: Decimal,
    pub stock_quantity: i32,
    pub attribute_hash: AttributeHash,
    pub primary_image_url: Option<String>,
}

/// Variant fields supplied by a catalog write.
#[derive(Debug, Clone)]
pub struct VariantInput {
    pub sku: String,
    pub price: Decimal,
    /// Stock added to the variant; a restock of an existing variant is additive.
    pub stock_delta: i32,
    /// Optional primary image, already validated.
    pub image: Option<ImageUpload>,
}

/// Input for `create_product`.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub category_id: CategoryId,
    pub name: String,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub brand: Option<String>,
    pub attributes: Vec<AttributeValue>,
    pub variant: VariantInput,
}

/// What happened to the image supplied with a variant write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum ImageOutcome {
    /// No image was supplied.
    NotProvided,
    /// The image was uploaded and is now the primary image.
    Attached(String),
    /// The variant already had a primary image; nothing was uploaded.
    KeptExisting,
    /// Upload or persist failed. The variant write itself succeeded.
    Failed(String),
}

impl ImageOutcome {
    /// Warning text for callers, if the image step failed.
    #[must_use]
    pub fn warning(&self) -> Option<&str> {
        match self {
            Self::Failed(message) => Some(message),
            _ => None,
        }
    }
}

/// Result of resolving an attribute set to a variant.
#[derive(Debug, Clone, Serialize)]
pub struct VariantResolution {
    pub variant: Variant,
    /// `true` when a new variant row was inserted, `false` on restock.
    pub created: bool,
    pub image: ImageOutcome,
}

/// Result of `create_product`.
#[derive(Debug, Clone, Serialize)]
pub struct ProductCreation {
    pub product: Product,
    /// `false` when an existing product with the same identity was reused.
    pub product_created: bool,
    pub resolution: VariantResolution,
}

/// One attribute of a variant, with its definition name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariantAttribute {
    pub attribute_id: AttributeId,
    pub name: String,
    pub value: String,
}

/// A variant with its attributes and gallery images.
#[derive(Debug, Clone, Serialize)]
pub struct VariantDetail {
    #[serde(flatten)]
    pub variant: Variant,
    pub attributes: Vec<VariantAttribute>,
    pub images: Vec<String>,
}

/// A product with its default variant and the remaining variants.
#[derive(Debug, Clone, Serialize)]
pub struct ProductDetail {
    pub product: Product,
    /// The default variant, or the earliest variant when none is set.
    pub default_variant: Option<VariantDetail>,
    pub variants: Vec<VariantDetail>,
}

// =============================================================================
// Listing
// =============================================================================

/// Accepted values for one attribute. Values are OR'd.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeFilter {
    pub attribute_id: AttributeId,
    pub values: Vec<String>,
}

impl AttributeFilter {
    #[must_use]
    pub fn new<I, S>(attribute_id: AttributeId, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            attribute_id,
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

/// Criteria for `list_products`. Every criterion is optional.
#[derive(Debug, Clone, Default)]
pub struct ProductFilters {
    pub pagination: Pagination,
    pub category: Option<CategoryId>,
    pub brand: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub in_stock: Option<bool>,
    /// Distinct attributes are AND'd.
    pub attributes: Vec<AttributeFilter>,
}

/// One row of a product listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductSummary {
    pub id: ProductId,
    pub category_id: CategoryId,
    pub name: String,
    pub slug: Option<String>,
    pub brand: Option<String>,
    /// Aggregate stock across variants.
    pub total_stock: i32,
    /// Representative variant (default variant preferred).
    pub variant_id: Option<VariantId>,
    pub item_stock: Option<i32>,
    pub price: Option<Decimal>,
    pub image_url: Option<String>,
    pub in_stock: bool,
}

/// A page of listing results.
#[derive(Debug, Clone, Serialize)]
pub struct ProductPage {
    pub items: Vec<ProductSummary>,
    pub page: u32,
    pub limit: u32,
}

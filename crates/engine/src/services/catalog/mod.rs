//! Catalog reads: product listing, product detail and name resolution.
//!
//! Listing assembles the bundled (or configured) SQL template with the
//! fragments from [`filters`] and runs it without locks. Results are ordered
//! by product ID, so identical filters page stably.

pub mod filters;
pub mod template;

use std::collections::HashMap;
use std::time::Duration;

use sitebuilder_core::{CategoryId, ProductId, StoreId, VariantId};
use sqlx::PgPool;
use tracing::{debug, instrument};

use self::template::ListingTemplate;
use crate::db;
use crate::deadline::with_deadline;
use crate::error::{EngineError, EngineResult};
use crate::models::{
    AttributeDefinition, AttributeFilter, Category, ProductDetail, ProductFilters, ProductPage,
    Variant, VariantAttribute, VariantDetail,
};

/// Read side of the catalog.
#[derive(Debug, Clone)]
pub struct CatalogService {
    pool: PgPool,
    template: ListingTemplate,
    timeout: Duration,
}

impl CatalogService {
    /// Create a catalog service using `template` for listings.
    #[must_use]
    pub const fn new(pool: PgPool, template: ListingTemplate, timeout: Duration) -> Self {
        Self {
            pool,
            template,
            timeout,
        }
    }

    /// List one page of a store's products matching `filters`.
    ///
    /// # Errors
    ///
    /// Returns `QueryFailed` if the query or row decoding fails.
    #[instrument(skip(self, filters), fields(store_id = %store_id, page = filters.pagination.page()))]
    pub async fn list_products(
        &self,
        store_id: StoreId,
        filters: &ProductFilters,
    ) -> EngineResult<ProductPage> {
        with_deadline("list_products", self.timeout, async {
            let listing = self.template.build(filters);
            debug!(sql = %listing.sql, params = listing.params.len(), "Assembled listing query");

            let items = db::catalog::list_products(&self.pool, store_id, filters.pagination, &listing)
                .await
                .map_err(EngineError::query)?;

            Ok(ProductPage {
                items,
                page: filters.pagination.page(),
                limit: filters.pagination.limit(),
            })
        })
        .await
    }

    /// Get a product with its default variant and the remaining variants.
    ///
    /// When no default is set the earliest variant stands in for it.
    ///
    /// # Errors
    ///
    /// Returns `ProductNotFound` if the product is not in the store.
    #[instrument(skip(self), fields(store_id = %store_id, product_id = %product_id))]
    pub async fn get_product(
        &self,
        store_id: StoreId,
        product_id: ProductId,
    ) -> EngineResult<ProductDetail> {
        with_deadline("get_product", self.timeout, async {
            let product = db::products::find_product(&self.pool, store_id, product_id)
                .await
                .map_err(EngineError::query)?
                .ok_or(EngineError::ProductNotFound)?;

            let variants = db::variants::list_for_product(&self.pool, product_id)
                .await
                .map_err(EngineError::query)?;
            let ids: Vec<VariantId> = variants.iter().map(|v| v.id).collect();
            let attributes = db::variants::list_attribute_values(&self.pool, &ids)
                .await
                .map_err(EngineError::query)?;
            let images = db::variants::list_gallery_images(&self.pool, &ids)
                .await
                .map_err(EngineError::query)?;

            let mut details = assemble_details(variants, attributes, images);
            let default_index = product
                .default_variant
                .and_then(|id| details.iter().position(|d| d.variant.id == id))
                .or_else(|| (!details.is_empty()).then_some(0));
            let default_variant = default_index.map(|index| details.remove(index));

            Ok(ProductDetail {
                product,
                default_variant,
                variants: details,
            })
        })
        .await
    }

    /// List a store's categories.
    ///
    /// # Errors
    ///
    /// Returns `QueryFailed` if the query fails.
    #[instrument(skip(self), fields(store_id = %store_id))]
    pub async fn list_categories(&self, store_id: StoreId) -> EngineResult<Vec<Category>> {
        with_deadline("list_categories", self.timeout, async {
            db::catalog::list_categories(&self.pool, store_id)
                .await
                .map_err(EngineError::query)
        })
        .await
    }

    /// List the attribute definitions of a category.
    ///
    /// # Errors
    ///
    /// Returns `QueryFailed` if the query fails.
    #[instrument(skip(self), fields(store_id = %store_id, category_id = %category_id))]
    pub async fn list_category_attributes(
        &self,
        store_id: StoreId,
        category_id: CategoryId,
    ) -> EngineResult<Vec<AttributeDefinition>> {
        with_deadline("list_category_attributes", self.timeout, async {
            db::catalog::list_category_attributes(&self.pool, store_id, category_id)
                .await
                .map_err(EngineError::query)
        })
        .await
    }

    /// Resolve a category name to its ID.
    ///
    /// # Errors
    ///
    /// Returns `QueryFailed` if the query fails.
    #[instrument(skip(self), fields(store_id = %store_id))]
    pub async fn resolve_category_id(
        &self,
        store_id: StoreId,
        name: &str,
    ) -> EngineResult<Option<CategoryId>> {
        with_deadline("resolve_category_id", self.timeout, async {
            let category = db::catalog::find_category_by_name(&self.pool, store_id, name)
                .await
                .map_err(EngineError::query)?;
            Ok(category.map(|c| c.id))
        })
        .await
    }

    /// Turn `(attribute name, accepted values)` pairs into attribute filters.
    ///
    /// Names that match no attribute definition are dropped.
    ///
    /// # Errors
    ///
    /// Returns `QueryFailed` if the query fails.
    #[instrument(skip(self, requested), fields(store_id = %store_id, requested = requested.len()))]
    pub async fn resolve_attribute_filters(
        &self,
        store_id: StoreId,
        category_id: Option<CategoryId>,
        requested: &[(String, Vec<String>)],
    ) -> EngineResult<Vec<AttributeFilter>> {
        if requested.is_empty() {
            return Ok(Vec::new());
        }
        with_deadline("resolve_attribute_filters", self.timeout, async {
            let names: Vec<String> = requested.iter().map(|(name, _)| name.clone()).collect();
            let definitions =
                db::catalog::find_attributes_by_name(&self.pool, store_id, category_id, &names)
                    .await
                    .map_err(EngineError::query)?;
            Ok(match_attribute_names(&definitions, requested))
        })
        .await
    }
}

/// Pair requested names with resolved definitions, case-insensitively.
fn match_attribute_names(
    definitions: &[AttributeDefinition],
    requested: &[(String, Vec<String>)],
) -> Vec<AttributeFilter> {
    let by_name: HashMap<String, &AttributeDefinition> = definitions
        .iter()
        .map(|d| (d.name.to_lowercase(), d))
        .collect();

    requested
        .iter()
        .filter_map(|(name, values)| {
            if let Some(definition) = by_name.get(&name.to_lowercase()) {
                Some(AttributeFilter::new(definition.id, values.iter().cloned()))
            } else {
                debug!(attribute = %name, "Dropping unknown attribute filter");
                None
            }
        })
        .collect()
}

fn assemble_details(
    variants: Vec<Variant>,
    attributes: Vec<(VariantId, VariantAttribute)>,
    images: Vec<(VariantId, String)>,
) -> Vec<VariantDetail> {
    let mut attributes_by_variant: HashMap<VariantId, Vec<VariantAttribute>> = HashMap::new();
    for (variant_id, attribute) in attributes {
        attributes_by_variant.entry(variant_id).or_default().push(attribute);
    }
    let mut images_by_variant: HashMap<VariantId, Vec<String>> = HashMap::new();
    for (variant_id, url) in images {
        images_by_variant.entry(variant_id).or_default().push(url);
    }

    variants
        .into_iter()
        .map(|variant| VariantDetail {
            attributes: attributes_by_variant.remove(&variant.id).unwrap_or_default(),
            images: images_by_variant.remove(&variant.id).unwrap_or_default(),
            variant,
        })
        .collect()
}

//! Variant resolution: catalog writes that create or restock variants.
//!
//! # Flow
//!
//! 1. Lock the product row (`FOR UPDATE`) inside a transaction
//! 2. Validate the attribute set against the category's definitions
//! 3. Hash the set and look for a variant of the product with that hash
//! 4. Found: add the stock delta. Not found: insert the variant and its
//!    attribute values
//! 5. Update the product's aggregate stock and default variant, then commit
//! 6. Outside the transaction, upload and attach the image if one was given
//!
//! The product lock serializes concurrent writers for the same product, so
//! two identical requests can never both take the insert branch.
//!
//! Image failures never undo step 5. They are reported through
//! [`ImageOutcome::Failed`]; an upload whose URL could not be persisted is
//! deleted again.

pub mod rules;

use std::sync::Arc;
use std::time::Duration;

use sitebuilder_core::{AttributeHash, AttributeValue, ProductId, StoreId, VariantId};
use sqlx::{PgConnection, PgPool};
use tracing::{debug, info, instrument, warn};

use crate::db;
use crate::db::products::ProductIdentity;
use crate::db::variants::NewVariantRecord;
use crate::deadline::with_deadline;
use crate::error::{EngineError, EngineResult};
use crate::media::ImageUpload;
use crate::models::{
    ImageOutcome, NewProduct, Product, ProductCreation, Variant, VariantInput, VariantResolution,
};
use crate::storage::{ImageStore, StorageError, attached_image_key, variant_image_key};

/// Catalog write service.
#[derive(Clone)]
pub struct VariantService {
    pool: PgPool,
    images: Option<Arc<dyn ImageStore>>,
    timeout: Duration,
}

impl std::fmt::Debug for VariantService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VariantService")
            .field("images", &self.images.is_some())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Variant state produced inside the product-locked transaction.
struct Resolved {
    product: Product,
    variant: Variant,
    created: bool,
}

impl VariantService {
    /// Create a variant service. Without an image store, supplied images are
    /// reported as failed.
    #[must_use]
    pub fn new(pool: PgPool, images: Option<Arc<dyn ImageStore>>, timeout: Duration) -> Self {
        Self {
            pool,
            images,
            timeout,
        }
    }

    /// Find or create the variant of `product_id` identified by `attributes`.
    ///
    /// An existing variant gets `input.stock_delta` added to its stock and
    /// keeps its SKU and price.
    ///
    /// # Errors
    ///
    /// - `InvalidQuantity` if the stock delta is negative
    /// - `InvalidPrice` if the price is negative
    /// - `ProductNotFound` if the product is not in the store
    /// - `CategoryAttributeViolation` if the attribute set does not fit the category
    /// - `TransactionFailed` / `DeadlineExceeded` on infrastructure failure
    #[instrument(
        skip(self, attributes, input),
        fields(store_id = %store_id, product_id = %product_id, attributes = attributes.len())
    )]
    pub async fn resolve_variant(
        &self,
        store_id: StoreId,
        product_id: ProductId,
        attributes: Vec<AttributeValue>,
        input: VariantInput,
    ) -> EngineResult<VariantResolution> {
        rules::check_variant_input(&input)?;

        let resolved = with_deadline("resolve_variant", self.timeout, async {
            let mut tx = self.pool.begin().await.map_err(EngineError::transaction)?;

            let product = db::products::lock_product(&mut *tx, store_id, product_id)
                .await
                .map_err(EngineError::transaction)?
                .ok_or(EngineError::ProductNotFound)?;
            let resolved = resolve_locked(&mut tx, product, &attributes, &input).await?;

            tx.commit().await.map_err(EngineError::transaction)?;
            Ok(resolved)
        })
        .await?;

        Ok(self.finish(store_id, resolved, input.image).await)
    }

    /// Create a product (or reuse the one with the same identity) together
    /// with the variant identified by `new.attributes`.
    ///
    /// Product identity is `(store, category, name, brand)`.
    ///
    /// # Errors
    ///
    /// - `InvalidQuantity` if the stock delta is negative
    /// - `InvalidPrice` if the price is negative
    /// - `CategoryNotFound` if the category is not in the store
    /// - `CategoryAttributeViolation` if the attribute set does not fit the category
    /// - `TransactionFailed` / `DeadlineExceeded` on infrastructure failure
    #[instrument(skip(self, new), fields(store_id = %store_id, name = %new.name))]
    pub async fn create_product(
        &self,
        store_id: StoreId,
        new: NewProduct,
    ) -> EngineResult<ProductCreation> {
        rules::check_variant_input(&new.variant)?;
        let brand = new.brand.as_deref().map(str::trim).filter(|b| !b.is_empty());
        let identity = ProductIdentity {
            store_id,
            category_id: new.category_id,
            name: new.name.trim(),
            brand,
            slug: new.slug.as_deref(),
            description: new.description.as_deref(),
        };

        let (resolved, product_created) = with_deadline("create_product", self.timeout, async {
            let mut tx = self.pool.begin().await.map_err(EngineError::transaction)?;

            db::catalog::find_category(&mut *tx, store_id, new.category_id)
                .await
                .map_err(EngineError::transaction)?
                .ok_or(EngineError::CategoryNotFound)?;

            let product_created = db::products::insert_product_if_absent(&mut *tx, identity)
                .await
                .map_err(EngineError::transaction)?;
            let product = db::products::lock_product_by_identity(&mut *tx, identity)
                .await
                .map_err(EngineError::transaction)?
                .ok_or_else(|| EngineError::transaction(db::RepositoryError::NotFound))?;
            if product_created {
                info!(product_id = %product.id, "Created product");
            }

            let resolved = resolve_locked(&mut tx, product, &new.attributes, &new.variant).await?;

            tx.commit().await.map_err(EngineError::transaction)?;
            Ok((resolved, product_created))
        })
        .await?;

        let product = resolved.product.clone();
        let resolution = self.finish(store_id, resolved, new.variant.image).await;
        Ok(ProductCreation {
            product,
            product_created,
            resolution,
        })
    }

    /// Upload an image and attach it to an existing variant, either as the
    /// primary image or as a gallery image.
    ///
    /// Unlike the image step of variant resolution, failures here are
    /// errors. If the upload succeeded but the URL could not be stored, the
    /// object is deleted before returning.
    ///
    /// # Errors
    ///
    /// - `InvalidVariant` if the variant does not belong to the product in this store
    /// - `Storage` if no image store is configured or the upload fails
    /// - `TransactionFailed` / `DeadlineExceeded` if persisting the URL fails
    #[instrument(
        skip(self, image),
        fields(store_id = %store_id, product_id = %product_id, variant_id = %variant_id)
    )]
    pub async fn attach_variant_image(
        &self,
        store_id: StoreId,
        product_id: ProductId,
        variant_id: VariantId,
        image: ImageUpload,
        primary: bool,
    ) -> EngineResult<String> {
        let images = self.images.as_ref().ok_or_else(|| {
            EngineError::Storage(StorageError::Config("image storage is not configured".to_string()))
        })?;

        with_deadline("attach_variant_image", self.timeout, async {
            db::variants::find_for_product(&self.pool, store_id, product_id, variant_id)
                .await
                .map_err(EngineError::query)?
                .ok_or(EngineError::InvalidVariant)?;

            let key = attached_image_key(store_id, product_id, variant_id);
            let content_type = image.content_type();
            let url = images.upload(&key, image.bytes, content_type).await?;

            if let Err(err) = self.persist_attached_image(variant_id, &url, primary).await {
                warn!(error = %err, key = %key, "Persisting attached image failed, deleting upload");
                compensate(images.as_ref(), &key).await;
                return Err(err);
            }

            info!(url = %url, primary, "Attached variant image");
            Ok(url)
        })
        .await
    }

    async fn persist_attached_image(
        &self,
        variant_id: VariantId,
        url: &str,
        primary: bool,
    ) -> EngineResult<()> {
        let mut tx = self.pool.begin().await.map_err(EngineError::transaction)?;
        let stored = if primary {
            db::variants::set_primary_image(&mut *tx, variant_id, url).await
        } else {
            db::variants::insert_gallery_image(&mut *tx, variant_id, url).await
        };
        stored.map_err(EngineError::transaction)?;
        tx.commit().await.map_err(EngineError::transaction)
    }

    /// Log the committed resolution and run the best-effort image step.
    async fn finish(
        &self,
        store_id: StoreId,
        resolved: Resolved,
        image: Option<ImageUpload>,
    ) -> VariantResolution {
        let Resolved {
            product,
            mut variant,
            created,
        } = resolved;

        if created {
            info!(
                product_id = %product.id,
                variant_id = %variant.id,
                sku = %variant.sku,
                stock = variant.stock_quantity,
                "Created variant"
            );
        } else {
            info!(
                product_id = %product.id,
                variant_id = %variant.id,
                stock = variant.stock_quantity,
                "Restocked variant"
            );
        }

        let image = match tokio::time::timeout(
            self.timeout,
            self.attach_resolution_image(store_id, &mut variant, image),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(variant_id = %variant.id, "Image step exceeded deadline");
                ImageOutcome::Failed("image step exceeded deadline".to_string())
            }
        };

        VariantResolution {
            variant,
            created,
            image,
        }
    }

    async fn attach_resolution_image(
        &self,
        store_id: StoreId,
        variant: &mut Variant,
        image: Option<ImageUpload>,
    ) -> ImageOutcome {
        let Some(image) = image else {
            return ImageOutcome::NotProvided;
        };
        if variant.primary_image_url.is_some() {
            debug!(variant_id = %variant.id, "Variant already has a primary image");
            return ImageOutcome::KeptExisting;
        }
        let Some(images) = self.images.as_ref() else {
            warn!(variant_id = %variant.id, "Image supplied but no image store is configured");
            return ImageOutcome::Failed("image storage is not configured".to_string());
        };

        let key = variant_image_key(store_id, variant.id);
        let content_type = image.content_type();
        let url = match images.upload(&key, image.bytes, content_type).await {
            Ok(url) => url,
            Err(err) => {
                warn!(error = %err, variant_id = %variant.id, "Image upload failed");
                return ImageOutcome::Failed(err.to_string());
            }
        };

        match db::variants::set_primary_image_if_absent(&self.pool, variant.id, &url).await {
            Ok(true) => {
                variant.primary_image_url = Some(url.clone());
                ImageOutcome::Attached(url)
            }
            Ok(false) => {
                // Another writer attached an image first.
                compensate(images.as_ref(), &key).await;
                ImageOutcome::KeptExisting
            }
            Err(err) => {
                warn!(error = %err, key = %key, "Persisting image URL failed, deleting upload");
                compensate(images.as_ref(), &key).await;
                ImageOutcome::Failed(format!("failed to save image: {err}"))
            }
        }
    }
}

/// Resolve the variant on a product already locked by the caller's transaction.
async fn resolve_locked(
    conn: &mut PgConnection,
    product: Product,
    attributes: &[AttributeValue],
    input: &VariantInput,
) -> EngineResult<Resolved> {
    let definitions =
        db::catalog::list_category_attributes(&mut *conn, product.store_id, product.category_id)
            .await
            .map_err(EngineError::transaction)?;
    rules::validate_attributes(product.category_id, &definitions, attributes)?;

    let hash = AttributeHash::of(attributes);
    let existing = db::variants::find_by_hash(&mut *conn, product.id, &hash)
        .await
        .map_err(EngineError::transaction)?;

    let (variant, created) = if let Some(existing) = existing {
        let variant = db::variants::add_stock(&mut *conn, existing.id, input.stock_delta)
            .await
            .map_err(EngineError::transaction)?;
        (variant, false)
    } else {
        let variant = db::variants::insert_variant(
            &mut *conn,
            NewVariantRecord {
                product_id: product.id,
                store_id: product.store_id,
                sku: &input.sku,
                price: input.price,
                stock_quantity: input.stock_delta,
                attribute_hash: &hash,
            },
        )
        .await
        .map_err(EngineError::transaction)?;
        db::variants::insert_attribute_values(&mut *conn, variant.id, attributes)
            .await
            .map_err(EngineError::transaction)?;
        (variant, true)
    };

    let default_variant = rules::next_default_variant(
        product.default_variant,
        product.is_sellable(),
        variant.id,
        created,
    );
    if product.default_variant != Some(default_variant) {
        debug!(product_id = %product.id, variant_id = %default_variant, "Setting default variant");
    }

    let product = db::products::apply_stock_delta(
        &mut *conn,
        product.id,
        input.stock_delta,
        Some(default_variant),
    )
    .await
    .map_err(EngineError::transaction)?;

    Ok(Resolved {
        product,
        variant,
        created,
    })
}

/// Delete an uploaded object whose URL could not be stored.
async fn compensate(images: &dyn ImageStore, key: &str) {
    if let Err(err) = images.delete(key).await {
        warn!(error = %err, key = %key, "Compensating delete failed, object orphaned");
    }
}

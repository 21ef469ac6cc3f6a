//! Engine handle shared by callers.

use std::sync::Arc;

use sqlx::PgPool;
use tracing::info;

use crate::config::EngineConfig;
use crate::db;
use crate::error::{EngineError, EngineResult};
use crate::services::catalog::template::ListingTemplate;
use crate::services::{CartService, CatalogService, VariantService};
use crate::storage::ImageStore;

/// The catalog and cart engine.
///
/// Cheap to clone; all clones share one pool.
#[derive(Clone, Debug)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

#[derive(Debug)]
struct EngineInner {
    pool: PgPool,
    catalog: CatalogService,
    variants: VariantService,
    carts: CartService,
}

impl Engine {
    /// Build an engine on an existing pool.
    ///
    /// Loads the listing template from `config.listing_template` when set,
    /// otherwise uses the bundled one.
    ///
    /// # Errors
    ///
    /// Returns `TemplateUnavailable` if the listing template cannot be loaded.
    pub async fn new(
        pool: PgPool,
        config: &EngineConfig,
        images: Option<Arc<dyn ImageStore>>,
    ) -> EngineResult<Self> {
        let template = match &config.listing_template {
            Some(path) => ListingTemplate::load(path).await?,
            None => ListingTemplate::bundled()?,
        };
        let timeout = config.operation_timeout;

        Ok(Self {
            inner: Arc::new(EngineInner {
                catalog: CatalogService::new(pool.clone(), template, timeout),
                variants: VariantService::new(pool.clone(), images, timeout),
                carts: CartService::new(pool.clone(), timeout),
                pool,
            }),
        })
    }

    /// Connect to the database from `config` and build an engine.
    ///
    /// With the `s3` feature and `S3_BUCKET` set, images go to S3.
    ///
    /// # Errors
    ///
    /// Returns `QueryFailed` if the pool cannot connect, `Storage` if the
    /// image store cannot be built, or `TemplateUnavailable`.
    pub async fn connect(config: &EngineConfig) -> EngineResult<Self> {
        let pool = db::create_pool(&config.database)
            .await
            .map_err(EngineError::query)?;
        info!(
            max_connections = config.database.max_connections,
            "Connected to database"
        );

        let images = image_store(config).await?;
        Self::new(pool, config, images).await
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Catalog reads.
    #[must_use]
    pub fn catalog(&self) -> &CatalogService {
        &self.inner.catalog
    }

    /// Catalog writes.
    #[must_use]
    pub fn variants(&self) -> &VariantService {
        &self.inner.variants
    }

    /// Cart operations.
    #[must_use]
    pub fn carts(&self) -> &CartService {
        &self.inner.carts
    }
}

#[cfg(feature = "s3")]
async fn image_store(config: &EngineConfig) -> EngineResult<Option<Arc<dyn ImageStore>>> {
    let Some(storage) = &config.storage else {
        return Ok(None);
    };
    let store = crate::storage::s3::S3ImageStore::new(storage).await?;
    info!(bucket = %storage.bucket, "Using S3 image storage");
    Ok(Some(Arc::new(store)))
}

#[cfg(not(feature = "s3"))]
#[allow(clippy::unused_async)]
async fn image_store(config: &EngineConfig) -> EngineResult<Option<Arc<dyn ImageStore>>> {
    if config.storage.is_some() {
        tracing::warn!("S3_BUCKET is set but the engine was built without the `s3` feature");
    }
    Ok(None)
}

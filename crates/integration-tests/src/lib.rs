//! Integration test fixtures for the site builder engine.
//!
//! # Running Tests
//!
//! The tests use `#[sqlx::test]`, which creates a fresh database per test
//! from `DATABASE_URL` and applies the engine migrations to it. They are
//! ignored by default:
//!
//! ```bash
//! DATABASE_URL=postgres://localhost/sitebuilder \
//!     cargo test -p sitebuilder-integration-tests -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `variant_resolution` - Variant create/restock, stock and default variant
//! - `product_listing` - Listing filters, pagination and tenant isolation
//! - `carts` - Add-to-cart and the login merge
//! - `deadlines` - Operation deadlines and rollback

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use secrecy::SecretString;
use sitebuilder_core::{AttributeId, CategoryId, CustomerId, SessionId, StoreId};
use sitebuilder_engine::config::DatabaseConfig;
use sitebuilder_engine::media::ImageUpload;
use sitebuilder_engine::models::VariantInput;
use sitebuilder_engine::storage::{ImageStore, MemoryImageStore};
use sitebuilder_engine::{Engine, EngineConfig};
use sqlx::PgPool;

/// A store with one category carrying `color` (required) and `size`.
#[derive(Debug, Clone, Copy)]
pub struct Shop {
    pub store_id: StoreId,
    pub category_id: CategoryId,
    pub color: AttributeId,
    pub size: AttributeId,
}

impl Shop {
    /// Create the store, its `Shirts` category and both attributes.
    ///
    /// # Panics
    ///
    /// Panics if an insert fails.
    pub async fn create(pool: &PgPool, name: &str) -> Self {
        let store_id = insert_store(pool, name).await;
        let category_id = insert_category(pool, store_id, "Shirts").await;
        let color = insert_attribute(pool, category_id, "color", true).await;
        let size = insert_attribute(pool, category_id, "size", false).await;
        Self {
            store_id,
            category_id,
            color,
            size,
        }
    }
}

/// Engine configuration for tests. The database URL is unused because the
/// engine is built on the test pool.
#[must_use]
pub fn test_config(operation_timeout: Duration) -> EngineConfig {
    EngineConfig {
        database: DatabaseConfig {
            url: SecretString::from("postgres://unused".to_string()),
            max_connections: 5,
            min_connections: 0,
            acquire_timeout_secs: 5,
        },
        operation_timeout,
        listing_template: None,
        storage: None,
    }
}

/// Build an engine on the test pool with an in-memory image store.
///
/// # Panics
///
/// Panics if the engine cannot be built.
pub async fn engine(pool: &PgPool, images: Arc<MemoryImageStore>) -> Engine {
    engine_with_timeout(pool, images, Duration::from_secs(10)).await
}

/// Build an engine with a specific operation deadline.
///
/// # Panics
///
/// Panics if the engine cannot be built.
pub async fn engine_with_timeout(
    pool: &PgPool,
    images: Arc<MemoryImageStore>,
    timeout: Duration,
) -> Engine {
    let images: Arc<dyn ImageStore> = images;
    Engine::new(pool.clone(), &test_config(timeout), Some(images))
        .await
        .expect("engine should build")
}

/// # Panics
///
/// Panics if the insert fails.
pub async fn insert_store(pool: &PgPool, name: &str) -> StoreId {
    sqlx::query_scalar("INSERT INTO stores (name) VALUES ($1) RETURNING store_id")
        .bind(name)
        .fetch_one(pool)
        .await
        .expect("insert store")
}

/// # Panics
///
/// Panics if the insert fails.
pub async fn insert_category(pool: &PgPool, store_id: StoreId, name: &str) -> CategoryId {
    sqlx::query_scalar(
        "INSERT INTO categories (store_id, name) VALUES ($1, $2) RETURNING category_id",
    )
    .bind(store_id)
    .bind(name)
    .fetch_one(pool)
    .await
    .expect("insert category")
}

/// # Panics
///
/// Panics if the insert fails.
pub async fn insert_attribute(
    pool: &PgPool,
    category_id: CategoryId,
    name: &str,
    is_required: bool,
) -> AttributeId {
    sqlx::query_scalar(
        r"
        INSERT INTO category_attributes (category_id, name, is_required)
        VALUES ($1, $2, $3)
        RETURNING attribute_id
        ",
    )
    .bind(category_id)
    .bind(name)
    .bind(is_required)
    .fetch_one(pool)
    .await
    .expect("insert attribute")
}

/// # Panics
///
/// Panics if the insert fails.
pub async fn insert_customer(pool: &PgPool, store_id: StoreId, email: &str) -> CustomerId {
    sqlx::query_scalar(
        r"
        INSERT INTO customers (store_id, name, email)
        VALUES ($1, 'Test Customer', $2)
        RETURNING customer_id
        ",
    )
    .bind(store_id)
    .bind(email)
    .fetch_one(pool)
    .await
    .expect("insert customer")
}

/// Create an anonymous session in the store.
///
/// # Panics
///
/// Panics if the insert fails.
pub async fn insert_session(pool: &PgPool, store_id: StoreId) -> SessionId {
    let session_id = SessionId::generate();
    sqlx::query("INSERT INTO sessions (session_id, store_id) VALUES ($1, $2)")
        .bind(session_id)
        .bind(store_id)
        .execute(pool)
        .await
        .expect("insert session");
    session_id
}

/// Set a variant's stock directly, bypassing the engine.
///
/// # Panics
///
/// Panics if the update fails.
pub async fn set_variant_stock(pool: &PgPool, variant_id: sitebuilder_core::VariantId, stock: i32) {
    sqlx::query("UPDATE product_variants SET stock_quantity = $2 WHERE variant_id = $1")
        .bind(variant_id)
        .bind(stock)
        .execute(pool)
        .await
        .expect("update variant stock");
}

/// Variant fields without an image.
#[must_use]
pub fn variant(sku: &str, price: &str, stock_delta: i32) -> VariantInput {
    VariantInput {
        sku: sku.to_string(),
        price: price.parse::<Decimal>().expect("valid decimal literal"),
        stock_delta,
        image: None,
    }
}

/// A minimal PNG upload.
///
/// # Panics
///
/// Panics if the bytes are not recognized as PNG.
#[must_use]
pub fn png_upload() -> ImageUpload {
    let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    bytes.extend_from_slice(&[0; 16]);
    ImageUpload::from_bytes(bytes).expect("PNG signature is accepted")
}

/// Parse a decimal literal.
///
/// # Panics
///
/// Panics on an invalid literal.
#[must_use]
pub fn dec(literal: &str) -> Decimal {
    literal.parse().expect("valid decimal literal")
}

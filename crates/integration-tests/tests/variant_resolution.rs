//! Integration tests for variant resolution and catalog writes.
//!
//! These tests require a `PostgreSQL` server reachable through
//! `DATABASE_URL`; each test runs in its own freshly migrated database.
//!
//! Run with: cargo test -p sitebuilder-integration-tests -- --ignored

use std::sync::Arc;

use sitebuilder_core::{AttributeValue, CategoryId, ProductId};
use sitebuilder_engine::models::{ImageOutcome, NewProduct};
use sitebuilder_engine::storage::MemoryImageStore;
use sitebuilder_engine::{AttributeViolation, Engine, EngineError};
use sitebuilder_integration_tests::{
    Shop, dec, engine, insert_attribute, insert_category, png_upload, variant,
};
use sqlx::PgPool;

async fn create_shirt(engine: &Engine, shop: &Shop, color: &str, stock: i32) -> ProductId {
    let creation = engine
        .variants()
        .create_product(
            shop.store_id,
            NewProduct {
                category_id: shop.category_id,
                name: "Oxford Shirt".to_string(),
                slug: Some("oxford-shirt".to_string()),
                description: None,
                brand: Some("Acme".to_string()),
                attributes: vec![AttributeValue::new(shop.color, color)],
                variant: variant(&format!("OX-{color}"), "29.90", stock),
            },
        )
        .await
        .expect("create product");
    creation.product.id
}

async fn product_stock(pool: &PgPool, product_id: ProductId) -> i32 {
    sqlx::query_scalar("SELECT stock_quantity FROM products WHERE product_id = $1")
        .bind(product_id)
        .fetch_one(pool)
        .await
        .expect("product stock")
}

async fn variant_stock_sum(pool: &PgPool, product_id: ProductId) -> i64 {
    sqlx::query_scalar(
        "SELECT COALESCE(SUM(stock_quantity), 0)::BIGINT FROM product_variants WHERE product_id = $1",
    )
    .bind(product_id)
    .fetch_one(pool)
    .await
    .expect("variant stock sum")
}

// ============================================================================
// Create & Restock
// ============================================================================

#[sqlx::test(migrations = "../engine/migrations")]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_same_attribute_set_restocks_existing_variant(pool: PgPool) {
    let shop = Shop::create(&pool, "Store A").await;
    let engine = engine(&pool, Arc::new(MemoryImageStore::default())).await;
    let product_id = create_shirt(&engine, &shop, "red", 5).await;

    // The same set is supplied again below in a different order.
    let first = engine
        .variants()
        .resolve_variant(
            shop.store_id,
            product_id,
            vec![
                AttributeValue::new(shop.size, "M"),
                AttributeValue::new(shop.color, "blue"),
            ],
            variant("OX-BLUE-M", "31.00", 2),
        )
        .await
        .expect("create blue/M");
    assert!(first.created);

    let second = engine
        .variants()
        .resolve_variant(
            shop.store_id,
            product_id,
            vec![
                AttributeValue::new(shop.color, "blue"),
                AttributeValue::new(shop.size, "M"),
            ],
            variant("IGNORED-SKU", "99.00", 3),
        )
        .await
        .expect("restock blue/M");

    assert!(!second.created);
    assert_eq!(second.variant.id, first.variant.id);
    assert_eq!(second.variant.stock_quantity, 5);
    // Restock keeps the original SKU and price.
    assert_eq!(second.variant.sku, "OX-BLUE-M");
    assert_eq!(second.variant.price, dec("31.00"));

    assert_eq!(product_stock(&pool, product_id).await, 10);
    assert_eq!(variant_stock_sum(&pool, product_id).await, 10);
}

#[sqlx::test(migrations = "../engine/migrations")]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_create_product_reuses_identity(pool: PgPool) {
    let shop = Shop::create(&pool, "Store A").await;
    let engine = engine(&pool, Arc::new(MemoryImageStore::default())).await;

    let first = create_shirt(&engine, &shop, "red", 1).await;
    let second = engine
        .variants()
        .create_product(
            shop.store_id,
            NewProduct {
                category_id: shop.category_id,
                name: "  Oxford Shirt ".to_string(),
                slug: None,
                description: None,
                brand: Some(" Acme ".to_string()),
                attributes: vec![AttributeValue::new(shop.color, "green")],
                variant: variant("OX-GREEN", "29.90", 4),
            },
        )
        .await
        .expect("reuse product");

    assert!(!second.product_created);
    assert_eq!(second.product.id, first);
    assert!(second.resolution.created);
    assert_eq!(second.product.stock_quantity, 5);
}

#[sqlx::test(migrations = "../engine/migrations")]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_create_product_in_unknown_category(pool: PgPool) {
    let shop = Shop::create(&pool, "Store A").await;
    let other = Shop::create(&pool, "Store B").await;
    let engine = engine(&pool, Arc::new(MemoryImageStore::default())).await;

    let result = engine
        .variants()
        .create_product(
            shop.store_id,
            NewProduct {
                category_id: other.category_id,
                name: "Borrowed".to_string(),
                slug: None,
                description: None,
                brand: None,
                attributes: vec![AttributeValue::new(other.color, "red")],
                variant: variant("B-1", "1.00", 1),
            },
        )
        .await;

    assert!(matches!(result, Err(EngineError::CategoryNotFound)));
    let products: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
        .fetch_one(&pool)
        .await
        .expect("count products");
    assert_eq!(products, 0);
}

// ============================================================================
// Attribute Validation
// ============================================================================

#[sqlx::test(migrations = "../engine/migrations")]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_attribute_from_other_category_is_rejected(pool: PgPool) {
    let shop = Shop::create(&pool, "Store A").await;
    let engine = engine(&pool, Arc::new(MemoryImageStore::default())).await;
    let product_id = create_shirt(&engine, &shop, "red", 1).await;

    let shoes: CategoryId = insert_category(&pool, shop.store_id, "Shoes").await;
    let width = insert_attribute(&pool, shoes, "width", false).await;

    let result = engine
        .variants()
        .resolve_variant(
            shop.store_id,
            product_id,
            vec![
                AttributeValue::new(shop.color, "red"),
                AttributeValue::new(width, "wide"),
            ],
            variant("OX-WIDE", "29.90", 1),
        )
        .await;

    match result {
        Err(EngineError::CategoryAttributeViolation(AttributeViolation::Disallowed {
            attribute_id,
            category_id,
        })) => {
            assert_eq!(attribute_id, width);
            assert_eq!(category_id, shop.category_id);
        }
        other => panic!("expected disallowed attribute, got {other:?}"),
    }

    // Nothing was written: stock is unchanged and no variant was added.
    assert_eq!(product_stock(&pool, product_id).await, 1);
    let variants: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM product_variants WHERE product_id = $1")
            .bind(product_id)
            .fetch_one(&pool)
            .await
            .expect("count variants");
    assert_eq!(variants, 1);
}

#[sqlx::test(migrations = "../engine/migrations")]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_missing_required_attribute_is_rejected(pool: PgPool) {
    let shop = Shop::create(&pool, "Store A").await;
    let engine = engine(&pool, Arc::new(MemoryImageStore::default())).await;
    let product_id = create_shirt(&engine, &shop, "red", 1).await;

    let result = engine
        .variants()
        .resolve_variant(
            shop.store_id,
            product_id,
            vec![AttributeValue::new(shop.size, "L")],
            variant("OX-L", "29.90", 1),
        )
        .await;

    assert!(matches!(
        result,
        Err(EngineError::CategoryAttributeViolation(
            AttributeViolation::MissingRequired { ref attribute_ids }
        )) if attribute_ids == &vec![shop.color]
    ));
}

#[sqlx::test(migrations = "../engine/migrations")]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_negative_stock_delta_is_rejected(pool: PgPool) {
    let shop = Shop::create(&pool, "Store A").await;
    let engine = engine(&pool, Arc::new(MemoryImageStore::default())).await;
    let product_id = create_shirt(&engine, &shop, "red", 3).await;

    let result = engine
        .variants()
        .resolve_variant(
            shop.store_id,
            product_id,
            vec![AttributeValue::new(shop.color, "red")],
            variant("OX-red", "29.90", -1),
        )
        .await;

    assert!(matches!(result, Err(EngineError::InvalidQuantity(-1))));
    assert_eq!(product_stock(&pool, product_id).await, 3);
}

#[sqlx::test(migrations = "../engine/migrations")]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_negative_price_is_rejected_as_input(pool: PgPool) {
    let shop = Shop::create(&pool, "Store A").await;
    let engine = engine(&pool, Arc::new(MemoryImageStore::default())).await;
    let product_id = create_shirt(&engine, &shop, "red", 3).await;

    let result = engine
        .variants()
        .resolve_variant(
            shop.store_id,
            product_id,
            vec![AttributeValue::new(shop.color, "blue")],
            variant("OX-blue", "-0.01", 2),
        )
        .await;
    let err = result.expect_err("negative price");
    assert!(matches!(err, EngineError::InvalidPrice(p) if p == dec("-0.01")));
    assert!(err.is_client_error());
    assert_eq!(product_stock(&pool, product_id).await, 3);

    let created = engine
        .variants()
        .create_product(
            shop.store_id,
            NewProduct {
                category_id: shop.category_id,
                name: "Polo".to_string(),
                slug: None,
                description: None,
                brand: None,
                attributes: vec![AttributeValue::new(shop.color, "red")],
                variant: variant("PO-red", "-5.00", 1),
            },
        )
        .await;
    assert!(matches!(created, Err(EngineError::InvalidPrice(_))));
    let products: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
        .fetch_one(&pool)
        .await
        .expect("count products");
    assert_eq!(products, 1);
}

#[sqlx::test(migrations = "../engine/migrations")]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_product_of_other_store_is_not_found(pool: PgPool) {
    let shop = Shop::create(&pool, "Store A").await;
    let other = Shop::create(&pool, "Store B").await;
    let engine = engine(&pool, Arc::new(MemoryImageStore::default())).await;
    let product_id = create_shirt(&engine, &shop, "red", 3).await;

    let result = engine
        .variants()
        .resolve_variant(
            other.store_id,
            product_id,
            vec![AttributeValue::new(shop.color, "red")],
            variant("X", "1.00", 1),
        )
        .await;

    assert!(matches!(result, Err(EngineError::ProductNotFound)));
}

// ============================================================================
// Default Variant
// ============================================================================

#[sqlx::test(migrations = "../engine/migrations")]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_default_variant_follows_first_sellable_variant(pool: PgPool) {
    let shop = Shop::create(&pool, "Store A").await;
    let engine = engine(&pool, Arc::new(MemoryImageStore::default())).await;

    // Created without stock: it becomes the default but the product is not sellable.
    let product_id = create_shirt(&engine, &shop, "red", 0).await;
    let detail = engine
        .catalog()
        .get_product(shop.store_id, product_id)
        .await
        .expect("get product");
    let red = detail.product.default_variant.expect("default variant set");
    assert_eq!(detail.product.stock_quantity, 0);

    // A new variant with stock takes over while the product had no stock.
    let blue = engine
        .variants()
        .resolve_variant(
            shop.store_id,
            product_id,
            vec![AttributeValue::new(shop.color, "blue")],
            variant("OX-blue", "29.90", 4),
        )
        .await
        .expect("create blue");
    let detail = engine
        .catalog()
        .get_product(shop.store_id, product_id)
        .await
        .expect("get product");
    assert_eq!(detail.product.default_variant, Some(blue.variant.id));
    assert_ne!(Some(red), detail.product.default_variant);

    // Once sellable, later variants do not replace the default.
    engine
        .variants()
        .resolve_variant(
            shop.store_id,
            product_id,
            vec![AttributeValue::new(shop.color, "green")],
            variant("OX-green", "29.90", 9),
        )
        .await
        .expect("create green");
    let detail = engine
        .catalog()
        .get_product(shop.store_id, product_id)
        .await
        .expect("get product");
    assert_eq!(detail.product.default_variant, Some(blue.variant.id));
    assert_eq!(
        detail.default_variant.as_ref().map(|d| d.variant.id),
        Some(blue.variant.id)
    );
    assert_eq!(detail.variants.len(), 2);
}

// ============================================================================
// Concurrency
// ============================================================================

#[sqlx::test(migrations = "../engine/migrations")]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_concurrent_resolution_creates_one_variant(pool: PgPool) {
    let shop = Shop::create(&pool, "Store A").await;
    let engine = engine(&pool, Arc::new(MemoryImageStore::default())).await;
    let product_id = create_shirt(&engine, &shop, "red", 0).await;

    let tasks: Vec<_> = (0..8)
        .map(|i| {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine
                    .variants()
                    .resolve_variant(
                        shop.store_id,
                        product_id,
                        vec![
                            AttributeValue::new(shop.color, "black"),
                            AttributeValue::new(shop.size, "S"),
                        ],
                        variant(&format!("OX-BLACK-S-{i}"), "29.90", 2),
                    )
                    .await
            })
        })
        .collect();

    let mut created = 0;
    for task in tasks {
        let resolution = task.await.expect("task joined").expect("resolve");
        if resolution.created {
            created += 1;
        }
    }
    assert_eq!(created, 1);

    let black_variants: i64 = sqlx::query_scalar(
        r"
        SELECT COUNT(*) FROM product_variants v
        JOIN variant_attribute_values a ON a.variant_id = v.variant_id
        WHERE v.product_id = $1 AND a.value = 'black'
        ",
    )
    .bind(product_id)
    .fetch_one(&pool)
    .await
    .expect("count black variants");
    assert_eq!(black_variants, 1);

    assert_eq!(product_stock(&pool, product_id).await, 16);
    assert_eq!(variant_stock_sum(&pool, product_id).await, 16);
}

// ============================================================================
// Images
// ============================================================================

#[sqlx::test(migrations = "../engine/migrations")]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_image_is_attached_on_creation(pool: PgPool) {
    let shop = Shop::create(&pool, "Store A").await;
    let images = Arc::new(MemoryImageStore::new("https://cdn.test"));
    let engine = engine(&pool, Arc::clone(&images)).await;
    let product_id = create_shirt(&engine, &shop, "red", 1).await;

    let mut input = variant("OX-blue", "29.90", 1);
    input.image = Some(png_upload());
    let resolution = engine
        .variants()
        .resolve_variant(
            shop.store_id,
            product_id,
            vec![AttributeValue::new(shop.color, "blue")],
            input,
        )
        .await
        .expect("resolve");

    let ImageOutcome::Attached(url) = &resolution.image else {
        panic!("expected attached image, got {:?}", resolution.image);
    };
    assert_eq!(resolution.variant.primary_image_url.as_deref(), Some(url.as_str()));
    let key = url.strip_prefix("https://cdn.test/").expect("url under base");
    let object = images.get(key).await.expect("object stored");
    assert_eq!(object.content_type, "image/png");

    // A second image for the same variant keeps the first.
    let mut again = variant("OX-blue", "29.90", 1);
    again.image = Some(png_upload());
    let resolution = engine
        .variants()
        .resolve_variant(
            shop.store_id,
            product_id,
            vec![AttributeValue::new(shop.color, "blue")],
            again,
        )
        .await
        .expect("restock");
    assert_eq!(resolution.image, ImageOutcome::KeptExisting);
    assert_eq!(images.keys().await.len(), 1);
}

#[sqlx::test(migrations = "../engine/migrations")]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_failed_upload_keeps_variant_and_warns(pool: PgPool) {
    let shop = Shop::create(&pool, "Store A").await;
    let images = Arc::new(MemoryImageStore::default());
    let engine = engine(&pool, Arc::clone(&images)).await;
    let product_id = create_shirt(&engine, &shop, "red", 1).await;

    images.fail_uploads(true);
    let mut input = variant("OX-blue", "29.90", 2);
    input.image = Some(png_upload());
    let resolution = engine
        .variants()
        .resolve_variant(
            shop.store_id,
            product_id,
            vec![AttributeValue::new(shop.color, "blue")],
            input,
        )
        .await
        .expect("variant write succeeds");

    assert!(resolution.created);
    assert!(resolution.image.warning().is_some());
    assert!(resolution.variant.primary_image_url.is_none());
    assert!(images.keys().await.is_empty());
    assert_eq!(product_stock(&pool, product_id).await, 3);
}

#[sqlx::test(migrations = "../engine/migrations")]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_attach_variant_image_to_gallery(pool: PgPool) {
    let shop = Shop::create(&pool, "Store A").await;
    let images = Arc::new(MemoryImageStore::default());
    let engine = engine(&pool, Arc::clone(&images)).await;
    let product_id = create_shirt(&engine, &shop, "red", 1).await;
    let detail = engine
        .catalog()
        .get_product(shop.store_id, product_id)
        .await
        .expect("get product");
    let variant_id = detail.product.default_variant.expect("default variant");

    let url = engine
        .variants()
        .attach_variant_image(shop.store_id, product_id, variant_id, png_upload(), false)
        .await
        .expect("attach gallery image");

    let detail = engine
        .catalog()
        .get_product(shop.store_id, product_id)
        .await
        .expect("get product");
    let default = detail.default_variant.expect("default variant detail");
    assert_eq!(default.images, vec![url]);
    assert!(default.variant.primary_image_url.is_none());

    // A variant of another product is rejected before anything is uploaded.
    let other = engine
        .variants()
        .create_product(
            shop.store_id,
            NewProduct {
                category_id: shop.category_id,
                name: "Polo".to_string(),
                slug: None,
                description: None,
                brand: None,
                attributes: vec![AttributeValue::new(shop.color, "red")],
                variant: variant("POLO-red", "19.90", 1),
            },
        )
        .await
        .expect("create polo");
    let result = engine
        .variants()
        .attach_variant_image(
            shop.store_id,
            other.product.id,
            variant_id,
            png_upload(),
            true,
        )
        .await;
    assert!(matches!(result, Err(EngineError::InvalidVariant)));
    assert_eq!(images.keys().await.len(), 1);
}

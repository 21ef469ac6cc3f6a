//! Integration tests for operation deadlines.
//!
//! A second transaction holds a row lock the operation needs, so the
//! operation blocks until its deadline passes. Nothing it did may persist.
//!
//! Run with: cargo test -p sitebuilder-integration-tests -- --ignored

use std::sync::Arc;
use std::time::Duration;

use sitebuilder_core::AttributeValue;
use sitebuilder_engine::EngineError;
use sitebuilder_engine::models::NewProduct;
use sitebuilder_engine::storage::MemoryImageStore;
use sitebuilder_integration_tests::{Shop, engine_with_timeout, insert_session, variant};
use sqlx::PgPool;

const SHORT: Duration = Duration::from_millis(300);

#[sqlx::test(migrations = "../engine/migrations")]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_blocked_resolution_times_out_and_rolls_back(pool: PgPool) {
    let shop = Shop::create(&pool, "Store A").await;
    let engine = engine_with_timeout(&pool, Arc::new(MemoryImageStore::default()), SHORT).await;
    let creation = engine
        .variants()
        .create_product(
            shop.store_id,
            NewProduct {
                category_id: shop.category_id,
                name: "Oxford".to_string(),
                slug: None,
                description: None,
                brand: None,
                attributes: vec![AttributeValue::new(shop.color, "red")],
                variant: variant("OX-red", "10.00", 4),
            },
        )
        .await
        .expect("create product");
    let product_id = creation.product.id;

    let mut blocker = pool.begin().await.expect("begin blocker");
    sqlx::query("SELECT 1 FROM products WHERE product_id = $1 FOR UPDATE")
        .bind(product_id)
        .execute(&mut *blocker)
        .await
        .expect("lock product");

    let result = engine
        .variants()
        .resolve_variant(
            shop.store_id,
            product_id,
            vec![AttributeValue::new(shop.color, "blue")],
            variant("OX-blue", "10.00", 6),
        )
        .await;
    assert!(matches!(result, Err(EngineError::DeadlineExceeded)));

    blocker.rollback().await.expect("release lock");

    let stock: i32 = sqlx::query_scalar("SELECT stock_quantity FROM products WHERE product_id = $1")
        .bind(product_id)
        .fetch_one(&pool)
        .await
        .expect("product stock");
    assert_eq!(stock, 4);
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
async fn test_blocked_add_item_times_out_without_cart(pool: PgPool) {
    let shop = Shop::create(&pool, "Store A").await;
    let engine = engine_with_timeout(&pool, Arc::new(MemoryImageStore::default()), SHORT).await;
    let red = engine
        .variants()
        .create_product(
            shop.store_id,
            NewProduct {
                category_id: shop.category_id,
                name: "Oxford".to_string(),
                slug: None,
                description: None,
                brand: None,
                attributes: vec![AttributeValue::new(shop.color, "red")],
                variant: variant("OX-red", "10.00", 4),
            },
        )
        .await
        .expect("create product")
        .resolution
        .variant
        .id;
    let session = insert_session(&pool, shop.store_id).await;

    // Stands in for a login merge that is linking the session.
    let mut blocker = pool.begin().await.expect("begin blocker");
    sqlx::query("SELECT 1 FROM sessions WHERE session_id = $1 FOR UPDATE")
        .bind(session)
        .execute(&mut *blocker)
        .await
        .expect("lock session");

    let result = engine.carts().add_item(shop.store_id, session, red, 1).await;
    assert!(matches!(result, Err(EngineError::DeadlineExceeded)));

    blocker.rollback().await.expect("release lock");

    let carts: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM carts")
        .fetch_one(&pool)
        .await
        .expect("count carts");
    assert_eq!(carts, 0);

    // With the lock gone the same add succeeds.
    engine
        .carts()
        .add_item(shop.store_id, session, red, 1)
        .await
        .expect("add after release");
}

//! Integration tests for carts: stock-checked add and the login merge.
//!
//! These tests require a `PostgreSQL` server reachable through
//! `DATABASE_URL`; each test runs in its own freshly migrated database.
//!
//! Run with: cargo test -p sitebuilder-integration-tests -- --ignored

use std::sync::Arc;

use sitebuilder_core::{AttributeValue, SessionId, VariantId};
use sitebuilder_engine::models::{MergeOutcome, NewProduct};
use sitebuilder_engine::storage::MemoryImageStore;
use sitebuilder_engine::{Engine, EngineError};
use sitebuilder_integration_tests::{
    Shop, dec, engine, insert_customer, insert_session, set_variant_stock, variant,
};
use sqlx::PgPool;

async fn stocked_variant(engine: &Engine, shop: &Shop, color: &str, price: &str, stock: i32) -> VariantId {
    engine
        .variants()
        .create_product(
            shop.store_id,
            NewProduct {
                category_id: shop.category_id,
                name: "Oxford".to_string(),
                slug: None,
                description: None,
                brand: None,
                attributes: vec![AttributeValue::new(shop.color, color)],
                variant: variant(&format!("OX-{color}"), price, stock),
            },
        )
        .await
        .expect("create variant")
        .resolution
        .variant
        .id
}

async fn cart_count(pool: &PgPool) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM carts")
        .fetch_one(pool)
        .await
        .expect("count carts")
}

// ============================================================================
// Add Item
// ============================================================================

#[sqlx::test(migrations = "../engine/migrations")]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_add_item_creates_cart_and_accumulates(pool: PgPool) {
    let shop = Shop::create(&pool, "Store A").await;
    let engine = engine(&pool, Arc::new(MemoryImageStore::default())).await;
    let red = stocked_variant(&engine, &shop, "red", "12.50", 10).await;
    let session = insert_session(&pool, shop.store_id).await;

    let empty = engine.carts().get_cart(shop.store_id, session).await.expect("get cart");
    assert!(empty.is_empty());
    assert_eq!(empty.cart_id, None);
    assert_eq!(cart_count(&pool).await, 0);

    engine.carts().add_item(shop.store_id, session, red, 2).await.expect("add");
    engine.carts().add_item(shop.store_id, session, red, 3).await.expect("add again");

    let cart = engine.carts().get_cart(shop.store_id, session).await.expect("get cart");
    assert!(cart.cart_id.is_some());
    assert_eq!(cart.items.len(), 1);
    let item = cart.items.first().expect("one item");
    assert_eq!(item.variant_id, red);
    assert_eq!(item.quantity, 5);
    assert_eq!(item.unit_price, dec("12.50"));
    assert_eq!(item.line_total, dec("62.50"));
    assert_eq!(cart.total_quantity, 5);
    assert_eq!(cart.total, dec("62.50"));
    assert_eq!(cart_count(&pool).await, 1);
}

#[sqlx::test(migrations = "../engine/migrations")]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_add_item_rejections_write_nothing(pool: PgPool) {
    let shop = Shop::create(&pool, "Store A").await;
    let other = Shop::create(&pool, "Store B").await;
    let engine = engine(&pool, Arc::new(MemoryImageStore::default())).await;
    let red = stocked_variant(&engine, &shop, "red", "12.50", 2).await;
    let foreign = stocked_variant(&engine, &other, "red", "9.00", 5).await;
    let session = insert_session(&pool, shop.store_id).await;

    let result = engine.carts().add_item(shop.store_id, session, red, 0).await;
    assert!(matches!(result, Err(EngineError::InvalidQuantity(0))));

    let result = engine.carts().add_item(shop.store_id, session, red, 3).await;
    assert!(matches!(
        result,
        Err(EngineError::InsufficientStock {
            requested: 3,
            available: 2,
            ..
        })
    ));

    let result = engine.carts().add_item(shop.store_id, session, foreign, 1).await;
    assert!(matches!(result, Err(EngineError::InvalidVariant)));

    let result = engine
        .carts()
        .add_item(shop.store_id, SessionId::generate(), red, 1)
        .await;
    assert!(matches!(result, Err(EngineError::InvalidSession)));

    let foreign_session = insert_session(&pool, other.store_id).await;
    let result = engine.carts().add_item(shop.store_id, foreign_session, red, 1).await;
    assert!(matches!(result, Err(EngineError::InvalidSession)));

    // A rejected add rolls back the lazily created cart too.
    assert_eq!(cart_count(&pool).await, 0);
}

#[sqlx::test(migrations = "../engine/migrations")]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_price_snapshot_survives_price_change(pool: PgPool) {
    let shop = Shop::create(&pool, "Store A").await;
    let engine = engine(&pool, Arc::new(MemoryImageStore::default())).await;
    let red = stocked_variant(&engine, &shop, "red", "12.50", 10).await;
    let session = insert_session(&pool, shop.store_id).await;

    engine.carts().add_item(shop.store_id, session, red, 1).await.expect("add");
    sqlx::query("UPDATE product_variants SET price = 99.00 WHERE variant_id = $1")
        .bind(red)
        .execute(&pool)
        .await
        .expect("reprice");
    engine.carts().add_item(shop.store_id, session, red, 1).await.expect("add again");

    let cart = engine.carts().get_cart(shop.store_id, session).await.expect("get cart");
    let item = cart.items.first().expect("one item");
    assert_eq!(item.unit_price, dec("12.50"));
    assert_eq!(cart.total, dec("25.00"));
}

#[sqlx::test(migrations = "../engine/migrations")]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_concurrent_adds_share_one_cart(pool: PgPool) {
    let shop = Shop::create(&pool, "Store A").await;
    let engine = engine(&pool, Arc::new(MemoryImageStore::default())).await;
    let red = stocked_variant(&engine, &shop, "red", "1.00", 100).await;
    let session = insert_session(&pool, shop.store_id).await;

    let tasks: Vec<_> = (0..10)
        .map(|_| {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine.carts().add_item(shop.store_id, session, red, 1).await
            })
        })
        .collect();
    for task in tasks {
        task.await.expect("task joined").expect("add");
    }

    assert_eq!(cart_count(&pool).await, 1);
    let cart = engine.carts().get_cart(shop.store_id, session).await.expect("get cart");
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.total_quantity, 10);
}

// ============================================================================
// Merge On Login
// ============================================================================

#[sqlx::test(migrations = "../engine/migrations")]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_merge_without_session_cart_is_noop(pool: PgPool) {
    let shop = Shop::create(&pool, "Store A").await;
    let engine = engine(&pool, Arc::new(MemoryImageStore::default())).await;
    let session = insert_session(&pool, shop.store_id).await;
    let customer = insert_customer(&pool, shop.store_id, "a@example.com").await;

    let outcome = engine
        .carts()
        .merge_on_login(shop.store_id, customer, session)
        .await
        .expect("merge");
    assert_eq!(outcome, MergeOutcome::Noop);
    assert_eq!(cart_count(&pool).await, 0);
}

#[sqlx::test(migrations = "../engine/migrations")]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_merge_reassigns_session_cart(pool: PgPool) {
    let shop = Shop::create(&pool, "Store A").await;
    let engine = engine(&pool, Arc::new(MemoryImageStore::default())).await;
    let red = stocked_variant(&engine, &shop, "red", "5.00", 10).await;
    let session = insert_session(&pool, shop.store_id).await;
    let customer = insert_customer(&pool, shop.store_id, "a@example.com").await;

    engine.carts().add_item(shop.store_id, session, red, 2).await.expect("add");
    let before = engine.carts().get_cart(shop.store_id, session).await.expect("get cart");
    let cart_id = before.cart_id.expect("cart exists");

    let outcome = engine
        .carts()
        .merge_on_login(shop.store_id, customer, session)
        .await
        .expect("merge");
    assert_eq!(outcome, MergeOutcome::Reassigned { cart_id });

    // The linked session now shops on the customer's cart.
    let after = engine.carts().get_cart(shop.store_id, session).await.expect("get cart");
    assert_eq!(after.cart_id, Some(cart_id));
    assert_eq!(after.total_quantity, 2);

    let customer_owned: bool = sqlx::query_scalar(
        "SELECT customer_id IS NOT NULL AND session_id IS NULL FROM carts WHERE cart_id = $1",
    )
    .bind(cart_id)
    .fetch_one(&pool)
    .await
    .expect("cart owner");
    assert!(customer_owned);

    // A second merge for the same login finds nothing to do.
    let again = engine
        .carts()
        .merge_on_login(shop.store_id, customer, session)
        .await
        .expect("merge again");
    assert_eq!(again, MergeOutcome::Noop);
}

#[sqlx::test(migrations = "../engine/migrations")]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_merge_combines_into_existing_customer_cart(pool: PgPool) {
    let shop = Shop::create(&pool, "Store A").await;
    let engine = engine(&pool, Arc::new(MemoryImageStore::default())).await;
    let red = stocked_variant(&engine, &shop, "red", "5.00", 10).await;
    let blue = stocked_variant(&engine, &shop, "blue", "7.00", 10).await;
    let customer = insert_customer(&pool, shop.store_id, "a@example.com").await;

    // First device: log in and build a customer cart with red at 5.00.
    let laptop = insert_session(&pool, shop.store_id).await;
    engine
        .carts()
        .merge_on_login(shop.store_id, customer, laptop)
        .await
        .expect("link laptop");
    engine.carts().add_item(shop.store_id, laptop, red, 1).await.expect("add red");
    let customer_cart = engine
        .carts()
        .get_cart(shop.store_id, laptop)
        .await
        .expect("get cart")
        .cart_id
        .expect("customer cart");

    // Second device, anonymous: red after a price change, plus blue.
    sqlx::query("UPDATE product_variants SET price = 6.00 WHERE variant_id = $1")
        .bind(red)
        .execute(&pool)
        .await
        .expect("reprice");
    let phone = insert_session(&pool, shop.store_id).await;
    engine.carts().add_item(shop.store_id, phone, red, 2).await.expect("add red");
    engine.carts().add_item(shop.store_id, phone, blue, 1).await.expect("add blue");
    let session_cart = engine
        .carts()
        .get_cart(shop.store_id, phone)
        .await
        .expect("get cart")
        .cart_id
        .expect("session cart");

    let outcome = engine
        .carts()
        .merge_on_login(shop.store_id, customer, phone)
        .await
        .expect("merge");
    assert_eq!(
        outcome,
        MergeOutcome::Combined {
            cart_id: customer_cart,
            removed_cart_id: session_cart,
            merged_items: 2,
        }
    );
    assert_eq!(cart_count(&pool).await, 1);

    let cart = engine.carts().get_cart(shop.store_id, phone).await.expect("get cart");
    assert_eq!(cart.cart_id, Some(customer_cart));
    let red_item = cart.items.iter().find(|i| i.variant_id == red).expect("red");
    assert_eq!(red_item.quantity, 3);
    assert_eq!(red_item.unit_price, dec("5.00"));
    let blue_item = cart.items.iter().find(|i| i.variant_id == blue).expect("blue");
    assert_eq!(blue_item.quantity, 1);
    assert_eq!(cart.total, dec("22.00"));
}

#[sqlx::test(migrations = "../engine/migrations")]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_concurrent_logins_for_one_customer_fold_into_one_cart(pool: PgPool) {
    let shop = Shop::create(&pool, "Store A").await;
    let engine = engine(&pool, Arc::new(MemoryImageStore::default())).await;
    let red = stocked_variant(&engine, &shop, "red", "5.00", 1000).await;

    for round in 0..20 {
        let customer = insert_customer(&pool, shop.store_id, &format!("c{round}@example.com")).await;
        let laptop = insert_session(&pool, shop.store_id).await;
        let phone = insert_session(&pool, shop.store_id).await;
        engine.carts().add_item(shop.store_id, laptop, red, 1).await.expect("add laptop");
        engine.carts().add_item(shop.store_id, phone, red, 2).await.expect("add phone");

        let (first, second) = tokio::join!(
            engine.carts().merge_on_login(shop.store_id, customer, laptop),
            engine.carts().merge_on_login(shop.store_id, customer, phone),
        );
        let outcomes = [first.expect("merge laptop"), second.expect("merge phone")];

        // One login hands its cart over, the other folds into it.
        let reassigned = outcomes
            .iter()
            .filter(|o| matches!(o, MergeOutcome::Reassigned { .. }))
            .count();
        let combined = outcomes
            .iter()
            .filter(|o| matches!(o, MergeOutcome::Combined { merged_items: 1, .. }))
            .count();
        assert_eq!((reassigned, combined), (1, 1), "round {round}: {outcomes:?}");

        let customer_carts: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM carts WHERE customer_id = $1")
                .bind(customer)
                .fetch_one(&pool)
                .await
                .expect("count customer carts");
        assert_eq!(customer_carts, 1);
        let cart = engine.carts().get_cart(shop.store_id, laptop).await.expect("get cart");
        assert_eq!(cart.total_quantity, 3);
    }
}

#[sqlx::test(migrations = "../engine/migrations")]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_linked_add_and_login_merge_share_customer_cart(pool: PgPool) {
    let shop = Shop::create(&pool, "Store A").await;
    let engine = engine(&pool, Arc::new(MemoryImageStore::default())).await;
    let red = stocked_variant(&engine, &shop, "red", "5.00", 1000).await;

    for round in 0..20 {
        let customer = insert_customer(&pool, shop.store_id, &format!("c{round}@example.com")).await;
        // Linked but cartless: its first add creates the customer cart.
        let laptop = insert_session(&pool, shop.store_id).await;
        engine
            .carts()
            .merge_on_login(shop.store_id, customer, laptop)
            .await
            .expect("link laptop");
        let phone = insert_session(&pool, shop.store_id).await;
        engine.carts().add_item(shop.store_id, phone, red, 2).await.expect("add phone");

        let (added, merged) = tokio::join!(
            engine.carts().add_item(shop.store_id, laptop, red, 1),
            engine.carts().merge_on_login(shop.store_id, customer, phone),
        );
        added.expect("add laptop");
        merged.expect("merge phone");

        let customer_carts: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM carts WHERE customer_id = $1")
                .bind(customer)
                .fetch_one(&pool)
                .await
                .expect("count customer carts");
        assert_eq!(customer_carts, 1);
        let cart = engine.carts().get_cart(shop.store_id, phone).await.expect("get cart");
        assert_eq!(cart.total_quantity, 3);
    }
}

#[sqlx::test(migrations = "../engine/migrations")]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_merge_rejects_foreign_customer_and_relinking(pool: PgPool) {
    let shop = Shop::create(&pool, "Store A").await;
    let other = Shop::create(&pool, "Store B").await;
    let engine = engine(&pool, Arc::new(MemoryImageStore::default())).await;
    let session = insert_session(&pool, shop.store_id).await;
    let alice = insert_customer(&pool, shop.store_id, "alice@example.com").await;
    let bob = insert_customer(&pool, shop.store_id, "bob@example.com").await;
    let outsider = insert_customer(&pool, other.store_id, "carol@example.com").await;

    let result = engine.carts().merge_on_login(shop.store_id, outsider, session).await;
    assert!(matches!(result, Err(EngineError::InvalidCustomer)));

    let result = engine
        .carts()
        .merge_on_login(shop.store_id, alice, SessionId::generate())
        .await;
    assert!(matches!(result, Err(EngineError::InvalidSession)));

    engine
        .carts()
        .merge_on_login(shop.store_id, alice, session)
        .await
        .expect("link alice");
    let result = engine.carts().merge_on_login(shop.store_id, bob, session).await;
    assert!(matches!(result, Err(EngineError::InvalidSession)));
}

#[sqlx::test(migrations = "../engine/migrations")]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_stock_check_uses_current_variant_stock(pool: PgPool) {
    let shop = Shop::create(&pool, "Store A").await;
    let engine = engine(&pool, Arc::new(MemoryImageStore::default())).await;
    let red = stocked_variant(&engine, &shop, "red", "5.00", 3).await;
    let session = insert_session(&pool, shop.store_id).await;

    engine.carts().add_item(shop.store_id, session, red, 3).await.expect("add");
    set_variant_stock(&pool, red, 1).await;

    let result = engine.carts().add_item(shop.store_id, session, red, 2).await;
    assert!(matches!(
        result,
        Err(EngineError::InsufficientStock {
            requested: 2,
            available: 1,
            ..
        })
    ));

    let cart = engine.carts().get_cart(shop.store_id, session).await.expect("get cart");
    assert_eq!(cart.total_quantity, 3);
}

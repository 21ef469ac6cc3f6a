//! Cart transactions: view, stock-checked add and the login merge.
//!
//! A session's cart is owned by the session until the session is linked to a
//! customer; from then on the session shops on the customer's cart. Carts
//! are created lazily by the first `add_item`.
//!
//! The stock check in `add_item` is advisory. It runs under the cart lock,
//! so concurrent adds to one cart cannot lose updates, but it does not
//! reserve stock across carts. Stock is decremented at checkout.
//!
//! A login merge locks the customer row exclusively before it touches the
//! session or any cart, and an add from a linked session share-locks the
//! same row. Merges for one customer therefore run one at a time, and never
//! overlap an add to that customer's cart.

pub mod merge;

use std::time::Duration;

use sitebuilder_core::{CartOwner, CustomerId, SessionId, StoreId, VariantId};
use sqlx::{PgConnection, PgPool};
use tracing::{debug, info, instrument};

use self::merge::{MergePlan, plan_merge, split_carts};
use crate::db;
use crate::deadline::with_deadline;
use crate::error::{EngineError, EngineResult};
use crate::models::{Cart, CartView, MergeOutcome};

/// Cart service.
#[derive(Debug, Clone)]
pub struct CartService {
    pool: PgPool,
    timeout: Duration,
}

impl CartService {
    #[must_use]
    pub const fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    /// View the session's cart.
    ///
    /// Unknown sessions and sessions without a cart get [`CartView::empty`].
    /// Never writes.
    ///
    /// # Errors
    ///
    /// Returns `QueryFailed` if a query fails.
    #[instrument(skip(self), fields(store_id = %store_id, session_id = %session_id))]
    pub async fn get_cart(&self, store_id: StoreId, session_id: SessionId) -> EngineResult<CartView> {
        with_deadline("get_cart", self.timeout, async {
            let Some(session) = db::sessions::find_session(&self.pool, store_id, session_id)
                .await
                .map_err(EngineError::query)?
            else {
                debug!("Unknown session, returning empty cart");
                return Ok(CartView::empty());
            };

            let owner = CartOwner::for_session(session_id, session.customer_id);
            let Some(cart) = db::carts::find_cart(&self.pool, store_id, owner)
                .await
                .map_err(EngineError::query)?
            else {
                return Ok(CartView::empty());
            };

            let items = db::carts::list_items(&self.pool, cart.id)
                .await
                .map_err(EngineError::query)?;
            Ok(CartView::from_items(cart.id, items))
        })
        .await
    }

    /// Add `quantity` of a variant to the session's cart in one transaction.
    ///
    /// # Errors
    ///
    /// - `InvalidQuantity` if `quantity` is not positive
    /// - `InvalidSession` if the session is not in the store
    /// - `InvalidVariant` if the variant is not in the store
    /// - `InsufficientStock` if the variant has less stock than `quantity`
    /// - `TransactionFailed` / `DeadlineExceeded` on infrastructure failure
    ///
    /// On any error nothing is written.
    #[instrument(
        skip(self),
        fields(store_id = %store_id, session_id = %session_id, variant_id = %variant_id)
    )]
    pub async fn add_item(
        &self,
        store_id: StoreId,
        session_id: SessionId,
        variant_id: VariantId,
        quantity: i32,
    ) -> EngineResult<()> {
        if quantity <= 0 {
            return Err(EngineError::InvalidQuantity(quantity));
        }

        with_deadline("add_item", self.timeout, async {
            let mut tx = self.pool.begin().await.map_err(EngineError::transaction)?;

            let session = db::sessions::share_lock_session(&mut *tx, store_id, session_id)
                .await
                .map_err(EngineError::transaction)?
                .ok_or(EngineError::InvalidSession)?;
            if let Some(customer_id) = session.customer_id {
                let linked = db::sessions::share_lock_customer(&mut *tx, store_id, customer_id)
                    .await
                    .map_err(EngineError::transaction)?;
                if !linked {
                    return Err(EngineError::InvalidSession);
                }
            }
            let owner = CartOwner::for_session(session_id, session.customer_id);
            let cart = lock_or_create_cart(&mut tx, store_id, owner).await?;

            let variant = db::variants::find_in_store(&mut *tx, store_id, variant_id)
                .await
                .map_err(EngineError::transaction)?
                .ok_or(EngineError::InvalidVariant)?;
            if variant.stock_quantity < quantity {
                return Err(EngineError::InsufficientStock {
                    variant_id,
                    requested: quantity,
                    available: variant.stock_quantity,
                });
            }

            db::carts::upsert_item(&mut *tx, cart.id, variant.id, quantity, variant.price)
                .await
                .map_err(EngineError::transaction)?;
            db::carts::touch_cart(&mut *tx, cart.id)
                .await
                .map_err(EngineError::transaction)?;

            tx.commit().await.map_err(EngineError::transaction)?;
            info!(cart_id = %cart.id, quantity, "Added item to cart");
            Ok(())
        })
        .await
    }

    /// Move the session's cart to the customer after login.
    ///
    /// Links the session to the customer, then:
    /// - no session cart: nothing else
    /// - only a session cart: the cart is handed to the customer in place
    /// - both: session items are folded into the customer cart (quantities
    ///   add up, the customer's price snapshots are kept) and the session
    ///   cart is deleted
    ///
    /// Calling it again for the same login finds no session cart and does
    /// nothing.
    ///
    /// # Errors
    ///
    /// - `InvalidCustomer` if the customer is not in the store
    /// - `InvalidSession` if the session is not in the store or is linked to
    ///   another customer
    /// - `TransactionFailed` / `DeadlineExceeded` on infrastructure failure
    #[instrument(
        skip(self),
        fields(store_id = %store_id, customer_id = %customer_id, session_id = %session_id)
    )]
    pub async fn merge_on_login(
        &self,
        store_id: StoreId,
        customer_id: CustomerId,
        session_id: SessionId,
    ) -> EngineResult<MergeOutcome> {
        with_deadline("merge_on_login", self.timeout, async {
            let mut tx = self.pool.begin().await.map_err(EngineError::transaction)?;

            if !db::sessions::lock_customer(&mut *tx, store_id, customer_id)
                .await
                .map_err(EngineError::transaction)?
            {
                return Err(EngineError::InvalidCustomer);
            }

            let session = db::sessions::find_session(&mut *tx, store_id, session_id)
                .await
                .map_err(EngineError::transaction)?
                .ok_or(EngineError::InvalidSession)?;
            match session.customer_id {
                Some(linked) if linked != customer_id => return Err(EngineError::InvalidSession),
                Some(_) => {}
                None => db::sessions::link_customer(&mut *tx, store_id, session_id, customer_id)
                    .await
                    .map_err(EngineError::transaction)?,
            }

            let carts =
                db::carts::lock_carts_for_merge(&mut *tx, store_id, session_id, customer_id)
                    .await
                    .map_err(EngineError::transaction)?;
            let (session_cart, customer_cart) = split_carts(carts, session_id, customer_id);

            let outcome = match plan_merge(session_cart.as_ref(), customer_cart.as_ref()) {
                MergePlan::Noop => MergeOutcome::Noop,
                MergePlan::Reassign { cart } => {
                    db::carts::reassign_to_customer(&mut *tx, cart, customer_id)
                        .await
                        .map_err(EngineError::transaction)?;
                    MergeOutcome::Reassigned { cart_id: cart }
                }
                MergePlan::Combine { from, into } => {
                    let merged_items = db::carts::merge_items(&mut *tx, from, into)
                        .await
                        .map_err(EngineError::transaction)?;
                    db::carts::delete_cart(&mut *tx, from)
                        .await
                        .map_err(EngineError::transaction)?;
                    db::carts::touch_cart(&mut *tx, into)
                        .await
                        .map_err(EngineError::transaction)?;
                    MergeOutcome::Combined {
                        cart_id: into,
                        removed_cart_id: from,
                        merged_items,
                    }
                }
            };

            tx.commit().await.map_err(EngineError::transaction)?;
            info!(outcome = ?outcome, "Merged cart on login");
            Ok(outcome)
        })
        .await
    }
}

/// Lock the owner's cart, creating it first if it does not exist.
async fn lock_or_create_cart(
    conn: &mut PgConnection,
    store_id: StoreId,
    owner: CartOwner,
) -> EngineResult<Cart> {
    if let Some(cart) = db::carts::lock_cart(&mut *conn, store_id, owner)
        .await
        .map_err(EngineError::transaction)?
    {
        return Ok(cart);
    }

    if db::carts::insert_cart_if_absent(&mut *conn, store_id, owner)
        .await
        .map_err(EngineError::transaction)?
    {
        info!(owner = ?owner, "Created cart");
    }

    db::carts::lock_cart(&mut *conn, store_id, owner)
        .await
        .map_err(EngineError::transaction)?
        .ok_or_else(|| EngineError::transaction(db::RepositoryError::NotFound))
}

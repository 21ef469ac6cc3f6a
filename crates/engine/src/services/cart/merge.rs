//! Planning the login merge of a session cart into a customer cart.

use sitebuilder_core::{CartId, CartOwner, CustomerId, SessionId};

use crate::models::Cart;

/// What the merge has to do, decided from the carts that exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePlan {
    /// No session cart: nothing to do.
    Noop,
    /// Only a session cart: hand it to the customer in place.
    Reassign { cart: CartId },
    /// Both carts: fold the session cart into the customer cart and delete it.
    Combine { from: CartId, into: CartId },
}

/// Split the locked carts into the session's and the customer's.
#[must_use]
pub fn split_carts(
    carts: Vec<Cart>,
    session_id: SessionId,
    customer_id: CustomerId,
) -> (Option<Cart>, Option<Cart>) {
    let mut session_cart = None;
    let mut customer_cart = None;
    for cart in carts {
        match cart.owner {
            CartOwner::Session(id) if id == session_id => session_cart = Some(cart),
            CartOwner::Customer(id) if id == customer_id => customer_cart = Some(cart),
            _ => {}
        }
    }
    (session_cart, customer_cart)
}

/// Decide the merge from the carts that exist.
#[must_use]
pub fn plan_merge(session_cart: Option<&Cart>, customer_cart: Option<&Cart>) -> MergePlan {
    match (session_cart, customer_cart) {
        (None, _) => MergePlan::Noop,
        (Some(session), None) => MergePlan::Reassign { cart: session.id },
        (Some(session), Some(customer)) => MergePlan::Combine {
            from: session.id,
            into: customer.id,
        },
    }
}

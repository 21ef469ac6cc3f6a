//! Cart ownership.

use serde::{Deserialize, Serialize};

use super::id::CustomerId;
use super::session::SessionId;

/// Who a cart belongs to.
///
/// A cart is owned by exactly one party: an anonymous session before login, or
/// a customer afterwards. Ownership only moves from `Session` to `Customer`,
/// and only through the login merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum CartOwner {
    Session(SessionId),
    Customer(CustomerId),
}

impl CartOwner {
    /// Pick the owner for a session that may already be linked to a customer.
    ///
    /// Authenticated sessions shop on the customer's cart.
    #[must_use]
    pub const fn for_session(session_id: SessionId, customer_id: Option<CustomerId>) -> Self {
        match customer_id {
            Some(customer_id) => Self::Customer(customer_id),
            None => Self::Session(session_id),
        }
    }

    /// Rebuild an owner from the nullable column pair stored on a cart row.
    ///
    /// Returns `None` unless exactly one of the two keys is set.
    #[must_use]
    pub const fn from_columns(
        session_id: Option<SessionId>,
        customer_id: Option<CustomerId>,
    ) -> Option<Self> {
        match (session_id, customer_id) {
            (Some(session_id), None) => Some(Self::Session(session_id)),
            (None, Some(customer_id)) => Some(Self::Customer(customer_id)),
            _ => None,
        }
    }

    /// Split into the `(session_id, customer_id)` column pair.
    #[must_use]
    pub const fn to_columns(self) -> (Option<SessionId>, Option<CustomerId>) {
        match self {
            Self::Session(session_id) => (Some(session_id), None),
            Self::Customer(customer_id) => (None, Some(customer_id)),
        }
    }
}

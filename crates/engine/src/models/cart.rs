//! Cart models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sitebuilder_core::{CartId, CartItemId, CartOwner, ProductId, StoreId, VariantId};

/// A persisted cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cart {
    pub id: CartId,
    pub store_id: StoreId,
    pub owner: CartOwner,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A line item as shown to the shopper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartItemView {
    pub id: CartItemId,
    pub variant_id: VariantId,
    pub product_id: ProductId,
    pub product_name: String,
    pub sku: String,
    pub quantity: i32,
    /// Price captured when the variant was first added.
    pub unit_price: Decimal,
    pub line_total: Decimal,
    pub image_url: Option<String>,
}

/// Read-only view of a cart.
///
/// A shopper without a cart gets the empty view: no ID, no items, zero total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartView {
    pub cart_id: Option<CartId>,
    pub items: Vec<CartItemView>,
    pub total_quantity: i64,
    pub total: Decimal,
}

impl CartView {
    /// The view of a cart that does not exist.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            cart_id: None,
            items: Vec::new(),
            total_quantity: 0,
            total: Decimal::ZERO,
        }
    }

    /// Build a view from a cart's items, computing the totals.
    #[must_use]
    pub fn from_items(cart_id: CartId, items: Vec<CartItemView>) -> Self {
        let total = items.iter().map(|item| item.line_total).sum();
        let total_quantity = items.iter().map(|item| i64::from(item.quantity)).sum();
        Self {
            cart_id: Some(cart_id),
            items,
            total_quantity,
            total,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// What `merge_on_login` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum MergeOutcome {
    /// Nothing to merge: no session cart.
    Noop,
    /// The session cart now belongs to the customer.
    Reassigned { cart_id: CartId },
    /// Session items were folded into the customer's cart and the session
    /// cart was deleted.
    Combined {
        cart_id: CartId,
        removed_cart_id: CartId,
        merged_items: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: i64, quantity: i32, unit_price: Decimal) -> CartItemView {
        CartItemView {
            id: CartItemId::new(id),
            variant_id: VariantId::new(id),
            product_id: ProductId::new(1),
            product_name: "Tee".to_string(),
            sku: format!("TEE-{id}"),
            quantity,
            unit_price,
            line_total: unit_price * Decimal::from(quantity),
            image_url: None,
        }
    }

    #[test]
    fn test_empty_view() {
        let view = CartView::empty();
        assert!(view.is_empty());
        assert_eq!(view.cart_id, None);
        assert_eq!(view.total, Decimal::ZERO);
    }

    #[test]
    fn test_totals() {
        let view = CartView::from_items(
            CartId::new(4),
            vec![
                item(1, 2, Decimal::new(1999, 2)),
                item(2, 1, Decimal::new(500, 2)),
            ],
        );
        assert_eq!(view.total, Decimal::new(4498, 2));
        assert_eq!(view.total_quantity, 3);
    }
}

//! Pure rules applied while resolving a variant.

use std::collections::{BTreeSet, HashSet};

use rust_decimal::Decimal;

use sitebuilder_core::{AttributeId, AttributeValue, CategoryId, VariantId};

use crate::error::{AttributeViolation, EngineError, EngineResult};
use crate::models::{AttributeDefinition, VariantInput};

/// Reject variant input that no transaction should see.
///
/// # Errors
///
/// - `InvalidQuantity` if the stock delta is negative
/// - `InvalidPrice` if the price is negative
pub fn check_variant_input(input: &VariantInput) -> EngineResult<()> {
    if input.stock_delta < 0 {
        return Err(EngineError::InvalidQuantity(input.stock_delta));
    }
    if input.price < Decimal::ZERO {
        return Err(EngineError::InvalidPrice(input.price));
    }
    Ok(())
}

/// Check an attribute set against the category's definitions.
///
/// Checks run in order: each attribute appears once, each attribute is
/// defined for the category, and every required attribute is present.
///
/// # Errors
///
/// Returns the first violation found.
pub fn validate_attributes(
    category_id: CategoryId,
    definitions: &[AttributeDefinition],
    attributes: &[AttributeValue],
) -> Result<(), AttributeViolation> {
    let mut seen = HashSet::with_capacity(attributes.len());
    for attribute in attributes {
        if !seen.insert(attribute.attribute_id) {
            return Err(AttributeViolation::Duplicate {
                attribute_id: attribute.attribute_id,
            });
        }
    }

    let allowed: HashSet<AttributeId> = definitions
        .iter()
        .filter(|d| d.category_id == category_id)
        .map(|d| d.id)
        .collect();
    if let Some(attribute) = attributes
        .iter()
        .find(|a| !allowed.contains(&a.attribute_id))
    {
        return Err(AttributeViolation::Disallowed {
            attribute_id: attribute.attribute_id,
            category_id,
        });
    }

    let missing: BTreeSet<AttributeId> = definitions
        .iter()
        .filter(|d| d.category_id == category_id && d.is_required && !seen.contains(&d.id))
        .map(|d| d.id)
        .collect();
    if !missing.is_empty() {
        return Err(AttributeViolation::MissingRequired {
            attribute_ids: missing.into_iter().collect(),
        });
    }

    Ok(())
}

/// The product's default variant after `variant` was resolved.
///
/// A product without a default takes the first variant processed. A product
/// that had no stock switches to a newly created variant. Otherwise the
/// current default stays.
#[must_use]
pub fn next_default_variant(
    current: Option<VariantId>,
    was_sellable: bool,
    variant: VariantId,
    created: bool,
) -> VariantId {
    match current {
        Some(_) if created && !was_sellable => variant,
        Some(existing) => existing,
        None => variant,
    }
}

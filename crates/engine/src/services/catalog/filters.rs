//! Filter clause builders for the product listing.
//!
//! Each builder takes one criterion and the next free placeholder number and
//! returns a [`SqlFragment`]: SQL text that references only `$n` placeholders
//! plus the values to bind to them, in order. Builders never read or renumber
//! placeholders owned by another fragment; the caller threads a single
//! counter through them (see [`ListingQuery`](super::template::ListingQuery)).
//!
//! An absent criterion yields [`SqlFragment::empty`]. Values are never
//! rendered into SQL text.
//!
//! Aliases available to fragments:
//! - `p` - the product row (product-level filters)
//! - `v` - the candidate variant inside the representative-variant lateral join

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

use rust_decimal::Decimal;
use sitebuilder_core::{AttributeId, CategoryId};

use crate::models::AttributeFilter;

/// A value bound to a placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    BigInt(i64),
    Decimal(Decimal),
    Text(String),
    Bool(bool),
}

/// SQL text together with the values for its placeholders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SqlFragment {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl SqlFragment {
    /// No SQL, no parameters.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }

    /// Placeholder number following this fragment's parameters.
    #[must_use]
    pub fn next_index(&self, start: usize) -> usize {
        start + self.params.len()
    }
}

/// `AND p.category_id = $n`
#[must_use]
pub fn category_clause(category: Option<CategoryId>, next: usize) -> SqlFragment {
    category.map_or_else(SqlFragment::empty, |category| SqlFragment {
        sql: format!(" AND p.category_id = ${next}"),
        params: vec![SqlValue::BigInt(category.as_i64())],
    })
}

/// `AND p.brand = $n`. Blank brands are no filter; stored brands are trimmed.
#[must_use]
pub fn brand_clause(brand: Option<&str>, next: usize) -> SqlFragment {
    let brand = brand.map(str::trim).filter(|b| !b.is_empty());
    brand.map_or_else(SqlFragment::empty, |brand| SqlFragment {
        sql: format!(" AND p.brand = ${next}"),
        params: vec![SqlValue::Text(brand.to_string())],
    })
}

/// Stock presence on the product aggregate.
#[must_use]
pub fn in_stock_clause(in_stock: Option<bool>, next: usize) -> SqlFragment {
    in_stock.map_or_else(SqlFragment::empty, |in_stock| SqlFragment {
        sql: format!(" AND (p.stock_quantity > 0) = ${next}"),
        params: vec![SqlValue::Bool(in_stock)],
    })
}

/// Inclusive variant price range; either bound may be absent.
#[must_use]
pub fn price_clause(min: Option<Decimal>, max: Option<Decimal>, next: usize) -> SqlFragment {
    let mut fragment = SqlFragment::empty();
    if let Some(min) = min {
        let n = fragment.next_index(next);
        let _ = write!(fragment.sql, " AND v.price >= ${n}");
        fragment.params.push(SqlValue::Decimal(min));
    }
    if let Some(max) = max {
        let n = fragment.next_index(next);
        let _ = write!(fragment.sql, " AND v.price <= ${n}");
        fragment.params.push(SqlValue::Decimal(max));
    }
    fragment
}

/// One join per distinct attribute, each with its own alias.
///
/// Filters naming the same attribute twice are merged (their values are
/// unioned). Attributes with no accepted values are skipped. Joins are
/// emitted in attribute ID order, so the output does not depend on the
/// order of `filters`.
#[must_use]
pub fn attribute_joins(filters: &[AttributeFilter], next: usize) -> SqlFragment {
    let mut merged: BTreeMap<AttributeId, BTreeSet<&str>> = BTreeMap::new();
    for filter in filters {
        merged
            .entry(filter.attribute_id)
            .or_default()
            .extend(filter.values.iter().map(String::as_str));
    }

    let mut fragment = SqlFragment::empty();
    for (alias, (attribute_id, values)) in merged
        .into_iter()
        .filter(|(_, values)| !values.is_empty())
        .enumerate()
    {
        let alias = format!("vav{alias}");
        let id_index = fragment.next_index(next);
        fragment.params.push(SqlValue::BigInt(attribute_id.as_i64()));

        let mut placeholders = Vec::with_capacity(values.len());
        for value in values {
            placeholders.push(format!("${}", fragment.next_index(next)));
            fragment.params.push(SqlValue::Text(value.to_string()));
        }

        let _ = write!(
            fragment.sql,
            " JOIN variant_attribute_values {alias} ON {alias}.variant_id = v.variant_id \
             AND {alias}.attribute_id = ${id_index} AND {alias}.value IN ({})",
            placeholders.join(", ")
        );
    }
    fragment
}

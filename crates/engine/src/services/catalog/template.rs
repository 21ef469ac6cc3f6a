//! Listing template loading and query assembly.

use std::path::Path;

use sqlx::Postgres;
use sqlx::postgres::PgArguments;
use sqlx::query::QueryAs;

use super::filters::{
    SqlFragment, SqlValue, attribute_joins, brand_clause, category_clause, in_stock_clause,
    price_clause,
};
use crate::error::{EngineError, EngineResult};
use crate::models::ProductFilters;

const BUNDLED_TEMPLATE: &str = include_str!("../../../sql/list_products.sql");

const VARIANT_JOINS: &str = "/*{{VARIANT_JOINS}}*/";
const VARIANT_FILTERS: &str = "/*{{VARIANT_FILTERS}}*/";
const PRODUCT_FILTERS: &str = "/*{{PRODUCT_FILTERS}}*/";

/// Placeholders `$1..$3` are the store, limit and offset.
const FIRST_FILTER_INDEX: usize = 4;

/// The listing SQL with its three injection markers.
#[derive(Debug, Clone)]
pub struct ListingTemplate {
    sql: String,
}

impl ListingTemplate {
    /// The template compiled into the crate.
    ///
    /// # Errors
    ///
    /// Returns `TemplateUnavailable` if a marker is missing.
    pub fn bundled() -> EngineResult<Self> {
        Self::parse(BUNDLED_TEMPLATE.to_string())
    }

    /// Read a template from disk.
    ///
    /// # Errors
    ///
    /// Returns `TemplateUnavailable` if the file cannot be read or a marker is
    /// missing.
    pub async fn load(path: &Path) -> EngineResult<Self> {
        let sql = tokio::fs::read_to_string(path).await.map_err(|e| {
            EngineError::TemplateUnavailable(format!("{}: {e}", path.display()))
        })?;
        Self::parse(sql)
    }

    /// Validate template text.
    ///
    /// # Errors
    ///
    /// Returns `TemplateUnavailable` if a marker is missing.
    pub fn parse(sql: String) -> EngineResult<Self> {
        for marker in [VARIANT_JOINS, VARIANT_FILTERS, PRODUCT_FILTERS] {
            if !sql.contains(marker) {
                return Err(EngineError::TemplateUnavailable(format!(
                    "missing marker {marker}"
                )));
            }
        }
        Ok(Self { sql })
    }

    /// Splice filter fragments for `filters` into the template.
    #[must_use]
    pub fn build(&self, filters: &ProductFilters) -> ListingQuery {
        let mut params = ParamList::new();

        // Fixed order: product-level criteria, then variant-level ones.
        let mut product_filters = params.push(|n| category_clause(filters.category, n));
        product_filters.push_str(&params.push(|n| brand_clause(filters.brand.as_deref(), n)));
        product_filters.push_str(&params.push(|n| in_stock_clause(filters.in_stock, n)));
        let variant_filters = params.push(|n| price_clause(filters.min_price, filters.max_price, n));
        let variant_joins = params.push(|n| attribute_joins(&filters.attributes, n));

        // A product only matches when some variant satisfies the variant-level criteria.
        if !variant_filters.is_empty() || !variant_joins.is_empty() {
            product_filters.push_str(" AND pv.variant_id IS NOT NULL");
        }

        let sql = self
            .sql
            .replace(VARIANT_JOINS, &variant_joins)
            .replace(VARIANT_FILTERS, &variant_filters)
            .replace(PRODUCT_FILTERS, &product_filters);

        ListingQuery {
            sql,
            params: params.values,
        }
    }
}

/// The single placeholder counter shared by all builders of one query.
struct ParamList {
    next: usize,
    values: Vec<SqlValue>,
}

impl ParamList {
    const fn new() -> Self {
        Self {
            next: FIRST_FILTER_INDEX,
            values: Vec::new(),
        }
    }

    /// Run a builder at the current index and take ownership of its values.
    fn push(&mut self, build: impl FnOnce(usize) -> SqlFragment) -> String {
        let fragment = build(self.next);
        self.next = fragment.next_index(self.next);
        self.values.extend(fragment.params);
        fragment.sql
    }
}

/// A fully assembled listing query and its filter parameters (`$4..`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingQuery {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl ListingQuery {
    /// Bind filter parameters after the store, limit and offset.
    pub fn bind_params<'q, O>(
        &'q self,
        mut query: QueryAs<'q, Postgres, O, PgArguments>,
    ) -> QueryAs<'q, Postgres, O, PgArguments> {
        for param in &self.params {
            query = match param {
                SqlValue::BigInt(v) => query.bind(*v),
                SqlValue::Decimal(v) => query.bind(*v),
                SqlValue::Text(v) => query.bind(v.as_str()),
                SqlValue::Bool(v) => query.bind(*v),
            };
        }
        query
    }

    /// Highest placeholder number used in the SQL.
    #[must_use]
    pub fn placeholder_count(&self) -> usize {
        FIRST_FILTER_INDEX - 1 + self.params.len()
    }
}

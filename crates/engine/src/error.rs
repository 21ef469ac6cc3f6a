//! Engine error taxonomy.

use rust_decimal::Decimal;
use sitebuilder_core::{AttributeId, CategoryId, VariantId};
use thiserror::Error;

use crate::db::RepositoryError;
use crate::media::MediaError;
use crate::storage::StorageError;

/// Result alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Why an attribute set was rejected for a product's category.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttributeViolation {
    /// The attribute is not defined for the product's category.
    #[error("attribute {attribute_id} is not allowed in category {category_id}")]
    Disallowed {
        attribute_id: AttributeId,
        category_id: CategoryId,
    },

    /// Required attributes of the category were not supplied.
    #[error("missing required attributes: {}", join_ids(attribute_ids))]
    MissingRequired { attribute_ids: Vec<AttributeId> },

    /// The same attribute was supplied more than once.
    #[error("attribute {attribute_id} supplied more than once")]
    Duplicate { attribute_id: AttributeId },
}

fn join_ids(ids: &[AttributeId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors returned by engine operations.
///
/// Validation variants are returned before any state changes. Once a
/// transaction has begun, failures surface as [`EngineError::TransactionFailed`]
/// and nothing is committed.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("category attribute violation: {0}")]
    CategoryAttributeViolation(#[from] AttributeViolation),

    #[error("product not found")]
    ProductNotFound,

    #[error("category not found")]
    CategoryNotFound,

    #[error("invalid session")]
    InvalidSession,

    #[error("invalid customer")]
    InvalidCustomer,

    #[error("invalid variant")]
    InvalidVariant,

    #[error("quantity must be positive, got {0}")]
    InvalidQuantity(i32),

    #[error("price must not be negative, got {0}")]
    InvalidPrice(Decimal),

    #[error("insufficient stock for variant {variant_id}: requested {requested}, available {available}")]
    InsufficientStock {
        variant_id: VariantId,
        requested: i32,
        available: i32,
    },

    #[error("listing template unavailable: {0}")]
    TemplateUnavailable(String),

    #[error("query failed: {0}")]
    QueryFailed(#[source] RepositoryError),

    #[error("transaction failed: {0}")]
    TransactionFailed(#[source] RepositoryError),

    #[error("operation deadline exceeded")]
    DeadlineExceeded,

    #[error("image rejected: {0}")]
    ImageRejected(#[from] MediaError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl EngineError {
    /// Wrap a repository error raised on a read path.
    pub fn query(err: impl Into<RepositoryError>) -> Self {
        Self::QueryFailed(err.into())
    }

    /// Wrap a repository error raised inside a transaction.
    pub fn transaction(err: impl Into<RepositoryError>) -> Self {
        Self::TransactionFailed(err.into())
    }

    /// Whether the error was caused by caller input rather than infrastructure.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::CategoryAttributeViolation(_)
                | Self::ProductNotFound
                | Self::CategoryNotFound
                | Self::InvalidSession
                | Self::InvalidCustomer
                | Self::InvalidVariant
                | Self::InvalidQuantity(_)
                | Self::InvalidPrice(_)
                | Self::InsufficientStock { .. }
                | Self::ImageRejected(_)
        )
    }
}

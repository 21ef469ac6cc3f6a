//! Core types for the catalog and cart engine.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod attributes;
pub mod id;
pub mod owner;
pub mod pagination;
pub mod session;

pub use attributes::{AttributeHash, AttributeValue};
pub use id::*;
pub use owner::CartOwner;
pub use pagination::{DEFAULT_LIMIT, MAX_LIMIT, Pagination};
pub use session::SessionId;

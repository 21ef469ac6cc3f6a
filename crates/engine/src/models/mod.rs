//! Domain models returned by the engine.
//!
//! These are the typed results of the public operations. Database row types
//! stay private to `crate::db` and are converted into these.

pub mod cart;
pub mod catalog;

pub use cart::{Cart, CartItemView, CartView, MergeOutcome};
pub use catalog::{
    AttributeDefinition, AttributeFilter, Category, ImageOutcome, NewProduct, Product,
    ProductCreation, ProductDetail, ProductFilters, ProductPage, ProductSummary, Variant,
    VariantAttribute, VariantDetail, VariantInput, VariantResolution,
};

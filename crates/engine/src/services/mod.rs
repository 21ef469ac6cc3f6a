//! Engine services.
//!
//! - [`variants`] - Variant resolution and other catalog writes
//! - [`catalog`] - Filtered product listing and catalog reads
//! - [`cart`] - Cart view, stock-checked add and login merge

pub mod cart;
pub mod catalog;
pub mod variants;

pub use cart::CartService;
pub use catalog::CatalogService;
pub use variants::VariantService;

//! Site Builder Engine - catalog and cart consistency for multi-tenant stores.
//!
//! The engine keeps catalog writes and carts correct under concurrent
//! requests against a shared `PostgreSQL` database:
//!
//! - [`services::variants`] - resolve an attribute set to a variant
//!   (create or restock), keeping product stock and default variant in step
//! - [`services::catalog`] - filtered, paginated product listing assembled
//!   from a SQL template and composable filter fragments
//! - [`services::cart`] - stock-checked add-to-cart and the session to
//!   customer merge at login
//!
//! HTTP handling, authentication and checkout live outside this crate.
//!
//! # Example
//!
//! ```rust,ignore
//! use sitebuilder_engine::{Engine, EngineConfig};
//!
//! let config = EngineConfig::from_env()?;
//! let engine = Engine::connect(&config).await?;
//! let page = engine.catalog().list_products(store_id, &filters).await?;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod deadline;
pub mod engine;
pub mod error;
pub mod media;
pub mod models;
pub mod services;
pub mod storage;

pub use config::{ConfigError, EngineConfig};
pub use engine::Engine;
pub use error::{AttributeViolation, EngineError, EngineResult};

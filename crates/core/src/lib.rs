//! Site Builder Core - Shared catalog and cart types.
//!
//! This crate provides the types shared by all site builder components:
//! - `engine` - Catalog & cart consistency engine (`PostgreSQL`)
//! - `cli` - Command-line tools for migrations and catalog inspection
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access. Database encoding for the ID types is available behind the
//! `postgres` feature.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, attribute hashing, cart ownership, pagination

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;

//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! sb-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `ENGINE_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string
//!
//! # Migration Files
//!
//! Migrations live in `crates/engine/migrations/` and are embedded in the
//! engine crate at build time.

use sitebuilder_engine::{EngineConfig, db};
use tracing::info;

use super::CommandError;

/// Apply all pending engine migrations.
///
/// # Errors
///
/// Returns `CommandError` if configuration is missing, the database is
/// unreachable, or a migration fails.
pub async fn run() -> Result<(), CommandError> {
    let config = EngineConfig::from_env()?;

    info!("Connecting to database...");
    let pool = db::create_pool(&config.database).await?;

    info!("Running engine migrations...");
    db::run_migrations(&pool).await?;

    info!("Migrations complete!");
    Ok(())
}

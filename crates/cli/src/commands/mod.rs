//! Command implementations.

pub mod cart;
pub mod catalog;
pub mod migrate;

use serde::Serialize;
use sitebuilder_engine::{ConfigError, Engine, EngineConfig, EngineError};
use thiserror::Error;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration failed.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// The engine rejected or failed the operation.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// A command-line argument could not be interpreted.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// An input file could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Output could not be serialized.
    #[error("Output error: {0}")]
    Output(#[from] serde_json::Error),
}

/// Connect an engine using configuration from the environment.
async fn connect() -> Result<Engine, CommandError> {
    let config = EngineConfig::from_env()?;
    Ok(Engine::connect(&config).await?)
}

/// Print a value to stdout as pretty JSON.
fn print_json<T: Serialize>(value: &T) -> Result<(), CommandError> {
    let rendered = serde_json::to_string_pretty(value)?;
    #[allow(clippy::print_stdout)]
    {
        println!("{rendered}");
    }
    Ok(())
}

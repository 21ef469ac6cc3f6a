//! Engine configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `ENGINE_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! ## Optional
//! - `ENGINE_DB_MAX_CONNECTIONS` - Pool size (default: 10)
//! - `ENGINE_DB_MIN_CONNECTIONS` - Idle connections kept open (default: 2)
//! - `ENGINE_DB_ACQUIRE_TIMEOUT_SECS` - Pool acquire timeout (default: 10)
//! - `ENGINE_OPERATION_TIMEOUT_MS` - Deadline for every engine operation (default: 5000)
//! - `ENGINE_LISTING_TEMPLATE` - Path to a listing SQL template (default: bundled template)
//!
//! ## Optional (object storage)
//! - `S3_BUCKET` - Bucket for product images; storage is disabled when unset
//! - `S3_REGION` - AWS region (default: provider chain)
//! - `S3_ENDPOINT` - Custom endpoint for S3-compatible stores (e.g. `MinIO`)
//! - `S3_FORCE_PATH_STYLE` - `true` for path-style addressing (default: false)
//! - `S3_PUBLIC_BASE_URL` - Public URL prefix for uploaded objects

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_MIN_CONNECTIONS: u32 = 2;
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 10;
const DEFAULT_OPERATION_TIMEOUT_MS: u64 = 5_000;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Connection pool settings
    pub database: DatabaseConfig,
    /// Deadline applied to each engine operation
    pub operation_timeout: Duration,
    /// Listing template override; `None` uses the bundled template
    pub listing_template: Option<PathBuf>,
    /// Object storage for product images (optional)
    pub storage: Option<StorageConfig>,
}

/// `PostgreSQL` pool configuration.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Connection URL (contains password)
    pub url: SecretString,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
}

/// S3-compatible object storage configuration.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub bucket: String,
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub force_path_style: bool,
    /// Prefix joined with the object key to build public URLs
    pub public_base_url: Option<String>,
}

impl EngineConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database = DatabaseConfig::from_env()?;
        let operation_timeout = Duration::from_millis(parse_env_or(
            "ENGINE_OPERATION_TIMEOUT_MS",
            DEFAULT_OPERATION_TIMEOUT_MS,
        )?);
        let listing_template = get_optional_env("ENGINE_LISTING_TEMPLATE").map(PathBuf::from);
        let storage = StorageConfig::from_env()?;

        Ok(Self {
            database,
            operation_timeout,
            listing_template,
            storage,
        })
    }
}

impl DatabaseConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            url: get_database_url("ENGINE_DATABASE_URL")?,
            max_connections: parse_env_or("ENGINE_DB_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?,
            min_connections: parse_env_or("ENGINE_DB_MIN_CONNECTIONS", DEFAULT_MIN_CONNECTIONS)?,
            acquire_timeout_secs: parse_env_or(
                "ENGINE_DB_ACQUIRE_TIMEOUT_SECS",
                DEFAULT_ACQUIRE_TIMEOUT_SECS,
            )?,
        })
    }
}

impl StorageConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(bucket) = get_optional_env("S3_BUCKET") else {
            return Ok(None);
        };
        Ok(Some(Self {
            bucket,
            region: get_optional_env("S3_REGION"),
            endpoint: get_optional_env("S3_ENDPOINT"),
            force_path_style: parse_env_or("S3_FORCE_PATH_STYLE", false)?,
            public_base_url: get_optional_env("S3_PUBLIC_BASE_URL"),
        }))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Some(value) = get_optional_env(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Some(value) = get_optional_env("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable, treating empty values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse an optional environment variable, falling back to `default`.
fn parse_env_or<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_optional_env(key).map_or(Ok(default), |raw| parse_value(key, &raw))
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

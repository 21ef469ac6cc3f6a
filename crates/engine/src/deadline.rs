//! Operation deadlines.
//!
//! Every public engine operation runs under [`with_deadline`]. When the
//! deadline elapses the operation future is dropped; an open
//! `sqlx::Transaction` inside it is dropped without commit and rolls back.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::{EngineError, EngineResult};

/// Run `fut` to completion or fail with [`EngineError::DeadlineExceeded`].
///
/// # Errors
///
/// Returns the operation's own error, or `DeadlineExceeded` on timeout.
pub async fn with_deadline<T, F>(operation: &'static str, limit: Duration, fut: F) -> EngineResult<T>
where
    F: Future<Output = EngineResult<T>>,
{
    if let Ok(result) = tokio::time::timeout(limit, fut).await {
        result
    } else {
        warn!(operation, timeout_ms = limit.as_millis(), "Operation deadline exceeded");
        Err(EngineError::DeadlineExceeded)
    }
}

//! Sessions and customers.

use sitebuilder_core::{CustomerId, SessionId, StoreId};
use sqlx::PgExecutor;

use super::RepositoryError;

/// A session scoped to its store.
#[derive(Debug, Clone, Copy, sqlx::FromRow)]
pub struct SessionRow {
    pub session_id: SessionId,
    pub store_id: StoreId,
    pub customer_id: Option<CustomerId>,
}

/// Find a session belonging to `store_id`.
///
/// # Errors
///
/// Returns error if the database query fails.
pub async fn find_session<'e, E>(
    executor: E,
    store_id: StoreId,
    session_id: SessionId,
) -> Result<Option<SessionRow>, RepositoryError>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query_as::<_, SessionRow>(
        r"
        SELECT session_id, store_id, customer_id
        FROM sessions
        WHERE session_id = $1 AND store_id = $2
        ",
    )
    .bind(session_id)
    .bind(store_id)
    .fetch_optional(executor)
    .await?;

    Ok(row)
}

/// Find a session and hold a share lock on it for the rest of the transaction.
///
/// Blocks while a login merge is linking the session, and keeps the merge
/// from linking it until this transaction ends.
///
/// # Errors
///
/// Returns error if the database query fails.
pub async fn share_lock_session<'e, E>(
    executor: E,
    store_id: StoreId,
    session_id: SessionId,
) -> Result<Option<SessionRow>, RepositoryError>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query_as::<_, SessionRow>(
        r"
        SELECT session_id, store_id, customer_id
        FROM sessions
        WHERE session_id = $1 AND store_id = $2
        FOR SHARE
        ",
    )
    .bind(session_id)
    .bind(store_id)
    .fetch_optional(executor)
    .await?;

    Ok(row)
}

/// Link a session to the customer that authenticated on it.
///
/// # Errors
///
/// Returns `NotFound` if the session does not exist in the store.
pub async fn link_customer<'e, E>(
    executor: E,
    store_id: StoreId,
    session_id: SessionId,
    customer_id: CustomerId,
) -> Result<(), RepositoryError>
where
    E: PgExecutor<'e>,
{
    let result = sqlx::query(
        r"
        UPDATE sessions
        SET customer_id = $3
        WHERE session_id = $1 AND store_id = $2
        ",
    )
    .bind(session_id)
    .bind(store_id)
    .bind(customer_id)
    .execute(executor)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound);
    }
    Ok(())
}

/// Find a customer in `store_id` and lock the row for the rest of the transaction.
///
/// Login merges for one customer hold this lock, so a second login sees the
/// cart the first one handed over.
///
/// # Errors
///
/// Returns error if the database query fails.
pub async fn lock_customer<'e, E>(
    executor: E,
    store_id: StoreId,
    customer_id: CustomerId,
) -> Result<bool, RepositoryError>
where
    E: PgExecutor<'e>,
{
    let row: Option<CustomerId> = sqlx::query_scalar(
        r"
        SELECT customer_id
        FROM customers
        WHERE customer_id = $1 AND store_id = $2
        FOR UPDATE
        ",
    )
    .bind(customer_id)
    .bind(store_id)
    .fetch_optional(executor)
    .await?;

    Ok(row.is_some())
}

/// Find a customer in `store_id` and hold a share lock on the row.
///
/// Taken by adds that shop on the customer's cart; blocks while a login
/// merge for the same customer is in progress.
///
/// # Errors
///
/// Returns error if the database query fails.
pub async fn share_lock_customer<'e, E>(
    executor: E,
    store_id: StoreId,
    customer_id: CustomerId,
) -> Result<bool, RepositoryError>
where
    E: PgExecutor<'e>,
{
    let row: Option<CustomerId> = sqlx::query_scalar(
        r"
        SELECT customer_id
        FROM customers
        WHERE customer_id = $1 AND store_id = $2
        FOR SHARE
        ",
    )
    .bind(customer_id)
    .bind(store_id)
    .fetch_optional(executor)
    .await?;

    Ok(row.is_some())
}

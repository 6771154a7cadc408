//! Store-call failure classification.
//!
//! Most call sites in this crate report outcomes as plain `anyhow::Result`
//! with `.context()`. [`StoreError`] exists for the narrower set of callers
//! that need to distinguish *why* a store call failed -- a dispatcher loop
//! deciding whether to retry, for instance -- rather than just propagating
//! a message upward.

use thiserror::Error;

/// A store-call failure, classified by how a caller should react to it.
///
/// `Conflict` (a unique-constraint violation) is ordinary concurrent-claim
/// flow and is already absorbed by `ON CONFLICT DO NOTHING` at every
/// insert in this crate, so it is rare for a caller to observe one
/// directly; it is kept here for completeness and for any future insert
/// that does not already neutralize the race at the SQL level.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store conflict: {0}")]
    Conflict(String),

    #[error("transient store error: {0}")]
    Transient(String),

    #[error("permanent store error: {0}")]
    Permanent(String),

    #[error("not found")]
    NotFound,
}

/// Classify a raw `sqlx::Error` into a [`StoreError`]: conflict
/// (unique-violation), transient (connection/timeout/pool), or permanent
/// (anything else, including other constraint violations).
pub fn classify_sqlx_error(err: &sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::RowNotFound => StoreError::NotFound,
        sqlx::Error::Database(db_err) => {
            if db_err.is_unique_violation() {
                StoreError::Conflict(db_err.message().to_string())
            } else {
                StoreError::Permanent(db_err.message().to_string())
            }
        }
        sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => StoreError::Transient(err.to_string()),
        other => StoreError::Permanent(other.to_string()),
    }
}

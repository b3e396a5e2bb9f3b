//! Bounded store calls shared by every domain service.
//!
//! Each individual store call is capped by a timeout. Idempotent reads may be
//! retried on transient failures; writes go through [`bounded`] only.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

/// Error types that can report a store timeout and classify transient
/// failures.
pub trait StoreFailure: std::fmt::Display + Sized {
    /// The error for a call that exceeded its timeout.
    fn timed_out(op: &'static str) -> Self;

    /// Whether retrying the same idempotent read might succeed.
    fn is_retryable(&self) -> bool;
}

/// Whether an sqlx error is a pool or connection hiccup rather than a
/// query-level failure.
pub fn is_transient_db_error(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::PoolTimedOut | sqlx::Error::Io(_))
}

/// Bound a single store call by `timeout`; expiry becomes
/// [`StoreFailure::timed_out`].
pub async fn bounded<T, E, F>(op: &'static str, timeout: Duration, fut: F) -> Result<T, E>
where
    E: StoreFailure,
    F: Future<Output = Result<T, E>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => {
            warn!(op, ?timeout, "store call timed out");
            Err(E::timed_out(op))
        }
    }
}

/// Run an idempotent read with a timeout, retrying transient failures up to
/// `retries` extra times.
pub async fn read_with_retry<T, E, F, Fut>(
    op: &'static str,
    timeout: Duration,
    retries: u32,
    mut call: F,
) -> Result<T, E>
where
    E: StoreFailure,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0;
    loop {
        match bounded(op, timeout, call()).await {
            Err(e) if e.is_retryable() && attempt < retries => {
                attempt += 1;
                debug!(op, attempt, error = %e, "retrying store read");
            }
            other => return other,
        }
    }
}

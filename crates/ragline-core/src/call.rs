//! Bounded execution of blocking model and index calls.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CallError<E> {
    #[error("{label} timed out after {timeout:?}")]
    Timeout { label: &'static str, timeout: Duration },

    #[error("{label} failed: {error}")]
    Failed { label: &'static str, error: E },

    #[error("{label} aborted: {reason}")]
    Aborted { label: &'static str, reason: String },
}

/// Run `f` on the blocking pool and give up after `timeout`.
///
/// An expired call keeps running on its thread; its result is discarded.
pub async fn run_blocking<T, E, F>(label: &'static str, timeout: Duration, f: F) -> Result<T, CallError<E>>
where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    match tokio::time::timeout(timeout, tokio::task::spawn_blocking(f)).await {
        Err(_) => Err(CallError::Timeout { label, timeout }),
        Ok(Err(join)) => Err(CallError::Aborted { label, reason: join.to_string() }),
        Ok(Ok(Err(error))) => Err(CallError::Failed { label, error }),
        Ok(Ok(Ok(value))) => Ok(value),
    }
}

//! Async utilities

use crate::error::{DeskError, DeskResult, ErrorContext};
use std::future::Future;
use tokio::time::{timeout, Duration};
use tracing::warn;

/// Timeout wrapper for async operations
///
/// The inner future is dropped when the deadline fires, so anything it owns is released.
pub async fn with_timeout<F, T>(future: F, timeout_ms: u64, operation_name: &str) -> DeskResult<T>
where
    F: Future<Output = T>,
{
    match timeout(Duration::from_millis(timeout_ms), future).await {
        Ok(result) => Ok(result),
        Err(_) => {
            warn!(
                operation = operation_name,
                timeout_ms = timeout_ms,
                "Operation timed out"
            );
            Err(DeskError::Timeout {
                operation: operation_name.to_string(),
                duration_ms: timeout_ms,
                context: ErrorContext::new("async_utils")
                    .with_operation("timeout")
                    .with_metadata("timeout_ms", &timeout_ms.to_string())
                    .with_suggestion("Increase timeout duration")
                    .with_suggestion("Check network connectivity")
                    .with_suggestion("Verify service availability"),
            })
        }
    }
}

/// Same as [`with_timeout`] for futures that already return a `DeskResult`
pub async fn try_with_timeout<F, T>(
    future: F,
    timeout_ms: u64,
    operation_name: &str,
) -> DeskResult<T>
where
    F: Future<Output = DeskResult<T>>,
{
    with_timeout(future, timeout_ms, operation_name).await?
}

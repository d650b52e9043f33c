//! Hard deadline across a whole authenticate-then-call chain.

use std::future::Future;
use std::time::Duration;

use crate::error::RelayError;

/// Run `future` to completion or fail with [`RelayError::Timeout`].
///
/// The inner future is dropped on expiry; no partial result is returned.
pub async fn with_deadline<T>(
    duration: Duration,
    future: impl Future<Output = Result<T, RelayError>>,
) -> Result<T, RelayError> {
    tokio::time::timeout(duration, future)
        .await
        .unwrap_or_else(|_| {
            let timeout_ms = millis(duration);
            tracing::warn!(timeout_ms, "Deadline exceeded");
            Err(RelayError::Timeout(timeout_ms))
        })
}

/// Whole milliseconds, saturating at `u64::MAX`.
fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

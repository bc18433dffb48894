//! Timeout helper.

use std::future::Future;
use std::time::Duration;

use crate::error::CreoleError;

/// Wrap a future with a timeout, mapping expiry to [`CreoleError::Timeout`].
pub async fn with_timeout<T>(
    duration: Duration,
    future: impl Future<Output = Result<T, CreoleError>>,
) -> Result<T, CreoleError> {
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(CreoleError::Timeout(duration.as_millis() as u64)),
    }
}

//! Waiting out backend rate limits.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::sleep_or_cancel;
use crate::error::{AppError, Result};

/// Retries an operation for as long as the backend answers `RateLimited`.
///
/// There is no attempt cap. Each wait is exactly the requested duration and
/// ends early only when the run is cancelled.
#[derive(Debug, Clone)]
pub struct RateLimitRetry {
    long_wait_warning: Duration,
    cancel: CancellationToken,
}

impl RateLimitRetry {
    pub fn new(long_wait_warning: Duration, cancel: CancellationToken) -> Self {
        Self {
            long_wait_warning,
            cancel,
        }
    }

    /// Run `op` until it returns anything other than `RateLimited`.
    ///
    /// `waits` is bumped once per wait. Returns `Cancelled` if the run is
    /// cancelled mid-wait.
    pub async fn run<T, F, Fut>(&self, context: &str, waits: &mut usize, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        loop {
            match op().await {
                Err(AppError::RateLimited { retry_after }) => {
                    *waits += 1;
                    if retry_after >= self.long_wait_warning {
                        log::warn!(
                            "Long FloodWait {}s on {}; waiting (Ctrl-C to stop)",
                            retry_after.as_secs(),
                            context
                        );
                    } else {
                        log::warn!("FloodWait {:.1}s on {}", retry_after.as_secs_f64(), context);
                    }
                    sleep_or_cancel(retry_after, &self.cancel).await?;
                }
                other => return other,
            }
        }
    }
}

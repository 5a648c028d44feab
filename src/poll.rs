//! Bounded polling and fixed-delay retry.

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::CapuError;

/// Poll `check` until it yields a value or `timeout` elapses.
///
/// The first check runs immediately, later ones every `interval`, and one
/// final check runs at the deadline. An error from `check` aborts the poll.
pub async fn poll_immediate<T, F, Fut>(
    operation: &str,
    interval: Duration,
    timeout: Duration,
    mut check: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let deadline = Instant::now() + timeout;
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        if let Some(value) = check().await? {
            debug!(operation, attempt, "Condition met");
            return Ok(value);
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(CapuError::timeout(operation, timeout).into());
        }
        debug!(operation, attempt, "Condition not met, waiting");
        tokio::time::sleep_until((now + interval).min(deadline)).await;
    }
}

/// Run `op` up to `attempts` times, sleeping `interval` between failures.
///
/// Returns the last error once the attempts are exhausted.
pub async fn retry<T, F, Fut>(attempts: u32, interval: Duration, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= attempts => return Err(e),
            Err(e) => {
                warn!(
                    attempt,
                    attempts,
                    error = %e,
                    delay_ms = interval.as_millis(),
                    "Operation failed, retrying"
                );
                tokio::time::sleep(interval).await;
            }
        }
    }
}

use std::future::Future;
use std::time::Duration;

#[cfg(not(target_arch = "wasm32"))]
use tokio::time::sleep;

use crate::{NotFoundRetry, Result};

/// Runs `op` and retries it while it fails with a not-found error.
///
/// At most `policy.max_attempts + 1` calls are made. Any other error is
/// returned as soon as it occurs; once the attempts are used up the error of
/// the final attempt is returned. With `policy.enabled == false` this is a
/// single call.
///
/// The client places this outside [`crate::with_auto_relogin`], so every
/// attempt may relogin on its own.
pub async fn with_not_found_retry<T, F, Fut>(policy: &NotFoundRetry, op: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    if !policy.enabled {
        return op().await;
    }

    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if !err.is_not_found() => return Err(err),
            Err(err) => {
                if attempt >= policy.max_attempts {
                    return Err(err);
                }
                attempt += 1;

                #[cfg(feature = "tracing")]
                tracing::debug!(
                    "not found ({err}); retry {attempt}/{} after {:?}",
                    policy.max_attempts,
                    policy.delay
                );

                wait(policy.delay).await;
            }
        }
    }
}

/// Yields to the runtime for `delay`. No-op on WASM, where no timer exists.
async fn wait(delay: Duration) {
    #[cfg(not(target_arch = "wasm32"))]
    if !delay.is_zero() {
        sleep(delay).await;
    }

    #[cfg(target_arch = "wasm32")]
    let _ = delay;
}

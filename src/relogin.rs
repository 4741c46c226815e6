use std::future::Future;

use crate::Result;

/// Runs `op`; if it fails because the session token expired, runs `relogin`
/// once and replays `op` once.
///
/// Errors of any other kind are returned untouched, as is a failing
/// `relogin`. There is never a third call to `op`. With `enabled == false`
/// this is a single call.
pub async fn with_auto_relogin<T, F, Fut, L, LFut>(enabled: bool, op: F, relogin: L) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
    L: FnOnce() -> LFut,
    LFut: Future<Output = Result<()>>,
{
    match op().await {
        Err(err) if enabled && err.is_session_invalid() => {
            #[cfg(feature = "tracing")]
            tracing::debug!("session expired ({err}); logging in again");

            relogin().await?;
            op().await
        }
        other => other,
    }
}

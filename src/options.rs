use std::time::Duration;

/// Configures HTTP timeout, session recovery and read retries.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClientOptions {
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Verify the server's TLS certificate. Ignored on `wasm32`.
    pub verify_ssl: bool,
    /// Data API version segment of every path, e.g. `v1` or `vLatest`.
    pub api_version: String,
    /// Log in again and replay the call once when the session token expired.
    pub auto_relogin: bool,
    /// Retry policy for reads that report a missing record.
    pub not_found_retry: NotFoundRetry,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            verify_ssl: true,
            api_version: "v1".to_owned(),
            auto_relogin: true,
            not_found_retry: NotFoundRetry::default(),
        }
    }
}

/// Bounded fixed-delay retry for `get_record`, `get_records` and `find`.
///
/// Useful right after a write on a server that serves reads from a lagging
/// replica: the record exists but is not visible yet.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NotFoundRetry {
    pub enabled: bool,
    /// Retries after the initial attempt.
    pub max_attempts: u32,
    /// Wait between two attempts.
    pub delay: Duration,
}

impl NotFoundRetry {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            enabled: true,
            max_attempts,
            delay,
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

impl Default for NotFoundRetry {
    fn default() -> Self {
        Self {
            enabled: false,
            max_attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}

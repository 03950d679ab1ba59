use std::time::Duration;

pub const DEFAULT_CONCURRENCY: usize = 2;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Tunables of one download run. Fixed once the run has started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferConfig {
    /// Files transferred at the same time.
    pub concurrency: usize,
    /// Attempts per file, shared by request and stream failures.
    pub max_attempts: u32,
    /// Pause before retrying a rate-limited or 5xx request.
    pub request_retry_delay: Duration,
    /// Stream retries wait `backoff_unit * attempt`.
    pub backoff_unit: Duration,
    /// Ask the server to serve files it has flagged as abusive.
    pub acknowledge_abuse: bool,
    /// Disable progress bars.
    pub silent: bool,
}

impl Default for TransferConfig {
    fn default() -> Self {
        TransferConfig {
            concurrency: DEFAULT_CONCURRENCY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            request_retry_delay: Duration::from_secs(5),
            backoff_unit: Duration::from_secs(2),
            acknowledge_abuse: false,
            silent: false,
        }
    }
}

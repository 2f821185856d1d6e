/**
 * Configuration constants for the informer and work queue
 */
/// Maximum number of restart attempts for the watch stream
pub const MAX_WATCH_RESTARTS: u32 = 50;

/// Maximum backoff time in seconds between watch restart attempts
pub const MAX_BACKOFF_SECONDS: u64 = 60;

/// Initial backoff time in seconds after a watch failure
pub const INITIAL_BACKOFF_SECONDS: u64 = 1;

/// Brief delay between watch restart attempts in seconds
pub const RESTART_DELAY_SECONDS: u64 = 1;

/// Watch request timeout in seconds (294 vs 300 to allow 6 seconds for graceful shutdown)
pub const WATCH_TIMEOUT_SECONDS: u32 = 294;

/// Channel buffer size for informer transitions
pub const TRANSITION_CHANNEL_CAPACITY: usize = 100;

/// Base delay in milliseconds for per-key reconcile retries
pub const RETRY_BASE_DELAY_MS: u64 = 10;

/// Ceiling in seconds on the per-key reconcile retry delay
pub const RETRY_MAX_DELAY_SECS: u64 = 60;

/// Reconcile attempts per key before the key is dropped
pub const MAX_RECONCILE_ATTEMPTS: u32 = 5;

/// Default number of reconcile workers
pub const DEFAULT_WORKERS: usize = 2;

/// Validate configuration constants at compile time
const _: () = {
    assert!(MAX_WATCH_RESTARTS > 0, "MAX_WATCH_RESTARTS must be greater than 0");
    assert!(MAX_BACKOFF_SECONDS > 0, "MAX_BACKOFF_SECONDS must be greater than 0");
    assert!(INITIAL_BACKOFF_SECONDS > 0, "INITIAL_BACKOFF_SECONDS must be greater than 0");
    assert!(WATCH_TIMEOUT_SECONDS > 0, "WATCH_TIMEOUT_SECONDS must be greater than 0");
    assert!(TRANSITION_CHANNEL_CAPACITY > 0, "TRANSITION_CHANNEL_CAPACITY must be greater than 0");
    assert!(RETRY_BASE_DELAY_MS > 0, "RETRY_BASE_DELAY_MS must be greater than 0");
    assert!(RETRY_MAX_DELAY_SECS > 0, "RETRY_MAX_DELAY_SECS must be greater than 0");
    assert!(MAX_RECONCILE_ATTEMPTS > 0, "MAX_RECONCILE_ATTEMPTS must be greater than 0");
    assert!(DEFAULT_WORKERS > 0, "DEFAULT_WORKERS must be greater than 0");
};

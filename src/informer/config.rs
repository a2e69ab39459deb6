/**
 * Tuning constants for watch sessions and their retry behavior
 */
/// Initial backoff between failed attempts, in milliseconds
pub const BASE_BACKOFF_MILLIS: u64 = 1000;

/// Maximum backoff between failed attempts, in milliseconds
pub const MAX_BACKOFF_MILLIS: u64 = 30_000;

/// Consecutive transient failures after which a session gives up
pub const MAX_WATCH_ATTEMPTS: u32 = 5;

/// A watch must stay open at least this long before the failure counter
/// resets; instant failures never count as a recovery
pub const MIN_STABLE_WATCH_SECONDS: u64 = 10;

/// Watch stream timeout in seconds (294 vs 300 to allow 6 seconds for graceful shutdown)
pub const WATCH_TIMEOUT_SECONDS: u32 = 294;

/// Brief delay before reopening a watch that ended cleanly, in seconds
pub const RESTART_DELAY_SECONDS: u64 = 1;

/// Validate configuration constants at compile time
const _: () = {
    assert!(BASE_BACKOFF_MILLIS > 0, "BASE_BACKOFF_MILLIS must be greater than 0");
    assert!(
        MAX_BACKOFF_MILLIS >= BASE_BACKOFF_MILLIS,
        "MAX_BACKOFF_MILLIS must not be below BASE_BACKOFF_MILLIS"
    );
    assert!(MAX_WATCH_ATTEMPTS > 0, "MAX_WATCH_ATTEMPTS must be greater than 0");
    assert!(MIN_STABLE_WATCH_SECONDS > 0, "MIN_STABLE_WATCH_SECONDS must be greater than 0");
    assert!(WATCH_TIMEOUT_SECONDS > 0, "WATCH_TIMEOUT_SECONDS must be greater than 0");
    assert!(RESTART_DELAY_SECONDS > 0, "RESTART_DELAY_SECONDS must be greater than 0");
};

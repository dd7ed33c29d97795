//! Timestamp freshness gate for replay mitigation.
//!
//! Inbound webhooks declare their send time in the `x-timestamp` header
//! (epoch milliseconds). Requests outside a fixed window around the
//! receiver's clock are rejected, bounding the replay-attack window under
//! roughly synchronized clocks.

/// Maximum allowed skew between the declared timestamp and now: 5 minutes.
pub const FRESHNESS_WINDOW_MS: i64 = 5 * 60 * 1000;

/// Returns true if `ts_ms` is within the freshness window of `now_ms`.
pub fn is_fresh(ts_ms: i64, now_ms: i64) -> bool {
    (now_ms - ts_ms).abs() <= FRESHNESS_WINDOW_MS
}

/// Parse an `x-timestamp` header value to epoch milliseconds.
///
/// A missing or unparseable value degrades to `0`, which always fails the
/// freshness check (fail-closed).
pub fn parse_timestamp(header: Option<&str>) -> i64 {
    header.and_then(|v| v.trim().parse::<i64>().ok()).unwrap_or(0)
}

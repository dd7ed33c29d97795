//! Two-eyes (dual-control) approval check for destructive DLQ operations.
//!
//! A sensitive action must carry an `x-two-eyes` header matching a token
//! held by a second operator, distinct from the caller's own credential.
//! The token is validated per-request; it is never stored.

use subtle::ConstantTimeEq;

/// Header carrying the dual-control approval token.
pub const TWO_EYES_HEADER: &str = "x-two-eyes";

/// Header carrying the idempotency key for replay actions.
pub const IDEMPOTENCY_KEY_HEADER: &str = "x-idempotency-key";

/// Maximum accepted idempotency key length.
const MAX_IDEMPOTENCY_KEY_LEN: usize = 128;

/// Check a presented two-eyes token against the configured one.
///
/// Fails closed: an empty configured token rejects every request, and the
/// comparison is constant-time.
pub fn check_two_eyes(presented: Option<&str>, expected: &str) -> bool {
    if expected.is_empty() {
        return false;
    }
    let Some(presented) = presented else {
        return false;
    };
    presented.as_bytes().ct_eq(expected.as_bytes()).into()
}

/// Validate an idempotency key presented for a replay action.
///
/// Returns the key when it is non-empty and within the length bound.
pub fn validate_idempotency_key(presented: Option<&str>) -> Option<&str> {
    let key = presented?.trim();
    if key.is_empty() || key.len() > MAX_IDEMPOTENCY_KEY_LEN {
        return None;
    }
    Some(key)
}

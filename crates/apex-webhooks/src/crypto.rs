//! HMAC-SHA256 signing and verification for broker webhook payloads.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Compute the HMAC-SHA256 signature over a raw request body.
///
/// Returns the hex-encoded signature string.
pub fn compute_signature(secret: &str, body: &[u8]) -> String {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");

    mac.update(body);

    hex::encode(mac.finalize().into_bytes())
}

/// Verify a hex-encoded HMAC-SHA256 signature using constant-time comparison.
///
/// Any malformed input (odd-length hex, non-hex characters) is treated as a
/// failed verification; this function never errors.
pub fn verify_signature(signature_hex: &str, body: &[u8], secret: &str) -> bool {
    let Ok(provided) = hex::decode(signature_hex) else {
        return false;
    };

    let computed = compute_signature(secret, body);
    // computed is valid hex by construction
    let expected = hex::decode(computed).expect("hex round-trip");

    constant_time_eq(&provided, &expected)
}

/// Constant-time byte comparison to prevent timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    use subtle::ConstantTimeEq;
    a.ct_eq(b).into()
}

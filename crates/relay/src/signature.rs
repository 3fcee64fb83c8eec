//! GitHub webhook signature verification (`X-Hub-Signature-256`).

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the signature.
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

const PREFIX: &str = "sha256=";

/// Compute the `sha256=<hex>` signature GitHub would send for `body`.
#[must_use]
pub fn sign(secret: &[u8], body: &[u8]) -> String {
    format!("{PREFIX}{}", hex::encode(digest(secret, body)))
}

/// Verify a GitHub webhook signature over the raw request body.
///
/// `body` must be the bytes exactly as received. Fails closed on a missing
/// header, an empty secret, a missing `sha256=` prefix, or malformed hex.
#[must_use]
pub fn verify(secret: &[u8], body: &[u8], provided: Option<&str>) -> bool {
    if secret.is_empty() {
        return false;
    }

    let Some(provided) = provided.map(str::trim).filter(|s| !s.is_empty()) else {
        return false;
    };

    let Some(hex_part) = provided.strip_prefix(PREFIX) else {
        return false;
    };

    let Ok(provided_bytes) = hex::decode(hex_part) else {
        return false;
    };

    let computed = digest(secret, body);

    // Constant-time comparison to prevent timing attacks
    computed.as_slice().ct_eq(&provided_bytes).into()
}

fn digest(secret: &[u8], body: &[u8]) -> Vec<u8> {
    // HMAC accepts keys of any length, so this cannot fail.
    let mut mac = match HmacSha256::new_from_slice(secret) {
        Ok(mac) => mac,
        Err(_) => return Vec::new(),
    };
    mac.update(body);
    mac.finalize().into_bytes().to_vec()
}

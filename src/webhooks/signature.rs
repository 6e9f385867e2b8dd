//! GitHub webhook signature verification using HMAC-SHA256.
//!
//! GitHub signs webhook payloads using HMAC-SHA256 with a shared secret.
//! The signature is provided in the `X-Hub-Signature-256` header as
//! `sha256=<hex>`.
//!
//! Verification is computed over the raw request body exactly as received.
//! Re-serializing parsed JSON before hashing would produce wrong results, so
//! callers must hand over the untouched body bytes.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Reasons a webhook signature fails verification.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    /// The signature header was absent from the request.
    #[error("missing signature header")]
    MissingHeader,

    /// The header does not carry a `sha256=` prefix.
    #[error("unsupported signature algorithm: {0:?}")]
    UnsupportedAlgorithm(String),

    /// The digest does not match the payload.
    #[error("signature mismatch")]
    Mismatch,
}

/// Computes the HMAC-SHA256 signature of a payload using the given secret.
///
/// This is useful for testing purposes (generating expected signatures).
pub fn compute_signature(payload: &[u8], secret: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(payload);
    mac.finalize().into_bytes().to_vec()
}

/// Formats a signature as a GitHub-style header value (`sha256=<hex>`).
pub fn format_signature_header(signature: &[u8]) -> String {
    format!("sha256={}", hex::encode(signature))
}

/// Verifies a GitHub webhook signature against the payload and secret.
///
/// Uses constant-time comparison to prevent timing attacks. The errors
/// distinguish an absent header and an unsupported algorithm prefix from a
/// plain digest mismatch; a malformed hex digest counts as a mismatch.
///
/// # Arguments
///
/// * `payload` - The raw webhook payload bytes, exactly as received
/// * `signature_header` - The value of the `X-Hub-Signature-256` header, if present
/// * `secret` - The webhook secret configured for the repository
pub fn verify_signature(
    payload: &[u8],
    signature_header: Option<&str>,
    secret: &[u8],
) -> Result<(), SignatureError> {
    let header = signature_header.ok_or(SignatureError::MissingHeader)?;

    let hex_digest = header
        .strip_prefix("sha256=")
        .ok_or_else(|| SignatureError::UnsupportedAlgorithm(header.to_string()))?;

    let expected = hex::decode(hex_digest).map_err(|_| SignatureError::Mismatch)?;

    let mut mac =
        HmacSha256::new_from_slice(secret).map_err(|_| SignatureError::Mismatch)?;
    mac.update(payload);

    // Constant-time comparison via the HMAC library
    mac.verify_slice(&expected)
        .map_err(|_| SignatureError::Mismatch)
}

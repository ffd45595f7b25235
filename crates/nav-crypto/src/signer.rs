//! # Credential Signer
//!
//! Derives the password digest and the request signature carried in the
//! `user` block of every request envelope.
//!
//! ## Signature input
//!
//! ```text
//! partial  = requestId || yyyyMMddHHmmss(UTC) || signingKey
//! per op   = UPPER_HEX(SHA3-512(operationKind || base64(payload)))
//! batch    = UPPER_HEX(SHA3-512(partial || per op[0] || per op[1] || ...))
//! simple   = UPPER_HEX(SHA3-512(partial))
//! ```

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};

use crate::hashing::{sha3_512_hex, sha3_512_hex_many, sha512_hex};

/// Timestamp layout used inside the signature input.
const SIGNATURE_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// One operation of a batch as seen by the signer.
#[derive(Clone, Copy, Debug)]
pub struct SignedOperation<'a> {
    /// Operation kind code, e.g. `CREATE`.
    pub kind: &'a str,
    /// Raw (not yet base64 encoded) invoice payload.
    pub payload: &'a [u8],
}

impl<'a> SignedOperation<'a> {
    /// Create a signer view over one operation.
    pub fn new(kind: &'a str, payload: &'a [u8]) -> Self {
        Self { kind, payload }
    }
}

/// Password digest sent instead of the plaintext password.
pub fn password_hash(password: &str) -> String {
    sha512_hex(password.as_bytes())
}

/// Compact UTC timestamp used in the signature input.
pub fn format_signature_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.format(SIGNATURE_TIMESTAMP_FORMAT).to_string()
}

/// Signature for requests that carry no invoice operations.
pub fn request_signature(request_id: &str, timestamp: &DateTime<Utc>, signing_key: &str) -> String {
    let ts = format_signature_timestamp(timestamp);
    sha3_512_hex_many(&[request_id.as_bytes(), ts.as_bytes(), signing_key.as_bytes()])
}

/// Digest of a single operation: kind followed by the base64 payload.
pub fn operation_digest(operation: &SignedOperation<'_>) -> String {
    let mut input = String::with_capacity(operation.kind.len() + operation.payload.len() * 4 / 3 + 4);
    input.push_str(operation.kind);
    STANDARD.encode_string(operation.payload, &mut input);
    sha3_512_hex(input.as_bytes())
}

/// Signature for a batch submission.
///
/// Reordering, adding, removing or altering any operation changes the result.
pub fn batch_signature(
    request_id: &str,
    timestamp: &DateTime<Utc>,
    signing_key: &str,
    operations: &[SignedOperation<'_>],
) -> String {
    let ts = format_signature_timestamp(timestamp);
    let digests: Vec<String> = operations.iter().map(operation_digest).collect();

    let mut inputs: Vec<&[u8]> = Vec::with_capacity(3 + digests.len());
    inputs.push(request_id.as_bytes());
    inputs.push(ts.as_bytes());
    inputs.push(signing_key.as_bytes());
    inputs.extend(digests.iter().map(|d| d.as_bytes()));

    sha3_512_hex_many(&inputs)
}

//! # NAV Crypto - Credential Signing Primitives
//!
//! Everything the connector needs to authenticate a technical user.
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `hashing` | SHA-512, SHA3-512 | Uppercase hex digests |
//! | `signer` | SHA-512 / SHA3-512 | Password hash, request signature |
//! | `exchange` | AES-128-ECB + PKCS#7 | Exchange-token decoding |
//!
//! ## Properties
//!
//! - Signing is a pure function of its inputs; the timestamp is always passed
//!   in, never read from the wall clock.
//! - Batch signatures bind to the exact ordered set of operations.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod errors;
pub mod exchange;
pub mod hashing;
pub mod signer;

// Re-exports
pub use errors::CryptoError;
pub use exchange::{decode_exchange_token, encode_exchange_token, EXCHANGE_KEY_LEN};
pub use hashing::{sha3_512_hex, sha512_hex};
pub use signer::{
    batch_signature, format_signature_timestamp, operation_digest, password_hash,
    request_signature, SignedOperation,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

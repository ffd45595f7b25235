//! # Digest Helpers
//!
//! The service compares digests as uppercase hexadecimal strings, so every
//! helper here returns that form directly.

use sha2::{Digest, Sha512};
use sha3::Sha3_512;

/// SHA-512 of `data`, uppercase hex.
pub fn sha512_hex(data: &[u8]) -> String {
    hex::encode_upper(Sha512::digest(data))
}

/// SHA3-512 of `data`, uppercase hex.
pub fn sha3_512_hex(data: &[u8]) -> String {
    hex::encode_upper(Sha3_512::digest(data))
}

/// SHA3-512 over several inputs fed in order, uppercase hex.
pub fn sha3_512_hex_many(inputs: &[&[u8]]) -> String {
    let mut hasher = Sha3_512::new();
    for input in inputs {
        hasher.update(input);
    }
    hex::encode_upper(hasher.finalize())
}

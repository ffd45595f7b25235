//! # Exchange Token Cipher
//!
//! The token exchange endpoint returns the session token encrypted with the
//! technical user's 16-byte exchange key (AES-128 in ECB mode, PKCS#7
//! padding) and base64 encoded.

use aes::Aes128;
use base64::{engine::general_purpose::STANDARD, Engine};
use ecb::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyInit};

use crate::CryptoError;

/// Required exchange key length in bytes.
pub const EXCHANGE_KEY_LEN: usize = 16;

type TokenDecryptor = ecb::Decryptor<Aes128>;
type TokenEncryptor = ecb::Encryptor<Aes128>;

fn check_key(exchange_key: &str) -> Result<&[u8], CryptoError> {
    let key = exchange_key.as_bytes();
    if key.len() != EXCHANGE_KEY_LEN {
        return Err(CryptoError::InvalidKeyLength {
            expected: EXCHANGE_KEY_LEN,
            actual: key.len(),
        });
    }
    Ok(key)
}

fn key_error(key: &[u8]) -> CryptoError {
    CryptoError::InvalidKeyLength {
        expected: EXCHANGE_KEY_LEN,
        actual: key.len(),
    }
}

/// Decode an encrypted exchange token into its plaintext form.
///
/// # Errors
///
/// - `InvalidEncoding` if `encoded` is not base64
/// - `InvalidKeyLength` if the key is not 16 bytes
/// - `DecryptionFailed` on bad block length, padding or non-UTF-8 plaintext
pub fn decode_exchange_token(encoded: &str, exchange_key: &str) -> Result<String, CryptoError> {
    let key = check_key(exchange_key)?;
    let data = STANDARD
        .decode(encoded.trim())
        .map_err(|e| CryptoError::InvalidEncoding(e.to_string()))?;

    let plain = TokenDecryptor::new_from_slice(key)
        .map_err(|_| key_error(key))?
        .decrypt_padded_vec_mut::<Pkcs7>(&data)
        .map_err(|_| {
            CryptoError::DecryptionFailed(format!(
                "{} byte ciphertext has bad block length or padding",
                data.len()
            ))
        })?;

    String::from_utf8(plain)
        .map_err(|_| CryptoError::DecryptionFailed("token is not valid UTF-8".to_string()))
}

/// Encrypt and encode a plaintext token. Inverse of [`decode_exchange_token`].
pub fn encode_exchange_token(token: &str, exchange_key: &str) -> Result<String, CryptoError> {
    let key = check_key(exchange_key)?;
    let data = TokenEncryptor::new_from_slice(key)
        .map_err(|_| key_error(key))?
        .encrypt_padded_vec_mut::<Pkcs7>(token.as_bytes());
    Ok(STANDARD.encode(data))
}

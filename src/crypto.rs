//! Credential encryption for the Hanna Cloud login
//!
//! The vendor web client never sends email or password in clear text. Each
//! value is AES-256-CBC encrypted (PKCS#7) under a key shipped with the web
//! client and a per-value random IV, then sent as `"<iv>:<ciphertext-hex>"`.

use crate::error::{HannaError, Result};
use aes::Aes256;
use base64::{engine::general_purpose, Engine as _};
use cbc::cipher::{block_padding::Pkcs7, BlockEncryptMut, KeyIvInit};
use rand::{distributions::Alphanumeric, Rng};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;

/// Base64 form of the key embedded in the vendor web client
const CLIENT_KEY_BASE64: &str = "MzJmODBmMDU0ZTAyNDFjYWM0YTVhOGQxY2ZlZTkwMDM=";

const IV_LEN: usize = 16;

/// Encrypt a single credential value for the login operation
pub fn encrypt_credential(plaintext: &str) -> Result<String> {
    let iv: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(IV_LEN)
        .map(char::from)
        .collect();
    encrypt_with_iv(plaintext, &iv)
}

fn client_key() -> Result<Vec<u8>> {
    general_purpose::STANDARD
        .decode(CLIENT_KEY_BASE64)
        .map_err(|e| HannaError::crypto(format!("Failed to decode client key: {e}")))
}

fn encrypt_with_iv(plaintext: &str, iv: &str) -> Result<String> {
    let key = client_key()?;
    let cipher = Aes256CbcEnc::new_from_slices(&key, iv.as_bytes())
        .map_err(|e| HannaError::crypto(format!("Invalid key or IV length: {e}")))?;
    let encrypted = cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());
    Ok(format!("{iv}:{}", hex::encode(encrypted)))
}

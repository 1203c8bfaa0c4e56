//! Cipher unit: Argon2id key derivation and XChaCha20-Poly1305 AEAD.
//!
//! Every record gets its own salt, so every record gets its own derived
//! key; compromise of one derived key reveals nothing about the others.

use argon2::{Algorithm, Argon2, Params, Version};
use chacha20poly1305::aead::{Aead, KeyInit, OsRng, Payload};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use rand::RngCore;
use zeroize::Zeroizing;

use crate::config::KdfParams;
use crate::error::StoreError;

pub const SALT_LEN: usize = 16;
pub const NONCE_LEN: usize = 24;
pub const DERIVED_KEY_LEN: usize = 32;

/// Derive a 32-byte record key from the master secret and a per-record
/// salt. The salt is stored alongside the ciphertext (it is not secret).
pub fn derive_key(
    secret: &[u8],
    salt: &[u8],
    kdf: &KdfParams,
) -> Result<Zeroizing<Vec<u8>>, StoreError> {
    let params = Params::new(kdf.m_cost, kdf.t_cost, kdf.p_cost, Some(DERIVED_KEY_LEN))
        .map_err(|e| StoreError::KeyDerivation(e.to_string()))?;
    let argon = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
    let mut key = Zeroizing::new(vec![0u8; DERIVED_KEY_LEN]);
    argon
        .hash_password_into(secret, salt, &mut key)
        .map_err(|e| StoreError::KeyDerivation(e.to_string()))?;
    Ok(key)
}

/// Encrypt `plaintext` under `key`. `aad` is authenticated but not stored;
/// decryption with different associated data fails.
pub fn encrypt(
    key: &[u8],
    nonce: &[u8; NONCE_LEN],
    plaintext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, StoreError> {
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key));
    cipher
        .encrypt(
            XNonce::from_slice(nonce),
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|_| StoreError::AeadEncrypt)
}

pub fn decrypt(
    key: &[u8],
    nonce: &[u8; NONCE_LEN],
    ciphertext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, StoreError> {
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key));
    cipher
        .decrypt(
            XNonce::from_slice(nonce),
            Payload {
                msg: ciphertext,
                aad,
            },
        )
        .map_err(|_| StoreError::AeadDecrypt)
}

pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    salt
}

pub fn generate_nonce() -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("value too large: {size} bytes (limit {limit})")]
    ValueTooLarge { size: usize, limit: usize },

    #[error("substrate rejected write for key {0}")]
    SubstrateRejected(String),

    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("AEAD encryption failed")]
    AeadEncrypt,

    #[error("AEAD decryption failed (authentication tag mismatch, possible tampering)")]
    AeadDecrypt,

    #[error("checksum mismatch (record corrupted or tampered)")]
    ChecksumMismatch,

    #[error("malformed envelope: {0}")]
    Malformed(&'static str),

    #[error("codec failure: {0}")]
    Codec(#[from] std::io::Error),

    #[error("serialisation error: {0}")]
    Serialisation(#[from] serde_json::Error),

    #[error("base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    #[error("decrypted payload is not valid UTF-8")]
    NotUtf8(#[from] std::string::FromUtf8Error),
}

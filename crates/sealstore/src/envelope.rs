//! The versioned record format written to the raw substrate.
//!
//! One envelope per logical key, serialized as JSON with base64 binary
//! fields. The checksum is a BLAKE3 hex digest over the salt, nonce,
//! ciphertext, both timestamps and the KDF costs; it is computed before
//! the record is stored and re-verified on every read, independently of
//! the cipher's own authentication tag. The KDF costs decide how much
//! derivation work a read performs, so a record with rewritten costs
//! must fail integrity before any derivation starts.

use base64::{engine::general_purpose, Engine as _};
use blake3::Hasher;
use serde::{Deserialize, Serialize};

use crate::config::KdfParams;
use crate::crypto::{NONCE_LEN, SALT_LEN};
use crate::error::StoreError;

pub const ENVELOPE_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub version: u32,
    pub salt: String,
    pub nonce: String,
    pub ciphertext: String,
    pub checksum: String,
    pub compressed: bool,
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    pub kdf: KdfParams,
}

/// Binary fields of an envelope, decoded and length-checked.
pub struct EnvelopeParts {
    pub salt: [u8; SALT_LEN],
    pub nonce: [u8; NONCE_LEN],
    pub ciphertext: Vec<u8>,
}

impl Envelope {
    /// Build an envelope for freshly encrypted data. The checksum is
    /// computed here, before anything reaches the substrate.
    pub fn new(
        salt: [u8; SALT_LEN],
        nonce: [u8; NONCE_LEN],
        ciphertext: Vec<u8>,
        compressed: bool,
        created_at: i64,
        expires_at: Option<i64>,
        kdf: KdfParams,
    ) -> Self {
        let checksum = checksum_hex(&salt, &nonce, &ciphertext, created_at, expires_at, &kdf);
        Self {
            version: ENVELOPE_VERSION,
            salt: general_purpose::STANDARD.encode(salt),
            nonce: general_purpose::STANDARD.encode(nonce),
            ciphertext: general_purpose::STANDARD.encode(&ciphertext),
            checksum,
            compressed,
            created_at,
            expires_at,
            kdf,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, StoreError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(raw: &[u8]) -> Result<Self, StoreError> {
        Ok(serde_json::from_slice(raw)?)
    }

    /// Decode the base64 fields. Fails on malformed base64 or wrong
    /// salt/nonce lengths.
    pub fn decode_parts(&self) -> Result<EnvelopeParts, StoreError> {
        let salt: [u8; SALT_LEN] = general_purpose::STANDARD
            .decode(&self.salt)?
            .try_into()
            .map_err(|_| StoreError::Malformed("salt length"))?;
        let nonce: [u8; NONCE_LEN] = general_purpose::STANDARD
            .decode(&self.nonce)?
            .try_into()
            .map_err(|_| StoreError::Malformed("nonce length"))?;
        let ciphertext = general_purpose::STANDARD.decode(&self.ciphertext)?;
        Ok(EnvelopeParts {
            salt,
            nonce,
            ciphertext,
        })
    }

    /// Re-verify the stored checksum against the stored fields.
    pub fn verify_checksum(&self) -> Result<(), StoreError> {
        let parts = self.decode_parts()?;
        let expected = checksum_hex(
            &parts.salt,
            &parts.nonce,
            &parts.ciphertext,
            self.created_at,
            self.expires_at,
            &self.kdf,
        );
        if expected != self.checksum {
            return Err(StoreError::ChecksumMismatch);
        }
        Ok(())
    }

    /// Whether the record is logically expired at `now_ms`. Records
    /// without `expires_at` never expire; a record expires the instant
    /// `now_ms` reaches it.
    pub fn is_expired(&self, now_ms: i64) -> bool {
        matches!(self.expires_at, Some(at) if now_ms >= at)
    }
}

fn checksum_hex(
    salt: &[u8],
    nonce: &[u8],
    ciphertext: &[u8],
    created_at: i64,
    expires_at: Option<i64>,
    kdf: &KdfParams,
) -> String {
    let mut hasher = Hasher::new();
    hasher.update(salt);
    hasher.update(b"|");
    hasher.update(nonce);
    hasher.update(b"|");
    hasher.update(ciphertext);
    hasher.update(b"|");
    hasher.update(&created_at.to_le_bytes());
    match expires_at {
        Some(at) => {
            hasher.update(b"1");
            hasher.update(&at.to_le_bytes());
        }
        None => {
            hasher.update(b"0");
        }
    }
    hasher.update(&kdf.m_cost.to_le_bytes());
    hasher.update(&kdf.t_cost.to_le_bytes());
    hasher.update(&kdf.p_cost.to_le_bytes());
    hasher.finalize().to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(expires_at: Option<i64>) -> Envelope {
        Envelope::new(
            [7u8; SALT_LEN],
            [9u8; NONCE_LEN],
            vec![1, 2, 3, 4],
            false,
            1_700_000_000_000,
            expires_at,
            KdfParams::test_params(),
        )
    }

    #[test]
    fn wire_fields_are_camel_case() {
        let json = String::from_utf8(sample(Some(1)).to_bytes().unwrap()).unwrap();
        assert!(json.contains("\"createdAt\""));
        assert!(json.contains("\"expiresAt\""));
        assert!(json.contains("\"mCost\""));
    }

    #[test]
    fn absent_expiry_is_omitted_from_wire() {
        let json = String::from_utf8(sample(None).to_bytes().unwrap()).unwrap();
        assert!(!json.contains("expiresAt"));
    }

    #[test]
    fn roundtrip_preserves_checksum() {
        let envelope = sample(Some(42));
        let parsed = Envelope::from_bytes(&envelope.to_bytes().unwrap()).unwrap();
        parsed.verify_checksum().unwrap();
        assert_eq!(parsed.checksum, envelope.checksum);
    }

    #[test]
    fn tampered_ciphertext_fails_checksum() {
        let mut envelope = sample(None);
        envelope.ciphertext = general_purpose::STANDARD.encode([9, 9, 9, 9]);
        assert!(matches!(
            envelope.verify_checksum(),
            Err(StoreError::ChecksumMismatch)
        ));
    }

    #[test]
    fn tampered_expiry_fails_checksum() {
        let mut envelope = sample(Some(100));
        envelope.expires_at = Some(i64::MAX);
        assert!(envelope.verify_checksum().is_err());
    }

    #[test]
    fn tampered_kdf_costs_fail_checksum() {
        // Inflated derivation costs must fail integrity before any
        // derivation work can be demanded.
        let mut envelope = sample(None);
        envelope.kdf.m_cost = 4 * 1024 * 1024;
        assert!(matches!(
            envelope.verify_checksum(),
            Err(StoreError::ChecksumMismatch)
        ));

        let mut envelope = sample(None);
        envelope.kdf.t_cost += 1;
        assert!(envelope.verify_checksum().is_err());
    }

    #[test]
    fn expiry_boundary_is_inclusive() {
        let envelope = sample(Some(100));
        assert!(!envelope.is_expired(99));
        assert!(envelope.is_expired(100));
        assert!(envelope.is_expired(101));
        assert!(!sample(None).is_expired(i64::MAX));
    }

    #[test]
    fn malformed_salt_is_rejected() {
        let mut envelope = sample(None);
        envelope.salt = general_purpose::STANDARD.encode([1u8; 4]);
        assert!(matches!(
            envelope.decode_parts(),
            Err(StoreError::Malformed("salt length"))
        ));
    }
}

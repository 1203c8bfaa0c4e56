//! Payload codec: transparent zstd compression for large values.

use crate::error::StoreError;

pub struct Encoded {
    pub payload: Vec<u8>,
    pub compressed: bool,
}

/// Compress `plaintext` when it exceeds `threshold` bytes, otherwise pass
/// it through untouched. Small values never pay the compression overhead.
pub fn encode(plaintext: &[u8], threshold: usize) -> Result<Encoded, StoreError> {
    if plaintext.len() > threshold {
        let payload = zstd::encode_all(plaintext, 3)?;
        Ok(Encoded {
            payload,
            compressed: true,
        })
    } else {
        Ok(Encoded {
            payload: plaintext.to_vec(),
            compressed: false,
        })
    }
}

/// Reverse [`encode`]. A corrupted compressed stream fails closed; callers
/// treat that exactly like a checksum failure.
pub fn decode(payload: &[u8], compressed: bool) -> Result<Vec<u8>, StoreError> {
    if compressed {
        Ok(zstd::decode_all(payload)?)
    } else {
        Ok(payload.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_value_passes_through() {
        let encoded = encode(b"tiny", 4096).unwrap();
        assert!(!encoded.compressed);
        assert_eq!(encoded.payload, b"tiny");
    }

    #[test]
    fn large_value_compresses_and_roundtrips() {
        let plaintext = vec![b'a'; 16 * 1024];
        let encoded = encode(&plaintext, 4096).unwrap();
        assert!(encoded.compressed);
        assert!(encoded.payload.len() < plaintext.len());
        let decoded = decode(&encoded.payload, true).unwrap();
        assert_eq!(decoded, plaintext);
    }

    #[test]
    fn corrupted_stream_fails_closed() {
        assert!(decode(b"definitely not zstd", true).is_err());
    }

    #[test]
    fn threshold_is_exclusive() {
        let at_threshold = vec![0u8; 64];
        assert!(!encode(&at_threshold, 64).unwrap().compressed);
        let over_threshold = vec![0u8; 65];
        assert!(encode(&over_threshold, 64).unwrap().compressed);
    }
}

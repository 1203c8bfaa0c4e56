use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

pub const DEFAULT_NAMESPACE: &str = "sealed::";
pub const DEFAULT_MAX_VALUE_BYTES: usize = 1024 * 1024; // 1 MiB
pub const DEFAULT_COMPRESSION_THRESHOLD: usize = 4 * 1024; // 4 KiB

/// Argon2id cost parameters.
///
/// Persisted inside every envelope so records written under old defaults
/// stay readable after the engine's costs are retuned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KdfParams {
    pub m_cost: u32,
    pub t_cost: u32,
    pub p_cost: u32,
}

impl Default for KdfParams {
    /// Tuned for interactive use: 64 MiB, 3 passes, 1 lane.
    fn default() -> Self {
        Self {
            m_cost: 64 * 1024,
            t_cost: 3,
            p_cost: 1,
        }
    }
}

impl KdfParams {
    /// Deliberately weak parameters for fast tests. Never use these for
    /// real data.
    pub fn test_params() -> Self {
        Self {
            m_cost: 256,
            t_cost: 1,
            p_cost: 1,
        }
    }
}

/// Engine configuration.
///
/// Construct with [`StoreConfig::new`], then adjust fields as needed.
/// Several engines with different secrets or namespaces may coexist over
/// one substrate.
#[derive(Clone)]
pub struct StoreConfig {
    pub(crate) master_secret: Zeroizing<Vec<u8>>,
    /// Prefix applied to every physical substrate key. Keeps `clear()`
    /// away from records the engine does not own.
    pub namespace: String,
    /// Hard ceiling on plaintext value size; larger writes are refused.
    pub max_value_bytes: usize,
    /// Values longer than this are zstd-compressed before encryption.
    pub compression_threshold: usize,
    pub kdf: KdfParams,
}

impl StoreConfig {
    pub fn new(master_secret: &str) -> Self {
        Self {
            master_secret: Zeroizing::new(master_secret.as_bytes().to_vec()),
            namespace: DEFAULT_NAMESPACE.to_string(),
            max_value_bytes: DEFAULT_MAX_VALUE_BYTES,
            compression_threshold: DEFAULT_COMPRESSION_THRESHOLD,
            kdf: KdfParams::default(),
        }
    }
}

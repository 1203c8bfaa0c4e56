//! Raw substrate: the plain byte store underneath the engine.
//!
//! The engine never touches a durable medium itself; everything it
//! persists goes through this trait as opaque bytes under string keys.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use parking_lot::RwLock;
use tracing::warn;

/// Synchronous byte-oriented key-value store.
///
/// Implementations may enforce a capacity: `set` returns `false` when a
/// write is refused. No method panics on absent keys.
pub trait RawSubstrate {
    fn get(&self, key: &str) -> Option<Vec<u8>>;

    /// Store `value` under `key`, overwriting. `false` means the write
    /// was refused (capacity, I/O failure) and nothing changed.
    fn set(&self, key: &str, value: &[u8]) -> bool;

    /// Remove `key`. Returns `true` when the key is gone afterwards
    /// (removing an absent key succeeds), `false` only on failure.
    fn delete(&self, key: &str) -> bool;

    fn list_keys(&self) -> Vec<String>;
}

// ── In-memory substrate ─────────────────────────────────────────────────────

/// In-memory substrate with an optional byte quota.
///
/// Cloning shares the underlying map, so several engines, or a test
/// poking at raw bytes, can observe the same storage.
#[derive(Clone, Default)]
pub struct MemorySubstrate {
    inner: Arc<RwLock<MemoryInner>>,
}

#[derive(Default)]
struct MemoryInner {
    entries: HashMap<String, Vec<u8>>,
    used_bytes: usize,
    max_bytes: Option<usize>,
}

impl MemorySubstrate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Substrate that refuses writes once stored values would exceed
    /// `max_bytes` in total.
    pub fn with_capacity_limit(max_bytes: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(MemoryInner {
                max_bytes: Some(max_bytes),
                ..Default::default()
            })),
        }
    }
}

impl RawSubstrate for MemorySubstrate {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.inner.read().entries.get(key).cloned()
    }

    fn set(&self, key: &str, value: &[u8]) -> bool {
        let mut inner = self.inner.write();
        let existing = inner.entries.get(key).map(|v| v.len()).unwrap_or(0);
        let projected = inner
            .used_bytes
            .saturating_sub(existing)
            .saturating_add(value.len());
        if let Some(max) = inner.max_bytes {
            if projected > max {
                return false;
            }
        }
        inner.used_bytes = projected;
        inner.entries.insert(key.to_string(), value.to_vec());
        true
    }

    fn delete(&self, key: &str) -> bool {
        let mut inner = self.inner.write();
        if let Some(old) = inner.entries.remove(key) {
            inner.used_bytes = inner.used_bytes.saturating_sub(old.len());
        }
        true
    }

    fn list_keys(&self) -> Vec<String> {
        self.inner.read().entries.keys().cloned().collect()
    }
}

// ── Directory substrate ─────────────────────────────────────────────────────

const RECORD_EXT: &str = "rec";

/// File-per-key substrate rooted at a directory.
///
/// Keys are encoded into file names with URL-safe base64. Writes go
/// through a staging file and rename, so a crash never leaves a
/// half-written record under the real name.
pub struct DirSubstrate {
    root: PathBuf,
}

impl DirSubstrate {
    pub fn open(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn file_for(&self, key: &str) -> PathBuf {
        let name = general_purpose::URL_SAFE_NO_PAD.encode(key.as_bytes());
        self.root.join(format!("{name}.{RECORD_EXT}"))
    }
}

impl RawSubstrate for DirSubstrate {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        fs::read(self.file_for(key)).ok()
    }

    fn set(&self, key: &str, value: &[u8]) -> bool {
        let dest = self.file_for(key);
        let staging = dest.with_extension("staging");
        let written = fs::write(&staging, value).and_then(|_| fs::rename(&staging, &dest));
        if let Err(e) = written {
            warn!(key, error = %e, "substrate write failed");
            let _ = fs::remove_file(&staging);
            return false;
        }
        true
    }

    fn delete(&self, key: &str) -> bool {
        match fs::remove_file(self.file_for(key)) {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
            Err(e) => {
                warn!(key, error = %e, "substrate delete failed");
                false
            }
        }
    }

    fn list_keys(&self) -> Vec<String> {
        let mut keys = Vec::new();
        if let Ok(entries) = fs::read_dir(&self.root) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXT) {
                    continue;
                }
                let stem = match path.file_stem().and_then(|s| s.to_str()) {
                    Some(stem) => stem,
                    None => continue,
                };
                if let Ok(raw) = general_purpose::URL_SAFE_NO_PAD.decode(stem) {
                    if let Ok(key) = String::from_utf8(raw) {
                        keys.push(key);
                    }
                }
            }
        }
        keys
    }
}

//! The record store: sealed key-value operations over a raw substrate.

use std::time::Duration;

use tracing::{debug, warn};

use crate::clock::LogicalClock;
use crate::codec;
use crate::config::StoreConfig;
use crate::crypto;
use crate::diagnostics::{RecordHealth, StorageStats};
use crate::envelope::{Envelope, ENVELOPE_VERSION};
use crate::error::StoreError;
use crate::substrate::RawSubstrate;

/// Sealed key-value store over a raw substrate.
///
/// One instance owns one namespace on the substrate; everything it writes
/// lives under `config.namespace`. Several instances, even in different
/// processes, may share a substrate. Writes to the same logical key are
/// last-writer-wins with no conflict detection; callers that need
/// coordination must provide it outside the engine.
///
/// Reads are total: absent, expired and damaged records all come back as
/// `None` from [`get_item`](Self::get_item), with the cause reported on
/// the tracing stream rather than the API surface.
pub struct SealedStore<S: RawSubstrate> {
    substrate: S,
    config: StoreConfig,
    clock: LogicalClock,
}

impl<S: RawSubstrate> SealedStore<S> {
    pub fn new(substrate: S, config: StoreConfig) -> Self {
        Self {
            substrate,
            config,
            clock: LogicalClock::new(),
        }
    }

    pub(crate) fn raw_substrate(&self) -> &S {
        &self.substrate
    }

    pub(crate) fn namespace(&self) -> &str {
        &self.config.namespace
    }

    pub(crate) fn physical_key(&self, key: &str) -> String {
        format!("{}{}", self.config.namespace, key)
    }

    fn logical_key<'a>(&self, physical: &'a str) -> Option<&'a str> {
        physical.strip_prefix(self.config.namespace.as_str())
    }

    fn owned_physical_keys(&self) -> Vec<String> {
        self.substrate
            .list_keys()
            .into_iter()
            .filter(|key| key.starts_with(self.config.namespace.as_str()))
            .collect()
    }

    // ── Write path ──────────────────────────────────────────────────────

    /// Seal `value` under `key`. The record never expires.
    pub fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.seal(key, value, None)
    }

    /// Seal `value` under `key` with a time-to-live. Once the TTL has
    /// elapsed the record reads as absent; `cleanup` reclaims the bytes.
    pub fn set_item_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        self.seal(key, value, Some(ttl))
    }

    fn seal(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        if value.len() > self.config.max_value_bytes {
            warn!(key, size = value.len(), "refusing oversized value");
            return Err(StoreError::ValueTooLarge {
                size: value.len(),
                limit: self.config.max_value_bytes,
            });
        }

        let encoded = codec::encode(value.as_bytes(), self.config.compression_threshold)?;

        // Fresh salt and nonce for every write to prevent cross-record key
        // reuse and XChaCha20-Poly1305 nonce reuse. Callers cannot supply
        // either.
        let salt = crypto::generate_salt();
        let nonce = crypto::generate_nonce();
        let record_key = crypto::derive_key(&self.config.master_secret, &salt, &self.config.kdf)?;
        let ciphertext = crypto::encrypt(&record_key, &nonce, &encoded.payload, key.as_bytes())?;

        let created_at = self.clock.now_ms();
        // TTLs beyond the epoch-millisecond range saturate to "never in
        // practice" instead of wrapping negative.
        let expires_at = ttl.map(|ttl| {
            created_at.saturating_add(i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX))
        });
        let envelope = Envelope::new(
            salt,
            nonce,
            ciphertext,
            encoded.compressed,
            created_at,
            expires_at,
            self.config.kdf,
        );

        let raw = envelope.to_bytes()?;
        if !self.substrate.set(&self.physical_key(key), &raw) {
            warn!(key, bytes = raw.len(), "substrate rejected write");
            return Err(StoreError::SubstrateRejected(key.to_string()));
        }
        Ok(())
    }

    // ── Read path ───────────────────────────────────────────────────────

    /// Retrieve and unseal `key`.
    ///
    /// Absent, expired and damaged records all come back as `None`.
    /// Damaged records (unparseable envelope, checksum or authentication
    /// failure, codec failure) are removed on sight so a corrupt blob
    /// cannot wedge its slot forever; expired records stay on the
    /// substrate until [`cleanup`](Self::cleanup).
    pub fn get_item(&self, key: &str) -> Option<String> {
        let physical = self.physical_key(key);
        let raw = self.substrate.get(&physical)?;

        let envelope = match Envelope::from_bytes(&raw) {
            Ok(envelope) => envelope,
            Err(err) => {
                self.heal(key, &physical, &err);
                return None;
            }
        };

        if envelope.version > ENVELOPE_VERSION {
            // A newer engine owns this record. Not ours to read or delete.
            debug!(key, version = envelope.version, "skipping foreign-version record");
            return None;
        }

        if let Err(err) = envelope.verify_checksum() {
            self.heal(key, &physical, &err);
            return None;
        }

        if envelope.is_expired(self.clock.peek_ms()) {
            return None;
        }

        match self.unseal(key, &envelope) {
            Ok(value) => Some(value),
            Err(err) => {
                self.heal(key, &physical, &err);
                None
            }
        }
    }

    fn unseal(&self, key: &str, envelope: &Envelope) -> Result<String, StoreError> {
        let parts = envelope.decode_parts()?;
        let record_key =
            crypto::derive_key(&self.config.master_secret, &parts.salt, &envelope.kdf)?;
        let payload = crypto::decrypt(&record_key, &parts.nonce, &parts.ciphertext, key.as_bytes())?;
        let plaintext = codec::decode(&payload, envelope.compressed)?;
        Ok(String::from_utf8(plaintext)?)
    }

    fn heal(&self, key: &str, physical: &str, err: &StoreError) {
        warn!(key, reason = %err, "removing damaged record");
        self.substrate.delete(physical);
    }

    // ── Removal ─────────────────────────────────────────────────────────

    /// Remove `key`. Removing an absent key is a success.
    pub fn remove_item(&self, key: &str) -> bool {
        self.substrate.delete(&self.physical_key(key))
    }

    /// Whether `key` currently holds a live, readable record.
    ///
    /// Implemented as a full [`get_item`](Self::get_item), decryption
    /// included, so it pays a key derivation per call. A record that
    /// cannot be read is reported absent, never present-but-broken.
    pub fn has_item(&self, key: &str) -> bool {
        self.get_item(key).is_some()
    }

    /// Delete every record in this engine's namespace. Records owned by
    /// other tenants of the substrate are untouched. `true` only if every
    /// delete succeeded.
    pub fn clear(&self) -> bool {
        let mut ok = true;
        for physical in self.owned_physical_keys() {
            ok &= self.substrate.delete(&physical);
        }
        ok
    }

    // ── Enumeration & maintenance ───────────────────────────────────────

    /// Logical keys physically present in the namespace, sorted. Includes
    /// records that are expired but not yet swept; enumeration never pays
    /// decode or decrypt costs.
    pub fn all_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .owned_physical_keys()
            .iter()
            .filter_map(|physical| self.logical_key(physical).map(str::to_string))
            .collect();
        keys.sort();
        keys
    }

    /// Sweep the namespace: remove every expired record plus any record
    /// too damaged to parse or verify. Returns how many were removed.
    /// Foreign-version records are left in place.
    pub fn cleanup(&self) -> usize {
        let now = self.clock.peek_ms();
        let mut removed = 0;
        for physical in self.owned_physical_keys() {
            let raw = match self.substrate.get(&physical) {
                Some(raw) => raw,
                None => continue,
            };
            match Self::classify(&raw, now) {
                RecordHealth::Expired | RecordHealth::Damaged => {
                    if self.substrate.delete(&physical) {
                        let key = self.logical_key(&physical).unwrap_or(physical.as_str());
                        debug!(key, "cleanup removed record");
                        removed += 1;
                    }
                }
                RecordHealth::Ok | RecordHealth::ForeignVersion => {}
            }
        }
        removed
    }

    /// Metadata accounting for the namespace. Never derives keys, never
    /// decrypts; damaged records still count toward the totals.
    pub fn stats(&self) -> StorageStats {
        let now = self.clock.peek_ms();
        let mut stats = StorageStats {
            total_items: 0,
            total_size: 0,
            expired_items: 0,
            oldest_item: None,
        };
        for physical in self.owned_physical_keys() {
            let raw = match self.substrate.get(&physical) {
                Some(raw) => raw,
                None => continue,
            };
            stats.total_items += 1;
            stats.total_size = stats.total_size.saturating_add(raw.len() as u64);
            let envelope = match Envelope::from_bytes(&raw) {
                Ok(envelope) => envelope,
                Err(_) => continue,
            };
            if envelope.is_expired(now) {
                stats.expired_items += 1;
            } else {
                stats.oldest_item = Some(match stats.oldest_item {
                    Some(oldest) => oldest.min(envelope.created_at),
                    None => envelope.created_at,
                });
            }
        }
        stats
    }

    /// Per-record health verdicts keyed by logical key, sorted. Metadata
    /// walk only; nothing is removed.
    pub fn examine(&self) -> Vec<(String, RecordHealth)> {
        let now = self.clock.peek_ms();
        let mut out = Vec::new();
        for physical in self.owned_physical_keys() {
            let logical = match self.logical_key(&physical) {
                Some(logical) => logical.to_string(),
                None => continue,
            };
            let raw = match self.substrate.get(&physical) {
                Some(raw) => raw,
                None => continue,
            };
            out.push((logical, Self::classify(&raw, now)));
        }
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    fn classify(raw: &[u8], now_ms: i64) -> RecordHealth {
        match Envelope::from_bytes(raw) {
            Ok(envelope) if envelope.version > ENVELOPE_VERSION => RecordHealth::ForeignVersion,
            Ok(envelope) => match envelope.verify_checksum() {
                Ok(()) if envelope.is_expired(now_ms) => RecordHealth::Expired,
                Ok(()) => RecordHealth::Ok,
                Err(_) => RecordHealth::Damaged,
            },
            Err(_) => RecordHealth::Damaged,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KdfParams;
    use crate::substrate::MemorySubstrate;

    fn test_store() -> (SealedStore<MemorySubstrate>, MemorySubstrate) {
        let substrate = MemorySubstrate::new();
        let mut config = StoreConfig::new("correct horse battery staple");
        config.kdf = KdfParams::test_params();
        (SealedStore::new(substrate.clone(), config), substrate)
    }

    #[test]
    fn set_get_roundtrip() {
        let (store, _) = test_store();
        store.set_item("note", "white-space & unicode ✓").unwrap();
        assert_eq!(
            store.get_item("note").as_deref(),
            Some("white-space & unicode ✓")
        );
    }

    #[test]
    fn substrate_sees_only_namespaced_ciphertext() {
        let (store, substrate) = test_store();
        store.set_item("note", "plaintext-value").unwrap();
        let raw = substrate.get("sealed::note").expect("namespaced record");
        let text = String::from_utf8(raw).unwrap();
        assert!(!text.contains("plaintext-value"));
        assert!(text.contains("\"ciphertext\""));
    }

    #[test]
    fn remove_is_idempotent() {
        let (store, _) = test_store();
        store.set_item("gone", "v").unwrap();
        assert!(store.remove_item("gone"));
        assert!(store.remove_item("gone"));
        assert_eq!(store.get_item("gone"), None);
    }
}

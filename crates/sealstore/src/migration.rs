//! One-way migration of legacy plaintext records into sealed storage.
//!
//! Legacy entries live on the raw substrate outside the engine's
//! namespace. Candidates are discovered by regex, then moved one at a
//! time through the ordinary write path: seal the copy first, delete the
//! original second. A failure between the two steps leaves a plaintext
//! duplicate behind, never zero copies.

use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::store::SealedStore;
use crate::substrate::RawSubstrate;

/// Hooks and key rewriting applied during [`SealedStore::migrate`].
///
/// `validate` inspects `(key, raw value)` before anything is written;
/// return `false` to leave the record where it is. `transform` rewrites
/// the value on its way in. Both see the legacy key, not the destination
/// key.
#[derive(Default)]
pub struct MigrateOptions {
    /// Prefix removed from the legacy key to form the destination key.
    pub strip_prefix: Option<String>,
    /// Prefix prepended to the destination key after stripping.
    pub add_prefix: Option<String>,
    pub validate: Option<Box<dyn Fn(&str, &str) -> bool>>,
    pub transform: Option<Box<dyn Fn(&str, &str) -> String>>,
}

/// Outcome of one migration batch.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationReport {
    pub migrated: usize,
    pub skipped: usize,
    pub errors: usize,
    pub error_details: Vec<MigrationFailure>,
    /// Destination keys of successfully migrated records.
    pub migrated_items: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationFailure {
    pub key: String,
    pub reason: String,
}

enum Outcome {
    Migrated(String),
    Skipped(&'static str),
}

impl<S: RawSubstrate> SealedStore<S> {
    /// Scan the substrate's full key space for legacy entries matching any
    /// of `patterns`. This is the engine's only read outside its own
    /// namespace; keys already inside it are never reported. Sorted.
    pub fn detect_legacy_keys(&self, patterns: &[Regex]) -> Vec<String> {
        let mut keys: Vec<String> = self
            .raw_substrate()
            .list_keys()
            .into_iter()
            .filter(|key| !key.starts_with(self.namespace()))
            .filter(|key| patterns.iter().any(|pattern| pattern.is_match(key)))
            .collect();
        keys.sort();
        keys
    }

    /// Move legacy plaintext entries into sealed storage.
    ///
    /// Failures are contained per key; the batch always runs to
    /// completion. An already-sealed destination wins (first-writer-wins)
    /// and the source stays untouched; so does a source that fails
    /// `validate`. A source that is already gone counts as skipped, which
    /// makes re-running a batch report `skipped` rather than errors.
    pub fn migrate(&self, keys: &[String], options: &MigrateOptions) -> MigrationReport {
        let mut report = MigrationReport::default();
        for key in keys {
            match self.migrate_one(key, options) {
                Ok(Outcome::Migrated(dest)) => {
                    report.migrated += 1;
                    report.migrated_items.push(dest);
                }
                Ok(Outcome::Skipped(reason)) => {
                    debug!(key = key.as_str(), reason, "migration skipped key");
                    report.skipped += 1;
                }
                Err(reason) => {
                    warn!(key = key.as_str(), reason = reason.as_str(), "migration failed for key");
                    report.errors += 1;
                    report.error_details.push(MigrationFailure {
                        key: key.clone(),
                        reason,
                    });
                }
            }
        }
        report
    }

    fn migrate_one(&self, key: &str, options: &MigrateOptions) -> Result<Outcome, String> {
        if key.starts_with(self.namespace()) {
            return Err("key is already inside the sealed namespace".to_string());
        }

        let raw = match self.raw_substrate().get(key) {
            Some(raw) => raw,
            None => return Ok(Outcome::Skipped("source already gone")),
        };
        let value =
            String::from_utf8(raw).map_err(|_| "source value is not valid UTF-8".to_string())?;

        if let Some(validate) = &options.validate {
            if !validate(key, &value) {
                return Ok(Outcome::Skipped("failed validation"));
            }
        }
        let value = match &options.transform {
            Some(transform) => transform(key, &value),
            None => value,
        };

        let stripped = match &options.strip_prefix {
            Some(prefix) => key.strip_prefix(prefix.as_str()).unwrap_or(key),
            None => key,
        };
        let dest = match &options.add_prefix {
            Some(prefix) => format!("{prefix}{stripped}"),
            None => stripped.to_string(),
        };
        if dest.is_empty() {
            return Err("destination key is empty".to_string());
        }

        // Idempotence guard: an existing destination record blocks the
        // move, whatever its state. Physical presence is the test; an
        // expired-but-unswept record also blocks.
        if self.raw_substrate().get(&self.physical_key(&dest)).is_some() {
            return Ok(Outcome::Skipped("destination already exists"));
        }

        self.set_item(&dest, &value).map_err(|e| e.to_string())?;

        // Source goes only after the sealed copy is down. A failed source
        // delete keeps the duplicate rather than risking data loss.
        if !self.raw_substrate().delete(key) {
            warn!(key, "migrated but failed to delete legacy source");
        }
        Ok(Outcome::Migrated(dest))
    }
}

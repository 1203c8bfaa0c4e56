//! Metadata-only introspection types. Nothing here derives keys or
//! decrypts payloads.

use serde::Serialize;

/// Storage accounting snapshot, produced by `SealedStore::stats`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageStats {
    /// Every physically present record in the namespace, readable or not.
    pub total_items: usize,
    /// Sum of serialized envelope byte lengths: what actually occupies
    /// the substrate, not plaintext sizes.
    pub total_size: u64,
    /// Records whose expiry has passed but that `cleanup` has not swept.
    pub expired_items: usize,
    /// Minimum `createdAt` among live records, `None` when there are none.
    pub oldest_item: Option<i64>,
}

/// Per-record verdict from a metadata walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordHealth {
    /// Parseable, checksum verifies, not expired.
    Ok,
    /// Checksum verifies but the expiry has passed.
    Expired,
    /// Unparseable, malformed fields, or checksum mismatch.
    Damaged,
    /// Written by a newer engine; this one leaves it alone.
    ForeignVersion,
}

//! sealstore — encrypted records over a plain key-value substrate
//!
//! # Design principles
//! - NO custom crypto; all primitives come from audited Rust crates.
//! - Every record is sealed on its own: per-record Argon2id salt,
//!   per-write XChaCha20-Poly1305 nonce, BLAKE3 checksum over the stored
//!   fields. No key material is shared between records.
//! - The substrate only ever sees opaque envelopes. It needs no schema
//!   and no transactions; anything that can store bytes under string
//!   keys qualifies.
//! - Reads are total: a damaged or expired record is simply absent.
//!   Damaged records are removed on sight, with the cause reported on
//!   the tracing stream rather than the API surface.
//!
//! # Module layout
//! - `store`       — `SealedStore`: set/get/remove/clear, sweeping, stats
//! - `envelope`    — versioned record format written to the substrate
//! - `crypto`      — Argon2id KDF + XChaCha20-Poly1305 AEAD helpers
//! - `codec`       — threshold-gated zstd compression
//! - `substrate`   — substrate trait, memory and directory substrates
//! - `migration`   — legacy plaintext import (detect + migrate)
//! - `diagnostics` — metadata-only health and accounting types
//! - `clock`       — monotonic millisecond timestamps
//! - `config`      — engine configuration and KDF cost parameters
//! - `error`       — unified error type

pub mod clock;
pub mod codec;
pub mod config;
pub mod crypto;
pub mod diagnostics;
pub mod envelope;
pub mod error;
pub mod migration;
pub mod store;
pub mod substrate;

pub use config::{KdfParams, StoreConfig};
pub use diagnostics::{RecordHealth, StorageStats};
pub use envelope::{Envelope, ENVELOPE_VERSION};
pub use error::StoreError;
pub use migration::{MigrateOptions, MigrationFailure, MigrationReport};
pub use store::SealedStore;
pub use substrate::{DirSubstrate, MemorySubstrate, RawSubstrate};

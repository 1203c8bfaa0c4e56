use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use directories::ProjectDirs;
use regex::Regex;
use sealstore::config::DEFAULT_NAMESPACE;
use sealstore::{DirSubstrate, KdfParams, MigrateOptions, RecordHealth, SealedStore, StoreConfig};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

pub const APP_QUALIFIER: &str = "com";
pub const APP_ORG: &str = "darklock";
pub const APP_NAME: &str = "sealstore";

const PASSPHRASE_ENV: &str = "SEALSTORE_PASSPHRASE";

#[derive(Parser)]
#[command(name = "sealstore")]
#[command(about = "Sealed key-value storage over plain files", long_about = None)]
struct Cli {
    /// Directory holding the sealed records (defaults to the platform data directory)
    #[arg(long, global = true)]
    path: Option<PathBuf>,

    /// Namespace prefix for sealed records
    #[arg(long, global = true, default_value = DEFAULT_NAMESPACE)]
    namespace: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a value
    Set {
        key: String,
        value: String,

        /// Time-to-live in milliseconds
        #[arg(long)]
        ttl_ms: Option<u64>,
    },

    /// Print a stored value
    Get { key: String },

    /// Remove a value
    Remove { key: String },

    /// List logical keys
    Keys,

    /// Storage accounting as JSON
    Stats,

    /// Sweep expired and damaged records
    Cleanup,

    /// Per-record health report as JSON (removes nothing)
    Check,

    /// Import legacy plaintext entries into sealed storage
    Migrate {
        /// Regex selecting legacy keys; repeatable
        #[arg(long = "pattern", required = true)]
        patterns: Vec<String>,

        /// Prefix removed from legacy keys to form destination keys
        #[arg(long)]
        strip_prefix: Option<String>,

        /// Prefix prepended to destination keys
        #[arg(long)]
        add_prefix: Option<String>,

        /// List candidates without migrating
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckEntry {
    key: String,
    health: RecordHealth,
}

#[derive(Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckReport {
    ok: usize,
    expired: usize,
    damaged: usize,
    foreign_version: usize,
    records: Vec<CheckEntry>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let root = match &cli.path {
        Some(path) => path.clone(),
        None => default_data_dir()?,
    };
    let substrate =
        DirSubstrate::open(&root).with_context(|| format!("open substrate at {}", root.display()))?;

    // Metadata-only commands never derive a key, so they skip the prompt.
    let needs_secret = matches!(
        cli.command,
        Commands::Set { .. } | Commands::Get { .. } | Commands::Migrate { .. }
    );
    let passphrase = if needs_secret {
        read_passphrase()?
    } else {
        String::new()
    };
    let mut config = StoreConfig::new(&passphrase);
    config.namespace = cli.namespace.clone();
    config.kdf = kdf_from_env();
    let store = SealedStore::new(substrate, config);

    match cli.command {
        Commands::Set { key, value, ttl_ms } => {
            match ttl_ms {
                Some(ms) => store.set_item_with_ttl(&key, &value, Duration::from_millis(ms))?,
                None => store.set_item(&key, &value)?,
            }
            println!("ok");
        }

        Commands::Get { key } => match store.get_item(&key) {
            Some(value) => println!("{value}"),
            None => bail!("no value for key {key}"),
        },

        Commands::Remove { key } => {
            if !store.remove_item(&key) {
                bail!("failed to remove {key}");
            }
            println!("ok");
        }

        Commands::Keys => {
            for key in store.all_keys() {
                println!("{key}");
            }
        }

        Commands::Stats => {
            println!("{}", serde_json::to_string_pretty(&store.stats())?);
        }

        Commands::Cleanup => {
            println!("removed {} records", store.cleanup());
        }

        Commands::Check => {
            let mut report = CheckReport::default();
            for (key, health) in store.examine() {
                match health {
                    RecordHealth::Ok => report.ok += 1,
                    RecordHealth::Expired => report.expired += 1,
                    RecordHealth::Damaged => report.damaged += 1,
                    RecordHealth::ForeignVersion => report.foreign_version += 1,
                }
                report.records.push(CheckEntry { key, health });
            }
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Commands::Migrate {
            patterns,
            strip_prefix,
            add_prefix,
            dry_run,
        } => {
            let patterns = compile_patterns(&patterns)?;
            let candidates = store.detect_legacy_keys(&patterns);
            if dry_run {
                println!("{}", serde_json::to_string_pretty(&candidates)?);
                return Ok(());
            }
            let options = MigrateOptions {
                strip_prefix,
                add_prefix,
                ..Default::default()
            };
            let report = store.migrate(&candidates, &options);
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}

fn compile_patterns(raw: &[String]) -> Result<Vec<Regex>> {
    raw.iter()
        .map(|pattern| Regex::new(pattern).with_context(|| format!("invalid pattern: {pattern}")))
        .collect()
}

fn default_data_dir() -> Result<PathBuf> {
    let dirs = ProjectDirs::from(APP_QUALIFIER, APP_ORG, APP_NAME)
        .ok_or_else(|| anyhow!("cannot determine data directory"))?;
    Ok(dirs.data_dir().to_path_buf())
}

fn read_passphrase() -> Result<String> {
    if let Ok(passphrase) = std::env::var(PASSPHRASE_ENV) {
        return Ok(passphrase);
    }
    rpassword::prompt_password("Passphrase: ").map_err(|e| anyhow!("passphrase prompt: {e}"))
}

/// Argon2 costs, overridable per deployment through the environment.
fn kdf_from_env() -> KdfParams {
    let mut kdf = KdfParams::default();
    if let Some(m_cost) = env_u32("SEALSTORE_KDF_M_COST") {
        kdf.m_cost = m_cost;
    }
    if let Some(t_cost) = env_u32("SEALSTORE_KDF_T_COST") {
        kdf.t_cost = t_cost;
    }
    if let Some(p_cost) = env_u32("SEALSTORE_KDF_P_COST") {
        kdf.p_cost = p_cost;
    }
    kdf
}

fn env_u32(name: &str) -> Option<u32> {
    std::env::var(name).ok()?.parse().ok()
}

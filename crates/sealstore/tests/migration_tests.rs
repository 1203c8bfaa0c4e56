use regex::Regex;

use sealstore::{
    KdfParams, MemorySubstrate, MigrateOptions, RawSubstrate, SealedStore, StoreConfig,
};

fn test_store() -> (SealedStore<MemorySubstrate>, MemorySubstrate) {
    let substrate = MemorySubstrate::new();
    let mut config = StoreConfig::new("migration passphrase");
    config.kdf = KdfParams::test_params();
    (SealedStore::new(substrate.clone(), config), substrate)
}

fn plant_legacy(substrate: &MemorySubstrate, entries: &[(&str, &str)]) {
    for (key, value) in entries {
        assert!(substrate.set(key, value.as_bytes()));
    }
}

fn patterns(raw: &[&str]) -> Vec<Regex> {
    raw.iter().map(|p| Regex::new(p).unwrap()).collect()
}

/// Substrate wrapper that refuses writes to one chosen key. Used to force
/// a destination-write failure mid-migration.
#[derive(Clone)]
struct RejectingSubstrate {
    inner: MemorySubstrate,
    poisoned: String,
}

impl RawSubstrate for RejectingSubstrate {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &[u8]) -> bool {
        if key == self.poisoned {
            return false;
        }
        self.inner.set(key, value)
    }

    fn delete(&self, key: &str) -> bool {
        self.inner.delete(key)
    }

    fn list_keys(&self) -> Vec<String> {
        self.inner.list_keys()
    }
}

#[test]
fn detect_matches_patterns_outside_the_namespace() {
    let (store, substrate) = test_store();
    plant_legacy(
        &substrate,
        &[
            ("user_prefs", "{}"),
            ("user_theme", "dark"),
            ("session_token", "abc"),
            ("unrelated", "x"),
        ],
    );
    store.set_item("user_prefs", "already sealed").unwrap();

    let found = store.detect_legacy_keys(&patterns(&["^user_", "^session_"]));
    assert_eq!(found, vec!["session_token", "user_prefs", "user_theme"]);
}

#[test]
fn detect_with_no_patterns_finds_nothing() {
    let (store, substrate) = test_store();
    plant_legacy(&substrate, &[("user_prefs", "{}")]);
    assert!(store.detect_legacy_keys(&[]).is_empty());
}

#[test]
fn migrate_seals_values_and_deletes_sources() {
    let (store, substrate) = test_store();
    plant_legacy(&substrate, &[("legacy_a", "alpha"), ("legacy_b", "beta")]);

    let options = MigrateOptions {
        strip_prefix: Some("legacy_".to_string()),
        ..Default::default()
    };
    let keys = vec!["legacy_a".to_string(), "legacy_b".to_string()];
    let report = store.migrate(&keys, &options);

    assert_eq!(report.migrated, 2);
    assert_eq!(report.skipped, 0);
    assert_eq!(report.errors, 0);
    assert_eq!(report.migrated_items, vec!["a", "b"]);
    assert_eq!(store.get_item("a").as_deref(), Some("alpha"));
    assert_eq!(store.get_item("b").as_deref(), Some("beta"));
    assert_eq!(substrate.get("legacy_a"), None);
    assert_eq!(substrate.get("legacy_b"), None);
}

#[test]
fn migrate_add_prefix_rewrites_destinations() {
    let (store, substrate) = test_store();
    plant_legacy(&substrate, &[("token", "abc")]);
    let options = MigrateOptions {
        add_prefix: Some("auth/".to_string()),
        ..Default::default()
    };
    let report = store.migrate(&["token".to_string()], &options);
    assert_eq!(report.migrated_items, vec!["auth/token"]);
    assert_eq!(store.get_item("auth/token").as_deref(), Some("abc"));
}

#[test]
fn second_run_reports_skipped_and_changes_nothing() {
    let (store, substrate) = test_store();
    plant_legacy(&substrate, &[("legacy_cfg", "original")]);
    let options = MigrateOptions {
        strip_prefix: Some("legacy_".to_string()),
        ..Default::default()
    };
    let keys = vec!["legacy_cfg".to_string()];

    let first = store.migrate(&keys, &options);
    assert_eq!(first.migrated, 1);

    let second = store.migrate(&keys, &options);
    assert_eq!(second.migrated, 0);
    assert_eq!(second.skipped, 1);
    assert_eq!(second.errors, 0);
    assert_eq!(store.get_item("cfg").as_deref(), Some("original"));
}

#[test]
fn existing_destination_blocks_and_preserves_source() {
    let (store, substrate) = test_store();
    store.set_item("cfg", "already sealed").unwrap();
    plant_legacy(&substrate, &[("legacy_cfg", "stale plaintext")]);

    let options = MigrateOptions {
        strip_prefix: Some("legacy_".to_string()),
        ..Default::default()
    };
    let report = store.migrate(&["legacy_cfg".to_string()], &options);

    assert_eq!(report.skipped, 1);
    assert_eq!(report.migrated, 0);
    // First writer wins; the legacy copy is left for the operator.
    assert_eq!(store.get_item("cfg").as_deref(), Some("already sealed"));
    assert_eq!(substrate.get("legacy_cfg"), Some(b"stale plaintext".to_vec()));
}

#[test]
fn induced_destination_failure_preserves_source() {
    let substrate = RejectingSubstrate {
        inner: MemorySubstrate::new(),
        poisoned: "sealed::doomed".to_string(),
    };
    let mut config = StoreConfig::new("pw");
    config.kdf = KdfParams::test_params();
    let store = SealedStore::new(substrate.clone(), config);
    assert!(substrate.inner.set("legacy_doomed", b"survivor"));

    let options = MigrateOptions {
        strip_prefix: Some("legacy_".to_string()),
        ..Default::default()
    };
    let report = store.migrate(&["legacy_doomed".to_string()], &options);

    assert_eq!(report.errors, 1);
    assert_eq!(report.migrated, 0);
    assert_eq!(report.error_details[0].key, "legacy_doomed");
    // No partial state: the original is intact, the destination absent.
    assert_eq!(substrate.get("legacy_doomed"), Some(b"survivor".to_vec()));
    assert_eq!(substrate.get("sealed::doomed"), None);
}

#[test]
fn validate_hook_skips_without_deleting() {
    let (store, substrate) = test_store();
    plant_legacy(&substrate, &[("legacy_ok", "short"), ("legacy_huge", "0123456789")]);

    let options = MigrateOptions {
        strip_prefix: Some("legacy_".to_string()),
        validate: Some(Box::new(|_key, value| value.len() <= 6)),
        ..Default::default()
    };
    let keys = vec!["legacy_huge".to_string(), "legacy_ok".to_string()];
    let report = store.migrate(&keys, &options);

    assert_eq!(report.migrated, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(store.get_item("ok").as_deref(), Some("short"));
    assert_eq!(store.get_item("huge"), None);
    assert_eq!(substrate.get("legacy_huge"), Some(b"0123456789".to_vec()));
}

#[test]
fn transform_hook_rewrites_values() {
    let (store, substrate) = test_store();
    plant_legacy(&substrate, &[("legacy_stamp", "1700000000")]);

    let options = MigrateOptions {
        strip_prefix: Some("legacy_".to_string()),
        transform: Some(Box::new(|_key, value| format!("{value}000"))),
        ..Default::default()
    };
    store.migrate(&["legacy_stamp".to_string()], &options);
    assert_eq!(store.get_item("stamp").as_deref(), Some("1700000000000"));
}

#[test]
fn per_key_failures_do_not_abort_the_batch() {
    let (store, substrate) = test_store();
    plant_legacy(&substrate, &[("legacy_good", "fine")]);
    assert!(substrate.set("legacy_binary", &[0xff, 0xfe, 0x00]));

    let options = MigrateOptions {
        strip_prefix: Some("legacy_".to_string()),
        ..Default::default()
    };
    let keys = vec![
        "legacy_binary".to_string(),
        "legacy_missing".to_string(),
        "legacy_good".to_string(),
    ];
    let report = store.migrate(&keys, &options);

    assert_eq!(report.migrated, 1);
    // A source that vanished is nothing to migrate, not a failure.
    assert_eq!(report.skipped, 1);
    assert_eq!(report.errors, 1);
    assert_eq!(report.error_details[0].key, "legacy_binary");
    assert_eq!(store.get_item("good").as_deref(), Some("fine"));
    // The undecodable source is preserved for manual inspection.
    assert_eq!(substrate.get("legacy_binary"), Some(vec![0xff, 0xfe, 0x00]));
}

#[test]
fn detect_then_migrate_end_to_end() {
    let (store, substrate) = test_store();
    plant_legacy(
        &substrate,
        &[("board_main", "kanban"), ("board_side", "notes"), ("other", "x")],
    );

    let found = store.detect_legacy_keys(&patterns(&["^board_"]));
    let report = store.migrate(&found, &MigrateOptions::default());

    assert_eq!(report.migrated, 2);
    assert_eq!(store.get_item("board_main").as_deref(), Some("kanban"));
    assert_eq!(store.get_item("board_side").as_deref(), Some("notes"));
    // Untouched: never matched a pattern.
    assert_eq!(substrate.get("other"), Some(b"x".to_vec()));
    assert!(store.detect_legacy_keys(&patterns(&["^board_"])).is_empty());
}

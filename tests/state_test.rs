//! State store round-trip and crash-safety tests.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{TimeZone, Utc};
use tempfile::TempDir;

use dirsyncd::collab::CollabGroupMeta;
use dirsyncd::retry::RetryItem;
use dirsyncd::state::{ControllerState, StateStore};

fn sample_state() -> ControllerState {
    let retry_items = vec![
        RetryItem {
            uid: "alice".to_string(),
            attempts: 0,
            next_retry_at: Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 5).unwrap(),
        },
        RetryItem {
            uid: "bob".to_string(),
            attempts: 2,
            next_retry_at: Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 45).unwrap(),
        },
        RetryItem {
            uid: "carol".to_string(),
            attempts: 4,
            next_retry_at: Utc.with_ymd_and_hms(2025, 6, 1, 12, 5, 0).unwrap(),
        },
    ];

    let mut collab_groups = BTreeMap::new();
    collab_groups.insert(
        "eng-collab".to_string(),
        CollabGroupMeta {
            base_department: "eng".to_string(),
            extra_members: ["dave", "erin"].iter().map(|m| m.to_string()).collect(),
        },
    );
    collab_groups.insert(
        "ops-collab".to_string(),
        CollabGroupMeta {
            base_department: "ops".to_string(),
            extra_members: BTreeSet::new(),
        },
    );

    ControllerState {
        retry_items,
        last_reconcile_success: Some(Utc.with_ymd_and_hms(2025, 6, 1, 11, 30, 0).unwrap()),
        collab_groups,
    }
}

#[tokio::test]
async fn round_trip_reproduces_the_exact_state() {
    let dir = TempDir::new().unwrap();
    let store = StateStore::new(dir.path());

    let state = sample_state();
    store.save(&state).await.expect("save");
    let loaded = store.load().await.expect("load");

    assert_eq!(loaded, state);
    assert_eq!(loaded.retry_items.len(), 3);
    assert_eq!(loaded.collab_groups.len(), 2);
}

#[tokio::test]
async fn missing_file_loads_the_default_state() {
    let dir = TempDir::new().unwrap();
    let store = StateStore::new(dir.path());

    let loaded = store.load().await.expect("load");
    assert_eq!(loaded, ControllerState::default());
    assert!(loaded.retry_items.is_empty());
    assert!(loaded.last_reconcile_success.is_none());
}

#[tokio::test]
async fn save_leaves_no_temp_file_behind() {
    let dir = TempDir::new().unwrap();
    let store = StateStore::new(dir.path());

    store.save(&sample_state()).await.expect("save");
    store.save(&ControllerState::default()).await.expect("overwrite");

    let names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["state.json"]);

    // The overwrite won: loading yields the default state again.
    let loaded = store.load().await.expect("load");
    assert_eq!(loaded, ControllerState::default());
}

#[tokio::test]
async fn wire_format_uses_the_documented_field_names() {
    let dir = TempDir::new().unwrap();
    let store = StateStore::new(dir.path());
    store.save(&sample_state()).await.expect("save");

    let raw = std::fs::read_to_string(dir.path().join("state.json")).unwrap();
    assert!(raw.contains("\"retryItems\""));
    assert!(raw.contains("\"subjectUID\""));
    assert!(raw.contains("\"nextRetryAt\""));
    assert!(raw.contains("\"lastReconcileSuccess\""));
    assert!(raw.contains("\"collabGroups\""));
    assert!(raw.contains("\"baseDepartment\""));
    assert!(raw.contains("\"extraMembers\""));
}

#[tokio::test]
async fn corrupt_snapshot_is_an_error_not_a_silent_reset() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("state.json"), "{not json").unwrap();

    let store = StateStore::new(dir.path());
    assert!(store.load().await.is_err());
}

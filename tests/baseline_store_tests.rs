//! Integration tests for baseline persistence and history
//!
//! Covers: round-trips, wholesale overwrite, schema versioning, corrupt
//! files, atomic replace on failed saves, append-only history.

use gpuperf::measurement::{MeasurementSet, Sample, WorkloadConfig, WorkloadIdentity};
use gpuperf::regression::compare;
use gpuperf::store::{BaselineStore, TestResult, SCHEMA_VERSION};
use gpuperf::GateError;
use std::fs;
use tempfile::TempDir;

fn workload() -> WorkloadConfig {
    WorkloadConfig::new("matmul")
        .with_dimensions(vec![1024, 1024])
        .with_parameter("precision", "fp32")
}

fn set(durations: &[f64]) -> MeasurementSet {
    let samples = durations
        .iter()
        .enumerate()
        .map(|(i, d)| Sample::new(*d).with_metric("alu_utilization", 70.0 + i as f64))
        .collect();
    MeasurementSet::build(samples, "Apple M2 Max", workload()).unwrap()
}

fn identity() -> WorkloadIdentity {
    WorkloadIdentity::new("Apple M2 Max", workload())
}

fn rewrite(store: &BaselineStore, edit: impl FnOnce(&mut serde_json::Value)) {
    let path = store.baseline_path(&identity());
    let mut value: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
    edit(&mut value);
    fs::write(&path, serde_json::to_vec_pretty(&value).unwrap()).unwrap();
}

#[test]
fn test_roundtrip_is_field_for_field() {
    let dir = TempDir::new().unwrap();
    let store = BaselineStore::new(dir.path());
    let original = set(&[10.123456789, 10.2, 9.87654321, 10.05, 0.1 + 0.2]);

    store.save(&original).unwrap();
    let loaded = store.load(&identity()).unwrap();

    assert_eq!(loaded, original);
    assert_eq!(loaded.samples(), original.samples());
    assert_eq!(loaded.captured_at(), original.captured_at());
    assert_eq!(loaded.mean().to_bits(), original.mean().to_bits());
}

#[test]
fn test_save_overwrites_wholesale() {
    let dir = TempDir::new().unwrap();
    let store = BaselineStore::new(dir.path());

    store.save(&set(&[1.0, 2.0, 3.0, 4.0, 5.0])).unwrap();
    let replacement = set(&[7.0, 8.0]);
    store.save(&replacement).unwrap();

    let loaded = store.load(&identity()).unwrap();
    assert_eq!(loaded, replacement);
    assert_eq!(loaded.count(), 2);
}

#[test]
fn test_load_missing_baseline() {
    let dir = TempDir::new().unwrap();
    let store = BaselineStore::new(dir.path());

    match store.load(&identity()) {
        Err(GateError::MissingBaseline { identity }) => {
            assert!(identity.contains("matmul"));
            assert!(identity.contains("Apple M2 Max"));
        }
        other => panic!("expected MissingBaseline, got {:?}", other),
    }
}

#[test]
fn test_newer_major_version_is_incompatible() {
    let dir = TempDir::new().unwrap();
    let store = BaselineStore::new(dir.path());
    store.save(&set(&[1.0, 2.0])).unwrap();

    rewrite(&store, |v| v["schema_version"] = serde_json::json!("2.0"));

    match store.load(&identity()) {
        Err(GateError::IncompatibleSchema { found, supported }) => {
            assert_eq!(found, "2.0");
            assert_eq!(supported, SCHEMA_VERSION);
        }
        other => panic!("expected IncompatibleSchema, got {:?}", other),
    }
}

#[test]
fn test_additive_minor_version_still_loads() {
    let dir = TempDir::new().unwrap();
    let store = BaselineStore::new(dir.path());
    let original = set(&[1.0, 2.0, 3.0]);
    store.save(&original).unwrap();

    rewrite(&store, |v| {
        v["schema_version"] = serde_json::json!("1.4");
        v["driver_version"] = serde_json::json!("31.0.101");
        v["measurement"]["thermal_state"] = serde_json::json!("nominal");
    });

    assert_eq!(store.load(&identity()).unwrap(), original);
}

#[test]
fn test_unversioned_file_is_corrupt() {
    let dir = TempDir::new().unwrap();
    let store = BaselineStore::new(dir.path());
    store.save(&set(&[1.0, 2.0])).unwrap();

    rewrite(&store, |v| {
        v.as_object_mut().unwrap().remove("schema_version");
    });

    assert!(matches!(
        store.load(&identity()),
        Err(GateError::CorruptData { .. })
    ));
}

#[test]
fn test_truncated_file_is_corrupt() {
    let dir = TempDir::new().unwrap();
    let store = BaselineStore::new(dir.path());
    let path = store.save(&set(&[1.0, 2.0, 3.0])).unwrap();

    let bytes = fs::read(&path).unwrap();
    fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();

    match store.load(&identity()) {
        Err(GateError::CorruptData { path: reported, .. }) => assert_eq!(reported, path),
        other => panic!("expected CorruptData, got {:?}", other),
    }
}

#[test]
fn test_structurally_wrong_document_is_corrupt() {
    let dir = TempDir::new().unwrap();
    let store = BaselineStore::new(dir.path());
    store.save(&set(&[1.0, 2.0])).unwrap();

    rewrite(&store, |v| v["measurement"]["samples"] = serde_json::json!("fast"));
    assert!(matches!(
        store.load(&identity()),
        Err(GateError::CorruptData { .. })
    ));

    rewrite(&store, |v| v["measurement"]["samples"] = serde_json::json!([]));
    assert!(matches!(
        store.load(&identity()),
        Err(GateError::CorruptData { .. })
    ));
}

#[test]
fn test_mismatched_identity_key_is_corrupt() {
    let dir = TempDir::new().unwrap();
    let store = BaselineStore::new(dir.path());
    store.save(&set(&[1.0, 2.0])).unwrap();

    rewrite(&store, |v| v["identity_key"] = serde_json::json!("other-0000000000000000"));
    assert!(matches!(
        store.load(&identity()),
        Err(GateError::CorruptData { .. })
    ));
}

#[test]
fn test_failed_save_keeps_previous_baseline() {
    let dir = TempDir::new().unwrap();
    let store = BaselineStore::new(dir.path());
    let original = set(&[1.0, 2.0, 3.0]);
    let path = store.save(&original).unwrap();

    // A directory squatting on the temp path makes the next write fail
    let tmp = path.with_extension("json.tmp");
    fs::create_dir(&tmp).unwrap();

    let result = store.save(&set(&[100.0, 200.0]));
    assert!(matches!(result, Err(GateError::WriteFailure { .. })));
    assert_eq!(store.load(&identity()).unwrap(), original);
}

#[test]
fn test_save_into_unwritable_root_is_write_failure() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("not-a-dir");
    fs::write(&root, b"occupied").unwrap();

    let store = BaselineStore::new(&root);
    match store.save(&set(&[1.0])) {
        Err(GateError::WriteFailure { operation, .. }) => assert_eq!(operation, "save baseline"),
        other => panic!("expected WriteFailure, got {:?}", other),
    }
}

#[test]
fn test_history_is_append_only() {
    let dir = TempDir::new().unwrap();
    let store = BaselineStore::new(dir.path());
    let baseline = set(&[100.0, 101.0]);

    for current_ms in [100.0, 120.0, 99.0] {
        let current = set(&[current_ms, current_ms + 1.0]);
        let verdict = compare(&current, &baseline, 0.05).unwrap();
        store
            .append_test_result(&TestResult::new(current, baseline.clone(), verdict))
            .unwrap();
    }

    let history = store.history().unwrap();
    assert_eq!(history.len(), 3);
    assert!(!history[0].verdict.is_regression());
    assert!(history[1].verdict.is_regression());
    assert_eq!(history[2].current.mean(), 99.5);
    assert_eq!(history[0].baseline, baseline);

    let lines = fs::read_to_string(store.history_path()).unwrap();
    assert_eq!(lines.lines().count(), 3);
}

#[test]
fn test_history_reports_bad_line() {
    let dir = TempDir::new().unwrap();
    let store = BaselineStore::new(dir.path());
    fs::write(store.history_path(), "{not json}\n").unwrap();

    match store.history() {
        Err(GateError::CorruptData { reason, .. }) => assert!(reason.contains("line 1")),
        other => panic!("expected CorruptData, got {:?}", other),
    }
}

#[test]
fn test_list_skips_unreadable_files() {
    let dir = TempDir::new().unwrap();
    let store = BaselineStore::new(dir.path());
    store.save(&set(&[1.0, 2.0])).unwrap();

    let other = MeasurementSet::build(
        vec![Sample::new(5.0)],
        "NVIDIA RTX 4090",
        WorkloadConfig::new("reduce"),
    )
    .unwrap();
    store.save(&other).unwrap();
    fs::write(dir.path().join("baselines").join("junk.json"), "garbage").unwrap();

    let summaries = store.list().unwrap();
    assert_eq!(summaries.len(), 2);
    assert!(summaries.iter().any(|s| s.device_id == "NVIDIA RTX 4090" && s.count == 1));
    assert!(summaries.iter().any(|s| s.workload.starts_with("matmul [1024x1024]")));
}

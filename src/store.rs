//! Durable baseline and test-result persistence
//!
//! Layout under the store root:
//!
//! ```text
//! <root>/baselines/<identity-key>.json   one active baseline per workload identity
//! <root>/history.jsonl                   append-only test results, one JSON document per line
//! ```
//!
//! Baselines are versioned documents (`schema_version = "MAJOR.MINOR"`).
//! Readers accept any minor version of a supported major and ignore unknown
//! fields; a newer major is rejected with `IncompatibleSchema`. Saves go
//! through a temp file, `sync_all` and `rename`, so a failed or interrupted
//! save leaves the previous baseline readable.

use crate::error::{GateError, Result};
use crate::measurement::{MeasurementRecord, MeasurementSet, WorkloadIdentity};
use crate::regression::RegressionVerdict;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Schema version written by this build
pub const SCHEMA_VERSION: &str = "1.0";

/// Highest major schema version this build can read
const SUPPORTED_MAJOR: u32 = 1;

const BASELINE_DIR: &str = "baselines";
const HISTORY_FILE: &str = "history.jsonl";

/// On-disk baseline document
#[derive(Debug, Serialize, Deserialize)]
struct BaselineDocument {
    schema_version: String,
    identity_key: String,
    measurement: MeasurementRecord,
}

/// Historical record of one comparison run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub recorded_at: DateTime<Utc>,
    pub identity_key: String,
    pub current: MeasurementSet,
    pub baseline: MeasurementSet,
    pub verdict: RegressionVerdict,
}

impl TestResult {
    pub fn new(current: MeasurementSet, baseline: MeasurementSet, verdict: RegressionVerdict) -> Self {
        Self {
            recorded_at: Utc::now(),
            identity_key: current.identity().key(),
            current,
            baseline,
            verdict,
        }
    }
}

/// One line of `list()` output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BaselineSummary {
    pub key: String,
    pub device_id: String,
    pub workload: String,
    pub count: usize,
    pub mean_ms: f64,
    pub std_dev_ms: f64,
    pub captured_at: DateTime<Utc>,
}

/// Filesystem-backed baseline store
#[derive(Debug, Clone)]
pub struct BaselineStore {
    root: PathBuf,
}

impl BaselineStore {
    /// Open a store rooted at `root`; directories are created on first write
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the baseline file for `identity`
    pub fn baseline_path(&self, identity: &WorkloadIdentity) -> PathBuf {
        self.root
            .join(BASELINE_DIR)
            .join(format!("{}.json", identity.key()))
    }

    pub fn history_path(&self) -> PathBuf {
        self.root.join(HISTORY_FILE)
    }

    /// Whether a baseline is stored for `identity`
    pub fn exists(&self, identity: &WorkloadIdentity) -> bool {
        self.baseline_path(identity).is_file()
    }

    /// Persist `set` as the baseline for its identity, replacing any prior one
    ///
    /// # Errors
    /// `WriteFailure` on any I/O error. The prior baseline, if any, is untouched.
    pub fn save(&self, set: &MeasurementSet) -> Result<PathBuf> {
        let identity = set.identity();
        let key = identity.key();
        let path = self.baseline_path(&identity);
        let write_failure = |source: io::Error| GateError::WriteFailure {
            operation: "save baseline",
            identity: format!("{} ({})", identity, key),
            source,
        };

        let document = BaselineDocument {
            schema_version: SCHEMA_VERSION.to_string(),
            identity_key: key.clone(),
            measurement: MeasurementRecord::from(set.clone()),
        };
        let data = serde_json::to_vec_pretty(&document)
            .map_err(|e| write_failure(io::Error::new(io::ErrorKind::InvalidData, e)))?;

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(write_failure)?;
        }

        let tmp = path.with_extension("json.tmp");
        if let Err(e) = write_synced(&tmp, &data).and_then(|()| fs::rename(&tmp, &path)) {
            let _ = fs::remove_file(&tmp);
            return Err(write_failure(e));
        }

        tracing::info!(
            key = %key,
            samples = set.count(),
            mean_ms = set.mean(),
            "saved baseline to {}",
            path.display()
        );
        Ok(path)
    }

    /// Load the baseline for `identity`
    ///
    /// # Errors
    /// - `MissingBaseline` when none is stored
    /// - `IncompatibleSchema` when the stored major version is unsupported
    /// - `CorruptData` when the file is unreadable, unversioned or malformed
    pub fn load(&self, identity: &WorkloadIdentity) -> Result<MeasurementSet> {
        let key = identity.key();
        let path = self.baseline_path(identity);
        if !path.exists() {
            return Err(GateError::MissingBaseline {
                identity: format!("{} ({})", identity, key),
            });
        }

        let set = read_baseline(&path, Some(&key))?;
        tracing::info!(key = %key, samples = set.count(), "loaded baseline");
        Ok(set)
    }

    /// Delete the baseline for `identity`; returns whether one existed
    pub fn remove(&self, identity: &WorkloadIdentity) -> Result<bool> {
        match fs::remove_file(self.baseline_path(identity)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(GateError::WriteFailure {
                operation: "remove baseline",
                identity: identity.key(),
                source,
            }),
        }
    }

    /// Summaries of every readable stored baseline, sorted by key
    ///
    /// Unreadable files are skipped with a warning.
    pub fn list(&self) -> Result<Vec<BaselineSummary>> {
        let dir = self.root.join(BASELINE_DIR);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(GateError::CorruptData {
                    path: dir,
                    reason: e.to_string(),
                })
            }
        };

        let mut summaries = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match read_baseline(&path, None) {
                Ok(set) => summaries.push(BaselineSummary {
                    key: set.identity().key(),
                    device_id: set.device_id().to_string(),
                    workload: set.workload().to_string(),
                    count: set.count(),
                    mean_ms: set.mean(),
                    std_dev_ms: set.std_dev(),
                    captured_at: set.captured_at(),
                }),
                Err(e) => tracing::warn!("skipping {}: {}", path.display(), e),
            }
        }
        summaries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(summaries)
    }

    /// Append a test result to the history log
    ///
    /// Never rewrites earlier entries.
    pub fn append_test_result(&self, result: &TestResult) -> Result<()> {
        let write_failure = |source: io::Error| GateError::WriteFailure {
            operation: "append test result",
            identity: result.identity_key.clone(),
            source,
        };

        let mut line = serde_json::to_vec(result)
            .map_err(|e| write_failure(io::Error::new(io::ErrorKind::InvalidData, e)))?;
        line.push(b'\n');

        fs::create_dir_all(&self.root).map_err(write_failure)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.history_path())
            .map_err(write_failure)?;
        file.write_all(&line).map_err(write_failure)?;
        file.sync_data().map_err(write_failure)?;

        tracing::debug!(key = %result.identity_key, "appended test result");
        Ok(())
    }

    /// Read back the history log, oldest first
    ///
    /// Diagnostics only; the analyzer never consults history.
    pub fn history(&self) -> Result<Vec<TestResult>> {
        let path = self.history_path();
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(GateError::CorruptData {
                    path,
                    reason: e.to_string(),
                })
            }
        };

        let mut results = Vec::new();
        for (number, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| GateError::CorruptData {
                path: path.clone(),
                reason: e.to_string(),
            })?;
            if line.trim().is_empty() {
                continue;
            }
            let result = serde_json::from_str(&line).map_err(|e| GateError::CorruptData {
                path: path.clone(),
                reason: format!("line {}: {}", number + 1, e),
            })?;
            results.push(result);
        }
        Ok(results)
    }
}

fn write_synced(path: &Path, data: &[u8]) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(data)?;
    file.sync_all()
}

/// Parse "MAJOR.MINOR" (a bare "MAJOR" is accepted)
fn parse_major(version: &str) -> Option<u32> {
    version.split('.').next()?.trim().parse().ok()
}

fn read_baseline(path: &Path, expected_key: Option<&str>) -> Result<MeasurementSet> {
    let corrupt = |reason: String| GateError::CorruptData {
        path: path.to_path_buf(),
        reason,
    };

    let data = fs::read(path).map_err(|e| corrupt(format!("read failed: {}", e)))?;
    let value: serde_json::Value =
        serde_json::from_slice(&data).map_err(|e| corrupt(format!("invalid JSON: {}", e)))?;

    let version = value
        .get("schema_version")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| corrupt("missing schema_version".to_string()))?;
    let major = parse_major(version)
        .ok_or_else(|| corrupt(format!("unparseable schema_version '{}'", version)))?;
    if major == 0 || major > SUPPORTED_MAJOR {
        return Err(GateError::IncompatibleSchema {
            found: version.to_string(),
            supported: SCHEMA_VERSION.to_string(),
        });
    }

    let document: BaselineDocument =
        serde_json::from_value(value).map_err(|e| corrupt(e.to_string()))?;

    if let Some(expected) = expected_key {
        if document.identity_key != expected {
            return Err(corrupt(format!(
                "identity key '{}' does not match '{}'",
                document.identity_key, expected
            )));
        }
    }

    let stored_summary = document.measurement.summary.clone();
    let set = MeasurementSet::try_from(document.measurement).map_err(|e| corrupt(e.to_string()))?;

    if let Some(stored) = stored_summary {
        if &stored != set.summary() {
            tracing::warn!(
                "stored statistics in {} disagree with its samples; using recomputed values",
                path.display()
            );
        }
    }

    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measurement::{Sample, WorkloadConfig};
    use tempfile::TempDir;

    fn set(durations: &[f64]) -> MeasurementSet {
        let samples = durations.iter().map(|d| Sample::new(*d)).collect();
        MeasurementSet::build(
            samples,
            "Apple M2 Max",
            WorkloadConfig::new("matmul").with_dimensions(vec![512, 512]),
        )
        .unwrap()
    }

    #[test]
    fn test_parse_major() {
        assert_eq!(parse_major("1.0"), Some(1));
        assert_eq!(parse_major("2"), Some(2));
        assert_eq!(parse_major("1.7.3"), Some(1));
        assert_eq!(parse_major("v1"), None);
        assert_eq!(parse_major(""), None);
    }

    #[test]
    fn test_exists_and_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = BaselineStore::new(dir.path());
        let baseline = set(&[10.0, 10.5, 9.5]);

        assert!(!store.exists(&baseline.identity()));
        store.save(&baseline).unwrap();
        assert!(store.exists(&baseline.identity()));

        let loaded = store.load(&baseline.identity()).unwrap();
        assert_eq!(loaded, baseline);
    }

    #[test]
    fn test_save_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let store = BaselineStore::new(dir.path());
        let path = store.save(&set(&[1.0])).unwrap();

        let tmp = path.with_extension("json.tmp");
        assert!(path.is_file());
        assert!(!tmp.exists());
    }

    #[test]
    fn test_document_carries_schema_version() {
        let dir = TempDir::new().unwrap();
        let store = BaselineStore::new(dir.path());
        let path = store.save(&set(&[1.0, 2.0])).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&fs::read(path).unwrap()).unwrap();
        assert_eq!(value["schema_version"], SCHEMA_VERSION);
        assert_eq!(value["measurement"]["summary"]["count"], 2);
        assert_eq!(value["measurement"]["samples"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_remove() {
        let dir = TempDir::new().unwrap();
        let store = BaselineStore::new(dir.path());
        let baseline = set(&[1.0]);

        assert!(!store.remove(&baseline.identity()).unwrap());
        store.save(&baseline).unwrap();
        assert!(store.remove(&baseline.identity()).unwrap());
        assert!(!store.exists(&baseline.identity()));
    }

    #[test]
    fn test_history_empty_when_absent() {
        let dir = TempDir::new().unwrap();
        let store = BaselineStore::new(dir.path());
        assert!(store.history().unwrap().is_empty());
        assert!(store.list().unwrap().is_empty());
    }
}

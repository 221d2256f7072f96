//! Glue between an external sample source and the core
//!
//! Sequence: collect N samples -> build a [`MeasurementSet`] -> either save it
//! as the baseline or compare it against the stored one. State is passed in
//! explicitly; nothing is held in process-wide variables.

use crate::error::{ErrorKind, GateError};
use crate::measurement::{MeasurementSet, Sample, WorkloadConfig, WorkloadIdentity};
use crate::regression::{analyze, RegressionVerdict, Strategy, Verdict};
use crate::report::format_report;
use crate::store::{BaselineStore, TestResult};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// External workload runner contract
///
/// Given an iteration count, yield exactly that many samples or fail the
/// whole run. Partial runs are never averaged.
pub trait SampleSource {
    fn collect(&mut self, iterations: usize) -> Result<Vec<Sample>>;
}

/// Samples written to disk by an external runner
///
/// Accepts a JSON array of samples or JSON Lines (one sample per line).
/// A bare number is read as a duration in milliseconds.
#[derive(Debug, Clone)]
pub struct FileSampleSource {
    path: PathBuf,
}

impl FileSampleSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every sample in the file
    pub fn read_all(&self) -> Result<Vec<Sample>> {
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read samples from {}", self.path.display()))?;
        parse_samples(&content)
            .with_context(|| format!("Failed to parse samples in {}", self.path.display()))
    }
}

impl SampleSource for FileSampleSource {
    /// Returns every sample in the file; the orchestrator checks the count
    fn collect(&mut self, _iterations: usize) -> Result<Vec<Sample>> {
        self.read_all()
    }
}

#[derive(serde::Deserialize)]
#[serde(untagged)]
enum SampleInput {
    Duration(f64),
    Full(Sample),
}

impl From<SampleInput> for Sample {
    fn from(input: SampleInput) -> Self {
        match input {
            SampleInput::Duration(ms) => Sample::new(ms),
            SampleInput::Full(sample) => sample,
        }
    }
}

/// Parse a JSON array or JSON Lines sample document
pub fn parse_samples(content: &str) -> Result<Vec<Sample>> {
    let trimmed = content.trim_start();
    if trimmed.starts_with('[') {
        let inputs: Vec<SampleInput> =
            serde_json::from_str(trimmed).context("Invalid JSON sample array")?;
        return Ok(inputs.into_iter().map(Sample::from).collect());
    }

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(number, line)| {
            serde_json::from_str::<SampleInput>(line)
                .map(Sample::from)
                .with_context(|| format!("Invalid sample on line {}", number + 1))
        })
        .collect()
}

/// Outcome contract for the command-line layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Pass,
    Fail,
    Error(ErrorKind),
}

impl Outcome {
    /// 0 = pass, 1 = regression detected, 2 = operational error
    pub fn exit_code(&self) -> u8 {
        match self {
            Outcome::Pass => 0,
            Outcome::Fail => 1,
            Outcome::Error(_) => 2,
        }
    }

    /// Classify an error from a run; non-core failures map to `External`
    pub fn from_error(error: &anyhow::Error) -> Self {
        let kind = error
            .downcast_ref::<GateError>()
            .map(GateError::kind)
            .unwrap_or(ErrorKind::External);
        Outcome::Error(kind)
    }
}

impl From<Verdict> for Outcome {
    fn from(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Pass => Outcome::Pass,
            Verdict::Fail => Outcome::Fail,
        }
    }
}

/// Result of a `check` run
#[derive(Debug, Clone)]
pub struct CheckReport {
    pub verdict: RegressionVerdict,
    pub report: String,
    pub test_result: TestResult,
    /// Whether the test result reached the history log
    pub history_recorded: bool,
}

impl CheckReport {
    pub fn outcome(&self) -> Outcome {
        self.verdict.verdict.into()
    }
}

/// Sequences sample collection, persistence and comparison
#[derive(Debug, Clone)]
pub struct Orchestrator {
    store: BaselineStore,
    iterations: usize,
}

impl Orchestrator {
    pub fn new(store: BaselineStore, iterations: usize) -> Self {
        Self { store, iterations }
    }

    pub fn store(&self) -> &BaselineStore {
        &self.store
    }

    /// Collect a full run and aggregate it
    ///
    /// # Errors
    /// Fails the run if the source errors or yields a different count than
    /// requested.
    pub fn measure(
        &self,
        source: &mut dyn SampleSource,
        device_id: &str,
        workload: &WorkloadConfig,
    ) -> Result<MeasurementSet> {
        let samples = source
            .collect(self.iterations)
            .context("Sample collection failed; run aborted")?;
        if samples.len() != self.iterations {
            return Err(GateError::SampleCountMismatch {
                expected: self.iterations,
                actual: samples.len(),
            }
            .into());
        }

        tracing::debug!(samples = samples.len(), device = device_id, "collected samples");
        Ok(MeasurementSet::build(samples, device_id, workload.clone())?)
    }

    /// Capture a run and store it as the new baseline
    pub fn record_baseline(
        &self,
        source: &mut dyn SampleSource,
        device_id: &str,
        workload: &WorkloadConfig,
    ) -> Result<MeasurementSet> {
        let set = self.measure(source, device_id, workload)?;
        self.store.save(&set)?;
        Ok(set)
    }

    /// Capture a run and compare it against the stored baseline
    ///
    /// The baseline is loaded before samples are collected so a missing or
    /// unreadable baseline fails fast. A failed history append is logged and
    /// does not change the verdict.
    pub fn check(
        &self,
        source: &mut dyn SampleSource,
        device_id: &str,
        workload: &WorkloadConfig,
        strategy: &Strategy,
    ) -> Result<CheckReport> {
        let identity = WorkloadIdentity::new(device_id, workload.clone());
        let baseline = self.store.load(&identity)?;
        let current = self.measure(source, device_id, workload)?;

        let verdict = analyze(&current, &baseline, strategy)?;
        let report = format_report(&current, &baseline, &verdict);
        let test_result = TestResult::new(current, baseline, verdict.clone());

        let history_recorded = match self.store.append_test_result(&test_result) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("could not record test result in history: {}", e);
                false
            }
        };

        Ok(CheckReport {
            verdict,
            report,
            test_result,
            history_recorded,
        })
    }
}

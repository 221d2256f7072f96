//! Per-run measurement aggregation
//!
//! A [`MeasurementSet`] is the immutable summary of one benchmark run: the raw
//! per-iteration [`Sample`]s in capture order plus descriptive statistics
//! derived from them. The statistics live in a private [`Summary`] field that
//! is only ever filled by [`MeasurementSet::build_at`], so they cannot drift
//! from the samples. Deserialization goes through the same constructor.
//!
//! Secondary metrics (utilization, instruction counts) are optional per
//! sample. A metric is averaged only when every sample carries it; otherwise
//! the aggregate records it as [`MetricSummary::Partial`] instead of
//! averaging over a biased subset.

use crate::error::{GateError, Result};
use aprender::stats::DescriptiveStats;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use trueno::Vector;

/// z-value for a two-sided 95% normal confidence interval
const Z_95: f64 = 1.96;

/// Largest accepted duration; the median quantile runs on f32
pub const MAX_DURATION_MS: f64 = f32::MAX as f64;

/// One iteration's measured outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Wall time of the iteration in milliseconds
    ///
    /// Zero is accepted (a timer below its resolution); negative values are not.
    /// The upper bound is `f32::MAX` ms, the range of the median quantile.
    pub duration_ms: f64,
    /// Optional secondary metrics keyed by name (e.g. "alu_utilization")
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metrics: BTreeMap<String, f64>,
}

impl Sample {
    pub fn new(duration_ms: f64) -> Self {
        Self {
            duration_ms,
            metrics: BTreeMap::new(),
        }
    }

    /// Attach a secondary metric
    pub fn with_metric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(name.into(), value);
        self
    }

    fn validate(&self, index: usize) -> Result<()> {
        if !self.duration_ms.is_finite() || self.duration_ms < 0.0 {
            return Err(GateError::InvalidSample {
                index,
                reason: format!("duration_ms must be finite and >= 0, got {}", self.duration_ms),
            });
        }
        if self.duration_ms > MAX_DURATION_MS {
            return Err(GateError::InvalidSample {
                index,
                reason: format!(
                    "duration_ms {} exceeds the supported maximum of {} ms",
                    self.duration_ms, MAX_DURATION_MS
                ),
            });
        }
        if let Some((name, value)) = self.metrics.iter().find(|(_, v)| !v.is_finite()) {
            return Err(GateError::InvalidSample {
                index,
                reason: format!("metric '{}' is not finite ({})", name, value),
            });
        }
        Ok(())
    }
}

/// Workload configuration carried through for report context
///
/// Not used by the statistical test. Together with the device id it forms the
/// [`WorkloadIdentity`] a baseline is stored under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkloadConfig {
    /// Workload kind (e.g. "matmul", "conv2d")
    pub kind: String,
    /// Problem dimensions
    #[serde(default)]
    pub dimensions: Vec<u64>,
    /// Free-form parameters
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

impl WorkloadConfig {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            dimensions: Vec::new(),
            parameters: BTreeMap::new(),
        }
    }

    pub fn with_dimensions(mut self, dimensions: impl Into<Vec<u64>>) -> Self {
        self.dimensions = dimensions.into();
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }
}

impl fmt::Display for WorkloadConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if !self.dimensions.is_empty() {
            let dims: Vec<String> = self.dimensions.iter().map(u64::to_string).collect();
            write!(f, " [{}]", dims.join("x"))?;
        }
        for (key, value) in &self.parameters {
            write!(f, " {}={}", key, value)?;
        }
        Ok(())
    }
}

/// Key under which exactly one baseline is stored
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkloadIdentity {
    pub device_id: String,
    pub workload: WorkloadConfig,
}

impl WorkloadIdentity {
    pub fn new(device_id: impl Into<String>, workload: WorkloadConfig) -> Self {
        Self {
            device_id: device_id.into(),
            workload,
        }
    }

    /// Stable, filesystem-safe key: `<kind>-<16 hex chars of SHA-256>`
    ///
    /// The digest covers, in order: device id, NUL, kind, NUL, each dimension
    /// as little-endian u64, NUL, then `key NUL value NUL` for every parameter
    /// in key order.
    pub fn key(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.device_id.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.workload.kind.as_bytes());
        hasher.update([0u8]);
        for dim in &self.workload.dimensions {
            hasher.update(dim.to_le_bytes());
        }
        hasher.update([0u8]);
        for (key, value) in &self.workload.parameters {
            hasher.update(key.as_bytes());
            hasher.update([0u8]);
            hasher.update(value.as_bytes());
            hasher.update([0u8]);
        }
        let digest = hex::encode(hasher.finalize());

        let kind: String = self
            .workload
            .kind
            .chars()
            .take(48)
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c.to_ascii_lowercase()
                } else {
                    '_'
                }
            })
            .collect();
        let kind = if kind.is_empty() { "workload".to_string() } else { kind };

        format!("{}-{}", kind, &digest[..16])
    }
}

impl fmt::Display for WorkloadIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {}", self.workload, self.device_id)
    }
}

/// Aggregate of one secondary metric across a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MetricSummary {
    /// Present in every sample
    Present { mean: f64, min: f64, max: f64 },
    /// Present in only some samples; not averaged
    Partial { present_in: usize },
}

impl MetricSummary {
    pub fn mean(&self) -> Option<f64> {
        match self {
            MetricSummary::Present { mean, .. } => Some(*mean),
            MetricSummary::Partial { .. } => None,
        }
    }
}

/// Descriptive statistics derived from a sample sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub count: usize,
    pub mean: f64,
    /// Bessel-corrected (n-1) sample standard deviation, 0 when count == 1
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
    #[serde(default)]
    pub metrics: BTreeMap<String, MetricSummary>,
}

impl Summary {
    fn compute(samples: &[Sample]) -> Result<Self> {
        let count = samples.len();
        let durations: Vec<f64> = samples.iter().map(|s| s.duration_ms).collect();

        let mean = durations.iter().sum::<f64>() / count as f64;
        let std_dev = if count < 2 {
            0.0
        } else {
            let sum_sq: f64 = durations.iter().map(|d| (d - mean).powi(2)).sum();
            (sum_sq / (count - 1) as f64).sqrt()
        };
        let min = durations.iter().copied().fold(f64::INFINITY, f64::min);
        let max = durations.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let median = median(&durations)?;
        // Floating point summation can land one ulp outside the range
        let mean = mean.clamp(min, max);

        Ok(Self {
            count,
            mean,
            std_dev,
            min,
            max,
            median,
            metrics: summarize_metrics(samples),
        })
    }
}

/// Median via aprender's R-7 quantile over a trueno vector
///
/// Runs in f32: report-only, never an input to the regression decision.
fn median(values: &[f64]) -> Result<f64> {
    let narrowed: Vec<f32> = values.iter().map(|v| *v as f32).collect();
    let vector = Vector::from_slice(&narrowed);
    DescriptiveStats::new(&vector)
        .quantile(0.5)
        .map(f64::from)
        .map_err(|e| GateError::Statistics(format!("failed to compute median: {}", e)))
}

fn summarize_metrics(samples: &[Sample]) -> BTreeMap<String, MetricSummary> {
    let mut values: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for sample in samples {
        for (name, value) in &sample.metrics {
            values.entry(name.as_str()).or_default().push(*value);
        }
    }

    values
        .into_iter()
        .map(|(name, observed)| {
            let summary = if observed.len() == samples.len() {
                MetricSummary::Present {
                    mean: observed.iter().sum::<f64>() / observed.len() as f64,
                    min: observed.iter().copied().fold(f64::INFINITY, f64::min),
                    max: observed.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                }
            } else {
                MetricSummary::Partial {
                    present_in: observed.len(),
                }
            };
            (name.to_string(), summary)
        })
        .collect()
}

/// Immutable aggregate of one benchmark run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "MeasurementRecord", into = "MeasurementRecord")]
pub struct MeasurementSet {
    samples: Vec<Sample>,
    device_id: String,
    workload: WorkloadConfig,
    captured_at: DateTime<Utc>,
    summary: Summary,
}

impl MeasurementSet {
    /// Aggregate samples captured now
    ///
    /// # Errors
    /// `EmptySampleSet` when `samples` is empty, `InvalidSample` when a
    /// duration is negative or above [`MAX_DURATION_MS`], or any value is
    /// non-finite.
    pub fn build(
        samples: Vec<Sample>,
        device_id: impl Into<String>,
        workload: WorkloadConfig,
    ) -> Result<Self> {
        Self::build_at(samples, device_id, workload, Utc::now())
    }

    /// Aggregate samples with an explicit capture timestamp
    pub fn build_at(
        samples: Vec<Sample>,
        device_id: impl Into<String>,
        workload: WorkloadConfig,
        captured_at: DateTime<Utc>,
    ) -> Result<Self> {
        if samples.is_empty() {
            return Err(GateError::EmptySampleSet);
        }
        for (index, sample) in samples.iter().enumerate() {
            sample.validate(index)?;
        }

        let summary = Summary::compute(&samples)?;
        Ok(Self {
            samples,
            device_id: device_id.into(),
            workload,
            captured_at,
            summary,
        })
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn workload(&self) -> &WorkloadConfig {
        &self.workload
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn summary(&self) -> &Summary {
        &self.summary
    }

    pub fn identity(&self) -> WorkloadIdentity {
        WorkloadIdentity::new(self.device_id.clone(), self.workload.clone())
    }

    pub fn count(&self) -> usize {
        self.summary.count
    }

    pub fn mean(&self) -> f64 {
        self.summary.mean
    }

    pub fn std_dev(&self) -> f64 {
        self.summary.std_dev
    }

    /// Sample variance (n-1 divisor)
    pub fn variance(&self) -> f64 {
        self.summary.std_dev * self.summary.std_dev
    }

    pub fn min(&self) -> f64 {
        self.summary.min
    }

    pub fn max(&self) -> f64 {
        self.summary.max
    }

    pub fn median(&self) -> f64 {
        self.summary.median
    }

    pub fn metric(&self, name: &str) -> Option<&MetricSummary> {
        self.summary.metrics.get(name)
    }

    /// Standard error of the mean
    pub fn standard_error(&self) -> f64 {
        self.summary.std_dev / (self.summary.count as f64).sqrt()
    }

    /// std_dev / mean
    pub fn coefficient_of_variation(&self) -> f64 {
        if self.summary.mean == 0.0 {
            return 0.0;
        }
        self.summary.std_dev / self.summary.mean
    }

    /// Normal-approximation 95% confidence interval for the mean
    pub fn confidence_interval_95(&self) -> (f64, f64) {
        let margin = Z_95 * self.standard_error();
        (self.summary.mean - margin, self.summary.mean + margin)
    }
}

/// Serialized form of a [`MeasurementSet`]
///
/// The summary is written for human readers and external tools. On read it
/// is ignored by [`MeasurementSet::try_from`], which recomputes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeasurementRecord {
    pub device_id: String,
    pub workload: WorkloadConfig,
    pub captured_at: DateTime<Utc>,
    pub samples: Vec<Sample>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<Summary>,
}

impl TryFrom<MeasurementRecord> for MeasurementSet {
    type Error = GateError;

    fn try_from(record: MeasurementRecord) -> Result<Self> {
        MeasurementSet::build_at(
            record.samples,
            record.device_id,
            record.workload,
            record.captured_at,
        )
    }
}

impl From<MeasurementSet> for MeasurementRecord {
    fn from(set: MeasurementSet) -> Self {
        Self {
            device_id: set.device_id,
            workload: set.workload,
            captured_at: set.captured_at,
            samples: set.samples,
            summary: Some(set.summary),
        }
    }
}

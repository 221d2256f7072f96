// Regression verdicts for current-vs-baseline comparisons
//
// Two strategies:
// - Threshold: fixed fractional slowdown on the means; ignores variance.
// - Statistical: one-tailed Welch t-test at a significance level, with an
//   explicit threshold fallback for runs too small to estimate variance and
//   an exact comparison for noise-free (zero-variance) runs.
//
// Every verdict records which decision branch produced it.

use crate::error::{GateError, Result};
use crate::measurement::MeasurementSet;
use crate::regression::config::{validate_threshold, RegressionConfig};
use crate::regression::statistics::{welch_one_tailed, WelchTest};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Final pass/fail tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    /// No meaningful slowdown
    Pass,
    /// Regression detected
    Fail,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Pass => write!(f, "PASS"),
            Verdict::Fail => write!(f, "FAIL"),
        }
    }
}

/// Comparison strategy selected by the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum Strategy {
    /// Fail when the mean slows down by more than `threshold` (a fraction)
    Threshold { threshold: f64 },
    /// One-tailed Welch t-test
    Statistical(RegressionConfig),
}

impl Strategy {
    pub fn threshold(threshold: f64) -> Self {
        Strategy::Threshold { threshold }
    }

    pub fn statistical(significance_level: f64) -> Self {
        Strategy::Statistical(RegressionConfig::default().with_significance_level(significance_level))
    }
}

impl Default for Strategy {
    fn default() -> Self {
        Strategy::Statistical(RegressionConfig::default())
    }
}

/// Decision path that produced a verdict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "branch", rename_all = "snake_case")]
pub enum DecisionBranch {
    /// Threshold strategy, as requested
    Threshold,
    /// Welch t-test ran
    WelchTTest,
    /// A set had fewer than `min_sample_size` samples; threshold used instead
    SmallSampleFallback {
        threshold: f64,
        min_sample_size: usize,
    },
    /// Both sets have zero variance; the difference is exact
    ZeroVariance,
}

impl fmt::Display for DecisionBranch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecisionBranch::Threshold => write!(f, "threshold"),
            DecisionBranch::WelchTTest => write!(f, "welch t-test (one-tailed)"),
            DecisionBranch::SmallSampleFallback {
                threshold,
                min_sample_size,
            } => write!(
                f,
                "small-sample fallback to threshold {:.2}% (fewer than {} samples)",
                threshold * 100.0,
                min_sample_size
            ),
            DecisionBranch::ZeroVariance => write!(f, "exact comparison (zero variance)"),
        }
    }
}

/// Outcome of one comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionVerdict {
    pub verdict: Verdict,
    /// Strategy requested, including its parameter
    pub strategy: Strategy,
    /// Path actually taken
    pub branch: DecisionBranch,
    /// (current.mean - baseline.mean) / baseline.mean
    pub percent_delta: f64,
    /// current.mean - baseline.mean, in milliseconds
    pub absolute_delta_ms: f64,
    /// Test statistics for the Welch and zero-variance branches
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub welch: Option<WelchTest>,
}

impl RegressionVerdict {
    pub fn is_regression(&self) -> bool {
        self.verdict == Verdict::Fail
    }
}

struct Delta {
    absolute: f64,
    percent: f64,
}

fn delta(current: &MeasurementSet, baseline: &MeasurementSet) -> Result<Delta> {
    let base = baseline.mean();
    if !base.is_finite() || base == 0.0 {
        return Err(GateError::InvalidBaseline(format!(
            "baseline mean for {} is {}; percent delta is undefined",
            baseline.identity(),
            base
        )));
    }
    let absolute = current.mean() - base;
    Ok(Delta {
        absolute,
        percent: absolute / base,
    })
}

fn threshold_tag(percent_delta: f64, threshold: f64) -> Verdict {
    if percent_delta > threshold {
        Verdict::Fail
    } else {
        Verdict::Pass
    }
}

/// Threshold strategy
///
/// `Fail` iff `(current.mean - baseline.mean) / baseline.mean > threshold`.
/// A slowdown of exactly `threshold` passes; improvements never fail.
///
/// # Example
/// ```
/// use gpuperf::measurement::{MeasurementSet, Sample, WorkloadConfig};
/// use gpuperf::regression::{compare, Verdict};
///
/// let set = |ms: f64| {
///     MeasurementSet::build(vec![Sample::new(ms)], "gpu0", WorkloadConfig::new("matmul")).unwrap()
/// };
/// let verdict = compare(&set(105.0), &set(100.0), 0.05).unwrap();
/// assert_eq!(verdict.verdict, Verdict::Pass);
/// ```
pub fn compare(
    current: &MeasurementSet,
    baseline: &MeasurementSet,
    threshold: f64,
) -> Result<RegressionVerdict> {
    validate_threshold(threshold)?;
    let delta = delta(current, baseline)?;

    Ok(RegressionVerdict {
        verdict: threshold_tag(delta.percent, threshold),
        strategy: Strategy::Threshold { threshold },
        branch: DecisionBranch::Threshold,
        percent_delta: delta.percent,
        absolute_delta_ms: delta.absolute,
        welch: None,
    })
}

/// Statistical strategy
///
/// `Fail` iff the current mean is larger **and** the one-tailed Welch
/// p-value is below `config.significance_level`. Sets smaller than
/// `config.min_sample_size` are decided by the threshold rule with
/// `config.fallback_threshold`. When both variances are zero the means are
/// compared exactly (p = 0 for a slowdown, 1 otherwise). The returned
/// [`DecisionBranch`] says which path ran.
pub fn compare_statistical(
    current: &MeasurementSet,
    baseline: &MeasurementSet,
    config: &RegressionConfig,
) -> Result<RegressionVerdict> {
    config.validate()?;
    let delta = delta(current, baseline)?;
    let strategy = Strategy::Statistical(config.clone());

    let fallback = |branch: DecisionBranch| RegressionVerdict {
        verdict: threshold_tag(delta.percent, config.fallback_threshold),
        strategy: strategy.clone(),
        branch,
        percent_delta: delta.percent,
        absolute_delta_ms: delta.absolute,
        welch: None,
    };

    if current.count() < config.min_sample_size || baseline.count() < config.min_sample_size {
        tracing::warn!(
            current = current.count(),
            baseline = baseline.count(),
            min_sample_size = config.min_sample_size,
            "too few samples for t-test, falling back to threshold {}",
            config.fallback_threshold
        );
        return Ok(fallback(DecisionBranch::SmallSampleFallback {
            threshold: config.fallback_threshold,
            min_sample_size: config.min_sample_size,
        }));
    }

    let (branch, test) = if current.variance() == 0.0 && baseline.variance() == 0.0 {
        tracing::warn!("both sets have zero variance, comparing means exactly");
        (DecisionBranch::ZeroVariance, WelchTest::exact(current, baseline))
    } else {
        (DecisionBranch::WelchTTest, welch_one_tailed(current, baseline)?)
    };

    let verdict = if delta.absolute > 0.0 && test.p_value < config.significance_level {
        Verdict::Fail
    } else {
        Verdict::Pass
    };

    Ok(RegressionVerdict {
        verdict,
        strategy,
        branch,
        percent_delta: delta.percent,
        absolute_delta_ms: delta.absolute,
        welch: Some(test),
    })
}

/// Dispatch on a [`Strategy`]
pub fn analyze(
    current: &MeasurementSet,
    baseline: &MeasurementSet,
    strategy: &Strategy,
) -> Result<RegressionVerdict> {
    let verdict = match strategy {
        Strategy::Threshold { threshold } => compare(current, baseline, *threshold)?,
        Strategy::Statistical(config) => compare_statistical(current, baseline, config)?,
    };

    tracing::info!(
        verdict = %verdict.verdict,
        branch = %verdict.branch,
        percent_delta = verdict.percent_delta,
        "regression analysis complete"
    );
    Ok(verdict)
}

// Welch's unequal-variance t-test for "current is slower than baseline"
//
// The statistic, the Welch-Satterthwaite degrees of freedom and the
// one-tailed p-value are all computed in f64 from the measurement
// summaries. The p-value is the upper tail of Student's t distribution
// (statrs) at the observed statistic.

use crate::error::{GateError, Result};
use crate::measurement::MeasurementSet;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};

/// Result of a one-tailed Welch test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WelchTest {
    /// t = (mean_current - mean_baseline) / sqrt(var_c/n_c + var_b/n_b)
    ///
    /// Saturates at +/- `f64::MAX` for two noise-free sets with different means.
    pub t_statistic: f64,

    /// Welch-Satterthwaite degrees of freedom
    pub degrees_of_freedom: f64,

    /// One-tailed p-value for the hypothesis "current mean > baseline mean"
    /// - p < alpha: the slowdown is unlikely to be noise
    /// - p >= alpha: consistent with run-to-run variation
    pub p_value: f64,
}

impl WelchTest {
    /// Exact comparison of two zero-variance sets
    ///
    /// With no noise the observed difference is the true difference: p is 0
    /// when the current mean is larger and 1 otherwise.
    pub fn exact(current: &MeasurementSet, baseline: &MeasurementSet) -> Self {
        let diff = current.mean() - baseline.mean();
        let t_statistic = if diff == 0.0 {
            0.0
        } else {
            f64::MAX.copysign(diff)
        };
        Self {
            t_statistic,
            degrees_of_freedom: (current.count() + baseline.count()).saturating_sub(2) as f64,
            p_value: if diff > 0.0 { 0.0 } else { 1.0 },
        }
    }
}

/// Run the one-tailed Welch test of `current` against `baseline`
///
/// Both sets need at least 2 samples and at least one of them must have
/// non-zero variance; callers route the degenerate cases elsewhere.
///
/// # Example
/// ```
/// use gpuperf::measurement::{MeasurementSet, Sample, WorkloadConfig};
/// use gpuperf::regression::welch_one_tailed;
///
/// let set = |d: &[f64]| {
///     let samples = d.iter().map(|v| Sample::new(*v)).collect();
///     MeasurementSet::build(samples, "gpu0", WorkloadConfig::new("matmul")).unwrap()
/// };
/// let baseline = set(&[10.0, 12.0, 11.0, 13.0, 10.0]);
/// let current = set(&[25.0, 27.0, 26.0, 28.0, 25.0]);
///
/// let test = welch_one_tailed(&current, &baseline).unwrap();
/// assert!(test.t_statistic > 0.0);
/// assert!(test.p_value < 0.05);
/// ```
pub fn welch_one_tailed(current: &MeasurementSet, baseline: &MeasurementSet) -> Result<WelchTest> {
    let (n_c, n_b) = (current.count(), baseline.count());
    if n_c < 2 || n_b < 2 {
        return Err(GateError::Statistics(format!(
            "need at least 2 samples per set for t-test (current={}, baseline={})",
            n_c, n_b
        )));
    }

    let se_c = current.variance() / n_c as f64;
    let se_b = baseline.variance() / n_b as f64;
    let se_sum = se_c + se_b;
    if se_sum <= 0.0 {
        return Err(GateError::Statistics(
            "both sets have zero variance".to_string(),
        ));
    }

    let diff = current.mean() - baseline.mean();
    let t_statistic = diff / se_sum.sqrt();
    let degrees_of_freedom = se_sum.powi(2)
        / (se_c.powi(2) / (n_c - 1) as f64 + se_b.powi(2) / (n_b - 1) as f64);

    let p_value = upper_tail(t_statistic, degrees_of_freedom)?;

    tracing::debug!(
        t = t_statistic,
        df = degrees_of_freedom,
        p = p_value,
        "welch one-tailed test"
    );

    Ok(WelchTest {
        t_statistic,
        degrees_of_freedom,
        p_value,
    })
}

/// P(T > t) for Student's t with `df` degrees of freedom
fn upper_tail(t: f64, df: f64) -> Result<f64> {
    let distribution = StudentsT::new(0.0, 1.0, df).map_err(|e| {
        GateError::Statistics(format!("failed to create t-distribution (df={}): {}", df, e))
    })?;

    let p_value = 1.0 - distribution.cdf(t);
    if !p_value.is_finite() {
        return Err(GateError::Statistics(format!(
            "t-test produced a non-finite p-value (t={}, df={})",
            t, df
        )));
    }
    Ok(p_value.clamp(0.0, 1.0))
}

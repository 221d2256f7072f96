// Configuration for regression analysis
//
// The statistical strategy is driven by a significance level rather than a
// fixed percentage. The percentage threshold survives only as the explicit
// fallback for runs too small to estimate variance.

use crate::error::{GateError, Result};
use serde::{Deserialize, Serialize};

/// Configuration for the statistical comparison strategy
///
/// # Example
/// ```
/// use gpuperf::regression::RegressionConfig;
///
/// let config = RegressionConfig::default();
/// assert_eq!(config.significance_level, 0.05); // 95% confidence
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegressionConfig {
    /// Significance level (alpha) for the one-tailed Welch test
    ///
    /// - 0.05 (default): 95% confidence
    /// - 0.01: stricter, fewer false positives
    /// - 0.10: looser, catches smaller slowdowns earlier
    pub significance_level: f64,

    /// Fractional slowdown allowed when a run is too small for the t-test
    ///
    /// Default: 0.05 (5%)
    pub fallback_threshold: f64,

    /// Minimum samples per set before the t-test is used
    ///
    /// Variance is undefined below 2 samples, so values below 2 are rejected.
    /// Sets smaller than this degrade to the threshold strategy using
    /// `fallback_threshold`.
    ///
    /// Default: 2
    pub min_sample_size: usize,
}

impl Default for RegressionConfig {
    fn default() -> Self {
        Self {
            significance_level: 0.05,
            fallback_threshold: 0.05,
            min_sample_size: 2,
        }
    }
}

impl RegressionConfig {
    /// Create a strict configuration (fewer false positives, more false negatives)
    pub fn strict() -> Self {
        Self {
            significance_level: 0.01,
            fallback_threshold: 0.10,
            min_sample_size: 10,
        }
    }

    /// Create a permissive configuration (flags smaller slowdowns)
    pub fn permissive() -> Self {
        Self {
            significance_level: 0.10,
            fallback_threshold: 0.02,
            min_sample_size: 2,
        }
    }

    /// Override the significance level
    pub fn with_significance_level(mut self, alpha: f64) -> Self {
        self.significance_level = alpha;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !(self.significance_level > 0.0 && self.significance_level < 1.0) {
            return Err(GateError::InvalidConfig(format!(
                "significance_level must be in (0, 1), got {}",
                self.significance_level
            )));
        }

        validate_threshold(self.fallback_threshold)?;

        if self.min_sample_size < 2 {
            return Err(GateError::InvalidConfig(format!(
                "min_sample_size must be >= 2 for t-test, got {}",
                self.min_sample_size
            )));
        }

        Ok(())
    }
}

/// A threshold is a finite fraction greater than zero
pub(crate) fn validate_threshold(threshold: f64) -> Result<()> {
    if !threshold.is_finite() || threshold <= 0.0 {
        return Err(GateError::InvalidConfig(format!(
            "threshold must be a finite fraction > 0, got {}",
            threshold
        )));
    }
    Ok(())
}

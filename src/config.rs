//! Tool configuration loaded from TOML
//!
//! # Example
//! ```toml
//! store_dir = ".gpuperf"
//! iterations = 30
//! strategy = "statistical"
//! threshold = 0.05
//!
//! [analysis]
//! significance_level = 0.01
//! fallback_threshold = 0.05
//! min_sample_size = 5
//! ```

use crate::regression::{RegressionConfig, Strategy};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Which comparison strategy a run uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Fixed fractional slowdown of the mean
    Threshold,
    /// One-tailed Welch t-test
    Statistical,
}

/// Settings shared by every subcommand
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Directory holding baselines and history
    pub store_dir: PathBuf,

    /// Expected samples per run; `None` accepts whatever the source provides
    pub iterations: Option<usize>,

    pub strategy: StrategyKind,

    /// Fraction used by the threshold strategy
    pub threshold: f64,

    /// Statistical strategy settings
    pub analysis: RegressionConfig,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            store_dir: PathBuf::from(".gpuperf"),
            iterations: None,
            strategy: StrategyKind::Statistical,
            threshold: 0.05,
            analysis: RegressionConfig::default(),
        }
    }
}

impl GateConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml_str(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Load configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse TOML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.analysis.validate()?;
        crate::regression::validate_threshold(self.threshold)?;
        Ok(())
    }

    /// The strategy this configuration selects
    pub fn strategy(&self) -> Strategy {
        match self.strategy {
            StrategyKind::Threshold => Strategy::Threshold {
                threshold: self.threshold,
            },
            StrategyKind::Statistical => Strategy::Statistical(self.analysis.clone()),
        }
    }
}

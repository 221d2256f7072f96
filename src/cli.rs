//! CLI argument parsing for gpuperf

use crate::config::{GateConfig, StrategyKind};
use crate::measurement::WorkloadConfig;
use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Output format for reports and listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format (default)
    Text,
    /// JSON format for machine parsing
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "gpuperf")]
#[command(version)]
#[command(
    about = "Statistical regression gate for repeatable GPU workload measurements",
    long_about = None
)]
pub struct Cli {
    /// TOML configuration file
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Baseline store directory (overrides the config file)
    #[arg(long, global = true, value_name = "DIR")]
    pub store: Option<PathBuf>,

    /// Enable debug tracing on stderr
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Capture a run and store it as the baseline (replaces any existing one)
    Record(RunArgs),

    /// Capture a run and compare it against the stored baseline
    ///
    /// Exit status: 0 = pass, 1 = regression detected, 2 = error
    Check {
        #[command(flatten)]
        run: RunArgs,

        /// Comparison strategy
        #[arg(long, value_enum)]
        strategy: Option<StrategyKind>,

        /// Allowed fractional slowdown for the threshold strategy (e.g. 0.05)
        #[arg(long, value_name = "FRACTION")]
        threshold: Option<f64>,

        /// Significance level for the statistical strategy (e.g. 0.05)
        #[arg(long, value_name = "ALPHA")]
        significance: Option<f64>,

        /// Output format
        #[arg(long = "format", value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// List stored baselines
    List {
        #[arg(long = "format", value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show recorded test results, oldest first
    History {
        /// Show only the most recent N entries
        #[arg(long, value_name = "N")]
        limit: Option<usize>,

        #[arg(long = "format", value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

/// Workload identity and sample input shared by `record` and `check`
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Device identifier (e.g. "Apple M2 Max")
    #[arg(long, value_name = "ID")]
    pub device: String,

    /// Workload kind (e.g. "matmul")
    #[arg(long, value_name = "KIND")]
    pub kind: String,

    /// Workload dimensions, e.g. 1024x1024
    #[arg(long, value_name = "DIMS", value_delimiter = 'x')]
    pub dims: Vec<u64>,

    /// Extra workload parameter (repeatable)
    #[arg(long = "param", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub params: Vec<(String, String)>,

    /// Samples file written by the workload runner (JSON array or JSON Lines)
    #[arg(long, value_name = "FILE")]
    pub samples: PathBuf,

    /// Required number of samples; the run fails if the file has a different count
    #[arg(long, value_name = "N")]
    pub iterations: Option<usize>,
}

impl RunArgs {
    pub fn workload(&self) -> WorkloadConfig {
        self.params.iter().fold(
            WorkloadConfig::new(&self.kind).with_dimensions(self.dims.clone()),
            |config, (key, value)| config.with_parameter(key, value),
        )
    }
}

fn parse_key_value(input: &str) -> Result<(String, String), String> {
    match input.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", input)),
    }
}

impl Cli {
    /// Resolve configuration: file (if any), then command-line overrides
    pub fn resolve_config(&self) -> Result<GateConfig> {
        let mut config = match &self.config {
            Some(path) => GateConfig::from_file(path)?,
            None => GateConfig::default(),
        };

        if let Some(store) = &self.store {
            config.store_dir = store.clone();
        }

        if let Command::Check {
            run,
            strategy,
            threshold,
            significance,
            ..
        } = &self.command
        {
            if let Some(strategy) = strategy {
                config.strategy = *strategy;
            }
            if let Some(threshold) = threshold {
                config.threshold = *threshold;
            }
            if let Some(alpha) = significance {
                config.analysis.significance_level = *alpha;
            }
            if run.iterations.is_some() {
                config.iterations = run.iterations;
            }
        }
        if let Command::Record(run) = &self.command {
            if run.iterations.is_some() {
                config.iterations = run.iterations;
            }
        }

        config.validate()?;
        Ok(config)
    }
}

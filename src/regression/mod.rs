// Regression analysis: current run vs stored baseline
//
// Two interchangeable strategies, both pure functions of two measurement
// sets:
// - Threshold: fixed fractional slowdown of the mean
// - Statistical: one-tailed Welch t-test at a configurable significance
//   level, degrading to the threshold rule (and saying so) when a run is
//   too small or noise-free
//
// Implementation:
// - t statistic and Welch-Satterthwaite df are computed from the summaries
// - p-value is the upper tail of Student's t (statrs) at that df

mod config;
mod statistics;
mod verdict;

pub use config::RegressionConfig;
pub(crate) use config::validate_threshold;
pub use statistics::{welch_one_tailed, WelchTest};
pub use verdict::{
    analyze, compare, compare_statistical, DecisionBranch, RegressionVerdict, Strategy, Verdict,
};

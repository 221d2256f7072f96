//! Human-readable and JSON renderings of a comparison
//!
//! Pure functions: callers decide where the text goes.

use crate::measurement::MeasurementSet;
use crate::regression::{DecisionBranch, RegressionVerdict, Strategy, Verdict};
use crate::store::TestResult;
use serde::Serialize;
use std::fmt::Write;

/// Render a comparison as a UTF-8 text block
///
/// Includes both device ids, sample counts, means with standard deviation,
/// the absolute and percent delta, the strategy with its parameter, the
/// decision branch, Welch statistics when computed, and the PASS/FAIL tag.
pub fn format_report(
    current: &MeasurementSet,
    baseline: &MeasurementSet,
    verdict: &RegressionVerdict,
) -> String {
    let mut report = String::new();

    // Verdict header
    match verdict.verdict {
        Verdict::Pass => report.push_str("✅ PASS: no regression detected\n\n"),
        Verdict::Fail => report.push_str("❌ FAIL: performance regression detected\n\n"),
    }

    let _ = writeln!(report, "Workload: {}", current.workload());
    let _ = writeln!(report);
    let _ = writeln!(
        report,
        "{:<10} {:<24} {:>8} {:>14} {:>12}",
        "Run", "Device", "Samples", "Mean (ms)", "StdDev (ms)"
    );
    for (label, set) in [("baseline", baseline), ("current", current)] {
        let _ = writeln!(
            report,
            "{:<10} {:<24} {:>8} {:>14.4} {:>12.4}",
            label,
            set.device_id(),
            set.count(),
            set.mean(),
            set.std_dev()
        );
    }
    let _ = writeln!(report);

    let _ = writeln!(
        report,
        "Delta: {:+.4} ms ({:+.2}%)",
        verdict.absolute_delta_ms,
        verdict.percent_delta * 100.0
    );

    match &verdict.strategy {
        Strategy::Threshold { threshold } => {
            let _ = writeln!(
                report,
                "Strategy: threshold (max slowdown {:.2}%)",
                threshold * 100.0
            );
        }
        Strategy::Statistical(config) => {
            let _ = writeln!(
                report,
                "Strategy: statistical (significance level {} / {:.0}% confidence)",
                config.significance_level,
                (1.0 - config.significance_level) * 100.0
            );
        }
    }
    let _ = writeln!(report, "Decision: {}", verdict.branch);

    match (&verdict.welch, &verdict.branch) {
        // t is saturated here; only p carries information
        (Some(welch), DecisionBranch::ZeroVariance) => {
            let _ = writeln!(report, "Exact comparison: p(one-tailed)={:.1}", welch.p_value);
        }
        (Some(welch), _) => {
            let _ = writeln!(
                report,
                "Welch t-test: t={:.4}, df={:.2}, p(one-tailed)={:.6}",
                welch.t_statistic, welch.degrees_of_freedom, welch.p_value
            );
        }
        (None, _) => {}
    }

    if current.device_id() != baseline.device_id() {
        let _ = writeln!(
            report,
            "\n⚠️  Device mismatch: baseline captured on '{}', current on '{}'",
            baseline.device_id(),
            current.device_id()
        );
    }

    let _ = writeln!(report, "\nResult: {}", verdict.verdict);
    report
}

#[derive(Serialize)]
struct JsonReport<'a> {
    format: &'static str,
    version: &'static str,
    #[serde(flatten)]
    result: &'a TestResult,
}

/// Render a test result as pretty-printed JSON
pub fn format_json(result: &TestResult) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&JsonReport {
        format: "gpuperf-json-v1",
        version: env!("CARGO_PKG_VERSION"),
        result,
    })
}

use anyhow::{Context, Result};
use clap::Parser;
use gpuperf::{
    cli::{Cli, Command, OutputFormat, RunArgs},
    config::GateConfig,
    orchestrator::{FileSampleSource, Orchestrator, Outcome},
    report::format_json,
    store::BaselineStore,
};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber for debug output
fn init_tracing(debug: bool) {
    if debug {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into()),
            )
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Build the orchestrator and sample source for a run
///
/// Without an explicit iteration count the run accepts however many samples
/// the file holds.
fn prepare(config: &GateConfig, run: &RunArgs) -> Result<(Orchestrator, FileSampleSource)> {
    let source = FileSampleSource::new(&run.samples);
    let iterations = match config.iterations {
        Some(n) => n,
        None => source.read_all()?.len(),
    };
    let orchestrator = Orchestrator::new(BaselineStore::new(&config.store_dir), iterations);
    Ok((orchestrator, source))
}

fn record(config: &GateConfig, run: &RunArgs) -> Result<Outcome> {
    let (orchestrator, mut source) = prepare(config, run)?;
    let set = orchestrator.record_baseline(&mut source, &run.device, &run.workload())?;
    let (low, high) = set.confidence_interval_95();

    println!(
        "Recorded baseline for {}: {} samples, mean {:.4} ms ± {:.4} ms (95% CI {:.4}..{:.4})",
        set.identity(),
        set.count(),
        set.mean(),
        set.std_dev(),
        low,
        high
    );
    println!(
        "Stored at {}",
        orchestrator.store().baseline_path(&set.identity()).display()
    );
    Ok(Outcome::Pass)
}

fn check(config: &GateConfig, run: &RunArgs, format: OutputFormat) -> Result<Outcome> {
    let (orchestrator, mut source) = prepare(config, run)?;
    let result = orchestrator.check(
        &mut source,
        &run.device,
        &run.workload(),
        &config.strategy(),
    )?;

    match format {
        OutputFormat::Text => print!("{}", result.report),
        OutputFormat::Json => println!(
            "{}",
            format_json(&result.test_result).context("Failed to render JSON report")?
        ),
    }
    if !result.history_recorded {
        eprintln!("warning: test result was not written to the history log");
    }
    Ok(result.outcome())
}

fn list(config: &GateConfig, format: OutputFormat) -> Result<Outcome> {
    let summaries = BaselineStore::new(&config.store_dir).list()?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summaries)?),
        OutputFormat::Text => {
            if summaries.is_empty() {
                println!("No baselines in {}", config.store_dir.display());
            }
            for s in &summaries {
                println!(
                    "{}  {} on {}  n={} mean={:.4}ms sd={:.4}ms captured {}",
                    s.key,
                    s.workload,
                    s.device_id,
                    s.count,
                    s.mean_ms,
                    s.std_dev_ms,
                    s.captured_at.to_rfc3339()
                );
            }
        }
    }
    Ok(Outcome::Pass)
}

fn history(config: &GateConfig, limit: Option<usize>, format: OutputFormat) -> Result<Outcome> {
    let mut results = BaselineStore::new(&config.store_dir).history()?;
    if let Some(limit) = limit {
        let skip = results.len().saturating_sub(limit);
        results.drain(..skip);
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&results)?),
        OutputFormat::Text => {
            for r in &results {
                println!(
                    "{}  {}  {}  {:+.2}%  ({})",
                    r.recorded_at.to_rfc3339(),
                    r.identity_key,
                    r.verdict.verdict,
                    r.verdict.percent_delta * 100.0,
                    r.verdict.branch
                );
            }
        }
    }
    Ok(Outcome::Pass)
}

fn run(cli: &Cli) -> Result<Outcome> {
    let config = cli.resolve_config()?;
    match &cli.command {
        Command::Record(run) => record(&config, run),
        Command::Check { run, format, .. } => check(&config, run, *format),
        Command::List { format } => list(&config, *format),
        Command::History { limit, format } => history(&config, *limit, *format),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let outcome = match run(&cli) {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            Outcome::from_error(&e)
        }
    };
    ExitCode::from(outcome.exit_code())
}

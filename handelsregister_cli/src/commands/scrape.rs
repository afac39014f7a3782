//! The `scrape` subcommand: resolve every input row against the register
//! portal and write entity, balance and shareholder list files.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::Args;
use handelsregister_lib::{validation, RequestLimits, SearchOrchestrator};
use indicatif::{ProgressBar, ProgressStyle};

use super::{build_client, load_courts, open_session};
use crate::input::InputReader;
use crate::output::ResultWriters;

/// Arguments for the `scrape` subcommand.
#[derive(Args)]
pub struct ScrapeArgs {
    /// Input CSV file (name, -, registry number, registry type, -, court)
    pub file: PathBuf,

    /// Rows to process as LOWER,UPPER (1-based, inclusive; either side may be empty)
    #[arg(long)]
    pub rows: Option<String>,

    /// Seconds to wait between requests (0 disables)
    #[arg(long, default_value = "10")]
    pub delay: u64,

    /// Maximum requests per interval (0 disables)
    #[arg(long, default_value = "60")]
    pub request_limit: u32,

    /// Length of the request limit interval in seconds
    #[arg(long, default_value = "3600")]
    pub limit_interval: u64,

    /// Search policy to start with: strict, name, keywords
    #[arg(long, default_value = "strict")]
    pub search_policy: String,

    /// Delimiter of the input file (use \t for tab)
    #[arg(long, default_value = ",")]
    pub source_delimiter: String,

    /// Delimiter of the result files (use \t for tab)
    #[arg(long, default_value = ",")]
    pub target_delimiter: String,

    /// Existing directory for result and log files
    #[arg(long, default_value = ".")]
    pub target: PathBuf,
}

pub async fn run(args: &ScrapeArgs, base_url: Option<&str>) -> Result<()> {
    let rows = args
        .rows
        .as_deref()
        .map(validation::validate_rows)
        .transpose()?
        .unwrap_or_default();
    let policy = validation::validate_search_policy(&args.search_policy)?;
    let source_delimiter = validation::validate_delimiter(&args.source_delimiter)?;
    let target_delimiter = validation::validate_delimiter(&args.target_delimiter)?;
    if !args.file.is_file() {
        bail!("Input file not found: {}", args.file.display());
    }
    let limits = RequestLimits::new(
        Duration::from_secs(args.delay),
        args.request_limit,
        Duration::from_secs(args.limit_interval),
    )?;

    tracing::info!(
        "Reading {} starting with the {} search policy",
        args.file.display(),
        policy
    );
    if let Some((limit, interval)) = limits.window() {
        tracing::info!("Limiting to {} requests per {}s", limit, interval.as_secs());
    }
    if let Some(delay) = limits.delay() {
        tracing::info!("Waiting {}s between requests", delay.as_secs());
    }

    let client = build_client(base_url)?;
    let session = open_session(&client, limits).await?;
    let courts = load_courts(&client, &session).await?;

    let mut writers = ResultWriters::create(&args.target, target_delimiter)?;
    let reader = InputReader::open(&args.file, source_delimiter)?;
    let orchestrator = SearchOrchestrator::new(&client, &session, &courts).with_start_policy(policy);

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::with_template(
        "{spinner} [{elapsed_precise}] {pos} processed {msg}",
    )?);
    pb.enable_steady_tick(Duration::from_millis(200));

    let mut attempted = 0usize;
    let mut successful = 0usize;
    for (row, record) in reader {
        if rows.is_after(row) {
            break;
        }
        if !rows.contains(row) {
            continue;
        }
        let Some(record) = record else {
            continue;
        };

        attempted += 1;
        pb.set_message(format!("row {}: {}", row, record.name));
        let outcome = orchestrator.resolve(row, &record).await;
        if let Some(resolved) = outcome.resolved() {
            writers.write(resolved)?;
            successful += 1;
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    let rate = if attempted == 0 {
        0.0
    } else {
        successful as f64 / attempted as f64 * 100.0
    };
    tracing::info!(
        "{} out of {} search requests were successful ({:.2} %)",
        successful,
        attempted,
        rate
    );

    Ok(())
}

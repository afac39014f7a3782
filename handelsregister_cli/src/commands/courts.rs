//! The `courts` subcommand: list the registry courts offered by the search form.

use anyhow::Result;
use clap::Args;
use handelsregister_lib::RequestLimits;

use super::{build_client, load_courts, open_session};
use crate::output::{self, OutputFormat};

/// Arguments for the `courts` subcommand.
#[derive(Args)]
pub struct CourtsArgs {
    /// Output format: table, json, csv, markdown
    #[arg(long, default_value = "table")]
    pub output: String,
}

pub async fn run(args: &CourtsArgs, base_url: Option<&str>) -> Result<()> {
    let format: OutputFormat = args.output.parse()?;
    let client = build_client(base_url)?;
    let session = open_session(&client, RequestLimits::unlimited()).await?;
    let courts = load_courts(&client, &session).await?;

    match format {
        OutputFormat::Table => output::print_courts_table(&courts),
        OutputFormat::Json => output::print_json(&courts.iter().collect::<Vec<_>>()),
        OutputFormat::Csv => output::print_courts_csv(&courts)?,
        OutputFormat::Markdown => output::print_courts_markdown(&courts),
    }

    Ok(())
}

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;

use anyhow::{bail, Result};
use chrono::NaiveDate;
use handelsregister_lib::types::RegistryType;
use handelsregister_lib::{CourtDirectory, ResolvedRecord};
use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

pub const ENTITY_FILE: &str = "entity-information.csv";
pub const BALANCE_FILE: &str = "balance-dates.csv";
pub const SHAREHOLDER_FILE: &str = "shareholder-lists.csv";

const ENTITY_HEADER: [&str; 14] = [
    "name",
    "registry_type",
    "registry_id",
    "registry_court",
    "structure",
    "capital",
    "capital_currency",
    "entry",
    "deletion",
    "balance_missing",
    "address",
    "post_code",
    "city",
    "search_policy",
];
const BALANCE_HEADER: [&str; 5] = ["name", "registry_type", "registry_id", "registry_court", "balance"];
const SHAREHOLDER_HEADER: [&str; 7] = [
    "name",
    "registry_type",
    "registry_id",
    "registry_court",
    "structure",
    "list_index",
    "list_date",
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
    Markdown,
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            other => bail!(
                "unknown output format '{}'. Valid values: table, json, csv, markdown",
                other
            ),
        }
    }
}

#[derive(Tabled, Serialize)]
struct CourtRow {
    #[tabled(rename = "Code")]
    #[serde(rename = "Code")]
    identifier: String,
    #[tabled(rename = "Court")]
    #[serde(rename = "Court")]
    name: String,
}

fn build_court_rows(courts: &CourtDirectory) -> Vec<CourtRow> {
    courts
        .iter()
        .map(|c| CourtRow {
            identifier: c.identifier.clone(),
            name: c.name.clone(),
        })
        .collect()
}

pub fn print_courts_table(courts: &CourtDirectory) {
    println!("{}", Table::new(build_court_rows(courts)));
}

pub fn print_courts_markdown(courts: &CourtDirectory) {
    let mut table = Table::new(build_court_rows(courts));
    table.with(Style::markdown());
    println!("{}", table);
}

pub fn print_courts_csv(courts: &CourtDirectory) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(std::io::stdout());
    for row in build_court_rows(courts) {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn print_json<T: serde::Serialize>(data: &T) {
    match serde_json::to_string_pretty(data) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to serialize to JSON: {}", e),
    }
}

// -- Result files --

#[derive(Serialize)]
struct EntityRow<'a> {
    name: Option<&'a str>,
    registry_type: Option<RegistryType>,
    registry_id: Option<&'a str>,
    registry_court: Option<&'a str>,
    structure: Option<&'a str>,
    capital: Option<f64>,
    capital_currency: Option<&'a str>,
    entry: Option<NaiveDate>,
    deletion: Option<NaiveDate>,
    balance_missing: bool,
    address: Option<&'a str>,
    post_code: Option<&'a str>,
    city: Option<&'a str>,
    search_policy: &'static str,
}

#[derive(Serialize)]
struct BalanceRow<'a> {
    name: Option<&'a str>,
    registry_type: Option<RegistryType>,
    registry_id: Option<&'a str>,
    registry_court: Option<&'a str>,
    balance: NaiveDate,
}

#[derive(Serialize)]
struct ShareholderRow<'a> {
    name: Option<&'a str>,
    registry_type: Option<RegistryType>,
    registry_id: Option<&'a str>,
    registry_court: Option<&'a str>,
    structure: Option<&'a str>,
    list_index: usize,
    list_date: Option<NaiveDate>,
}

/// The three result files of a scrape run. Headers are written on creation
/// and every record is flushed as soon as it is written, so an interrupted
/// run keeps everything resolved so far.
pub struct ResultWriters<W: Write> {
    entities: csv::Writer<W>,
    balances: csv::Writer<W>,
    shareholders: csv::Writer<W>,
}

impl ResultWriters<File> {
    /// Create (or truncate) the result files inside `dir`.
    pub fn create(dir: &Path, delimiter: u8) -> Result<Self> {
        Self::new(
            File::create(dir.join(ENTITY_FILE))?,
            File::create(dir.join(BALANCE_FILE))?,
            File::create(dir.join(SHAREHOLDER_FILE))?,
            delimiter,
        )
    }
}

impl<W: Write> ResultWriters<W> {
    pub fn new(entities: W, balances: W, shareholders: W, delimiter: u8) -> Result<Self> {
        let open = |inner: W, header: &[&str]| -> Result<csv::Writer<W>> {
            let mut wtr = csv::WriterBuilder::new()
                .delimiter(delimiter)
                .has_headers(false)
                .from_writer(inner);
            wtr.write_record(header)?;
            wtr.flush()?;
            Ok(wtr)
        };
        Ok(Self {
            entities: open(entities, &ENTITY_HEADER)?,
            balances: open(balances, &BALANCE_HEADER)?,
            shareholders: open(shareholders, &SHAREHOLDER_HEADER)?,
        })
    }

    /// Append one resolved record to all three files.
    pub fn write(&mut self, resolved: &ResolvedRecord) -> Result<()> {
        let entity = &resolved.entity;
        let name = entity.name.as_deref();
        let registry_id = entity.registry_id.as_deref();
        let registry_court = entity.registry_court.as_deref();
        let structure = entity.legal_structure.as_deref();

        self.entities.serialize(EntityRow {
            name,
            registry_type: entity.registry_type,
            registry_id,
            registry_court,
            structure,
            capital: entity.capital,
            capital_currency: entity.capital_currency.as_deref(),
            entry: entity.entry_date,
            deletion: entity.deletion_date,
            balance_missing: entity.balance_dates.as_ref().is_some_and(Vec::is_empty),
            address: entity.street.as_deref(),
            post_code: entity.postal_code.as_deref(),
            city: entity.city.as_deref(),
            search_policy: resolved.policy.as_str(),
        })?;
        self.entities.flush()?;

        for balance in entity.balance_dates.iter().flatten() {
            self.balances.serialize(BalanceRow {
                name,
                registry_type: entity.registry_type,
                registry_id,
                registry_court,
                balance: *balance,
            })?;
        }
        self.balances.flush()?;

        if let Some(lists) = resolved.shareholder_lists() {
            for (index, date) in lists.dates.iter().enumerate() {
                self.shareholders.serialize(ShareholderRow {
                    name,
                    registry_type: entity.registry_type,
                    registry_id,
                    registry_court,
                    structure,
                    list_index: index,
                    list_date: *date,
                })?;
            }
        }
        self.shareholders.flush()?;

        Ok(())
    }
}

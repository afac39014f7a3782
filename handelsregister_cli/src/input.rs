//! Reader for the input CSV file.
//!
//! Each row carries the entity name in the first column, the registry
//! number in the third, the registry type in the fourth and the court
//! name in the sixth. The other columns are ignored.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::Result;
use handelsregister_lib::validation;
use handelsregister_lib::SearchInputRecord;

/// Rows with fewer columns than this are skipped.
pub const MIN_COLUMNS: usize = 6;

const NAME_COLUMN: usize = 0;
const ID_COLUMN: usize = 2;
const TYPE_COLUMN: usize = 3;
const COURT_COLUMN: usize = 5;

/// Iterates the data rows of an input file as `(row, record)` pairs.
///
/// Rows are numbered from 1, starting after the header. Rows that cannot
/// be turned into a search record yield `None` so callers can still honor
/// row ranges.
pub struct InputReader<R: Read> {
    records: csv::StringRecordsIntoIter<R>,
    row: usize,
}

impl InputReader<File> {
    pub fn open(path: &Path, delimiter: u8) -> Result<Self> {
        let reader = builder(delimiter).from_path(path)?;
        Ok(Self {
            records: reader.into_records(),
            row: 0,
        })
    }
}

impl<R: Read> InputReader<R> {
    pub fn from_reader(reader: R, delimiter: u8) -> Self {
        Self {
            records: builder(delimiter).from_reader(reader).into_records(),
            row: 0,
        }
    }
}

impl<R: Read> Iterator for InputReader<R> {
    type Item = (usize, Option<SearchInputRecord>);

    fn next(&mut self) -> Option<Self::Item> {
        let result = self.records.next()?;
        self.row += 1;
        let record = match result {
            Ok(raw) => parse_row(self.row, &raw),
            Err(e) => {
                tracing::warn!("Skipping unreadable row {}: {}", self.row, e);
                None
            }
        };
        Some((self.row, record))
    }
}

fn builder(delimiter: u8) -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    builder.delimiter(delimiter).has_headers(true).flexible(true);
    builder
}

fn column<'r>(raw: &'r csv::StringRecord, index: usize) -> Option<&'r str> {
    raw.get(index).map(str::trim).filter(|value| !value.is_empty())
}

fn parse_row(row: usize, raw: &csv::StringRecord) -> Option<SearchInputRecord> {
    if raw.len() < MIN_COLUMNS {
        tracing::warn!(
            "Skipping row {}: expected at least {} columns, found {}",
            row,
            MIN_COLUMNS,
            raw.len()
        );
        return None;
    }

    let name = match validation::validate_entity_name(raw.get(NAME_COLUMN).unwrap_or_default()) {
        Ok(name) => name,
        Err(e) => {
            tracing::warn!("Skipping row {}: {}", row, e);
            return None;
        }
    };

    let registry_id = column(raw, ID_COLUMN).and_then(|id| match validation::validate_registry_id(id) {
        Ok(id) => Some(id),
        Err(e) => {
            tracing::warn!("Omitting registry number of row {}: {}", row, e);
            None
        }
    });

    let registry_type =
        column(raw, TYPE_COLUMN).and_then(|code| match validation::validate_registry_type(code) {
            Ok(registry_type) => Some(registry_type),
            Err(e) => {
                tracing::error!("Omitting invalid registry type in row {}: {}", row, e);
                None
            }
        });

    Some(
        SearchInputRecord::new(&name)
            .with_registry_type(registry_type)
            .with_registry_id(registry_id.as_deref())
            .with_registry_court(column(raw, COURT_COLUMN)),
    )
}

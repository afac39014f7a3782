//! Checks for user-provided options and input file fields.

use std::sync::OnceLock;

use handelsregister_api::types::RegistryType;
use regex::Regex;

use crate::error::RegistryError;
use crate::orchestrator::SearchPolicy;

pub const MAX_NAME_LENGTH: usize = 250;

/// Strip ASCII control characters (0x00-0x1F except space 0x20), trim whitespace,
/// and enforce a byte-length limit.
pub fn sanitize_text(input: &str, max_len: usize) -> Result<String, RegistryError> {
    if input.len() > max_len {
        return Err(RegistryError::InvalidInput(format!(
            "input exceeds maximum length of {} bytes",
            max_len
        )));
    }
    let cleaned: String = input
        .chars()
        .filter(|c| !c.is_ascii_control() || *c == ' ')
        .collect();
    Ok(cleaned.trim().to_string())
}

/// Validate an entity name from the input file: must not be empty after cleaning.
pub fn validate_entity_name(input: &str) -> Result<String, RegistryError> {
    let name = sanitize_text(input, MAX_NAME_LENGTH)?;
    if name.is_empty() {
        return Err(RegistryError::InvalidInput("entity name is empty".to_string()));
    }
    Ok(name)
}

/// Validate a registry type code (HRA, HRB, GnR, PR, VR), case-sensitive as on the portal.
pub fn validate_registry_type(input: &str) -> Result<RegistryType, RegistryError> {
    input.parse().map_err(|_| {
        RegistryError::InvalidInput(format!(
            "unknown registry type '{}'. Valid values: HRA, HRB, GnR, PR, VR",
            input.trim()
        ))
    })
}

fn registry_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\D*(\d+ ?\w{0,2})\s*$").expect("registry id pattern is valid"))
}

/// Normalize a registry number such as `HRB 12345 B` to `12345 B`.
///
/// Any non-digit prefix is dropped; a suffix of up to two word characters
/// after the digits is kept.
pub fn validate_registry_id(input: &str) -> Result<String, RegistryError> {
    registry_id_pattern()
        .captures(input)
        .map(|caps| caps[1].trim_end().to_string())
        .ok_or_else(|| {
            RegistryError::InvalidInput(format!("unrecognized registry number '{}'", input.trim()))
        })
}

/// Validate a search policy name: strict, name or keywords (case-insensitive).
pub fn validate_search_policy(input: &str) -> Result<SearchPolicy, RegistryError> {
    input.parse().map_err(|_| {
        RegistryError::InvalidInput(format!(
            "unknown search policy '{}'. Valid values: strict, name, keywords",
            input
        ))
    })
}

/// Validate a CSV delimiter: exactly one ASCII character.
pub fn validate_delimiter(input: &str) -> Result<u8, RegistryError> {
    match input.as_bytes() {
        [byte] if byte.is_ascii() => Ok(*byte),
        _ if input == "\\t" => Ok(b'\t'),
        _ => Err(RegistryError::InvalidInput(format!(
            "delimiter must be a single ASCII character, got '{}'",
            input
        ))),
    }
}

/// Inclusive, 1-based range of input rows to process. Unset bounds are open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowRange {
    pub lower: Option<usize>,
    pub upper: Option<usize>,
}

impl RowRange {
    /// Whether the 1-based `row` lies inside the range.
    pub fn contains(&self, row: usize) -> bool {
        self.lower.map_or(true, |lower| row >= lower) && self.upper.map_or(true, |upper| row <= upper)
    }

    /// Whether `row` and every row after it lie beyond the range.
    pub fn is_after(&self, row: usize) -> bool {
        self.upper.is_some_and(|upper| row > upper)
    }
}

/// Validate a row range of the form `LOWER,UPPER`; either side may be empty.
pub fn validate_rows(input: &str) -> Result<RowRange, RegistryError> {
    let invalid = || {
        RegistryError::InvalidInput(format!(
            "invalid row range '{}'. Expected LOWER,UPPER with 1-based row numbers (e.g., 1,100 or 50,)",
            input
        ))
    };
    let (lower, upper) = input.split_once(',').ok_or_else(invalid)?;
    let bound = |raw: &str| -> Result<Option<usize>, RegistryError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        match raw.parse::<usize>() {
            Ok(0) | Err(_) => Err(invalid()),
            Ok(n) => Ok(Some(n)),
        }
    };
    let range = RowRange {
        lower: bound(lower)?,
        upper: bound(upper)?,
    };
    if let (Some(lower), Some(upper)) = (range.lower, range.upper) {
        if upper < lower {
            return Err(RegistryError::InvalidInput(format!(
                "row range upper bound {} is below lower bound {}",
                upper, lower
            )));
        }
    }
    Ok(range)
}

//! Error types for the library layer.

use std::fmt;

/// Errors that abort a run, wrapping upstream API errors and adding
/// failures of the court directory and user input.
///
/// Per-record problems never surface here; the orchestrator logs them and
/// moves on to the next record.
#[derive(Debug)]
pub enum RegistryError {
    /// An error from the underlying portal client.
    Api(handelsregister_api::Error),
    /// The search form did not list any registry court.
    EmptyCourtDirectory,
    /// A page was fetched but did not have the expected structure, or
    /// carried the portal's error banner.
    MalformedPage(&'static str),
    /// User-provided input failed validation.
    InvalidInput(String),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Api(e) => write!(f, "Portal error: {}", e),
            Self::EmptyCourtDirectory => write!(f, "No registry courts found on the search form"),
            Self::MalformedPage(page) => write!(f, "Unexpected {} page layout", page),
            Self::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
        }
    }
}

impl std::error::Error for RegistryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Api(e) => Some(e),
            _ => None,
        }
    }
}

impl From<handelsregister_api::Error> for RegistryError {
    fn from(e: handelsregister_api::Error) -> Self {
        Self::Api(e)
    }
}

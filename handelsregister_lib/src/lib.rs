//! Library layer for the common register scraper: page extractors, court
//! resolution, and the search orchestrator.
//!
//! Pages are fetched through `handelsregister_api` and parsed by streaming
//! extractors that yield `None` instead of failing when a page is not what
//! they expect.

pub mod court;
pub mod documents;
pub mod entity;
pub mod error;
pub mod markup;
pub mod orchestrator;
pub mod record;
pub mod resolver;
pub mod search;
pub mod validation;

pub use handelsregister_api;
pub use handelsregister_api::types;
pub use handelsregister_api::{Client, RateLimitedSession, RequestLimits, SearchParameters};

pub use court::{fetch_court_directory, CourtDirectory, CourtDirectoryExtractor, RegistryCourt};
pub use documents::{DocumentTree, DocumentTreeExtractor, NodeId, ShareholderFilingDates};
pub use entity::{EntityDetailExtractor, EntityRecord};
pub use error::RegistryError;
pub use markup::Extractor;
pub use orchestrator::{
    next_step, search_parameters, PolicyStep, RecordOutcome, ResolvedRecord, SearchOrchestrator,
    SearchPolicy,
};
pub use record::SearchInputRecord;
pub use resolver::{CourtMatch, CourtNameResolver};
pub use search::{SearchResultEntry, SearchResultExtractor};

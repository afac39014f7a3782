//! Per-record search pipeline: court resolution, policy escalation, and the
//! follow-up fetches for a unique hit.

use std::fmt;
use std::str::FromStr;

use handelsregister_api::types::RecordContent;
use handelsregister_api::{Client, KeywordMatchMode, RateLimitedSession, SearchParameters};
use serde::Serialize;
use tracing::{Instrument, Span};

use crate::court::CourtDirectory;
use crate::documents::{fetch_documents, DocumentTree, ShareholderFilingDates};
use crate::entity::{fetch_entity, EntityRecord};
use crate::record::SearchInputRecord;
use crate::resolver::{CourtMatch, CourtNameResolver};
use crate::search::{search, SearchResultEntry};

/// How strictly a search matches the input record. Later variants are looser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchPolicy {
    /// Exact name plus registry type, number and court.
    #[default]
    Strict,
    /// Exact name only.
    Name,
    /// Any of the name's words.
    Keywords,
}

impl SearchPolicy {
    pub const ALL: [SearchPolicy; 3] = [SearchPolicy::Strict, SearchPolicy::Name, SearchPolicy::Keywords];

    /// The next looser policy, if any.
    pub fn next(self) -> Option<SearchPolicy> {
        match self {
            SearchPolicy::Strict => Some(SearchPolicy::Name),
            SearchPolicy::Name => Some(SearchPolicy::Keywords),
            SearchPolicy::Keywords => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SearchPolicy::Strict => "strict",
            SearchPolicy::Name => "name",
            SearchPolicy::Keywords => "keywords",
        }
    }
}

impl fmt::Display for SearchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchPolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Ok(SearchPolicy::Strict),
            "name" => Ok(SearchPolicy::Name),
            "keywords" => Ok(SearchPolicy::Keywords),
            _ => Err(()),
        }
    }
}

/// Search parameters for `record` under `policy`.
///
/// `court` is the resolved court identifier; it is only used by the strict policy.
pub fn search_parameters(
    record: &SearchInputRecord,
    court: Option<&str>,
    policy: SearchPolicy,
) -> SearchParameters {
    let strict = SearchParameters::new(&record.name)
        .with_registry_type(record.registry_type)
        .with_registry_id(record.registry_id.as_deref())
        .with_registry_court(court)
        .with_keyword_match(KeywordMatchMode::ExactName)
        .with_deleted(true);
    match policy {
        SearchPolicy::Strict => strict,
        SearchPolicy::Name => strict.without_registry(),
        SearchPolicy::Keywords => strict
            .without_registry()
            .with_keyword_match(KeywordMatchMode::AtLeastOne),
    }
}

/// What to do after a search under some policy returned `count` results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyStep {
    /// Exactly one result.
    Accept,
    /// No result; retry with the given looser policy.
    Escalate(SearchPolicy),
    /// No result and no looser policy left.
    NotFound,
    /// More than one result; never resolved automatically.
    Ambiguous,
}

pub fn next_step(policy: SearchPolicy, count: usize) -> PolicyStep {
    match count {
        0 => policy.next().map_or(PolicyStep::NotFound, PolicyStep::Escalate),
        1 => PolicyStep::Accept,
        _ => PolicyStep::Ambiguous,
    }
}

/// A record that was matched to exactly one registry entry.
#[derive(Debug, Clone)]
pub struct ResolvedRecord {
    pub entry: SearchResultEntry,
    /// Policy that produced the match; looser policies mean less confidence.
    pub policy: SearchPolicy,
    pub entity: EntityRecord,
    /// `None` if the entry has no documents or fetching them failed.
    pub documents: Option<DocumentTree>,
}

impl ResolvedRecord {
    pub fn shareholder_lists(&self) -> Option<ShareholderFilingDates<'_>> {
        self.documents
            .as_ref()
            .map(|tree| tree.shareholder_lists(&self.entity))
    }
}

/// Result of resolving one input record.
#[derive(Debug)]
pub enum RecordOutcome {
    Resolved(Box<ResolvedRecord>),
    /// No policy produced a result.
    NotFound,
    Ambiguous { policy: SearchPolicy, count: usize },
    /// The search request itself failed.
    SearchFailed { policy: SearchPolicy },
    /// The unique entry offers no legal entity information.
    MissingEntityInformation,
    /// Fetching or parsing the legal entity information failed.
    EntityUnavailable,
}

impl RecordOutcome {
    pub fn resolved(&self) -> Option<&ResolvedRecord> {
        match self {
            RecordOutcome::Resolved(record) => Some(record.as_ref()),
            _ => None,
        }
    }
}

/// Resolves input records one at a time against the portal.
pub struct SearchOrchestrator<'a> {
    client: &'a Client,
    session: &'a RateLimitedSession,
    resolver: CourtNameResolver<'a>,
    start_policy: SearchPolicy,
    span: Span,
}

impl<'a> SearchOrchestrator<'a> {
    pub fn new(client: &'a Client, session: &'a RateLimitedSession, courts: &'a CourtDirectory) -> Self {
        Self {
            client,
            session,
            resolver: CourtNameResolver::new(courts),
            start_policy: SearchPolicy::Strict,
            span: tracing::info_span!("run", courts = courts.len()),
        }
    }

    /// Start escalation at `policy` instead of strict.
    pub fn with_start_policy(mut self, policy: SearchPolicy) -> Self {
        self.start_policy = policy;
        self
    }

    /// Run-wide span; every record is processed in a child of it.
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Resolves `record`, read from input row `row`.
    pub async fn resolve(&self, row: usize, record: &SearchInputRecord) -> RecordOutcome {
        let span = tracing::info_span!(parent: &self.span, "record", row, name = %record.name);
        self.resolve_record(record).instrument(span).await
    }

    fn resolve_court(&self, record: &SearchInputRecord) -> Option<String> {
        let name = record.registry_court.as_deref()?;
        match self.resolver.resolve(name) {
            Some(CourtMatch::Exact(court)) => Some(court.identifier.clone()),
            Some(CourtMatch::Closest(court)) => {
                tracing::warn!(
                    "Closest match for court '{}' is {} ({})",
                    name,
                    court.name,
                    court.identifier
                );
                Some(court.identifier.clone())
            }
            None => {
                tracing::warn!("No court identifier found for '{}'", name);
                None
            }
        }
    }

    async fn find_entry(
        &self,
        record: &SearchInputRecord,
    ) -> Result<(SearchResultEntry, SearchPolicy), RecordOutcome> {
        let court = self.resolve_court(record);
        let mut policy = self.start_policy;
        loop {
            let params = search_parameters(record, court.as_deref(), policy);
            let entries = match search(self.client, self.session, &params).await {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::error!("Could not perform search request for {}: {}", record.summary(), e);
                    return Err(RecordOutcome::SearchFailed { policy });
                }
            };
            let count = entries.len();
            match next_step(policy, count) {
                PolicyStep::Accept => {
                    if policy == SearchPolicy::Keywords {
                        tracing::warn!(
                            "The search result for {} might not be the desired legal entity",
                            record.summary()
                        );
                    }
                    return entries
                        .into_iter()
                        .next()
                        .map(|entry| (entry, policy))
                        .ok_or(RecordOutcome::NotFound);
                }
                PolicyStep::Escalate(next) => {
                    tracing::info!(
                        "No {} result for {}, retrying with {} policy",
                        policy,
                        record.summary(),
                        next
                    );
                    policy = next;
                }
                PolicyStep::NotFound => {
                    tracing::error!("No result for {}", record.summary());
                    return Err(RecordOutcome::NotFound);
                }
                PolicyStep::Ambiguous => {
                    tracing::error!("Too many results ({}) for {}", count, record.summary());
                    return Err(RecordOutcome::Ambiguous { policy, count });
                }
            }
        }
    }

    async fn resolve_record(&self, record: &SearchInputRecord) -> RecordOutcome {
        if self.session.is_limit_reached() {
            tracing::info!("Reached request limit, delaying request");
        }

        let (entry, policy) = match self.find_entry(record).await {
            Ok(found) => found,
            Err(outcome) => return outcome,
        };

        if !entry.has(RecordContent::LegalEntityInformation) {
            tracing::warn!("No legal entity information indicator for '{}'", entry.name);
            return RecordOutcome::MissingEntityInformation;
        }

        let entity = match fetch_entity(self.client, self.session, entry.index).await {
            Ok(entity) => entity,
            Err(e) => {
                tracing::warn!("Cannot fetch detailed information for '{}': {}", entry.name, e);
                return RecordOutcome::EntityUnavailable;
            }
        };

        let documents = if entry.has(RecordContent::Documents) {
            match fetch_documents(self.client, self.session, entry.index).await {
                Ok(tree) => Some(tree),
                Err(e) => {
                    tracing::warn!("Cannot fetch shareholder lists for '{}': {}", entry.name, e);
                    None
                }
            }
        } else {
            None
        };

        tracing::info!("Resolved '{}' with {} policy", entry.name, policy);
        RecordOutcome::Resolved(Box::new(ResolvedRecord {
            entry,
            policy,
            entity,
            documents,
        }))
    }
}

//! Search result listing.

use std::collections::BTreeMap;

use handelsregister_api::types::RecordContent;
use handelsregister_api::{Client, RateLimitedSession, SearchParameters};
use serde::Serialize;

use crate::error::RegistryError;
use crate::markup::{normalize_whitespace, Extractor, MarkupHandler, StartTag};

const ENTRY_CELL_CLASS: &str = "RegPortErg_AZ";
const NAME_CELL_CLASS: &str = "RegPortErg_FirmaKopf";
const CONTENT_CELL_CLASS: &str = "RegPortErg_RandRechts";
const INDEX_ANCHOR_PREFIX: &str = "Eintrag_";
const ERROR_BANNER: &str = "Fehler";

/// One row of the search result listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchResultEntry {
    /// Handle of the row on the portal, used to fetch its sub-resources.
    pub index: u32,
    pub name: String,
    /// Every known content type, flagged `true` when the row offers it.
    pub content: BTreeMap<RecordContent, bool>,
}

impl SearchResultEntry {
    /// An entry that offers no content yet.
    pub fn new(index: u32, name: &str) -> Self {
        Self {
            index,
            name: name.to_string(),
            content: RecordContent::ALL.iter().map(|c| (*c, false)).collect(),
        }
    }

    pub fn has(&self, content: RecordContent) -> bool {
        self.content.get(&content).copied().unwrap_or(false)
    }
}

/// Submits `params` and parses the result listing.
pub async fn search(
    client: &Client,
    session: &RateLimitedSession,
    params: &SearchParameters,
) -> Result<Vec<SearchResultEntry>, RegistryError> {
    let html = client.search(session, params).await?;
    SearchResultExtractor::default()
        .extract(&html)
        .ok_or(RegistryError::MalformedPage("search result"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum SearchState {
    #[default]
    Void,
    Entry,
    Name,
    Content,
    Error,
}

#[derive(Debug)]
struct PendingEntry {
    index: Option<u32>,
    name: String,
    content: BTreeMap<RecordContent, bool>,
    table_depth: usize,
}

/// Table-row scanner over the result listing.
#[derive(Debug, Default)]
pub struct SearchResultExtractor {
    state: SearchState,
    table_depth: usize,
    in_heading: bool,
    pending: Option<PendingEntry>,
    entries: Vec<SearchResultEntry>,
}

impl SearchResultExtractor {
    fn open_entry(&mut self) {
        self.close_entry();
        self.pending = Some(PendingEntry {
            index: None,
            name: String::new(),
            content: RecordContent::ALL.iter().map(|c| (*c, false)).collect(),
            table_depth: self.table_depth,
        });
        self.state = SearchState::Entry;
    }

    fn close_entry(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        let name = normalize_whitespace(&pending.name);
        match pending.index {
            Some(index) => self.entries.push(SearchResultEntry {
                index,
                name,
                content: pending.content,
            }),
            None => tracing::warn!("Dropping search result '{}' without record index", name),
        }
        self.state = SearchState::Void;
    }
}

fn is_heading(name: &str) -> bool {
    matches!(name, "h1" | "h2" | "h3" | "h4")
}

impl MarkupHandler for SearchResultExtractor {
    fn start_tag(&mut self, tag: &StartTag) {
        if self.state == SearchState::Error {
            return;
        }
        match tag.name() {
            "table" => self.table_depth += 1,
            name if is_heading(name) => self.in_heading = true,
            "td" if tag.has_class(ENTRY_CELL_CLASS) => self.open_entry(),
            "td" if self.pending.is_some() => {
                if tag.has_class(NAME_CELL_CLASS) {
                    self.state = SearchState::Name;
                } else if tag.has_class(CONTENT_CELL_CLASS) {
                    self.state = SearchState::Content;
                }
            }
            "a" => {
                let Some(pending) = self.pending.as_mut() else {
                    return;
                };
                let Some(anchor) = tag.attr("name") else {
                    return;
                };
                if let Some(raw) = anchor.strip_prefix(INDEX_ANCHOR_PREFIX) {
                    match raw.trim().parse() {
                        Ok(index) => pending.index = Some(index),
                        Err(_) => tracing::debug!("Unparsable record anchor '{}'", anchor),
                    }
                }
            }
            _ => {}
        }
    }

    fn text(&mut self, text: &str) {
        if self.in_heading
            && self.pending.is_none()
            && self.entries.is_empty()
            && text.contains(ERROR_BANNER)
        {
            tracing::warn!("Search result page reports an error: {}", text.trim());
            self.state = SearchState::Error;
            return;
        }

        let Some(pending) = self.pending.as_mut() else {
            return;
        };
        match self.state {
            SearchState::Name => pending.name.push_str(text),
            SearchState::Content => {
                for token in text.split(|c: char| !c.is_alphanumeric()) {
                    if let Some(content) = RecordContent::from_token(token) {
                        pending.content.insert(content, true);
                    }
                }
            }
            _ => {}
        }
    }

    fn end_tag(&mut self, name: &str) {
        if self.state == SearchState::Error {
            return;
        }
        match name {
            "table" => self.table_depth = self.table_depth.saturating_sub(1),
            name if is_heading(name) => self.in_heading = false,
            "td" if matches!(self.state, SearchState::Name | SearchState::Content) => {
                self.state = SearchState::Entry;
            }
            "tr" => {
                let at_entry_depth = self
                    .pending
                    .as_ref()
                    .is_some_and(|p| p.table_depth == self.table_depth);
                if at_entry_depth {
                    self.close_entry();
                }
            }
            _ => {}
        }
    }
}

impl Extractor for SearchResultExtractor {
    type Output = Vec<SearchResultEntry>;

    fn finish(mut self) -> Option<Vec<SearchResultEntry>> {
        if self.state == SearchState::Error {
            return None;
        }
        self.close_entry();
        Some(self.entries)
    }
}

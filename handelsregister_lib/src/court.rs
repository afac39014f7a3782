//! Registry court directory, parsed from the portal's search form.

use std::collections::HashMap;

use handelsregister_api::{Client, RateLimitedSession};
use serde::Serialize;

use crate::error::RegistryError;
use crate::markup::{Extractor, MarkupHandler, StartTag};

/// Name of the search form's court selection field.
const COURT_FIELD_NAME: &str = "registergericht";

/// A registry court as offered by the search form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistryCourt {
    /// Short code used by the search form, one uppercase letter and four digits.
    pub identifier: String,
    /// Display name, e.g. `Berlin (Charlottenburg)`.
    pub name: String,
}

/// Read-only lookup over the known registry courts, by name and by identifier.
///
/// Courts keep the order in which the form listed them. A code listed twice
/// keeps its first entry.
#[derive(Debug, Default)]
pub struct CourtDirectory {
    courts: Vec<RegistryCourt>,
    by_name: HashMap<String, usize>,
    by_identifier: HashMap<String, usize>,
}

impl CourtDirectory {
    pub fn new(courts: Vec<RegistryCourt>) -> Self {
        let mut directory = CourtDirectory::default();
        for court in courts {
            if directory.by_identifier.contains_key(&court.identifier) {
                tracing::debug!("Ignoring duplicate court code {}", court.identifier);
                continue;
            }
            let idx = directory.courts.len();
            directory.by_identifier.insert(court.identifier.clone(), idx);
            directory.by_name.entry(court.name.clone()).or_insert(idx);
            directory.courts.push(court);
        }
        directory
    }

    pub fn get_by_name(&self, name: &str) -> Option<&RegistryCourt> {
        self.by_name.get(name).map(|&idx| &self.courts[idx])
    }

    pub fn get_by_identifier(&self, identifier: &str) -> Option<&RegistryCourt> {
        self.by_identifier.get(identifier).map(|&idx| &self.courts[idx])
    }

    pub fn len(&self) -> usize {
        self.courts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.courts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegistryCourt> {
        self.courts.iter()
    }
}

/// Fetches the search form and builds the court directory from it.
///
/// Any failure here is fatal for a run: without the directory no court
/// name can be turned into a search parameter.
pub async fn fetch_court_directory(
    client: &Client,
    session: &RateLimitedSession,
) -> Result<CourtDirectory, RegistryError> {
    let html = client.get_search_form(session).await?;
    let directory = CourtDirectoryExtractor::default()
        .extract(&html)
        .ok_or(RegistryError::MalformedPage("search form"))?;
    if directory.is_empty() {
        return Err(RegistryError::EmptyCourtDirectory);
    }
    Ok(directory)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum CourtState {
    #[default]
    Void,
    AwaitOption,
    AwaitName,
    Name,
}

/// Collects `<option>` entries of the court `<select>` whose value is a
/// court code.
#[derive(Debug, Default)]
pub struct CourtDirectoryExtractor {
    state: CourtState,
    seen_field: bool,
    identifier: Option<String>,
    name: String,
    courts: Vec<RegistryCourt>,
}

impl CourtDirectoryExtractor {
    fn close_option(&mut self) {
        if let Some(identifier) = self.identifier.take() {
            let name = self.name.trim();
            if name.is_empty() {
                tracing::debug!("Court code {} has no display name", identifier);
            } else {
                self.courts.push(RegistryCourt {
                    identifier,
                    name: name.to_string(),
                });
            }
        }
        self.name.clear();
        self.state = CourtState::AwaitOption;
    }
}

fn is_court_code(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() == 5 && bytes[0].is_ascii_uppercase() && bytes[1..].iter().all(u8::is_ascii_digit)
}

impl MarkupHandler for CourtDirectoryExtractor {
    fn start_tag(&mut self, tag: &StartTag) {
        match tag.name() {
            "select" if tag.attr("name") == Some(COURT_FIELD_NAME) => {
                self.seen_field = true;
                self.state = CourtState::AwaitOption;
            }
            "option" => {
                if matches!(self.state, CourtState::AwaitName | CourtState::Name) {
                    self.close_option();
                }
                if self.state != CourtState::AwaitOption {
                    return;
                }
                match tag.attr("value").map(str::trim) {
                    Some(value) if is_court_code(value) => {
                        self.identifier = Some(value.to_string());
                        self.state = CourtState::AwaitName;
                    }
                    _ => self.state = CourtState::Name,
                }
            }
            _ => {}
        }
    }

    fn text(&mut self, text: &str) {
        if self.state == CourtState::AwaitName && !text.trim().is_empty() {
            self.name.push_str(text);
            self.state = CourtState::Name;
        }
    }

    fn end_tag(&mut self, name: &str) {
        match (name, self.state) {
            ("option", CourtState::AwaitName | CourtState::Name) => self.close_option(),
            ("select", CourtState::AwaitName | CourtState::Name) => {
                self.close_option();
                self.state = CourtState::Void;
            }
            ("select", CourtState::AwaitOption) => self.state = CourtState::Void,
            _ => {}
        }
    }
}

impl Extractor for CourtDirectoryExtractor {
    type Output = CourtDirectory;

    fn finish(mut self) -> Option<CourtDirectory> {
        if matches!(self.state, CourtState::AwaitName | CourtState::Name) {
            self.close_option();
        }
        self.seen_field.then(|| CourtDirectory::new(self.courts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FORM: &str = r#"
        <form action="/rp_web/search.do" method="post">
          <select name="registerArt">
            <option value="HRB">HRB</option>
          </select>
          <select name="registergericht" size="1">
            <option value="">alle</option>
            <option value="D3201">Aachen</option>
            <option value="R3101">Bad Kreuznach</option>
            <option value="F1103">Berlin (Charlottenburg)</option>
            <option value="Y1201">Brandenburg an der Havel</option>
          </select>
        </form>"#;

    fn parse(html: &str) -> Option<CourtDirectory> {
        CourtDirectoryExtractor::default().extract(html)
    }

    #[test]
    fn parses_one_court_per_coded_option() {
        let directory = parse(FORM).unwrap();
        assert_eq!(directory.len(), 4);
        let names: Vec<&str> = directory.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Aachen", "Bad Kreuznach", "Berlin (Charlottenburg)", "Brandenburg an der Havel"]
        );
        assert_eq!(directory.get_by_identifier("F1103").unwrap().name, "Berlin (Charlottenburg)");
        assert_eq!(directory.get_by_name("Aachen").unwrap().identifier, "D3201");
    }

    #[test]
    fn options_of_other_selects_are_ignored() {
        let directory = parse(FORM).unwrap();
        assert!(directory.get_by_identifier("HRB").is_none());
        assert!(directory.get_by_name("alle").is_none());
    }

    #[test]
    fn identifier_index_counts_distinct_codes() {
        let html = r#"<select name="registergericht">
            <option value="D3201">Aachen</option>
            <option value="D3201">Aachen (alt)</option>
            <option value="D4601">Arnsberg</option>
            <option value="d4601">lowercase</option>
            <option value="D46011">too long</option>
        </select>"#;
        let directory = parse(html).unwrap();
        assert_eq!(directory.len(), 2);
        assert_eq!(directory.get_by_identifier("D3201").unwrap().name, "Aachen");
    }

    #[test]
    fn unterminated_options_are_closed_by_the_next_one() {
        let html = r#"<select name="registergericht">
            <option value="D3201">Aachen
            <option value="D4601">Arnsberg
        </select>"#;
        let directory = parse(html).unwrap();
        assert_eq!(directory.len(), 2);
        assert_eq!(directory.get_by_identifier("D4601").unwrap().name, "Arnsberg");
    }

    #[test]
    fn names_are_trimmed_and_entities_decoded() {
        let html = r#"<select name="registergericht"><option value="P2507">
            Frankfurt (Oder) &amp; Umland </option></select>"#;
        let directory = parse(html).unwrap();
        assert_eq!(
            directory.get_by_identifier("P2507").unwrap().name,
            "Frankfurt (Oder) & Umland"
        );
    }

    #[test]
    fn page_without_court_field_yields_nothing() {
        assert!(parse("<html><body><h3>Fehler</h3></body></html>").is_none());
    }

    #[test]
    fn code_pattern_is_one_letter_and_four_digits() {
        assert!(is_court_code("F1103"));
        assert!(!is_court_code("F110"));
        assert!(!is_court_code("11103"));
        assert!(!is_court_code("ÄF110"));
    }
}

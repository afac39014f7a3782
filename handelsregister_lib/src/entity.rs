//! Legal entity information page ("Unternehmensträgerdaten").

use std::sync::OnceLock;

use chrono::NaiveDate;
use handelsregister_api::types::{DocumentType, RegistryType};
use handelsregister_api::{Client, DocumentQuery, RateLimitedSession};
use regex::Regex;
use serde::Serialize;

use crate::error::RegistryError;
use crate::markup::{normalize_whitespace, Extractor, MarkupHandler, StartTag};

const SECTION_HEADING: &str = "Unternehmensträgerdaten";
const COURT_MARKER: &str = "Amtsgericht";
const ERROR_BANNER: &str = "Fehler";

/// Entity details as shown on the legal entity information page.
///
/// Every field is optional: text that does not match its expected shape
/// leaves the field unset.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EntityRecord {
    pub name: Option<String>,
    pub registry_court: Option<String>,
    pub registry_type: Option<RegistryType>,
    /// Register number, possibly with a one or two letter suffix (`12345 B`).
    pub registry_id: Option<String>,
    pub legal_structure: Option<String>,
    pub capital: Option<f64>,
    pub capital_currency: Option<String>,
    pub entry_date: Option<NaiveDate>,
    pub deletion_date: Option<NaiveDate>,
    /// `None` if the page had no balance filing selection at all,
    /// `Some(vec![])` if it had one without entries.
    pub balance_dates: Option<Vec<NaiveDate>>,
    pub street: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
}

/// Fetches and parses the legal entity information of result row `index`.
pub async fn fetch_entity(
    client: &Client,
    session: &RateLimitedSession,
    index: u32,
) -> Result<EntityRecord, RegistryError> {
    let query = DocumentQuery::new(DocumentType::LegalEntityInformation, index);
    let html = client.get_document(session, &query).await?;
    EntityDetailExtractor::default()
        .extract(&html)
        .ok_or(RegistryError::MalformedPage("legal entity information"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    LegalStructure,
    Capital,
    EntryDate,
    DeletionDate,
    Balance,
    Address,
}

impl Field {
    const ALL: [(&'static str, Field); 6] = [
        ("Rechtsform", Field::LegalStructure),
        ("Kapital", Field::Capital),
        ("Eintragsdatum", Field::EntryDate),
        ("Löschdatum", Field::DeletionDate),
        ("Jahresabschluss", Field::Balance),
        ("Anschrift", Field::Address),
    ];

    fn from_label(label: &str) -> Option<Field> {
        let label = label.trim();
        Self::ALL
            .iter()
            .find(|(prefix, _)| label.starts_with(prefix))
            .map(|(_, field)| *field)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum EntityState {
    #[default]
    Void,
    AwaitHeader,
    Header,
    AwaitCourt,
    AwaitRegistrySection,
    AwaitRegistryDetail,
    RegistryDetail,
    AwaitName,
    Name,
    AwaitKeyword,
    Keyword,
    AwaitValue,
    Value,
    Error,
}

/// Progress inside a value cell that spans several text nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum ValueState {
    #[default]
    Void,
    Street,
    City,
    BalanceOptions,
    BalanceOption,
}

#[derive(Debug, Default)]
pub struct EntityDetailExtractor {
    state: EntityState,
    value_state: ValueState,
    keyword: Option<Field>,
    seen_header: bool,
    record: EntityRecord,
}

fn registry_line_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*(.*?)\s+([A-Za-z]{2,3})\s+(\d+(?:\s+[a-zA-Z]{1,2})?)\s*$")
            .expect("registry line pattern is valid")
    })
}

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\s*[–-]\s*(.*?)\s*$").expect("name pattern is valid"))
}

fn capital_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*((?:\d{1,3}(?:\.\d{3})+|\d+)(?:,\d{1,2})?)\s*(EUR|DEM|€)?\s*$")
            .expect("capital pattern is valid")
    })
}

fn date_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\s*(\d{2})\.(\d{2})\.(\d{4})").expect("date pattern is valid"))
}

fn city_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*(?:(\d{5})\s+)?([^\d\n]+?)\s*$").expect("city pattern is valid")
    })
}

/// Parses `DD.MM.YYYY` at the start of `text`.
pub(crate) fn parse_date(text: &str) -> Option<NaiveDate> {
    let caps = date_pattern().captures(text)?;
    NaiveDate::from_ymd_opt(
        caps[3].parse().ok()?,
        caps[2].parse().ok()?,
        caps[1].parse().ok()?,
    )
}

/// Parses a capital amount such as `1.234.567,89 EUR` into amount and currency.
pub fn parse_capital(text: &str) -> Option<(f64, Option<String>)> {
    let caps = capital_pattern().captures(text)?;
    let amount = caps[1].replace('.', "").replace(',', ".").parse().ok()?;
    Some((amount, caps.get(2).map(|m| m.as_str().to_string())))
}

impl EntityDetailExtractor {
    fn set_registry_line(&mut self, text: &str) {
        let Some(caps) = registry_line_pattern().captures(text) else {
            tracing::debug!("Unrecognized registry line '{}'", text.trim());
            return;
        };
        self.record.registry_court = Some(caps[1].to_string());
        match caps[2].parse::<RegistryType>() {
            Ok(registry_type) => self.record.registry_type = Some(registry_type),
            Err(()) => tracing::warn!("Unknown registry type '{}'", &caps[2]),
        }
        self.record.registry_id = Some(normalize_whitespace(&caps[3]));
    }

    fn set_name(&mut self, text: &str) {
        if let Some(caps) = name_pattern().captures(text) {
            self.record.name = Some(caps[1].to_string());
        }
    }

    fn set_value(&mut self, text: &str) {
        match self.keyword {
            // the cell may be split by inline markup; keep every fragment
            Some(Field::LegalStructure) => match self.record.legal_structure.as_mut() {
                Some(structure) => {
                    structure.push(' ');
                    structure.push_str(text.trim());
                }
                None => self.record.legal_structure = Some(text.trim().to_string()),
            },
            Some(Field::Capital) => match parse_capital(text) {
                Some((amount, currency)) => {
                    self.record.capital = Some(amount);
                    self.record.capital_currency = currency;
                }
                None => tracing::debug!("Unrecognized capital '{}'", text.trim()),
            },
            Some(Field::EntryDate) => {
                if let Some(date) = parse_date(text) {
                    self.record.entry_date = Some(date);
                }
            }
            Some(Field::DeletionDate) => {
                if let Some(date) = parse_date(text) {
                    self.record.deletion_date = Some(date);
                }
            }
            Some(Field::Address) => match self.value_state {
                ValueState::Void => {
                    self.record.street = Some(text.trim().to_string());
                    self.value_state = ValueState::Street;
                }
                ValueState::Street => {
                    if let Some(caps) = city_pattern().captures(text) {
                        self.record.postal_code = caps.get(1).map(|m| m.as_str().to_string());
                        self.record.city = Some(caps[2].to_string());
                    }
                    self.value_state = ValueState::City;
                }
                _ => {}
            },
            Some(Field::Balance) => {
                if self.value_state == ValueState::BalanceOption {
                    if let (Some(date), Some(dates)) =
                        (parse_date(text), self.record.balance_dates.as_mut())
                    {
                        dates.push(date);
                    }
                }
            }
            None => {}
        }
    }
}

impl MarkupHandler for EntityDetailExtractor {
    fn start_tag(&mut self, tag: &StartTag) {
        use EntityState::*;

        match (tag.name(), self.state) {
            (_, Error) => {}
            ("h3", Void) => self.state = AwaitHeader,
            // a later section ends the entity details
            ("h3", _) => self.state = Void,
            ("td", Header) => self.state = AwaitCourt,
            ("td", Name | Value) => self.state = AwaitKeyword,
            ("td", Keyword) => {
                self.state = AwaitValue;
                self.value_state = ValueState::Void;
            }
            ("b", AwaitRegistrySection) => self.state = AwaitRegistryDetail,
            ("select", AwaitValue) if self.keyword == Some(Field::Balance) => {
                self.record.balance_dates.get_or_insert_with(Vec::new);
                self.value_state = ValueState::BalanceOptions;
            }
            ("option", AwaitValue) if self.value_state == ValueState::BalanceOptions => {
                self.value_state = ValueState::BalanceOption;
            }
            _ => {}
        }
    }

    fn text(&mut self, text: &str) {
        use EntityState::*;

        if text.trim().is_empty() {
            return;
        }
        match self.state {
            AwaitHeader if text.contains(SECTION_HEADING) => {
                self.seen_header = true;
                self.state = Header;
            }
            AwaitHeader if !self.seen_header && text.contains(ERROR_BANNER) => {
                tracing::warn!("Entity page reports an error: {}", text.trim());
                self.state = Error;
            }
            AwaitCourt if text.contains(COURT_MARKER) => self.state = AwaitRegistrySection,
            AwaitRegistryDetail => {
                self.set_registry_line(text);
                self.state = RegistryDetail;
            }
            AwaitName => {
                self.set_name(text);
                self.state = Name;
            }
            AwaitKeyword => {
                self.keyword = Field::from_label(text);
                self.state = Keyword;
            }
            AwaitValue => self.set_value(text),
            _ => {}
        }
    }

    fn end_tag(&mut self, name: &str) {
        use EntityState::*;

        match (name, self.state) {
            ("h3", AwaitHeader) => self.state = Void,
            ("td", AwaitCourt) => self.state = Header,
            ("td", AwaitValue) => {
                self.state = Value;
                self.value_state = ValueState::Void;
            }
            ("b", RegistryDetail) => self.state = AwaitName,
            ("option", AwaitValue) if self.value_state == ValueState::BalanceOption => {
                self.value_state = ValueState::BalanceOptions;
            }
            ("select", AwaitValue) if self.value_state == ValueState::BalanceOptions => {
                self.value_state = ValueState::Void;
            }
            _ => {}
        }
    }
}

impl Extractor for EntityDetailExtractor {
    type Output = EntityRecord;

    fn finish(self) -> Option<EntityRecord> {
        if self.state == EntityState::Error || !self.seen_header {
            return None;
        }
        Some(self.record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
<html><body>
<h3>Unternehmensträgerdaten</h3>
<table>
  <tr><td><b>Amtsgericht</b></td></tr>
  <tr><td><b>Berlin (Charlottenburg)   HRB   123456 B</b> &ndash; Muster Beteiligungs GmbH</td></tr>
  <tr><td>Rechtsform:</td><td> Gesellschaft mit beschränkter Haftung </td></tr>
  <tr><td>Kapital:</td><td>1.234.567,89 EUR</td></tr>
  <tr><td>Eintragsdatum:</td><td>03.04.2012</td></tr>
  <tr><td>Löschdatum:</td><td>-</td></tr>
  <tr><td>Jahresabschluss:</td><td>
     <select name="bilanz">
       <option>31.12.2016</option>
       <option>31.12.2017</option>
       <option>keine Angabe</option>
     </select></td></tr>
  <tr><td>Anschrift:</td><td>
      Musterstraße 12
      <div>10115 Berlin</div></td></tr>
</table>
<h3>Hinweise</h3>
<table><tr><td>Kapital:</td><td>99 EUR</td></tr></table>
</body></html>"#;

    fn parse(html: &str) -> Option<EntityRecord> {
        EntityDetailExtractor::default().extract(html)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_registry_line_and_name() {
        let record = parse(PAGE).unwrap();
        assert_eq!(record.registry_court.as_deref(), Some("Berlin (Charlottenburg)"));
        assert_eq!(record.registry_type, Some(RegistryType::Hrb));
        assert_eq!(record.registry_id.as_deref(), Some("123456 B"));
        assert_eq!(record.name.as_deref(), Some("Muster Beteiligungs GmbH"));
    }

    #[test]
    fn parses_keyword_values() {
        let record = parse(PAGE).unwrap();
        assert_eq!(
            record.legal_structure.as_deref(),
            Some("Gesellschaft mit beschränkter Haftung")
        );
        assert_eq!(record.capital, Some(1234567.89));
        assert_eq!(record.capital_currency.as_deref(), Some("EUR"));
        assert_eq!(record.entry_date, Some(date(2012, 4, 3)));
        assert_eq!(record.deletion_date, None);
    }

    #[test]
    fn balance_options_become_dates() {
        let record = parse(PAGE).unwrap();
        assert_eq!(
            record.balance_dates,
            Some(vec![date(2016, 12, 31), date(2017, 12, 31)])
        );
    }

    #[test]
    fn address_splits_street_and_city() {
        let record = parse(PAGE).unwrap();
        assert_eq!(record.street.as_deref(), Some("Musterstraße 12"));
        assert_eq!(record.postal_code.as_deref(), Some("10115"));
        assert_eq!(record.city.as_deref(), Some("Berlin"));
    }

    #[test]
    fn missing_balance_selection_is_unknown_not_empty() {
        let html = PAGE.replace("Jahresabschluss:", "Sonstiges:");
        assert_eq!(parse(&html).unwrap().balance_dates, None);

        let html = PAGE
            .replace("<option>31.12.2016</option>", "")
            .replace("<option>31.12.2017</option>", "");
        assert_eq!(parse(&html).unwrap().balance_dates, Some(Vec::new()));
    }

    #[test]
    fn trailing_markup_keeps_parsed_dates() {
        let html = PAGE
            .replace(
                "<td>03.04.2012</td>",
                "<td>03.04.2012 <span>(Sitzverlegung)</span></td>",
            )
            .replace("<td>-</td>", "<td>15.06.2020<br><i>von Amts wegen</i></td>");
        let record = parse(&html).unwrap();
        assert_eq!(record.entry_date, Some(date(2012, 4, 3)));
        assert_eq!(record.deletion_date, Some(date(2020, 6, 15)));
    }

    #[test]
    fn legal_structure_keeps_every_fragment() {
        let html = PAGE.replace(
            "<td> Gesellschaft mit beschränkter Haftung </td>",
            "<td>Gesellschaft mit beschränkter Haftung<br><i>(umgewandelt)</i></td>",
        );
        let record = parse(&html).unwrap();
        assert_eq!(
            record.legal_structure.as_deref(),
            Some("Gesellschaft mit beschränkter Haftung (umgewandelt)")
        );
    }

    #[test]
    fn unknown_registry_type_is_dropped() {
        let html = PAGE.replace("HRB", "XYZ");
        let record = parse(&html).unwrap();
        assert_eq!(record.registry_type, None);
        assert_eq!(record.registry_id.as_deref(), Some("123456 B"));
    }

    #[test]
    fn city_without_postal_code() {
        let html = PAGE.replace("10115 Berlin", "Berlin-Mitte");
        let record = parse(&html).unwrap();
        assert_eq!(record.postal_code, None);
        assert_eq!(record.city.as_deref(), Some("Berlin-Mitte"));
    }

    #[test]
    fn error_banner_yields_no_record() {
        let html = "<html><body><h3>Fehler</h3><p>Keine Daten</p></body></html>";
        assert!(parse(html).is_none());
    }

    #[test]
    fn page_without_section_yields_no_record() {
        assert!(parse("<html><body><h3>Suche</h3></body></html>").is_none());
    }

    #[test]
    fn capital_with_currency() {
        assert_eq!(
            parse_capital("1.234.567,89 EUR"),
            Some((1234567.89, Some("EUR".to_string())))
        );
        assert_eq!(parse_capital(" 25.000,00 € "), Some((25000.0, Some("€".to_string()))));
        assert_eq!(parse_capital("50000 DEM"), Some((50000.0, Some("DEM".to_string()))));
    }

    #[test]
    fn capital_without_currency() {
        assert_eq!(parse_capital("25000"), Some((25000.0, None)));
        assert_eq!(parse_capital("1.000,5"), Some((1000.5, None)));
    }

    #[test]
    fn malformed_capital_is_rejected() {
        assert_eq!(parse_capital("12.34.567"), None);
        assert_eq!(parse_capital("25.000 USD"), None);
        assert_eq!(parse_capital(""), None);
    }

    #[test]
    fn dates_must_be_valid_calendar_days() {
        assert_eq!(parse_date("01.02.2003 (geändert)"), Some(date(2003, 2, 1)));
        assert_eq!(parse_date("31.02.2003"), None);
        assert_eq!(parse_date("1.2.2003"), None);
    }
}

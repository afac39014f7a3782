use std::str::FromStr;

use crate::types::RegistryType;

/// How the portal matches the keyword field against entity names.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum KeywordMatchMode {
    /// Every keyword must appear in the name.
    All = 1,
    /// At least one keyword must appear in the name.
    AtLeastOne = 2,
    /// The keywords must form the exact entity name. This is the default.
    #[default]
    ExactName = 3,
}

impl FromStr for KeywordMatchMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1" => Ok(KeywordMatchMode::All),
            "2" => Ok(KeywordMatchMode::AtLeastOne),
            "3" => Ok(KeywordMatchMode::ExactName),
            _ => Err(()),
        }
    }
}

/// One search attempt against the registry.
///
/// Values are built fresh for every attempt; escalating to a looser search
/// produces a new value rather than mutating the previous one.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchParameters {
    pub keywords: String,
    pub registry_type: Option<RegistryType>,
    pub registry_id: Option<String>,
    /// Court identifier as used by the search form (e.g. `F1103`).
    pub registry_court: Option<String>,
    pub keyword_match: KeywordMatchMode,
    pub include_deleted: bool,
}

impl SearchParameters {
    pub fn new(keywords: &str) -> Self {
        Self {
            keywords: keywords.to_string(),
            ..Default::default()
        }
    }

    pub fn with_registry_type(mut self, registry_type: Option<RegistryType>) -> Self {
        self.registry_type = registry_type;
        self
    }

    pub fn with_registry_id(mut self, registry_id: Option<&str>) -> Self {
        self.registry_id = registry_id.map(str::to_string);
        self
    }

    pub fn with_registry_court(mut self, court_identifier: Option<&str>) -> Self {
        self.registry_court = court_identifier.map(str::to_string);
        self
    }

    pub fn with_keyword_match(mut self, keyword_match: KeywordMatchMode) -> Self {
        self.keyword_match = keyword_match;
        self
    }

    pub fn with_deleted(mut self, include_deleted: bool) -> Self {
        self.include_deleted = include_deleted;
        self
    }

    /// Drops the registry type, id and court, keeping keywords and options.
    pub fn without_registry(&self) -> Self {
        Self {
            registry_type: None,
            registry_id: None,
            registry_court: None,
            ..self.clone()
        }
    }

    /// Form fields for the search POST. Unset fields are sent empty, as the
    /// portal's own form does.
    pub fn to_form(&self) -> Vec<(&'static str, String)> {
        let mut form = vec![
            ("suchTyp", "n".to_string()),
            ("btnSuche", "Suchen".to_string()),
            ("ergebnisseProSeite", "10".to_string()),
            ("niederlassung", String::new()),
            ("schlagwoerter", self.keywords.clone()),
            (
                "schlagwortOptionen",
                (self.keyword_match as u8).to_string(),
            ),
            (
                "registerArt",
                self.registry_type
                    .map(|t| t.code().to_string())
                    .unwrap_or_default(),
            ),
            ("registerNummer", self.registry_id.clone().unwrap_or_default()),
            (
                "registergericht",
                self.registry_court.clone().unwrap_or_default(),
            ),
        ];
        if self.include_deleted {
            form.push(("suchOptionenGeloescht", "true".to_string()));
        }
        form
    }
}

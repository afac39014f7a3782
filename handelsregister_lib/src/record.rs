use handelsregister_api::types::RegistryType;
use serde::Serialize;

/// One entity to look up, as read from the input file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchInputRecord {
    pub name: String,
    pub registry_type: Option<RegistryType>,
    pub registry_id: Option<String>,
    /// Free-text court name; resolved against the court directory before searching.
    pub registry_court: Option<String>,
}

impl SearchInputRecord {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
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

    pub fn with_registry_court(mut self, registry_court: Option<&str>) -> Self {
        self.registry_court = registry_court.map(str::to_string);
        self
    }

    /// Short form for log lines, e.g. `Muster GmbH (HRB 12345, Hamburg)`.
    pub fn summary(&self) -> String {
        let registry: Vec<&str> = [
            self.registry_type.as_ref().map(RegistryType::code),
            self.registry_id.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect();
        let mut details = registry.join(" ");
        if let Some(court) = self.registry_court.as_deref() {
            if !details.is_empty() {
                details.push_str(", ");
            }
            details.push_str(court);
        }
        if details.is_empty() {
            self.name.clone()
        } else {
            format!("{} ({})", self.name, details)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_lists_known_registry_details() {
        let record = SearchInputRecord::new("Muster GmbH")
            .with_registry_type(Some(RegistryType::Hrb))
            .with_registry_id(Some("12345"))
            .with_registry_court(Some("Hamburg"));
        assert_eq!(record.summary(), "Muster GmbH (HRB 12345, Hamburg)");

        let record = SearchInputRecord::new("Muster GmbH").with_registry_court(Some("Hamburg"));
        assert_eq!(record.summary(), "Muster GmbH (Hamburg)");

        assert_eq!(SearchInputRecord::new("Muster GmbH").summary(), "Muster GmbH");
    }
}

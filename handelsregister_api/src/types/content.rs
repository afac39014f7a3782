use std::fmt;

use serde::{Deserialize, Serialize};

/// Sub-resources a search result row may link to. The portal renders each
/// as a short token in the row's rightmost cell.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordContent {
    CurrentPrint,
    ChronologicalPrint,
    HistoricalPrint,
    Documents,
    LegalEntityInformation,
    Publications,
    StructuredData,
}

impl RecordContent {
    pub const ALL: [RecordContent; 7] = [
        RecordContent::CurrentPrint,
        RecordContent::ChronologicalPrint,
        RecordContent::HistoricalPrint,
        RecordContent::Documents,
        RecordContent::LegalEntityInformation,
        RecordContent::Publications,
        RecordContent::StructuredData,
    ];

    pub fn token(&self) -> &'static str {
        match self {
            RecordContent::CurrentPrint => "AD",
            RecordContent::ChronologicalPrint => "CD",
            RecordContent::HistoricalPrint => "HD",
            RecordContent::Documents => "DK",
            RecordContent::LegalEntityInformation => "UT",
            RecordContent::Publications => "VÖ",
            RecordContent::StructuredData => "SI",
        }
    }

    /// Maps a token as rendered in the listing back to its content type.
    pub fn from_token(token: &str) -> Option<Self> {
        let token = token.trim();
        RecordContent::ALL.into_iter().find(|c| c.token() == token)
    }
}

impl fmt::Display for RecordContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Discriminator for the document endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DocumentType {
    /// Legal-entity information page (`UT`).
    LegalEntityInformation,
    /// Filed document tree (`DK`).
    Documents,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::LegalEntityInformation => "UT",
            DocumentType::Documents => "DK",
        }
    }
}

impl From<DocumentType> for RecordContent {
    fn from(value: DocumentType) -> Self {
        match value {
            DocumentType::LegalEntityInformation => RecordContent::LegalEntityInformation,
            DocumentType::Documents => RecordContent::Documents,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_types_map_to_their_listing_tokens() {
        assert_eq!(
            RecordContent::from_token(DocumentType::Documents.as_str()),
            Some(RecordContent::from(DocumentType::Documents))
        );
        assert_eq!(
            RecordContent::from_token(DocumentType::LegalEntityInformation.as_str()),
            Some(RecordContent::LegalEntityInformation)
        );
        assert_eq!(RecordContent::from_token("VÖ"), Some(RecordContent::Publications));
    }

    #[test]
    fn unknown_token_is_ignored() {
        assert_eq!(RecordContent::from_token("XY"), None);
        assert_eq!(RecordContent::from_token(""), None);
    }

    #[test]
    fn token_lookup_trims_whitespace() {
        assert_eq!(
            RecordContent::from_token("  DK\n"),
            Some(RecordContent::Documents)
        );
    }
}

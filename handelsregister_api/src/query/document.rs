use url::Url;

use crate::types::DocumentType;

use super::Query;

/// Selects one sub-resource of a search result row.
///
/// `index` is the row handle the listing assigned; it is only valid within
/// the session that produced the listing.
#[derive(Clone, Copy, Debug)]
pub struct DocumentQuery {
    pub document_type: DocumentType,
    pub index: u32,
}

impl DocumentQuery {
    pub fn new(document_type: DocumentType, index: u32) -> Self {
        Self {
            document_type,
            index,
        }
    }
}

impl Query for DocumentQuery {
    fn add_to_url(&self, url: &Url) -> Url {
        let mut url = url.clone();
        url.query_pairs_mut()
            .append_pair("doctyp", self.document_type.as_str())
            .append_pair("index", &self.index.to_string());
        url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_discriminator_and_index() {
        let base = Url::parse("https://example.test/rp_web/document.do").unwrap();
        let url = DocumentQuery::new(DocumentType::Documents, 3).add_to_url(&base);
        assert_eq!(url.query(), Some("doctyp=DK&index=3"));

        let url = DocumentQuery::new(DocumentType::LegalEntityInformation, 0).add_to_url(&base);
        assert_eq!(url.query(), Some("doctyp=UT&index=0"));
    }
}

mod common;
pub use self::common::Query;

mod search;
pub use self::search::{KeywordMatchMode, SearchParameters};

mod document;
pub use self::document::DocumentQuery;

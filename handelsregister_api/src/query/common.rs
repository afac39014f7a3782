//! Shared query infrastructure.

use url::Url;

/// Trait implemented by query builders that travel in the URL.
pub trait Query {
    /// Appends this query's parameters to the given URL, returning the modified URL.
    fn add_to_url(&self, url: &Url) -> Url;
}

//! Mapping of free-text court names onto the court directory.

use crate::court::{CourtDirectory, RegistryCourt};

/// How a court name was matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CourtMatch<'a> {
    /// The name is exactly a directory entry.
    Exact(&'a RegistryCourt),
    /// The closest directory entry; callers should treat it as a guess.
    Closest(&'a RegistryCourt),
}

impl<'a> CourtMatch<'a> {
    pub fn court(&self) -> &'a RegistryCourt {
        match self {
            CourtMatch::Exact(court) | CourtMatch::Closest(court) => court,
        }
    }

    pub fn is_exact(&self) -> bool {
        matches!(self, CourtMatch::Exact(_))
    }
}

/// Resolves court names against a [`CourtDirectory`].
#[derive(Debug, Clone, Copy)]
pub struct CourtNameResolver<'a> {
    directory: &'a CourtDirectory,
}

impl<'a> CourtNameResolver<'a> {
    pub fn new(directory: &'a CourtDirectory) -> Self {
        Self { directory }
    }

    /// Plain lookup by display name.
    pub fn resolve_exact(&self, name: &str) -> Option<&'a RegistryCourt> {
        self.directory.get_by_name(name)
    }

    /// Best-effort match for a court name that is not in the directory.
    ///
    /// Input such as `Charlottenburg` matches a court named
    /// `Berlin (Charlottenburg)` directly. Otherwise the court with the
    /// highest normalized edit similarity wins; ties go to the court listed
    /// first. Returns `None` only for blank input or an empty directory.
    pub fn resolve_closest(&self, name: &str) -> Option<&'a RegistryCourt> {
        let needle = name.trim();
        if needle.is_empty() {
            return None;
        }

        let qualifier = format!("({})", needle);
        if let Some(court) = self.directory.iter().find(|c| c.name.contains(&qualifier)) {
            return Some(court);
        }

        let needle = needle.to_lowercase();
        let mut best: Option<(&'a RegistryCourt, f64)> = None;
        for court in self.directory.iter() {
            let score = strsim::normalized_levenshtein(&needle, &court.name.to_lowercase());
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((court, score));
            }
        }
        best.map(|(court, _)| court)
    }

    /// Exact lookup first, closest match as fallback.
    pub fn resolve(&self, name: &str) -> Option<CourtMatch<'a>> {
        if let Some(court) = self.resolve_exact(name) {
            return Some(CourtMatch::Exact(court));
        }
        self.resolve_closest(name).map(CourtMatch::Closest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn court(identifier: &str, name: &str) -> RegistryCourt {
        RegistryCourt {
            identifier: identifier.to_string(),
            name: name.to_string(),
        }
    }

    fn directory() -> CourtDirectory {
        CourtDirectory::new(vec![
            court("D3201", "Aachen"),
            court("F1103", "Berlin (Charlottenburg)"),
            court("K1101", "Hamburg"),
            court("R2101", "Frankfurt am Main"),
            court("P2507", "Frankfurt (Oder)"),
            court("M1201", "München"),
        ])
    }

    #[test]
    fn exact_lookup_matches_directory_names_only() {
        let directory = directory();
        let resolver = CourtNameResolver::new(&directory);
        assert_eq!(resolver.resolve_exact("Hamburg").unwrap().identifier, "K1101");
        assert!(resolver.resolve_exact("hamburg").is_none());
        assert!(resolver.resolve_exact("Charlottenburg").is_none());
    }

    #[test]
    fn parenthesized_qualifier_wins_over_similarity() {
        let directory = directory();
        let resolver = CourtNameResolver::new(&directory);
        assert_eq!(resolver.resolve_closest("Charlottenburg").unwrap().identifier, "F1103");
        assert_eq!(resolver.resolve_closest("Oder").unwrap().identifier, "P2507");
    }

    #[test]
    fn misspelled_names_resolve_by_similarity() {
        let directory = directory();
        let resolver = CourtNameResolver::new(&directory);
        assert_eq!(resolver.resolve_closest("Muenchen").unwrap().identifier, "M1201");
        assert_eq!(resolver.resolve_closest("Frankfurt a. Main").unwrap().identifier, "R2101");
        assert_eq!(resolver.resolve_closest("HAMBURG").unwrap().identifier, "K1101");
    }

    #[test]
    fn closest_always_answers_for_non_empty_input() {
        let directory = directory();
        let resolver = CourtNameResolver::new(&directory);
        assert!(resolver.resolve_closest("zzzzzzzzzzzzzzzzzzzz").is_some());
        assert!(resolver.resolve_closest("   ").is_none());
        assert!(resolver.resolve_closest("").is_none());
    }

    #[test]
    fn ties_go_to_the_first_listed_court() {
        let directory = CourtDirectory::new(vec![court("A0001", "Abc"), court("A0002", "Abd")]);
        let resolver = CourtNameResolver::new(&directory);
        assert_eq!(resolver.resolve_closest("Abx").unwrap().identifier, "A0001");
    }

    #[test]
    fn empty_directory_resolves_nothing() {
        let directory = CourtDirectory::new(Vec::new());
        let resolver = CourtNameResolver::new(&directory);
        assert!(resolver.resolve("Hamburg").is_none());
    }

    #[test]
    fn resolve_reports_match_kind() {
        let directory = directory();
        let resolver = CourtNameResolver::new(&directory);
        assert!(resolver.resolve("Aachen").unwrap().is_exact());
        let guess = resolver.resolve("Achen").unwrap();
        assert!(!guess.is_exact());
        assert_eq!(guess.court().identifier, "D3201");
    }
}

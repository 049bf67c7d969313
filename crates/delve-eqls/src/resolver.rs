//! Mapping attribute names as written onto attributes the store knows.

use delve_store::CatalogEntry;

/// Outcome of resolving one attribute name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The name exists as written.
    Exact,
    /// Use this attribute name instead.
    Substitute(String),
    /// No plausible match.
    Unknown,
}

/// Resolves attribute names against the current catalog.
///
/// Implementations decide how loose the match may be; the compiled query
/// always keeps the user's text as its projection keys.
pub trait AttributeResolver {
    fn resolve(&self, attribute: &str, catalog: &[CatalogEntry]) -> Resolution;
}

/// Exact match, then case-insensitive, then ignoring `_` and `-`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CaseInsensitiveResolver;

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

impl AttributeResolver for CaseInsensitiveResolver {
    fn resolve(&self, attribute: &str, catalog: &[CatalogEntry]) -> Resolution {
        if catalog.iter().any(|entry| entry.attribute == attribute) {
            return Resolution::Exact;
        }
        if let Some(entry) = catalog
            .iter()
            .find(|entry| entry.attribute.eq_ignore_ascii_case(attribute))
        {
            return Resolution::Substitute(entry.attribute.clone());
        }
        let wanted = normalize(attribute);
        match catalog
            .iter()
            .find(|entry| normalize(&entry.attribute) == wanted)
        {
            Some(entry) => Resolution::Substitute(entry.attribute.clone()),
            None => Resolution::Unknown,
        }
    }
}

/// Accepts every name as written.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactResolver;

impl AttributeResolver for ExactResolver {
    fn resolve(&self, _attribute: &str, _catalog: &[CatalogEntry]) -> Resolution {
        Resolution::Exact
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use delve_store::{Atom, Fact, FactStore};

    fn catalog() -> Vec<CatalogEntry> {
        let mut store = FactStore::new();
        store.add_facts([
            Fact::new("post:1", "title", "Hello"),
            Fact::new("post:1", "view_count", 10),
            Fact::new("post:1", "author.name", Atom::from("ann")),
        ]);
        store.catalog()
    }

    #[test]
    fn test_exact_match() {
        assert_eq!(
            CaseInsensitiveResolver.resolve("title", &catalog()),
            Resolution::Exact
        );
    }

    #[test]
    fn test_case_and_separator_insensitive() {
        let catalog = catalog();
        assert_eq!(
            CaseInsensitiveResolver.resolve("Title", &catalog),
            Resolution::Substitute("title".to_string())
        );
        assert_eq!(
            CaseInsensitiveResolver.resolve("viewCount", &catalog),
            Resolution::Substitute("view_count".to_string())
        );
        assert_eq!(
            CaseInsensitiveResolver.resolve("Author.Name", &catalog),
            Resolution::Substitute("author.name".to_string())
        );
    }

    #[test]
    fn test_unknown() {
        assert_eq!(
            CaseInsensitiveResolver.resolve("likes", &catalog()),
            Resolution::Unknown
        );
    }
}

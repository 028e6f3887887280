//! Facet records produced by a mapping table.
//!
//! A [`FacetRecord`] holds at most one value per field, in the order the
//! fields were first set, plus the identifier of the document it was built
//! from. The identifier names output files and expands `${filename}`.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Normalized field/value record built from one input document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetRecord {
    source: String,
    facets: IndexMap<String, String>,
}

impl FacetRecord {
    /// Create an empty record for the document identified by `source`.
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            facets: IndexMap::new(),
        }
    }

    /// The source identifier (usually the input file name).
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Set a field, replacing any earlier value. A replaced field keeps its
    /// original position.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.facets.insert(field.into(), value.into());
    }

    /// Get the value of a field.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.facets.get(field).map(String::as_str)
    }

    /// Field name -> value, insertion ordered.
    #[must_use]
    pub fn facets(&self) -> &IndexMap<String, String> {
        &self.facets
    }

    /// Iterate over `(field, value)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.facets.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of fields with a value.
    #[must_use]
    pub fn len(&self) -> usize {
        self.facets.len()
    }

    /// Returns `true` if no field has a value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.facets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get() {
        let mut record = FacetRecord::new("a.xml");
        record.set("title", "First");
        record.set("author", "Someone");

        assert_eq!(record.source(), "a.xml");
        assert_eq!(record.get("title"), Some("First"));
        assert_eq!(record.get("missing"), None);
        assert_eq!(record.len(), 2);
    }

    #[test]
    fn test_overwrite_keeps_position() {
        let mut record = FacetRecord::new("a.xml");
        record.set("title", "First");
        record.set("author", "Someone");
        record.set("title", "Second");

        let pairs: Vec<_> = record.iter().collect();
        assert_eq!(pairs, vec![("title", "Second"), ("author", "Someone")]);
    }

    #[test]
    fn test_facets_view_matches_set_values() {
        let mut record = FacetRecord::new("a.xml");
        record.set("language", "fin");
        record.set("title", "Kalevala");

        let facets = record.facets();
        assert_eq!(facets.keys().collect::<Vec<_>>(), vec!["language", "title"]);
        assert_eq!(facets["title"], "Kalevala");
        assert_eq!(
            serde_json::to_string(facets).unwrap(),
            r#"{"language":"fin","title":"Kalevala"}"#
        );
    }

    #[test]
    fn test_empty_record() {
        let record = FacetRecord::new("empty.xml");
        assert!(record.is_empty());
        assert_eq!(record.iter().count(), 0);
    }
}

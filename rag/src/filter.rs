//! Topical gate applied to every similarity search.
//!
//! Section and subsection are exact, case-insensitive metadata matches. They
//! never influence ranking; a unit either passes the gate or is excluded.

use crate::document::{topic_key, KnowledgeUnit};

/// A per-request query: free text plus optional topical hints.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetrievalQuery {
    pub query_text: String,
    pub section: Option<String>,
    pub subsection: Option<String>,
}

impl RetrievalQuery {
    pub fn new(query_text: impl Into<String>) -> Self {
        Self {
            query_text: query_text.into(),
            section: None,
            subsection: None,
        }
    }

    pub fn with_section(mut self, section: Option<impl Into<String>>) -> Self {
        self.section = section.map(Into::into);
        self
    }

    pub fn with_subsection(mut self, subsection: Option<impl Into<String>>) -> Self {
        self.subsection = subsection.map(Into::into);
        self
    }

    pub fn topic_filter(&self) -> TopicFilter {
        TopicFilter::new(self.section.as_deref(), self.subsection.as_deref())
    }
}

/// Case-folded section/subsection constraints. `None` matches every value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TopicFilter {
    section: Option<String>,
    subsection: Option<String>,
}

impl TopicFilter {
    pub fn new(section: Option<&str>, subsection: Option<&str>) -> Self {
        Self {
            section: section.map(topic_key),
            subsection: subsection.map(topic_key),
        }
    }

    pub fn section_key(&self) -> Option<&str> {
        self.section.as_deref()
    }

    pub fn subsection_key(&self) -> Option<&str> {
        self.subsection.as_deref()
    }

    pub fn matches(&self, unit: &KnowledgeUnit) -> bool {
        dimension_matches(self.section.as_deref(), &unit.section)
            && dimension_matches(self.subsection.as_deref(), &unit.subsection)
    }
}

fn dimension_matches(wanted: Option<&str>, actual: &str) -> bool {
    match wanted {
        None => true,
        Some(key) => key == topic_key(actual),
    }
}

/// True when `unit` passes the topical gate of `query`.
pub fn matches_query(unit: &KnowledgeUnit, query: &RetrievalQuery) -> bool {
    query.topic_filter().matches(unit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentType;

    fn unit(section: &str, subsection: &str) -> KnowledgeUnit {
        KnowledgeUnit::new("body", DocumentType::QaPair, Some(section), Some(subsection))
    }

    fn query(section: Option<&str>, subsection: Option<&str>) -> RetrievalQuery {
        RetrievalQuery::new("q")
            .with_section(section)
            .with_subsection(subsection)
    }

    #[test]
    fn absent_filters_match_everything() {
        let q = query(None, None);
        assert_eq!(q.topic_filter(), TopicFilter::default());
        assert!(matches_query(&unit("Income", "Salary"), &q));
        assert!(matches_query(&unit("", ""), &q));
    }

    #[test]
    fn section_is_case_insensitive_and_exact() {
        let u = unit("Income", "Salary");
        assert!(matches_query(&u, &query(Some("income"), None)));
        assert!(matches_query(&u, &query(Some("INCOME"), None)));
        assert!(!matches_query(&u, &query(Some("Business Income"), None)));
        assert!(!matches_query(&u, &query(Some("Inc"), None)));
    }

    #[test]
    fn subsection_is_symmetric_with_section() {
        let u = unit("Income", "Salary");
        assert!(matches_query(&u, &query(None, Some("salary"))));
        assert!(!matches_query(&u, &query(None, Some("Dividends"))));
    }

    #[test]
    fn both_filters_are_a_strict_and() {
        let u = unit("Foreign Income", "");
        assert!(matches_query(&u, &query(Some("foreign income"), None)));
        // no fallback to section-only matching when the subsection is untagged
        assert!(!matches_query(&u, &query(Some("foreign income"), Some("Salary"))));
        assert!(matches_query(&u, &query(Some("foreign income"), Some(""))));
    }

    #[test]
    fn non_ascii_sections_fold_case() {
        let u = unit("ÜBERWEISUNG", "");
        assert!(matches_query(&u, &query(Some("überweisung"), None)));
        let greek = unit("ΟΔΟΣ", "");
        assert!(matches_query(&greek, &query(Some("οδοσ"), None)));
    }
}

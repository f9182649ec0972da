use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Metadata keys every persisted unit carries; caller metadata never overrides them.
pub const RESERVED_KEYS: &[&str] = &[
    "content",
    "type",
    "section",
    "subsection",
    "section_key",
    "subsection_key",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    GeneralInfo,
    QaPair,
    #[serde(other)]
    Other,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::GeneralInfo => "general_info",
            DocumentType::QaPair => "qa_pair",
            DocumentType::Other => "other",
        }
    }

    /// Parses an ingestion label; anything unrecognised is `Other`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "general_info" => DocumentType::GeneralInfo,
            "qa_pair" => DocumentType::QaPair,
            _ => DocumentType::Other,
        }
    }
}

/// One independently retrievable piece of reference text.
///
/// `section` and `subsection` are never null: an absent value is the empty string.
/// Identifiers and vectors belong to the store adapter and never appear here.
#[derive(Clone, Debug, PartialEq)]
pub struct KnowledgeUnit {
    pub content: String,
    pub doc_type: DocumentType,
    pub section: String,
    pub subsection: String,
    pub extra: Map<String, Value>,
}

impl KnowledgeUnit {
    pub fn new(
        content: impl Into<String>,
        doc_type: DocumentType,
        section: Option<&str>,
        subsection: Option<&str>,
    ) -> Self {
        Self {
            content: content.into(),
            doc_type,
            section: section.unwrap_or_default().to_string(),
            subsection: subsection.unwrap_or_default().to_string(),
            extra: Map::new(),
        }
    }

    pub fn general_info(
        content: impl Into<String>,
        section: Option<&str>,
        subsection: Option<&str>,
    ) -> Self {
        Self::new(content, DocumentType::GeneralInfo, section, subsection)
            .with_extra("priority", Value::from("high"))
    }

    /// Q&A content is rendered as "Question: …\n\nAnswer: …" so the assembler can emit it verbatim.
    pub fn qa_pair(question: &str, answer: &str, section: Option<&str>, subsection: Option<&str>) -> Self {
        let content = format!("Question: {}\n\nAnswer: {}", question.trim(), answer.trim());
        Self::new(content, DocumentType::QaPair, section, subsection)
            .with_extra("question", Value::from(question.trim()))
            .with_extra("priority", Value::from("medium"))
    }

    /// Adds a caller metadata entry. Reserved keys are ignored.
    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        let key = key.into();
        if !RESERVED_KEYS.contains(&key.as_str()) {
            self.extra.insert(key, value);
        }
        self
    }

    /// Merges caller metadata, returning the reserved keys that were dropped.
    pub fn merge_extra(&mut self, metadata: Map<String, Value>) -> Vec<String> {
        let mut dropped = Vec::new();
        for (key, value) in metadata {
            if RESERVED_KEYS.contains(&key.as_str()) {
                dropped.push(key);
            } else {
                self.extra.insert(key, value);
            }
        }
        dropped
    }

    /// Flattens the unit into the persisted metadata layout.
    pub fn to_payload(&self) -> Map<String, Value> {
        let mut payload = self.extra.clone();
        payload.insert("content".into(), Value::from(self.content.as_str()));
        payload.insert("type".into(), Value::from(self.doc_type.as_str()));
        payload.insert("section".into(), Value::from(self.section.as_str()));
        payload.insert("subsection".into(), Value::from(self.subsection.as_str()));
        payload.insert("section_key".into(), Value::from(topic_key(&self.section)));
        payload.insert("subsection_key".into(), Value::from(topic_key(&self.subsection)));
        payload
    }

    /// Rebuilds a unit from a persisted payload. Returns `None` when there is no content.
    pub fn from_payload(mut payload: Map<String, Value>) -> Option<Self> {
        let content = match payload.remove("content") {
            Some(Value::String(s)) => s,
            _ => return None,
        };
        let doc_type = payload
            .remove("type")
            .and_then(|v| v.as_str().map(DocumentType::from_label))
            .unwrap_or(DocumentType::Other);
        let mut text = |key: &str| match payload.remove(key) {
            Some(Value::String(s)) => s,
            _ => String::new(),
        };
        let section = text("section");
        let subsection = text("subsection");
        payload.remove("section_key");
        payload.remove("subsection_key");
        Some(Self {
            content,
            doc_type,
            section,
            subsection,
            extra: payload,
        })
    }
}

/// Case-folded form used for topical comparisons.
///
/// Folds one character at a time, so context rules such as the Greek final
/// sigma never apply.
pub fn topic_key(value: &str) -> String {
    value.chars().flat_map(char::to_lowercase).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn absent_topics_become_empty_strings() {
        let unit = KnowledgeUnit::general_info("Foreign income refers to...", Some("Foreign Income"), None);
        assert_eq!(unit.section, "Foreign Income");
        assert_eq!(unit.subsection, "");
        assert_eq!(unit.extra.get("priority"), Some(&json!("high")));
    }

    #[test]
    fn qa_pair_is_preformatted() {
        let unit = KnowledgeUnit::qa_pair(" How are bonuses taxed? ", "As salary.", Some("Income"), Some("Salary"));
        assert_eq!(unit.doc_type, DocumentType::QaPair);
        assert_eq!(unit.content, "Question: How are bonuses taxed?\n\nAnswer: As salary.");
        assert_eq!(unit.extra.get("question"), Some(&json!("How are bonuses taxed?")));
    }

    #[test]
    fn unknown_labels_are_other() {
        assert_eq!(DocumentType::from_label("QA_PAIR"), DocumentType::QaPair);
        assert_eq!(DocumentType::from_label("faq"), DocumentType::Other);
        let parsed: DocumentType = serde_json::from_value(json!("circular")).expect("other variant");
        assert_eq!(parsed, DocumentType::Other);
    }

    #[test]
    fn caller_metadata_cannot_override_reserved_keys() {
        let mut unit = KnowledgeUnit::new("text", DocumentType::Other, Some("Income"), None);
        let dropped = unit.merge_extra(
            json!({"section": "Hijacked", "source": "fbr.gov.pk"})
                .as_object()
                .cloned()
                .unwrap_or_default(),
        );
        assert_eq!(dropped, vec!["section".to_string()]);
        let payload = unit.to_payload();
        assert_eq!(payload["section"], json!("Income"));
        assert_eq!(payload["subsection"], json!(""));
        assert_eq!(payload["source"], json!("fbr.gov.pk"));
    }

    #[test]
    fn payload_layout_round_trips() {
        let unit = KnowledgeUnit::qa_pair("Q?", "A.", Some("Income"), Some("Salary"));
        let payload = unit.to_payload();
        assert_eq!(payload["type"], json!("qa_pair"));
        assert_eq!(payload["section_key"], json!("income"));
        assert_eq!(payload["subsection_key"], json!("salary"));
        assert_eq!(KnowledgeUnit::from_payload(payload), Some(unit));
    }

    #[test]
    fn topic_key_folds_per_character() {
        assert_eq!(topic_key("Foreign Income"), "foreign income");
        assert_eq!(topic_key("ΟΔΟΣ"), "οδοσ");
        assert_eq!(topic_key("ΟΔΟΣ"), topic_key("οδοσ"));
    }

    #[test]
    fn payload_without_content_is_skipped() {
        let payload = json!({"type": "qa_pair"}).as_object().cloned().unwrap_or_default();
        assert_eq!(KnowledgeUnit::from_payload(payload), None);
    }
}

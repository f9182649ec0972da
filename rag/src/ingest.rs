use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::document::{DocumentType, KnowledgeUnit};
use crate::error::RagError;
use crate::store::KnowledgeStore;

/// A single document as submitted by an administrator.
#[derive(Clone, Debug, Deserialize)]
pub struct NewDocument {
    pub content: String,
    #[serde(rename = "type")]
    pub doc_type: String,
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub subsection: Option<String>,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
}

/// Several documents sharing type, topics and metadata.
#[derive(Clone, Debug, Deserialize)]
pub struct DocumentBatch {
    pub contents: Vec<String>,
    #[serde(rename = "type")]
    pub doc_type: String,
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub subsection: Option<String>,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct QaPair {
    pub question: String,
    pub answer: String,
}

/// One general-information paragraph plus its ordered Q&A pairs.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxSection {
    pub section: String,
    #[serde(default)]
    pub subsection: Option<String>,
    pub general_info: String,
    #[serde(default)]
    pub qa_pairs: Vec<QaPair>,
}

impl TaxSection {
    /// Expands the section into units: general info first, then each pair in order.
    pub fn into_units(self) -> Result<Vec<KnowledgeUnit>, RagError> {
        if self.section.trim().is_empty() {
            return Err(RagError::InvalidDocument("tax section needs a section name".to_string()));
        }
        if self.general_info.trim().is_empty() {
            return Err(RagError::InvalidDocument(format!(
                "tax section {:?} has no general information",
                self.section
            )));
        }
        let section = Some(self.section.as_str());
        let subsection = self.subsection.as_deref();
        let mut units = Vec::with_capacity(self.qa_pairs.len() + 1);
        units.push(KnowledgeUnit::general_info(
            normalize_whitespace(&self.general_info),
            section,
            subsection,
        ));
        for (i, qa) in self.qa_pairs.iter().enumerate() {
            if qa.question.trim().is_empty() || qa.answer.trim().is_empty() {
                return Err(RagError::InvalidDocument(format!(
                    "Q&A pair {} in section {:?} is missing a question or answer",
                    i + 1,
                    self.section
                )));
            }
            units.push(KnowledgeUnit::qa_pair(
                &normalize_whitespace(&qa.question),
                &normalize_whitespace(&qa.answer),
                section,
                subsection,
            ));
        }
        Ok(units)
    }
}

/// Collapses the hard-wrapped paragraphs typical of curated text into single spaces.
fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Write path into the knowledge store. Errors are returned to the caller, never absorbed.
#[derive(Clone)]
pub struct Ingestor {
    store: Arc<dyn KnowledgeStore>,
}

impl Ingestor {
    pub fn new(store: Arc<dyn KnowledgeStore>) -> Self {
        Self { store }
    }

    pub async fn add_document(&self, doc: NewDocument) -> Result<(), RagError> {
        let unit = build_unit(doc.content, &doc.doc_type, doc.section, doc.subsection, doc.metadata)?;
        info!(
            section = %unit.section,
            subsection = %unit.subsection,
            doc_type = unit.doc_type.as_str(),
            "adding document"
        );
        self.store.insert(std::slice::from_ref(&unit)).await
    }

    pub async fn add_documents_batch(&self, batch: DocumentBatch) -> Result<(), RagError> {
        if batch.contents.is_empty() {
            return Err(RagError::InvalidDocument("batch has no contents".to_string()));
        }
        let units = batch
            .contents
            .into_iter()
            .map(|content| {
                build_unit(
                    content,
                    &batch.doc_type,
                    batch.section.clone(),
                    batch.subsection.clone(),
                    batch.metadata.clone(),
                )
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.store.insert(&units).await?;
        info!(
            count = units.len(),
            section = batch.section.as_deref().unwrap_or_default(),
            subsection = batch.subsection.as_deref().unwrap_or_default(),
            doc_type = %batch.doc_type,
            "added documents in batch"
        );
        Ok(())
    }

    /// Writes the general-info paragraph and every Q&A pair as one batch.
    pub async fn add_tax_section(&self, section: TaxSection) -> Result<usize, RagError> {
        let name = section.section.clone();
        let subsection = section.subsection.clone().unwrap_or_default();
        let units = section.into_units()?;
        self.store.insert(&units).await?;
        info!(
            section = %name,
            subsection = %subsection,
            qa_pairs = units.len() - 1,
            "added tax knowledge section"
        );
        Ok(units.len())
    }
}

fn build_unit(
    content: String,
    doc_type: &str,
    section: Option<String>,
    subsection: Option<String>,
    metadata: Option<Map<String, Value>>,
) -> Result<KnowledgeUnit, RagError> {
    if content.trim().is_empty() {
        return Err(RagError::InvalidDocument("document content is empty".to_string()));
    }
    let mut unit = KnowledgeUnit::new(
        content,
        DocumentType::from_label(doc_type),
        section.as_deref(),
        subsection.as_deref(),
    );
    if let Some(metadata) = metadata {
        let dropped = unit.merge_extra(metadata);
        if !dropped.is_empty() {
            warn!(keys = ?dropped, "ignoring caller metadata that shadows reserved keys");
        }
    }
    Ok(unit)
}

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::error::RagError;
use crate::ingest::{Ingestor, TaxSection};

const BUILTIN_KNOWLEDGE: &str = include_str!("../knowledge/builtin.json");

/// A knowledge file holds one tax section or a list of them.
#[derive(Deserialize)]
#[serde(untagged)]
enum SectionFile {
    Many(Vec<TaxSection>),
    One(TaxSection),
}

impl SectionFile {
    fn into_sections(self) -> Vec<TaxSection> {
        match self {
            SectionFile::Many(sections) => sections,
            SectionFile::One(section) => vec![section],
        }
    }
}

/// The tax sections shipped with the service.
pub fn builtin_sections() -> Result<Vec<TaxSection>, RagError> {
    serde_json::from_str::<SectionFile>(BUILTIN_KNOWLEDGE)
        .map(SectionFile::into_sections)
        .map_err(|e| RagError::Config(format!("built-in knowledge is malformed: {e}")))
}

/// Reads every `*.json` tax-section file under `dir`. Unreadable or malformed files are skipped.
pub fn scan_sections(dir: &Path) -> Vec<(PathBuf, Vec<TaxSection>)> {
    let mut results = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name().into_iter().filter_map(Result::ok) {
        if !entry.file_type().is_file() || !is_json_file(entry.path()) {
            continue;
        }
        let path = entry.path();
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "skipping unreadable knowledge file");
                continue;
            }
        };
        match serde_json::from_str::<SectionFile>(&text) {
            Ok(file) => results.push((path.to_path_buf(), file.into_sections())),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "skipping malformed knowledge file");
            }
        }
    }
    results
}

fn is_json_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

/// Loads the built-in sections and, when given, every section file under `dir`.
///
/// Returns the number of knowledge units written. A store failure aborts the load.
pub async fn load_knowledge(ingestor: &Ingestor, builtin: bool, dir: Option<&Path>) -> Result<usize, RagError> {
    let mut written = 0;
    if builtin {
        info!("loading built-in tax knowledge");
        for section in builtin_sections()? {
            written += ingestor.add_tax_section(section).await?;
        }
    }
    if let Some(dir) = dir {
        for (path, sections) in scan_sections(dir) {
            for section in sections {
                match ingestor.add_tax_section(section).await {
                    Ok(count) => written += count,
                    Err(RagError::InvalidDocument(reason)) => {
                        warn!(path = %path.display(), %reason, "skipping invalid tax section");
                    }
                    Err(err) => return Err(err),
                }
            }
        }
    }
    info!(units = written, "tax knowledge base loaded");
    Ok(written)
}

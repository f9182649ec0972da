use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::RagError;

pub const DEFAULT_PERSONA: &str = "You are a helpful tax-filing assistant for Befiler.com.";

/// Which knowledge store adapter backs the service.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    Qdrant,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "qdrant" => Ok(StoreBackend::Qdrant),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(RagError::Config(format!(
                "unknown store backend {other:?}, expected \"qdrant\" or \"memory\""
            ))),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub bind_addr: String,
    pub store: StoreBackend,
    pub ollama_url: String,
    pub embed_model: String,
    pub chat_model: String,
    pub qdrant_url: String,
    pub collection: String,
    pub distance: String,
    pub top_k: usize,
    pub general_info_limit: usize,
    pub qa_limit: usize,
    pub search_timeout: Duration,
    pub generation_timeout: Duration,
    pub http_timeout: Duration,
    pub seed_knowledge: bool,
    pub knowledge_dir: Option<PathBuf>,
    pub persona: String,
}

impl Config {
    pub fn from_env() -> Result<Self, RagError> {
        // Load .env if present so backend URLs and models work without manual `source .env`.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup; missing keys take defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, RagError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let string = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let secs = |key: &str, default: u64| Duration::from_secs(parsed(&lookup, key, default));

        let store = match lookup("RAG_STORE") {
            Some(raw) => raw.parse()?,
            None => StoreBackend::Qdrant,
        };
        let top_k = parsed(&lookup, "RAG_TOP_K", 8usize);
        if top_k == 0 {
            return Err(RagError::Config("RAG_TOP_K must be at least 1".to_string()));
        }

        Ok(Self {
            bind_addr: string("BIND_ADDR", "0.0.0.0:8080"),
            store,
            ollama_url: trim_url(string("OLLAMA_URL", "http://localhost:11434")),
            embed_model: string("OLLAMA_EMBED_MODEL", "nomic-embed-text"),
            chat_model: string("OLLAMA_CHAT_MODEL", "llama3.1"),
            qdrant_url: trim_url(string("QDRANT_URL", "http://localhost:6333")),
            collection: sanitize_collection_name(&string("QDRANT_COLLECTION", "befiler_tax_knowledge")),
            distance: string("QDRANT_DISTANCE", "Cosine"),
            top_k,
            general_info_limit: parsed(&lookup, "RAG_GENERAL_INFO_LIMIT", 2usize),
            qa_limit: parsed(&lookup, "RAG_QA_LIMIT", 4usize),
            search_timeout: secs("RAG_SEARCH_TIMEOUT_SECS", 10),
            generation_timeout: secs("RAG_GENERATION_TIMEOUT_SECS", 60),
            http_timeout: secs("RAG_HTTP_TIMEOUT_SECS", 120),
            seed_knowledge: lookup("RAG_SEED_KNOWLEDGE")
                .map(|v| parse_flag(&v))
                .unwrap_or(true),
            knowledge_dir: lookup("RAG_KNOWLEDGE_DIR")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            persona: lookup("RAG_PERSONA")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_PERSONA.to_string()),
        })
    }
}

fn parsed<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_flag(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}

fn trim_url(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

fn sanitize_collection_name(name: &str) -> String {
    let mut out = String::new();
    for c in name.chars() {
        if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
            out.push(c);
        } else if c.is_ascii_whitespace() || c == '.' {
            out.push('_');
        }
    }
    if out.is_empty() { "befiler_tax_knowledge".to_string() } else { out }
}

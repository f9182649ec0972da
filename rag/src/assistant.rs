//! Query orchestration: retrieve, assemble, compose, generate.
//!
//! Every failure on this path is logged and turned into [`FALLBACK_MESSAGE`];
//! callers never see an error.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{error, warn};

use crate::config::Config;
use crate::context::assemble;
use crate::error::RagError;
use crate::filter::RetrievalQuery;
use crate::generate::Generator;
use crate::prompt::compose_prompt;
use crate::retrieve::Retriever;

pub const FALLBACK_MESSAGE: &str = "I'm sorry, I'm having trouble processing your request right now. \
Please try rephrasing your question or contact support.";

/// Outcome of one query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Answer {
    /// Generated text, or [`FALLBACK_MESSAGE`].
    pub text: String,
    /// The assembled context handed to the model (empty when nothing matched).
    pub context: String,
    /// Retrieval failed or timed out; generation was not attempted.
    pub degraded: bool,
    /// `text` is the fallback message.
    pub fallback: bool,
}

impl Answer {
    fn fallback(context: String, degraded: bool) -> Self {
        Self {
            text: FALLBACK_MESSAGE.to_string(),
            context,
            degraded,
            fallback: true,
        }
    }
}

pub struct TaxAssistant {
    retriever: Retriever,
    generator: Arc<dyn Generator>,
    persona: String,
    generation_timeout: Duration,
}

impl TaxAssistant {
    pub fn new(
        retriever: Retriever,
        generator: Arc<dyn Generator>,
        persona: impl Into<String>,
        generation_timeout: Duration,
    ) -> Self {
        Self {
            retriever,
            generator,
            persona: persona.into(),
            generation_timeout,
        }
    }

    pub fn from_config(cfg: &Config, retriever: Retriever, generator: Arc<dyn Generator>) -> Self {
        Self::new(retriever, generator, cfg.persona.clone(), cfg.generation_timeout)
    }

    /// Answers a question; returns the fallback message on any backend failure.
    pub async fn answer(&self, query_text: &str, section: Option<&str>, subsection: Option<&str>) -> String {
        self.answer_detailed(query_text, section, subsection).await.text
    }

    pub async fn answer_detailed(
        &self,
        query_text: &str,
        section: Option<&str>,
        subsection: Option<&str>,
    ) -> Answer {
        if query_text.trim().is_empty() {
            warn!("rejecting blank query");
            return Answer::fallback(String::new(), false);
        }

        let query = RetrievalQuery::new(query_text)
            .with_section(section)
            .with_subsection(subsection);

        let context = match self.retriever.retrieve(&query).await {
            Ok(result) => assemble(&result),
            Err(err) => {
                error!(error = %err, "retrieval failed, returning fallback");
                return Answer::fallback(String::new(), true);
            }
        };

        let prompt = compose_prompt(&self.persona, &context, section, subsection, query_text);
        match self.generate(&prompt).await {
            Ok(text) => Answer {
                text,
                context,
                degraded: false,
                fallback: false,
            },
            Err(err) => {
                error!(error = %err, "generation failed, returning fallback");
                Answer::fallback(context, false)
            }
        }
    }

    async fn generate(&self, prompt: &str) -> Result<String, RagError> {
        timeout(self.generation_timeout, self.generator.generate(prompt))
            .await
            .map_err(|_| RagError::Timeout {
                operation: "generation",
                duration: self.generation_timeout,
            })?
    }
}

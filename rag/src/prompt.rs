use serde::Serialize;

use crate::config::DEFAULT_PERSONA;

pub const NO_CONTEXT: &str = "(no relevant context found)";
pub const DEFAULT_SECTION: &str = "General";
pub const DEFAULT_SUBSECTION: &str = "N/A";

const RULES: &str = "Guidelines:
- Answer directly and concisely, in plain language a non-expert can follow.
- Use the context below as your source of facts.
- If the context does not cover the question, say so briefly instead of guessing.
- For complex or personal situations, suggest consulting a tax professional or the official tax authority guidance.";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Renders the instruction block followed by the user's question.
///
/// The question always comes last, behind a `Question:` label, so it cannot
/// be mistaken for instruction text.
pub fn compose_prompt(
    persona: &str,
    context: &str,
    section: Option<&str>,
    subsection: Option<&str>,
    question: &str,
) -> String {
    let persona = if persona.trim().is_empty() { DEFAULT_PERSONA } else { persona.trim() };
    let context = if context.trim().is_empty() { NO_CONTEXT } else { context };
    format!(
        "{persona}\n\n{rules}\n\nContext:\n{context}\n\nCurrent section: {section}\nCurrent subsection: {subsection}\n\nQuestion: {question}",
        rules = RULES,
        section = section.unwrap_or(DEFAULT_SECTION),
        subsection = subsection.unwrap_or(DEFAULT_SUBSECTION),
    )
}

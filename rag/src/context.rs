use crate::document::KnowledgeUnit;
use crate::retrieve::RetrievalResult;

pub const GENERAL_INFO_HEADER: &str = "GENERAL INFORMATION:";
pub const QA_HEADER: &str = "RELEVANT Q&A:";

/// Renders retrieval results as labeled bullet sections; general information always comes first.
///
/// Pure and deterministic. An empty result renders as the empty string.
pub fn assemble(result: &RetrievalResult) -> String {
    let sections: Vec<String> = [
        (GENERAL_INFO_HEADER, &result.general_info),
        (QA_HEADER, &result.qa_pairs),
    ]
    .into_iter()
    .filter(|(_, units)| !units.is_empty())
    .map(|(header, units)| render_section(header, units))
    .collect();
    sections.join("\n\n")
}

fn render_section(header: &str, units: &[KnowledgeUnit]) -> String {
    let blocks: Vec<String> = units
        .iter()
        .map(|unit| format!("- {}", unit.content.trim()))
        .collect();
    format!("{}\n{}", header, blocks.join("\n\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(general: &[&str], qa: &[(&str, &str)]) -> RetrievalResult {
        RetrievalResult {
            general_info: general
                .iter()
                .map(|c| KnowledgeUnit::general_info(*c, Some("Income"), None))
                .collect(),
            qa_pairs: qa
                .iter()
                .map(|(q, a)| KnowledgeUnit::qa_pair(q, a, Some("Income"), None))
                .collect(),
        }
    }

    #[test]
    fn empty_result_renders_nothing() {
        assert_eq!(assemble(&RetrievalResult::default()), "");
    }

    #[test]
    fn renders_both_sections_in_fixed_order() {
        let rendered = assemble(&result(
            &["Salary is taxed by slab.", "Allowances may be exempt."],
            &[("How are bonuses taxed?", "As salary.")],
        ));
        assert_eq!(
            rendered,
            "GENERAL INFORMATION:\n\
             - Salary is taxed by slab.\n\n\
             - Allowances may be exempt.\n\n\
             RELEVANT Q&A:\n\
             - Question: How are bonuses taxed?\n\nAnswer: As salary."
        );
    }

    #[test]
    fn single_section_has_no_trailing_separator() {
        let rendered = assemble(&result(&[], &[("Q1?", "A1."), ("Q2?", "A2.")]));
        assert!(rendered.starts_with(QA_HEADER));
        assert!(!rendered.contains(GENERAL_INFO_HEADER));
        assert!(!rendered.ends_with('\n'));
        assert_eq!(rendered.matches("- Question:").count(), 2);
    }

    #[test]
    fn is_deterministic() {
        let input = result(&["a"], &[("q", "a")]);
        assert_eq!(assemble(&input), assemble(&input.clone()));
    }
}

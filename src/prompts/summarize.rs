//! Abstract summarization prompt.

/// Prompt template for a one-or-two sentence abstract summary
/// Placeholders: {abstract_text}
pub const SUMMARY_PROMPT_TEMPLATE: &str = r#"Summarize the following research paper abstract in one or two concise sentences.
Focus on the core contributions and the main outcomes of the article.

Abstract:
---
{abstract_text}
---"#;

/// Build the summary prompt for an abstract
pub fn build_summary_prompt(abstract_text: &str) -> String {
    SUMMARY_PROMPT_TEMPLATE.replace("{abstract_text}", abstract_text.trim())
}

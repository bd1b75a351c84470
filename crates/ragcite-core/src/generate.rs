//! Answer generator trait and prompt construction.
//!
//! Generators receive the question plus the reranked passages in rank
//! order. Passage `i` (0-based) is presented to the model as `[i + 1]`, so
//! any markers the model emits line up with the citation ids assigned by
//! [`CitationEngine`](crate::citation::CitationEngine).

use anyhow::Result;
use async_trait::async_trait;

pub const SYSTEM_PROMPT: &str = "You are a helpful assistant that answers questions based on provided \
document excerpts. Always use inline citations [1], [2], etc. to reference the source material.";

#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// Short backend name for diagnostics (e.g. `"openai"`).
    fn name(&self) -> &str;

    /// Model identifier, when the backend has one.
    fn model(&self) -> &str {
        ""
    }

    async fn generate(&self, question: &str, passages: &[String]) -> Result<String>;
}

/// Number passages as `[1] ...`, separated by blank lines.
pub fn format_context(passages: &[String]) -> String {
    passages
        .iter()
        .enumerate()
        .map(|(i, p)| format!("[{}] {}", i + 1, p))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// User prompt for chat-style generators.
pub fn build_prompt(question: &str, passages: &[String]) -> String {
    format!(
        "Based on the following document excerpts, please answer the question. \
Use inline citations [1], [2], etc. to reference the relevant excerpts.\n\n\
Question: {}\n\n\
Document excerpts:\n{}\n\n\
Please provide a comprehensive answer with inline citations where appropriate. \
Be precise and only use information from the provided excerpts.",
        question,
        format_context(passages)
    )
}

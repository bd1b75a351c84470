//! Answer generator implementations.
//!
//! - **[`ExtractiveGenerator`]**: offline; answers with the passage sentences
//!   that best overlap the question. The default.
//! - **[`OpenAIGenerator`]**: `POST {url}/chat/completions`. Requires `OPENAI_API_KEY`.
//! - **[`OllamaGenerator`]**: `POST {url}/api/chat` with `stream: false`.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

use ragcite_core::generate::{build_prompt, AnswerGenerator, SYSTEM_PROMPT};

use crate::config::GeneratorConfig;
use crate::http;

const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const DEFAULT_OLLAMA_MODEL: &str = "llama3.1";

/// Sentences taken from the top passages.
const EXTRACTIVE_MAX_SENTENCES: usize = 3;

// ============ Extractive ============

/// Builds an answer from the passages themselves: for each of the first
/// few passages, the sentence sharing the most words with the question,
/// followed by its `[n]` marker.
pub struct ExtractiveGenerator;

#[async_trait]
impl AnswerGenerator for ExtractiveGenerator {
    fn name(&self) -> &str {
        "extractive"
    }

    async fn generate(&self, question: &str, passages: &[String]) -> Result<String> {
        Ok(extract_answer(question, passages))
    }
}

fn words(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > 2)
        .map(|w| w.to_lowercase())
        .collect()
}

fn extract_answer(question: &str, passages: &[String]) -> String {
    let q = words(question);
    let mut parts = Vec::new();

    for (i, passage) in passages.iter().take(EXTRACTIVE_MAX_SENTENCES).enumerate() {
        let mut best: Option<(usize, &str)> = None;
        for sentence in passage
            .split_inclusive(&['.', '!', '?'][..])
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            let overlap = words(sentence).intersection(&q).count();
            if best.map_or(true, |(b, _)| overlap > b) {
                best = Some((overlap, sentence));
            }
        }

        if let Some((overlap, sentence)) = best {
            if overlap == 0 && !parts.is_empty() {
                continue;
            }
            let body = sentence.trim_end_matches(&['.', '!', '?'][..]);
            parts.push(format!("{} [{}].", body, i + 1));
        }
    }

    parts.join(" ")
}

// ============ OpenAI ============

pub struct OpenAIGenerator {
    model: String,
    url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAIGenerator {
    pub fn new(config: &GeneratorConfig) -> Result<Self> {
        Ok(Self {
            model: config
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            url: config
                .url
                .clone()
                .unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string()),
            api_key: http::env_key("openai", "OPENAI_API_KEY")?,
            client: http::client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl AnswerGenerator for OpenAIGenerator {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, question: &str, passages: &[String]) -> Result<String> {
        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": build_prompt(question, passages)},
            ],
        });
        let resp = http::post_json(
            &self.client,
            "openai",
            &format!("{}/chat/completions", self.url.trim_end_matches('/')),
            Some(&self.api_key),
            &body,
        )
        .await?;
        let content = resp
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str);
        non_empty_answer("openai", content)
    }
}

// ============ Ollama ============

pub struct OllamaGenerator {
    model: String,
    url: String,
    client: reqwest::Client,
}

impl OllamaGenerator {
    pub fn new(config: &GeneratorConfig) -> Result<Self> {
        Ok(Self {
            model: config
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_OLLAMA_MODEL.to_string()),
            url: config
                .url
                .clone()
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            client: http::client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl AnswerGenerator for OllamaGenerator {
    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, question: &str, passages: &[String]) -> Result<String> {
        let body = json!({
            "model": self.model,
            "stream": false,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": build_prompt(question, passages)},
            ],
        });
        let resp = http::post_json(
            &self.client,
            "ollama",
            &format!("{}/api/chat", self.url.trim_end_matches('/')),
            None,
            &body,
        )
        .await?;
        let content = resp.pointer("/message/content").and_then(Value::as_str);
        non_empty_answer("ollama", content)
    }
}

fn non_empty_answer(service: &str, content: Option<&str>) -> Result<String> {
    match content.map(str::trim) {
        Some(answer) if !answer.is_empty() => Ok(answer.to_string()),
        _ => Err(http::malformed(service, "response contained no answer text")),
    }
}

/// Create the [`AnswerGenerator`] named by `config.provider`.
pub fn create_generator(config: &GeneratorConfig) -> Result<Arc<dyn AnswerGenerator>> {
    match config.provider.as_str() {
        "extractive" => Ok(Arc::new(ExtractiveGenerator)),
        "openai" => Ok(Arc::new(OpenAIGenerator::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaGenerator::new(config)?)),
        other => bail!("Unknown generator provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_extractive_picks_overlapping_sentences() {
        let passages = vec![
            "Cats are small mammals. Cats have four legs and a tail.".to_string(),
            "Dogs bark loudly. Some dogs have four legs too!".to_string(),
        ];
        let answer = ExtractiveGenerator
            .generate("How many legs do cats have?", &passages)
            .await
            .unwrap();
        assert_eq!(
            answer,
            "Cats have four legs and a tail [1]. Some dogs have four legs too [2]."
        );
    }

    #[tokio::test]
    async fn test_extractive_without_overlap_uses_first_passage() {
        let passages = vec!["Alpha beta.".to_string(), "Gamma delta.".to_string()];
        let answer = ExtractiveGenerator.generate("zzz?", &passages).await.unwrap();
        assert_eq!(answer, "Alpha beta [1].");
    }

    #[tokio::test]
    async fn test_extractive_no_passages() {
        let answer = ExtractiveGenerator.generate("q", &[]).await.unwrap();
        assert_eq!(answer, "");
    }

    #[test]
    fn test_non_empty_answer() {
        assert_eq!(non_empty_answer("x", Some("  hi ")).unwrap(), "hi");
        assert!(non_empty_answer("x", Some("  ")).is_err());
        assert!(non_empty_answer("x", None).is_err());
    }

    #[test]
    fn test_create_generator() {
        let g = create_generator(&GeneratorConfig::default()).unwrap();
        assert_eq!(g.name(), "extractive");

        let ollama = create_generator(&GeneratorConfig {
            provider: "ollama".into(),
            ..GeneratorConfig::default()
        })
        .unwrap();
        assert_eq!(ollama.model(), DEFAULT_OLLAMA_MODEL);

        assert!(create_generator(&GeneratorConfig {
            provider: "bard".into(),
            ..GeneratorConfig::default()
        })
        .is_err());
    }
}

//! Configuration parsing and validation.
//!
//! ragcite is configured via a TOML file (passed with `--config`). Every
//! section and field has a default, so an empty file (or no file at all)
//! yields a fully offline setup: hashing embedder, local rerank scoring and
//! the extractive answer generator.
//!
//! # Example Configuration
//!
//! ```toml
//! [chunking]
//! chunk_size = 1000
//! chunk_overlap = 150
//!
//! [retrieval]
//! top_k = 5
//!
//! [embedding]
//! provider = "openai"
//! model = "text-embedding-3-small"
//! dims = 1536
//!
//! [reranker]
//! provider = "cohere"        # needs COHERE_API_KEY
//!
//! [generator]
//! provider = "openai"        # needs OPENAI_API_KEY
//! model = "gpt-4o-mini"
//!
//! [limits]
//! max_concurrent_embeddings = 5
//! max_concurrent_generations = 3
//! max_attempts = 3
//! base_delay_ms = 1000
//! ```

use anyhow::{bail, Context, Result};
use ragcite_core::chunk::{ChunkerConfig, DEFAULT_SEPARATORS};
use serde::Deserialize;
use std::path::Path;

/// Top-level configuration.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub reranker: RerankerConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default)]
    pub preserve_line_breaks: bool,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            preserve_line_breaks: false,
        }
    }
}

impl ChunkingConfig {
    pub fn to_chunker_config(&self) -> ChunkerConfig {
        ChunkerConfig {
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
            preserve_line_breaks: self.preserve_line_breaks,
        }
    }
}

fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    150
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Candidates fetched from the index per requested result.
    #[serde(default = "default_candidate_multiplier")]
    pub candidate_multiplier: usize,
    #[serde(default = "default_max_citations")]
    pub max_citations: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            candidate_multiplier: default_candidate_multiplier(),
            max_citations: default_max_citations(),
        }
    }
}

fn default_top_k() -> usize {
    10
}
fn default_candidate_multiplier() -> usize {
    2
}
fn default_max_citations() -> usize {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for Ollama (default `http://localhost:11434`) or an
    /// OpenAI-compatible endpoint.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    /// Whether the provider needs `model` and `dims` spelled out.
    fn requires_model(&self) -> bool {
        matches!(self.provider.as_str(), "openai" | "ollama")
    }
}

fn default_embedding_provider() -> String {
    "hash".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct RerankerConfig {
    #[serde(default = "default_reranker_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RerankerConfig {
    fn default() -> Self {
        Self {
            provider: default_reranker_provider(),
            model: None,
            url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_reranker_provider() -> String {
    "none".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeneratorConfig {
    #[serde(default = "default_generator_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_generator_timeout_secs")]
    pub timeout_secs: u64,
    /// Price per 1000 estimated tokens, reported as `estimated_cost`.
    #[serde(default = "default_cost_per_1k_tokens")]
    pub cost_per_1k_tokens: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            provider: default_generator_provider(),
            model: None,
            url: None,
            timeout_secs: default_generator_timeout_secs(),
            cost_per_1k_tokens: default_cost_per_1k_tokens(),
        }
    }
}

fn default_generator_provider() -> String {
    "extractive".to_string()
}
fn default_generator_timeout_secs() -> u64 {
    60
}
fn default_cost_per_1k_tokens() -> f64 {
    0.01
}

/// Admission gate and retry settings for embedder/generator calls.
#[derive(Debug, Deserialize, Clone)]
pub struct LimitsConfig {
    #[serde(default = "default_max_concurrent_embeddings")]
    pub max_concurrent_embeddings: usize,
    #[serde(default = "default_max_concurrent_generations")]
    pub max_concurrent_generations: usize,
    /// Total attempts for a rate-limited call, first try included.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_concurrent_embeddings: default_max_concurrent_embeddings(),
            max_concurrent_generations: default_max_concurrent_generations(),
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

fn default_max_concurrent_embeddings() -> usize {
    5
}
fn default_max_concurrent_generations() -> usize {
    3
}
fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    1000
}

/// Read, parse and validate a TOML config file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

/// Check cross-field constraints that serde defaults cannot express.
pub fn validate(config: &Config) -> Result<()> {
    // Validate chunking
    if config.chunking.chunk_size == 0 {
        bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.chunk_overlap >= config.chunking.chunk_size {
        bail!("chunking.chunk_overlap must be < chunking.chunk_size");
    }

    // Validate retrieval
    if config.retrieval.top_k < 1 {
        bail!("retrieval.top_k must be >= 1");
    }
    if config.retrieval.candidate_multiplier < 1 {
        bail!("retrieval.candidate_multiplier must be >= 1");
    }
    if config.retrieval.max_citations < 1 {
        bail!("retrieval.max_citations must be >= 1");
    }

    // Validate embedding
    match config.embedding.provider.as_str() {
        "disabled" | "hash" | "openai" | "ollama" | "local" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, hash, openai, ollama, or local.",
            other
        ),
    }
    if config.embedding.requires_model() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }
    if config.embedding.batch_size == 0 {
        bail!("embedding.batch_size must be > 0");
    }

    match config.reranker.provider.as_str() {
        "none" | "cohere" | "jina" | "voyage" | "bge" => {}
        other => bail!(
            "Unknown reranker provider: '{}'. Must be none, cohere, jina, voyage, or bge.",
            other
        ),
    }

    match config.generator.provider.as_str() {
        "extractive" | "openai" | "ollama" => {}
        other => bail!(
            "Unknown generator provider: '{}'. Must be extractive, openai, or ollama.",
            other
        ),
    }
    let cost = config.generator.cost_per_1k_tokens;
    if !cost.is_finite() || cost < 0.0 {
        bail!("generator.cost_per_1k_tokens must be a non-negative number");
    }

    // Validate limits
    if config.limits.max_concurrent_embeddings == 0 || config.limits.max_concurrent_generations == 0 {
        bail!("limits.max_concurrent_* must be > 0");
    }
    if config.limits.max_attempts == 0 {
        bail!("limits.max_attempts must be >= 1");
    }

    Ok(())
}

//! CLI command implementations.
//!
//! Each `run_*` function backs one `ragcite` subcommand. With `--json`
//! they print the same `{success, ...}` payloads the pipeline produces;
//! otherwise a human-readable summary.

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde_json::json;

use ragcite_core::chunk::Chunker;
use ragcite_core::citation::format_citations_markdown;

use crate::config::Config;
use crate::pipeline::{respond, Pipeline, QueryResponse};

fn read_document(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read document: {}", path.display()))
}

fn default_title(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Chunk a file and report the chunks plus quality statistics.
pub fn run_chunk(config: &Config, path: &Path, as_json: bool) -> Result<()> {
    let text = read_document(path)?;
    let chunker = Chunker::new(config.chunking.to_chunker_config());
    let source = path.display().to_string();
    let chunks = chunker.chunk(&text, &source, &default_title(path), None);
    let report = chunker.validate(&chunks);

    if as_json {
        return print_json(&json!({
            "chunks": chunks,
            "validation_stats": report,
            "chunking_params": chunker.parameters(),
        }));
    }

    println!("{} chunk(s) from {}", chunks.len(), source);
    for chunk in &chunks {
        println!(
            "  [{}] {:>5} chars  {:<24}  {}",
            chunk.chunk_index,
            chunk.char_count,
            chunk.section,
            chunk.language_tag
        );
    }
    match report.stats() {
        Some(stats) => {
            println!();
            println!("  Estimated tokens:  {}", stats.total_estimated_tokens);
            println!("  Oversized:         {}", stats.oversized_chunks);
            println!("  Undersized:        {}", stats.undersized_chunks);
            println!("  Broken sentences:  {}", stats.broken_sentences);
            println!(
                "  Quality:           {}",
                serde_json::to_value(stats.overall_quality)?
                    .as_str()
                    .unwrap_or_default()
            );
        }
        None => println!("No chunks to validate"),
    }
    Ok(())
}

/// Options for `ragcite ask`.
pub struct AskOptions<'a> {
    pub path: &'a Path,
    pub questions: &'a [String],
    pub top_k: Option<usize>,
    pub title: Option<String>,
    pub source: Option<String>,
    pub as_json: bool,
}

/// Upload a file into a fresh pipeline and answer each question against it.
pub async fn run_ask(config: &Config, opts: AskOptions<'_>) -> Result<()> {
    let text = read_document(opts.path)?;
    let pipeline = Pipeline::from_config(config)?;

    let title = opts.title.unwrap_or_else(|| default_title(opts.path));
    let source = opts
        .source
        .unwrap_or_else(|| opts.path.display().to_string());

    let upload = pipeline.upload(&text, &source, &title).await;
    if opts.as_json {
        print_json(&respond(&upload))?;
    }
    let upload = upload?;
    if !opts.as_json {
        println!(
            "Indexed \"{}\" as {} ({} chunks)",
            title, upload.document_id, upload.chunks_created
        );
    }

    let mut failed = 0usize;
    for question in opts.questions {
        let result = pipeline.query(&upload.document_id, question, opts.top_k).await;
        if opts.as_json {
            print_json(&respond(&result))?;
            if result.is_err() {
                failed += 1;
            }
            continue;
        }
        print_answer(question, &result?);
    }
    if failed > 0 {
        bail!("{} of {} questions failed", failed, opts.questions.len());
    }
    Ok(())
}

fn print_answer(question: &str, response: &QueryResponse) {
    println!();
    println!("Q: {}", question);
    println!("A: {}", response.answer);
    if !response.citations.is_empty() {
        println!();
        println!("{}", format_citations_markdown(&response.citations));
    }
    let v = &response.citation_validation;
    if !v.is_valid {
        println!(
            "warning: citation markers without sources: {:?}",
            v.missing_citations
        );
    }
    println!(
        "({} retrieved, {} reranked, {} cited, ~{} tokens, ~${:.4}, {:.2}s)",
        response.stats.chunks_retrieved,
        response.stats.chunks_reranked,
        response.stats.citations_added,
        response.stats.estimated_tokens,
        response.stats.estimated_cost,
        response.stats.response_time
    );
}

/// Print the configured providers and parameters.
pub async fn run_info(config: &Config, as_json: bool) -> Result<()> {
    let pipeline = Pipeline::from_config(config)?;
    let info = pipeline.system_info().await;

    if as_json {
        return print_json(&serde_json::to_value(&info)?);
    }

    println!("ragcite configuration");
    println!("=====================");
    println!();
    println!(
        "  Chunking:    size {}, overlap {} ({:.1}%)",
        info.chunking.chunk_size, info.chunking.chunk_overlap, info.chunking.overlap_percentage
    );
    println!("  Embedder:    {} ({} dims)", info.embedder.model, info.embedder.dims);
    println!("  Index:       {}", info.vector_index.name);
    println!(
        "  Reranker:    {}{}",
        info.reranker.provider,
        match (&info.reranker.model, info.reranker.credential_configured) {
            (Some(m), true) => format!(" ({})", m),
            (Some(m), false) => format!(" ({}, no API key: local fallback)", m),
            (None, _) => String::new(),
        }
    );
    println!(
        "  Generator:   {}{}  (${} per 1k tokens)",
        info.generator.provider,
        info.generator
            .model
            .as_deref()
            .map(|m| format!(" ({})", m))
            .unwrap_or_default(),
        info.generator.cost_per_1k_tokens
    );
    println!(
        "  Limits:      {} concurrent embeddings, {} concurrent generations, {} attempts",
        config.limits.max_concurrent_embeddings,
        config.limits.max_concurrent_generations,
        config.limits.max_attempts
    );
    Ok(())
}

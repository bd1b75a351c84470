//! # ragcite
//!
//! **Retrieval-augmented question answering with auditable citations.**
//!
//! A document goes in, gets chunked and embedded into a vector index; a
//! question comes in, the closest chunks are retrieved, reranked, handed to
//! an answer generator, and the answer comes back with numbered `[n]`
//! markers that point at the exact chunks it was built from.
//!
//! ## Architecture
//!
//! ```text
//!  upload ─▶ Chunker ─▶ Embedder ─▶ VectorIndex
//!                          ▲             │
//!                          │             ▼
//!  query ──────────────────┘   search (top_k × multiplier)
//!                                        │
//!                          Reranker ◀────┘   (remote → local fallback)
//!                              │
//!                          Generator ─▶ CitationEngine ─▶ response
//! ```
//!
//! The pure pieces (chunking, citation attachment, fallback scoring, the
//! in-memory index and the collaborator traits) live in `ragcite-core`.
//! This crate adds the HTTP providers, configuration, the admission gate
//! and the [`pipeline::Pipeline`] orchestrator.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`gate`] | Bounded concurrency plus rate-limit retry for upstream calls |
//! | [`http`] | JSON-over-HTTP helpers and upstream error mapping |
//! | [`embedding`] | Embedder implementations: hash, OpenAI, Ollama, fastembed |
//! | [`rerank`] | Remote rerank backends: Cohere, Jina, Voyage, BGE |
//! | [`generate`] | Answer generators: extractive, OpenAI, Ollama |
//! | [`pipeline`] | Upload and query orchestration, document table |
//! | [`commands`] | CLI command implementations |

pub mod commands;
pub mod config;
pub mod embedding;
pub mod gate;
pub mod generate;
pub mod http;
pub mod pipeline;
pub mod rerank;

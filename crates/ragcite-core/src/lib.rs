//! # ragcite core
//!
//! Runtime-free logic for ragcite: data models, overlap chunking, reranking
//! with local fallback, the citation engine, and the collaborator traits
//! ([`Embedder`](embedding::Embedder), [`VectorIndex`](store::VectorIndex),
//! [`RerankBackend`](rerank::RerankBackend),
//! [`AnswerGenerator`](generate::AnswerGenerator)).
//!
//! This crate contains no tokio, HTTP or filesystem I/O. Concrete providers
//! and the pipeline orchestrator live in the `ragcite` app crate.

pub mod chunk;
pub mod citation;
pub mod embedding;
pub mod error;
pub mod generate;
pub mod models;
pub mod rerank;
pub mod store;

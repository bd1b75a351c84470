//! Vector index abstraction.
//!
//! The [`VectorIndex`] trait is the seam between the pipeline and whatever
//! stores embeddings (the bundled [`memory::InMemoryIndex`], or an external
//! vector database wrapped by the application).
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::models::{IndexedVector, SearchHit};

/// Exact-match filter over vector payload fields.
///
/// An empty filter matches every record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataFilter {
    fields: Map<String, Value>,
}

impl MetadataFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `key == value`.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Filter on the owning document.
    pub fn doc_id(doc_id: &str) -> Self {
        Self::new().with("doc_id", doc_id)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn matches(&self, metadata: &Map<String, Value>) -> bool {
        self.fields
            .iter()
            .all(|(k, v)| metadata.get(k).is_some_and(|m| m == v))
    }
}

/// Storage backend for chunk embeddings.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`upsert`](VectorIndex::upsert) | Insert or replace vectors by `external_id` |
/// | [`search`](VectorIndex::search) | Nearest neighbours by cosine similarity |
/// | [`delete`](VectorIndex::delete) | Remove every vector matching a filter |
/// | [`len`](VectorIndex::len) | Number of stored vectors |
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Short backend name for diagnostics (e.g. `"memory"`).
    fn name(&self) -> &str;

    /// Insert or replace a batch. Returns `true` when every item was stored.
    async fn upsert(&self, items: &[IndexedVector]) -> Result<bool>;

    /// Return at most `top_k` hits, best first.
    async fn search(
        &self,
        query: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchHit>>;

    /// Remove matching vectors and return how many were removed.
    ///
    /// Implementations refuse an empty filter.
    async fn delete(&self, filter: &MetadataFilter) -> Result<usize>;

    async fn len(&self) -> Result<usize>;
}

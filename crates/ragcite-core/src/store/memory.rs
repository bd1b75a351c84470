//! In-memory [`VectorIndex`] implementation.
//!
//! Uses a `Vec` behind `std::sync::RwLock` for thread safety. Search is
//! brute-force cosine similarity over all stored vectors, which is fine
//! for the per-document workloads the pipeline serves.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::models::{IndexedVector, SearchHit};

use super::{MetadataFilter, VectorIndex};

/// In-memory vector index.
pub struct InMemoryIndex {
    vectors: RwLock<Vec<IndexedVector>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self {
            vectors: RwLock::new(Vec::new()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Vec<IndexedVector>>> {
        self.vectors
            .read()
            .map_err(|_| anyhow::anyhow!("in-memory index lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Vec<IndexedVector>>> {
        self.vectors
            .write()
            .map_err(|_| anyhow::anyhow!("in-memory index lock poisoned"))
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    fn name(&self) -> &str {
        "memory"
    }

    async fn upsert(&self, items: &[IndexedVector]) -> Result<bool> {
        let mut stored = self.write()?;

        let dims = stored
            .first()
            .map(|v| v.embedding.len())
            .or_else(|| items.first().map(|v| v.embedding.len()));
        if let Some(dims) = dims {
            if let Some(bad) = items.iter().find(|v| v.embedding.len() != dims) {
                bail!(
                    "vector for {} has {} dims, index holds {}",
                    bad.external_id,
                    bad.embedding.len(),
                    dims
                );
            }
        }

        for item in items {
            match stored.iter_mut().find(|v| v.external_id == item.external_id) {
                Some(existing) => *existing = item.clone(),
                None => stored.push(item.clone()),
            }
        }
        Ok(true)
    }

    async fn search(
        &self,
        query: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchHit>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let stored = self.read()?;
        let mut hits: Vec<SearchHit> = stored
            .iter()
            .filter(|v| filter.map_or(true, |f| f.matches(&v.metadata)))
            .map(|v| SearchHit {
                id: v.external_id.clone(),
                score: cosine_similarity(query, &v.embedding) as f64,
                text: v.text.clone(),
                metadata: v.metadata.clone(),
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn delete(&self, filter: &MetadataFilter) -> Result<usize> {
        if filter.is_empty() {
            bail!("refusing to delete with an empty filter");
        }
        let mut stored = self.write()?;
        let before = stored.len();
        stored.retain(|v| !filter.matches(&v.metadata));
        Ok(before - stored.len())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }
}

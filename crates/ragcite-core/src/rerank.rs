//! Reranking with remote providers and a deterministic local fallback.
//!
//! A [`Reranker`] wraps at most one [`RerankBackend`] (Cohere, Jina, ...,
//! implemented in the app crate). Whatever the backend does (network error,
//! non-2xx status, malformed payload, missing credential) the caller gets
//! a ranked list back: on failure the reranker scores candidates locally
//! with [`similarity_ratio`] and tags them `"fallback"`.
//!
//! Results are ordered by score descending. Ties keep the original
//! candidate order so output is reproducible.

use std::cmp::Ordering;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::error::UpstreamError;
use crate::models::RankedCandidate;

/// Provider tag for locally scored results.
pub const FALLBACK_PROVIDER: &str = "fallback";

/// Remote providers the app crate knows how to construct.
pub const SUPPORTED_PROVIDERS: [&str; 4] = ["cohere", "jina", "voyage", "bge"];

/// One entry of a remote rerank response.
#[derive(Debug, Clone, PartialEq)]
pub struct RerankHit {
    /// Index into the documents slice sent to the backend.
    pub index: usize,
    pub relevance_score: f64,
}

/// A remote scoring service: sends `(query, documents, top_k)` and returns
/// a permutation with relevance scores.
#[async_trait]
pub trait RerankBackend: Send + Sync {
    /// Provider tag attached to reranked candidates (e.g. `"cohere"`).
    fn name(&self) -> &str;

    fn model(&self) -> &str;

    fn base_url(&self) -> &str;

    fn has_credential(&self) -> bool;

    async fn rerank(&self, query: &str, documents: &[String], top_k: usize) -> Result<Vec<RerankHit>>;
}

/// Static description of a [`Reranker`], as reported by [`Reranker::info`].
#[derive(Debug, Clone, Serialize)]
pub struct RerankerInfo {
    pub provider: String,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub credential_configured: bool,
    pub fallback_scorer: &'static str,
    pub supported_providers: Vec<&'static str>,
}

/// Reorders retrieval candidates by relevance.
pub struct Reranker {
    backend: Option<Box<dyn RerankBackend>>,
}

impl Reranker {
    pub fn new(backend: Box<dyn RerankBackend>) -> Self {
        Self {
            backend: Some(backend),
        }
    }

    /// A reranker without a remote provider; always scores locally.
    pub fn local() -> Self {
        Self { backend: None }
    }

    /// Rerank `candidates` for `query`, returning at most `top_k` of them.
    ///
    /// Never fails. Returns an empty vector when `top_k == 0`, when there
    /// are no candidates or when the query is blank.
    pub async fn rerank(
        &self,
        query: &str,
        candidates: &[RankedCandidate],
        top_k: usize,
    ) -> Vec<RankedCandidate> {
        let k = top_k.min(candidates.len());
        if k == 0 || query.trim().is_empty() {
            return Vec::new();
        }

        let Some(backend) = &self.backend else {
            return fallback_rerank(query, candidates, k);
        };

        let documents: Vec<String> = candidates.iter().map(|c| c.text.clone()).collect();
        let outcome = backend
            .rerank(query, &documents, k)
            .await
            .and_then(|hits| usable_hits(backend.name(), hits, candidates.len()));

        match outcome {
            Ok(hits) => {
                tracing::debug!(provider = backend.name(), results = hits.len(), "reranked remotely");
                apply_scores(candidates, hits, k, backend.name())
            }
            Err(e) => {
                tracing::warn!(
                    provider = backend.name(),
                    error = %format!("{:#}", e),
                    "remote rerank failed; using fallback scorer"
                );
                fallback_rerank(query, candidates, k)
            }
        }
    }

    pub fn info(&self) -> RerankerInfo {
        let (provider, model, base_url, credential_configured) = match &self.backend {
            Some(b) => (
                b.name().to_string(),
                Some(b.model().to_string()),
                Some(b.base_url().to_string()),
                b.has_credential(),
            ),
            None => (FALLBACK_PROVIDER.to_string(), None, None, false),
        };
        RerankerInfo {
            provider,
            model,
            base_url,
            credential_configured,
            fallback_scorer: "lcs-ratio",
            supported_providers: SUPPORTED_PROVIDERS.to_vec(),
        }
    }
}

/// Drop out-of-range and duplicate indices. An empty result for non-empty
/// input counts as a malformed response.
fn usable_hits(service: &str, hits: Vec<RerankHit>, len: usize) -> Result<Vec<RerankHit>> {
    let mut seen = vec![false; len];
    let usable: Vec<RerankHit> = hits
        .into_iter()
        .filter(|h| {
            if h.index >= len || seen[h.index] {
                return false;
            }
            seen[h.index] = true;
            true
        })
        .collect();

    if usable.is_empty() {
        return Err(UpstreamError::Malformed {
            service: service.to_string(),
            message: "no usable results in rerank response".to_string(),
        }
        .into());
    }
    Ok(usable)
}

fn apply_scores(
    candidates: &[RankedCandidate],
    hits: Vec<RerankHit>,
    k: usize,
    provider: &str,
) -> Vec<RankedCandidate> {
    let mut scored: Vec<(usize, f64)> = hits.into_iter().map(|h| (h.index, h.relevance_score)).collect();
    sort_by_score(&mut scored);
    scored
        .into_iter()
        .take(k)
        .map(|(index, score)| {
            let mut cand = candidates[index].clone();
            cand.rerank_score = Some(score);
            cand.rerank_provider = Some(provider.to_string());
            cand
        })
        .collect()
}

/// Score candidates locally with [`similarity_ratio`] and keep the best `top_k`.
pub fn fallback_rerank(query: &str, candidates: &[RankedCandidate], top_k: usize) -> Vec<RankedCandidate> {
    let query = query.to_lowercase();
    let mut scored: Vec<(usize, f64)> = candidates
        .iter()
        .enumerate()
        .map(|(i, c)| (i, similarity_ratio(&query, &c.text.to_lowercase())))
        .collect();
    sort_by_score(&mut scored);

    scored
        .into_iter()
        .take(top_k)
        .map(|(index, score)| {
            let mut cand = candidates[index].clone();
            cand.rerank_score = Some(score);
            cand.rerank_provider = Some(FALLBACK_PROVIDER.to_string());
            cand
        })
        .collect()
}

/// Score descending; equal scores keep ascending index order.
fn sort_by_score(scored: &mut [(usize, f64)]) {
    scored.sort_by(|a, b| match b.1.total_cmp(&a.1) {
        Ordering::Equal => a.0.cmp(&b.0),
        other => other,
    });
}

/// Normalized longest-common-subsequence similarity in `[0, 1]`:
/// `2 * LCS(a, b) / (|a| + |b|)`, over characters. Two empty strings score 1.
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for ca in &a {
        for (j, cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    2.0 * prev[b.len()] as f64 / total as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    fn cand(id: &str, text: &str) -> RankedCandidate {
        let mut metadata = Map::new();
        metadata.insert("department".into(), json!("zoology"));
        RankedCandidate {
            chunk_id: id.into(),
            doc_id: Some("d".into()),
            text: text.into(),
            source: Some("s".into()),
            title: Some("t".into()),
            section: None,
            position: Some(0),
            total_chunks: Some(1),
            similarity_score: 0.5,
            rerank_score: None,
            rerank_provider: None,
            metadata,
        }
    }

    struct Failing;

    #[async_trait]
    impl RerankBackend for Failing {
        fn name(&self) -> &str {
            "cohere"
        }
        fn model(&self) -> &str {
            "rerank-english-v2.0"
        }
        fn base_url(&self) -> &str {
            "https://api.cohere.ai/v1"
        }
        fn has_credential(&self) -> bool {
            false
        }
        async fn rerank(&self, _q: &str, _d: &[String], _k: usize) -> Result<Vec<RerankHit>> {
            Err(UpstreamError::MissingCredential {
                service: "cohere".into(),
                env_var: "COHERE_API_KEY".into(),
            }
            .into())
        }
    }

    struct Fixed(Vec<RerankHit>);

    #[async_trait]
    impl RerankBackend for Fixed {
        fn name(&self) -> &str {
            "jina"
        }
        fn model(&self) -> &str {
            "jina-reranker-v1-base-en"
        }
        fn base_url(&self) -> &str {
            "https://api.jina.ai/v1"
        }
        fn has_credential(&self) -> bool {
            true
        }
        async fn rerank(&self, _q: &str, _d: &[String], _k: usize) -> Result<Vec<RerankHit>> {
            Ok(self.0.clone())
        }
    }

    fn hit(index: usize, relevance_score: f64) -> RerankHit {
        RerankHit {
            index,
            relevance_score,
        }
    }

    #[test]
    fn test_similarity_ratio() {
        assert_eq!(similarity_ratio("", ""), 1.0);
        assert_eq!(similarity_ratio("abc", ""), 0.0);
        assert_eq!(similarity_ratio("abc", "abc"), 1.0);
        // LCS("abcd", "bcf") = 2 → 4 / 7
        assert!((similarity_ratio("abcd", "bcf") - 4.0 / 7.0).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_forced_failure_uses_fallback_deterministically() {
        let reranker = Reranker::new(Box::new(Failing));
        let candidates = vec![cand("a", "A"), cand("b", "B")];

        let first = reranker.rerank("b", &candidates, 2).await;
        let second = reranker.rerank("b", &candidates, 2).await;

        assert_eq!(first.len(), 2);
        assert!(first
            .iter()
            .all(|c| c.rerank_provider.as_deref() == Some(FALLBACK_PROVIDER)));
        assert_eq!(first, second);
        assert_eq!(first[0].chunk_id, "b");
    }

    #[tokio::test]
    async fn test_ties_keep_candidate_order() {
        let reranker = Reranker::local();
        let candidates = vec![cand("x", "zzz"), cand("y", "zzz"), cand("z", "zzz")];
        let out = reranker.rerank("q", &candidates, 3).await;
        let ids: Vec<&str> = out.iter().map(|c| c.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["x", "y", "z"]);
    }

    #[tokio::test]
    async fn test_top_k_is_clamped() {
        let reranker = Reranker::local();
        let candidates = vec![cand("a", "alpha"), cand("b", "beta"), cand("c", "gamma")];
        let out = reranker.rerank("alpha", &candidates, 50).await;
        assert_eq!(out.len(), 3);
        let mut ids: Vec<&str> = out.iter().map(|c| c.chunk_id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 3);
    }

    #[tokio::test]
    async fn test_empty_inputs() {
        let reranker = Reranker::new(Box::new(Failing));
        let candidates = vec![cand("a", "alpha")];
        assert!(reranker.rerank("alpha", &candidates, 0).await.is_empty());
        assert!(reranker.rerank("alpha", &[], 5).await.is_empty());
        assert!(reranker.rerank("   ", &candidates, 5).await.is_empty());
    }

    #[tokio::test]
    async fn test_remote_scores_and_metadata_preserved() {
        let reranker = Reranker::new(Box::new(Fixed(vec![hit(2, 0.9), hit(0, 0.4), hit(1, 0.7)])));
        let candidates = vec![cand("a", "alpha"), cand("b", "beta"), cand("c", "gamma")];
        let out = reranker.rerank("q", &candidates, 2).await;

        let ids: Vec<&str> = out.iter().map(|c| c.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b"]);
        assert_eq!(out[0].rerank_score, Some(0.9));
        assert_eq!(out[0].rerank_provider.as_deref(), Some("jina"));
        assert_eq!(out[0].similarity_score, 0.5);
        assert_eq!(out[0].metadata["department"], json!("zoology"));
    }

    #[tokio::test]
    async fn test_bad_indices_are_filtered() {
        let reranker = Reranker::new(Box::new(Fixed(vec![hit(7, 0.99), hit(1, 0.8), hit(1, 0.3)])));
        let candidates = vec![cand("a", "alpha"), cand("b", "beta")];
        let out = reranker.rerank("q", &candidates, 2).await;
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].chunk_id, "b");
        assert_eq!(out[0].rerank_provider.as_deref(), Some("jina"));
    }

    #[tokio::test]
    async fn test_unusable_response_falls_back() {
        let reranker = Reranker::new(Box::new(Fixed(vec![hit(9, 0.5)])));
        let candidates = vec![cand("a", "alpha"), cand("b", "beta")];
        let out = reranker.rerank("beta", &candidates, 2).await;
        assert_eq!(out.len(), 2);
        assert!(out
            .iter()
            .all(|c| c.rerank_provider.as_deref() == Some(FALLBACK_PROVIDER)));
    }

    #[test]
    fn test_info() {
        let info = Reranker::new(Box::new(Failing)).info();
        assert_eq!(info.provider, "cohere");
        assert_eq!(info.base_url.as_deref(), Some("https://api.cohere.ai/v1"));
        assert!(!info.credential_configured);
        assert_eq!(info.supported_providers.len(), 4);

        let local = Reranker::local().info();
        assert_eq!(local.provider, FALLBACK_PROVIDER);
        assert!(local.model.is_none());
    }
}

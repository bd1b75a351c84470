//! Remote rerank backends.
//!
//! [`HttpRerankBackend`] speaks `POST {base_url}/rerank`; a [`RerankApi`]
//! marker per provider supplies the request body and results key:
//!
//! | Provider | Default base URL | Credential | Request `k` field | Results array |
//! |----------|------------------|------------|-------------------|---------------|
//! | `cohere` | `https://api.cohere.ai/v1` | `COHERE_API_KEY` | `top_n` | `results` |
//! | `jina` | `https://api.jina.ai/v1` | `JINA_API_KEY` | `top_n` | `results` |
//! | `voyage` | `https://api.voyageai.com/v1` | `VOYAGE_API_KEY` | `top_k` | `data` |
//! | `bge` | `https://api.bge-reranker.com/v1` | `BGE_API_KEY` | `top_k` | `results` |
//!
//! A missing credential does not fail construction: the backend reports
//! `has_credential() == false` and every call errors, so the
//! [`Reranker`] degrades to local scoring.

use std::marker::PhantomData;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

use ragcite_core::error::UpstreamError;
use ragcite_core::rerank::{RerankBackend, RerankHit, Reranker};

use crate::config::RerankerConfig;
use crate::http;

/// Request and response shape of one rerank service.
pub trait RerankApi: Send + Sync + 'static {
    const NAME: &'static str;
    const ENV_VAR: &'static str;
    const DEFAULT_URL: &'static str;
    const DEFAULT_MODEL: &'static str;
    /// Key of the `[{index, relevance_score}]` array in the response.
    const RESULTS_KEY: &'static str = "results";

    fn body(model: &str, query: &str, documents: &[String], top_k: usize) -> Value;
}

/// Cohere `v1/rerank`.
pub struct Cohere;

impl RerankApi for Cohere {
    const NAME: &'static str = "cohere";
    const ENV_VAR: &'static str = "COHERE_API_KEY";
    const DEFAULT_URL: &'static str = "https://api.cohere.ai/v1";
    const DEFAULT_MODEL: &'static str = "rerank-english-v2.0";

    fn body(model: &str, query: &str, documents: &[String], top_k: usize) -> Value {
        json!({
            "model": model,
            "query": query,
            "documents": documents,
            "top_n": top_k,
            "return_documents": false,
        })
    }
}

/// Jina AI `v1/rerank`.
pub struct Jina;

impl RerankApi for Jina {
    const NAME: &'static str = "jina";
    const ENV_VAR: &'static str = "JINA_API_KEY";
    const DEFAULT_URL: &'static str = "https://api.jina.ai/v1";
    const DEFAULT_MODEL: &'static str = "jina-reranker-v1-base-en";

    fn body(model: &str, query: &str, documents: &[String], top_k: usize) -> Value {
        json!({ "model": model, "query": query, "documents": documents, "top_n": top_k })
    }
}

/// Voyage AI `v1/rerank`.
pub struct Voyage;

impl RerankApi for Voyage {
    const NAME: &'static str = "voyage";
    const ENV_VAR: &'static str = "VOYAGE_API_KEY";
    const DEFAULT_URL: &'static str = "https://api.voyageai.com/v1";
    const DEFAULT_MODEL: &'static str = "voyage-rerank-lite-1";
    const RESULTS_KEY: &'static str = "data";

    fn body(model: &str, query: &str, documents: &[String], top_k: usize) -> Value {
        json!({ "model": model, "query": query, "documents": documents, "top_k": top_k })
    }
}

/// Hosted BGE reranker.
pub struct Bge;

impl RerankApi for Bge {
    const NAME: &'static str = "bge";
    const ENV_VAR: &'static str = "BGE_API_KEY";
    const DEFAULT_URL: &'static str = "https://api.bge-reranker.com/v1";
    const DEFAULT_MODEL: &'static str = "bge-reranker-base";

    fn body(model: &str, query: &str, documents: &[String], top_k: usize) -> Value {
        json!({ "model": model, "query": query, "documents": documents, "top_k": top_k })
    }
}

pub type CohereBackend = HttpRerankBackend<Cohere>;
pub type JinaBackend = HttpRerankBackend<Jina>;
pub type VoyageBackend = HttpRerankBackend<Voyage>;
pub type BgeBackend = HttpRerankBackend<Bge>;

/// `POST {base_url}/rerank` against the service described by `A`.
pub struct HttpRerankBackend<A> {
    model: String,
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
    _api: PhantomData<fn() -> A>,
}

impl<A: RerankApi> HttpRerankBackend<A> {
    pub fn new(config: &RerankerConfig) -> Result<Self> {
        Ok(Self {
            model: config
                .model
                .clone()
                .unwrap_or_else(|| A::DEFAULT_MODEL.to_string()),
            base_url: config
                .url
                .clone()
                .unwrap_or_else(|| A::DEFAULT_URL.to_string()),
            api_key: http::env_key(A::NAME, A::ENV_VAR).ok(),
            client: http::client(config.timeout_secs)?,
            _api: PhantomData,
        })
    }
}

#[async_trait]
impl<A: RerankApi> RerankBackend for HttpRerankBackend<A> {
    fn name(&self) -> &str {
        A::NAME
    }
    fn model(&self) -> &str {
        &self.model
    }
    fn base_url(&self) -> &str {
        &self.base_url
    }
    fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    async fn rerank(&self, query: &str, documents: &[String], top_k: usize) -> Result<Vec<RerankHit>> {
        let key = self.api_key.as_deref().ok_or_else(|| UpstreamError::MissingCredential {
            service: A::NAME.to_string(),
            env_var: A::ENV_VAR.to_string(),
        })?;
        let url = format!("{}/rerank", self.base_url.trim_end_matches('/'));
        let body = A::body(&self.model, query, documents, top_k);
        let resp = http::post_json(&self.client, A::NAME, &url, Some(key), &body).await?;
        parse_hits(A::NAME, &resp, A::RESULTS_KEY)
    }
}

/// Parse `[{index, relevance_score}, ...]` under `key`.
fn parse_hits(service: &str, json: &Value, key: &str) -> Result<Vec<RerankHit>> {
    let results = json
        .get(key)
        .and_then(|r| r.as_array())
        .ok_or_else(|| http::malformed(service, format!("missing {} array", key)))?;

    results
        .iter()
        .map(|r| {
            let index = r
                .get("index")
                .and_then(Value::as_u64)
                .ok_or_else(|| http::malformed(service, "result without index"))?;
            let relevance_score = r
                .get("relevance_score")
                .and_then(Value::as_f64)
                .ok_or_else(|| http::malformed(service, "result without relevance_score"))?;
            Ok(RerankHit {
                index: index as usize,
                relevance_score,
            })
        })
        .collect()
}

/// Build the [`Reranker`] named by `config.provider`. `"none"` scores locally.
pub fn create_reranker(config: &RerankerConfig) -> Result<Reranker> {
    let backend: Box<dyn RerankBackend> = match config.provider.as_str() {
        "none" => return Ok(Reranker::local()),
        "cohere" => Box::new(CohereBackend::new(config)?),
        "jina" => Box::new(JinaBackend::new(config)?),
        "voyage" => Box::new(VoyageBackend::new(config)?),
        "bge" => Box::new(BgeBackend::new(config)?),
        other => bail!("Unknown reranker provider: {}", other),
    };
    if !backend.has_credential() {
        tracing::warn!(
            provider = backend.name(),
            "no API key configured; reranking will use the local fallback scorer"
        );
    }
    Ok(Reranker::new(backend))
}

//! Pipeline orchestrator.
//!
//! Owns the per-document table and sequences the collaborators:
//!
//! ```text
//! ingest:  UPLOADED → CHUNKED → EMBEDDED → INDEXED
//! query:   EMBED_QUERY → SEARCH → RERANK → GENERATE → CITE → RESPOND
//! ```
//!
//! A document becomes visible to queries only once it reaches `INDEXED`.
//! If ingest fails after vectors may have been written, the document's
//! vectors are removed (best effort) before the error is returned.
//!
//! Every failure is a [`StageError`] naming the stage that failed; use
//! [`respond`] to turn a result into the `{success, ...}` JSON payload.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use ragcite_core::chunk::{Chunker, ChunkingParameters, ValidationReport, UNTITLED};
use ragcite_core::citation::{CitationEngine, CitationStats, CitationValidation};
use ragcite_core::embedding::Embedder;
use ragcite_core::error::RagError;
use ragcite_core::generate::AnswerGenerator;
use ragcite_core::models::{Citation, Document, IndexedVector, RankedCandidate};
use ragcite_core::rerank::{Reranker, RerankerInfo};
use ragcite_core::store::memory::InMemoryIndex;
use ragcite_core::store::{MetadataFilter, VectorIndex};

use crate::config::{Config, RetrievalConfig};
use crate::embedding::create_embedder;
use crate::gate::Gate;
use crate::generate::create_generator;
use crate::rerank::create_reranker;

pub const NO_ANSWER: &str =
    "I couldn't find relevant information to answer your question in the document.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestStage {
    Uploaded,
    Chunked,
    Embedded,
    Indexed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryStage {
    EmbedQuery,
    Search,
    Rerank,
    Generate,
    Cite,
    Respond,
}

/// The stage at which a request failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Stage {
    Ingest(IngestStage),
    Query(QueryStage),
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Ingest(IngestStage::Uploaded) => "uploaded",
            Stage::Ingest(IngestStage::Chunked) => "chunked",
            Stage::Ingest(IngestStage::Embedded) => "embedded",
            Stage::Ingest(IngestStage::Indexed) => "indexed",
            Stage::Query(QueryStage::EmbedQuery) => "embed_query",
            Stage::Query(QueryStage::Search) => "search",
            Stage::Query(QueryStage::Rerank) => "rerank",
            Stage::Query(QueryStage::Generate) => "generate",
            Stage::Query(QueryStage::Cite) => "cite",
            Stage::Query(QueryStage::Respond) => "respond",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub struct StageError {
    pub stage: Stage,
    pub error: RagError,
}

impl StageError {
    fn ingest(stage: IngestStage, error: RagError) -> Self {
        Self {
            stage: Stage::Ingest(stage),
            error,
        }
    }

    fn query(stage: QueryStage, error: RagError) -> Self {
        Self {
            stage: Stage::Query(stage),
            error,
        }
    }
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} stage failed: {}", self.stage, self.error)
    }
}

impl std::error::Error for StageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadResponse {
    pub document_id: String,
    pub chunks_created: usize,
    pub validation_stats: ValidationReport,
    pub chunking_params: ChunkingParameters,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryStats {
    /// Seconds from request start to response.
    pub response_time: f64,
    /// Question words plus context words.
    pub estimated_tokens: usize,
    /// `estimated_tokens / 1000 * generator.cost_per_1k_tokens`.
    pub estimated_cost: f64,
    pub chunks_retrieved: usize,
    pub chunks_reranked: usize,
    pub citations_added: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub answer: String,
    pub citations: Vec<Citation>,
    pub citation_validation: CitationValidation,
    pub citation_stats: CitationStats,
    pub stats: QueryStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentInfo {
    pub id: String,
    pub title: String,
    pub source: String,
    pub upload_time: DateTime<Utc>,
    pub word_count: usize,
    pub char_count: usize,
    pub content_hash: String,
    pub chunks_count: usize,
    pub chunking_params: ChunkingParameters,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentSummary {
    pub id: String,
    pub title: String,
    pub source: String,
    pub upload_time: DateTime<Utc>,
    pub chunks_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    pub document_id: String,
    pub vectors_removed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemInfo {
    pub vector_index: IndexInfo,
    pub embedder: EmbedderInfo,
    pub generator: GeneratorInfo,
    pub chunking: ChunkingParameters,
    pub reranker: RerankerInfo,
    pub documents_uploaded: usize,
    pub total_chunks: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexInfo {
    pub name: String,
    pub vectors: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedderInfo {
    pub model: String,
    pub dims: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneratorInfo {
    pub provider: String,
    /// `None` for generators without a model (extractive).
    pub model: Option<String>,
    pub cost_per_1k_tokens: f64,
}

/// Render a pipeline result as `{"success": true, ...fields}` or
/// `{"success": false, "error", "stage", "code"}`.
pub fn respond<T: Serialize>(result: &Result<T, StageError>) -> Value {
    match result {
        Ok(body) => {
            let mut value = serde_json::to_value(body).unwrap_or_else(|_| json!({}));
            if let Value::Object(map) = &mut value {
                map.insert("success".into(), Value::Bool(true));
            }
            value
        }
        Err(e) => json!({
            "success": false,
            "error": e.error.to_string(),
            "stage": e.stage.as_str(),
            "code": e.error.code(),
        }),
    }
}

struct DocumentRecord {
    document: Document,
    chunk_count: usize,
}

/// The retrieval-and-attribution pipeline.
pub struct Pipeline {
    chunker: Chunker,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    reranker: Reranker,
    generator: Arc<dyn AnswerGenerator>,
    citations: CitationEngine,
    embed_gate: Gate,
    generate_gate: Gate,
    retrieval: RetrievalConfig,
    cost_per_1k_tokens: f64,
    documents: RwLock<HashMap<String, DocumentRecord>>,
}

impl Pipeline {
    /// Assemble a pipeline from explicit collaborators.
    pub fn new(
        config: &Config,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        reranker: Reranker,
        generator: Arc<dyn AnswerGenerator>,
    ) -> Self {
        let limits = &config.limits;
        let base_delay = Duration::from_millis(limits.base_delay_ms);
        Self {
            chunker: Chunker::new(config.chunking.to_chunker_config()),
            embedder,
            index,
            reranker,
            generator,
            citations: CitationEngine::new(config.retrieval.max_citations),
            embed_gate: Gate::new(
                "embedding",
                limits.max_concurrent_embeddings,
                limits.max_attempts,
                base_delay,
            ),
            generate_gate: Gate::new(
                "generation",
                limits.max_concurrent_generations,
                limits.max_attempts,
                base_delay,
            ),
            retrieval: config.retrieval.clone(),
            cost_per_1k_tokens: config.generator.cost_per_1k_tokens,
            documents: RwLock::new(HashMap::new()),
        }
    }

    /// Build every collaborator from configuration, with an in-memory index.
    pub fn from_config(config: &Config) -> Result<Self> {
        let embedder = create_embedder(&config.embedding)?;
        let reranker = create_reranker(&config.reranker)?;
        let generator = create_generator(&config.generator)?;
        Ok(Self::new(
            config,
            embedder,
            Arc::new(InMemoryIndex::new()),
            reranker,
            generator,
        ))
    }

    fn docs_read(&self) -> RwLockReadGuard<'_, HashMap<String, DocumentRecord>> {
        self.documents.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn docs_write(&self) -> RwLockWriteGuard<'_, HashMap<String, DocumentRecord>> {
        self.documents.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Ingest a document: chunk, embed, index. Returns the new document id.
    pub async fn upload(
        &self,
        text: &str,
        source: &str,
        title: &str,
    ) -> Result<UploadResponse, StageError> {
        use IngestStage::*;

        if text.trim().is_empty() {
            return Err(StageError::ingest(
                Uploaded,
                RagError::InvalidInput("Document text is empty".into()),
            ));
        }

        let doc_id = uuid::Uuid::new_v4().to_string();
        let title = if title.trim().is_empty() { UNTITLED } else { title };
        let document = Document {
            id: doc_id.clone(),
            title: title.to_string(),
            source: source.to_string(),
            raw_text: text.to_string(),
            upload_time: Utc::now(),
            word_count: text.split_whitespace().count(),
            char_count: text.chars().count(),
            content_hash: format!("{:x}", Sha256::digest(text.as_bytes())),
        };

        let chunks = self.chunker.chunk(text, source, title, Some(&doc_id));
        if chunks.is_empty() {
            return Err(StageError::ingest(
                Chunked,
                RagError::InvalidInput("Failed to create chunks from document".into()),
            ));
        }
        let validation_stats = self.chunker.validate(&chunks);
        tracing::info!(doc_id = %doc_id, chunks = chunks.len(), "chunked");

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self
            .embed_gate
            .run(|| self.embedder.embed(&texts))
            .await
            .map_err(|e| StageError::ingest(Embedded, e))?;
        if vectors.len() != chunks.len() {
            return Err(StageError::ingest(
                Embedded,
                RagError::UpstreamFatal(format!(
                    "embedder returned {} vectors for {} chunks",
                    vectors.len(),
                    chunks.len()
                )),
            ));
        }
        tracing::info!(doc_id = %doc_id, vectors = vectors.len(), "embedded");

        let items: Vec<IndexedVector> = chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, embedding)| IndexedVector {
                external_id: chunk.chunk_id.clone(),
                embedding,
                text: chunk.text.clone(),
                metadata: chunk.index_metadata(),
            })
            .collect();

        let stored = match self.index.upsert(&items).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(RagError::Index("Failed to store vectors in index".into())),
            Err(e) => Err(RagError::Index(format!("{:#}", e))),
        };
        if let Err(e) = stored {
            self.remove_vectors(&doc_id).await;
            return Err(StageError::ingest(Indexed, e));
        }

        let response = UploadResponse {
            document_id: doc_id.clone(),
            chunks_created: chunks.len(),
            validation_stats,
            chunking_params: self.chunker.parameters(),
        };
        self.docs_write().insert(
            doc_id.clone(),
            DocumentRecord {
                document,
                chunk_count: chunks.len(),
            },
        );
        tracing::info!(doc_id = %doc_id, "indexed");
        Ok(response)
    }

    async fn remove_vectors(&self, doc_id: &str) {
        if let Err(e) = self.index.delete(&MetadataFilter::doc_id(doc_id)).await {
            tracing::warn!(doc_id, error = %format!("{:#}", e), "failed to clean up partial index state");
        }
    }

    /// Answer `question` from an indexed document.
    ///
    /// `top_k` defaults to `retrieval.top_k`.
    pub async fn query(
        &self,
        document_id: &str,
        question: &str,
        top_k: Option<usize>,
    ) -> Result<QueryResponse, StageError> {
        use QueryStage::*;

        let start = Instant::now();
        let top_k = top_k.unwrap_or(self.retrieval.top_k);

        if question.trim().is_empty() {
            return Err(StageError::query(
                EmbedQuery,
                RagError::InvalidInput("Question is empty".into()),
            ));
        }
        if top_k == 0 {
            return Err(StageError::query(
                EmbedQuery,
                RagError::InvalidInput("top_k must be >= 1".into()),
            ));
        }
        if !self.docs_read().contains_key(document_id) {
            return Err(StageError::query(
                EmbedQuery,
                RagError::DocumentNotFound(document_id.to_string()),
            ));
        }

        let query_vector = self
            .embed_gate
            .run(|| self.embedder.embed_query(question))
            .await
            .map_err(|e| StageError::query(EmbedQuery, e))?;

        let filter = MetadataFilter::doc_id(document_id);
        let hits = self
            .index
            .search(
                &query_vector,
                top_k.saturating_mul(self.retrieval.candidate_multiplier),
                Some(&filter),
            )
            .await
            .map_err(|e| StageError::query(Search, RagError::Index(format!("{:#}", e))))?;
        tracing::debug!(document_id, hits = hits.len(), "searched");

        if hits.is_empty() {
            return Ok(QueryResponse {
                answer: NO_ANSWER.to_string(),
                citations: Vec::new(),
                citation_validation: self.citations.validate(NO_ANSWER, &[]),
                citation_stats: self.citations.stats(&[]),
                stats: QueryStats {
                    response_time: start.elapsed().as_secs_f64(),
                    estimated_tokens: 0,
                    estimated_cost: 0.0,
                    chunks_retrieved: 0,
                    chunks_reranked: 0,
                    citations_added: 0,
                },
            });
        }

        let chunks_retrieved = hits.len();
        let candidates: Vec<RankedCandidate> = hits.into_iter().map(RankedCandidate::from_hit).collect();
        let ranked = self.reranker.rerank(question, &candidates, top_k).await;

        let passages: Vec<String> = ranked.iter().map(|c| c.text.clone()).collect();
        let answer = self
            .generate_gate
            .run(|| self.generator.generate(question, &passages))
            .await
            .map_err(|e| StageError::query(Generate, e))?;

        let (annotated, citations) = self.citations.attach(&answer, &ranked);
        let citation_validation = self.citations.validate(&annotated, &citations);

        let estimated_tokens = question.split_whitespace().count()
            + passages
                .iter()
                .map(|p| p.split_whitespace().count())
                .sum::<usize>();

        tracing::info!(
            document_id,
            retrieved = chunks_retrieved,
            reranked = ranked.len(),
            citations = citations.len(),
            "answered"
        );

        Ok(QueryResponse {
            answer: annotated,
            stats: QueryStats {
                response_time: start.elapsed().as_secs_f64(),
                estimated_tokens,
                estimated_cost: estimated_tokens as f64 / 1000.0 * self.cost_per_1k_tokens,
                chunks_retrieved,
                chunks_reranked: ranked.len(),
                citations_added: citations.len(),
            },
            citation_stats: self.citations.stats(&citations),
            citations,
            citation_validation,
        })
    }

    /// Remove a document and its vectors.
    ///
    /// The record is dropped only after the index delete succeeds, so a
    /// failed delete can be retried.
    pub async fn delete(&self, document_id: &str) -> Result<DeleteResponse, RagError> {
        if !self.docs_read().contains_key(document_id) {
            return Err(RagError::DocumentNotFound(document_id.to_string()));
        }
        let vectors_removed = self
            .index
            .delete(&MetadataFilter::doc_id(document_id))
            .await
            .map_err(|e| RagError::Index(format!("{:#}", e)))?;
        self.docs_write().remove(document_id);
        tracing::info!(document_id, vectors_removed, "deleted");
        Ok(DeleteResponse {
            document_id: document_id.to_string(),
            vectors_removed,
        })
    }

    pub fn document_info(&self, document_id: &str) -> Option<DocumentInfo> {
        let docs = self.docs_read();
        let record = docs.get(document_id)?;
        let doc = &record.document;
        Some(DocumentInfo {
            id: doc.id.clone(),
            title: doc.title.clone(),
            source: doc.source.clone(),
            upload_time: doc.upload_time,
            word_count: doc.word_count,
            char_count: doc.char_count,
            content_hash: doc.content_hash.clone(),
            chunks_count: record.chunk_count,
            chunking_params: self.chunker.parameters(),
        })
    }

    /// Indexed documents, oldest first.
    pub fn list_documents(&self) -> Vec<DocumentSummary> {
        let docs = self.docs_read();
        let mut out: Vec<DocumentSummary> = docs
            .values()
            .map(|r| DocumentSummary {
                id: r.document.id.clone(),
                title: r.document.title.clone(),
                source: r.document.source.clone(),
                upload_time: r.document.upload_time,
                chunks_count: r.chunk_count,
            })
            .collect();
        out.sort_by(|a, b| a.upload_time.cmp(&b.upload_time).then_with(|| a.id.cmp(&b.id)));
        out
    }

    pub async fn system_info(&self) -> SystemInfo {
        let vectors = match self.index.len().await {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(error = %format!("{:#}", e), "could not count index vectors");
                0
            }
        };
        let (documents_uploaded, total_chunks) = {
            let docs = self.docs_read();
            (docs.len(), docs.values().map(|r| r.chunk_count).sum())
        };
        SystemInfo {
            vector_index: IndexInfo {
                name: self.index.name().to_string(),
                vectors,
            },
            embedder: EmbedderInfo {
                model: self.embedder.model_name().to_string(),
                dims: self.embedder.dims(),
            },
            generator: GeneratorInfo {
                provider: self.generator.name().to_string(),
                model: Some(self.generator.model())
                    .filter(|m| !m.is_empty())
                    .map(str::to_string),
                cost_per_1k_tokens: self.cost_per_1k_tokens,
            },
            chunking: self.chunker.parameters(),
            reranker: self.reranker.info(),
            documents_uploaded,
            total_chunks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline() -> Pipeline {
        Pipeline::from_config(&Config::default()).unwrap()
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(Stage::Ingest(IngestStage::Embedded).to_string(), "embedded");
        assert_eq!(Stage::Query(QueryStage::EmbedQuery).as_str(), "embed_query");
    }

    #[test]
    fn test_respond_error_shape() {
        let result: Result<UploadResponse, StageError> = Err(StageError::ingest(
            IngestStage::Uploaded,
            RagError::InvalidInput("Document text is empty".into()),
        ));
        let value = respond(&result);
        assert_eq!(value["success"], json!(false));
        assert_eq!(value["error"], json!("Document text is empty"));
        assert_eq!(value["stage"], json!("uploaded"));
        assert_eq!(value["code"], json!("invalid_input"));
    }

    #[tokio::test]
    async fn test_upload_then_query_offline() {
        let pipeline = offline();
        let text = "The warranty covers parts for two years. Labor is covered for ninety days. \
                    Shipping damage must be reported within a week.";
        let upload = pipeline.upload(text, "warranty.txt", "Warranty").await.unwrap();
        assert_eq!(upload.chunks_created, 1);
        assert!(!upload.validation_stats.is_empty());

        let value = respond(&Ok::<_, StageError>(upload.clone()));
        assert_eq!(value["success"], json!(true));
        assert_eq!(value["document_id"], json!(upload.document_id));

        let answer = pipeline
            .query(&upload.document_id, "How long are parts covered?", Some(3))
            .await
            .unwrap();
        assert_eq!(answer.stats.chunks_retrieved, 1);
        assert_eq!(answer.citations.len(), 1);
        assert!(answer.answer.contains("[1]"));
        assert!(answer.citation_validation.is_valid);
        assert_eq!(answer.citations[0].source, "warranty.txt");

        assert_eq!(answer.citation_stats.total_citations, 1);
        assert_eq!(answer.citation_stats.unique_sources, 1);
        let tokens = answer.stats.estimated_tokens as f64;
        assert!((answer.stats.estimated_cost - tokens / 1000.0 * 0.01).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_cost_uses_configured_rate() {
        let mut config = Config::default();
        config.generator.cost_per_1k_tokens = 2.0;
        let pipeline = Pipeline::from_config(&config).unwrap();
        let up = pipeline
            .upload("Tea is brewed from leaves. Coffee is brewed from beans.", "d.txt", "Drinks")
            .await
            .unwrap();

        let answer = pipeline.query(&up.document_id, "What is tea?", None).await.unwrap();
        let expected = answer.stats.estimated_tokens as f64 * 0.002;
        assert!(answer.stats.estimated_tokens > 0);
        assert!((answer.stats.estimated_cost - expected).abs() < 1e-9);

        let info = pipeline.system_info().await;
        assert_eq!(info.generator.provider, "extractive");
        assert_eq!(info.generator.model, None);
        assert_eq!(info.generator.cost_per_1k_tokens, 2.0);
    }

    #[tokio::test]
    async fn test_blank_title_gets_placeholder() {
        let pipeline = offline();
        let up = pipeline.upload("Body text only.", "notes.txt", "  ").await.unwrap();

        let info = pipeline.document_info(&up.document_id).unwrap();
        assert_eq!(info.title, "Untitled Document");
        assert_eq!(pipeline.list_documents()[0].title, "Untitled Document");
    }

    #[tokio::test]
    async fn test_blank_upload_is_rejected_at_upload_stage() {
        let pipeline = offline();
        let err = pipeline.upload("   \n\t ", "s", "t").await.unwrap_err();
        assert_eq!(err.stage, Stage::Ingest(IngestStage::Uploaded));
        assert!(pipeline.list_documents().is_empty());
    }

    #[tokio::test]
    async fn test_control_only_upload_fails_chunking() {
        let pipeline = offline();
        let err = pipeline.upload("\u{0001}\u{0002}", "s", "t").await.unwrap_err();
        assert_eq!(err.stage, Stage::Ingest(IngestStage::Chunked));
        assert_eq!(err.error.to_string(), "Failed to create chunks from document");
    }

    #[tokio::test]
    async fn test_query_validation() {
        let pipeline = offline();
        let up = pipeline.upload("Some text here.", "s", "t").await.unwrap();

        let err = pipeline.query("missing", "q?", None).await.unwrap_err();
        assert!(matches!(err.error, RagError::DocumentNotFound(_)));

        let err = pipeline.query(&up.document_id, "  ", None).await.unwrap_err();
        assert!(matches!(err.error, RagError::InvalidInput(_)));

        let err = pipeline.query(&up.document_id, "q?", Some(0)).await.unwrap_err();
        assert!(matches!(err.error, RagError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_info_list_and_delete() {
        let pipeline = offline();
        let a = pipeline.upload("First document.", "a.txt", "A").await.unwrap();
        let b = pipeline.upload("Second document.", "b.txt", "B").await.unwrap();

        let listed = pipeline.list_documents();
        assert_eq!(listed.len(), 2);

        let info = pipeline.document_info(&a.document_id).unwrap();
        assert_eq!(info.title, "A");
        assert_eq!(info.word_count, 2);
        assert_eq!(info.chunks_count, 1);
        assert_eq!(info.content_hash.len(), 64);

        let system = pipeline.system_info().await;
        assert_eq!(system.documents_uploaded, 2);
        assert_eq!(system.total_chunks, 2);
        assert_eq!(system.vector_index.vectors, 2);
        assert_eq!(system.vector_index.name, "memory");
        assert_eq!(system.reranker.provider, "fallback");

        let removed = pipeline.delete(&b.document_id).await.unwrap();
        assert_eq!(removed.vectors_removed, 1);
        assert!(pipeline.document_info(&b.document_id).is_none());
        assert!(matches!(
            pipeline.delete(&b.document_id).await,
            Err(RagError::DocumentNotFound(_))
        ));
        assert_eq!(pipeline.system_info().await.vector_index.vectors, 1);
    }
}

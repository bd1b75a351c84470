//! Core data types shared by the chunker, reranker, citation engine and
//! the pipeline orchestrator.
//!
//! | Type | Lifetime |
//! |------|----------|
//! | [`Document`] | created on upload, immutable, dropped on delete |
//! | [`Chunk`] | created in one batch per document, never mutated |
//! | [`IndexedVector`] | owned by the [`VectorIndex`](crate::store::VectorIndex) |
//! | [`RankedCandidate`] | per query, never persisted |
//! | [`Citation`] | per query, discarded after the response |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A document accepted by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Fresh UUID per upload.
    pub id: String,
    pub title: String,
    pub source: String,
    /// Text exactly as uploaded (before normalization).
    pub raw_text: String,
    pub upload_time: DateTime<Utc>,
    pub word_count: usize,
    pub char_count: usize,
    /// SHA-256 hex of `raw_text`. Informational only, never used for dedup.
    pub content_hash: String,
}

/// Coarse script-based language tag attached to every chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Language {
    English,
    NonEnglish,
    Chinese,
    Japanese,
    Korean,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::English => "english",
            Language::NonEnglish => "non-english",
            Language::Chinese => "chinese",
            Language::Japanese => "japanese",
            Language::Korean => "korean",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A bounded, overlap-linked segment of a document's normalized text.
///
/// `text` is always the exact slice `normalized[start_offset..end_offset]`
/// (character offsets), so dropping the first `chunk_overlap` characters of
/// every chunk after the first and concatenating reproduces the normalized
/// document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// `"{doc_id}_chunk_{chunk_index}"`.
    pub chunk_id: String,
    pub doc_id: String,
    pub chunk_index: usize,
    pub total_chunks: usize,
    /// Always equal to `chunk_index`.
    pub position: usize,
    pub text: String,
    pub source: String,
    pub title: String,
    pub section: String,
    pub word_count: usize,
    pub char_count: usize,
    /// `char_count / 4`.
    pub estimated_token_count: usize,
    pub has_numbers: bool,
    pub has_questions: bool,
    pub has_lists: bool,
    pub language_tag: Language,
    /// Character offset of the first character in the normalized text.
    pub start_offset: usize,
    /// Character offset one past the last character.
    pub end_offset: usize,
    /// SHA-256 hex of `text`.
    pub hash: String,
}

impl Chunk {
    /// Payload stored next to the chunk's embedding in the vector index.
    pub fn index_metadata(&self) -> Map<String, Value> {
        let mut meta = Map::new();
        meta.insert("doc_id".into(), Value::from(self.doc_id.clone()));
        meta.insert("chunk_id".into(), Value::from(self.chunk_id.clone()));
        meta.insert("source".into(), Value::from(self.source.clone()));
        meta.insert("title".into(), Value::from(self.title.clone()));
        meta.insert("section".into(), Value::from(self.section.clone()));
        meta.insert("position".into(), Value::from(self.position));
        meta.insert("total_chunks".into(), Value::from(self.total_chunks));
        meta.insert("language".into(), Value::from(self.language_tag.as_str()));
        meta
    }
}

/// The persisted join between a chunk and its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedVector {
    /// The chunk id.
    pub external_id: String,
    pub embedding: Vec<f32>,
    pub text: String,
    pub metadata: Map<String, Value>,
}

/// A nearest-neighbour hit returned by [`VectorIndex::search`](crate::store::VectorIndex::search).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub score: f64,
    pub text: String,
    pub metadata: Map<String, Value>,
}

/// A retrieval candidate flowing through rerank → generate → cite.
///
/// Well-known payload keys are lifted into typed fields; everything else
/// stays in `metadata` untouched so reranking never drops fields it does
/// not understand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedCandidate {
    pub chunk_id: String,
    pub doc_id: Option<String>,
    pub text: String,
    pub source: Option<String>,
    pub title: Option<String>,
    pub section: Option<String>,
    pub position: Option<usize>,
    pub total_chunks: Option<usize>,
    pub similarity_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rerank_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rerank_provider: Option<String>,
    /// Payload keys not lifted into the fields above.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

const LIFTED_KEYS: [&str; 7] = [
    "doc_id",
    "chunk_id",
    "source",
    "title",
    "section",
    "position",
    "total_chunks",
];

impl RankedCandidate {
    /// Build a candidate from a vector-index hit.
    pub fn from_hit(hit: SearchHit) -> Self {
        let SearchHit {
            id,
            score,
            text,
            mut metadata,
        } = hit;

        let str_field = |m: &Map<String, Value>, key: &str| {
            m.get(key).and_then(Value::as_str).map(str::to_string)
        };
        let usize_field =
            |m: &Map<String, Value>, key: &str| m.get(key).and_then(Value::as_u64).map(|v| v as usize);

        let chunk_id = str_field(&metadata, "chunk_id").unwrap_or(id);
        let doc_id = str_field(&metadata, "doc_id");
        let source = str_field(&metadata, "source");
        let title = str_field(&metadata, "title");
        let section = str_field(&metadata, "section");
        let position = usize_field(&metadata, "position");
        let total_chunks = usize_field(&metadata, "total_chunks");

        for key in LIFTED_KEYS {
            metadata.remove(key);
        }

        Self {
            chunk_id,
            doc_id,
            text,
            source,
            title,
            section,
            position,
            total_chunks,
            similarity_score: score,
            rerank_score: None,
            rerank_provider: None,
            metadata,
        }
    }

    /// The score used for citation ranking: rerank score when present.
    pub fn effective_score(&self) -> f64 {
        self.rerank_score.unwrap_or(self.similarity_score)
    }
}

impl From<&Chunk> for RankedCandidate {
    fn from(chunk: &Chunk) -> Self {
        Self {
            chunk_id: chunk.chunk_id.clone(),
            doc_id: Some(chunk.doc_id.clone()),
            text: chunk.text.clone(),
            source: Some(chunk.source.clone()),
            title: Some(chunk.title.clone()),
            section: Some(chunk.section.clone()),
            position: Some(chunk.position),
            total_chunks: Some(chunk.total_chunks),
            similarity_score: 0.0,
            rerank_score: None,
            rerank_provider: None,
            metadata: Map::new(),
        }
    }
}

/// A numbered source reference attached to an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    /// 1-based, contiguous within one answer.
    pub id: usize,
    pub text: String,
    pub source: String,
    pub title: String,
    pub section: String,
    pub position_label: String,
    pub chunk_id: String,
    pub score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_hit_lifts_known_keys_and_keeps_the_rest() {
        let metadata = json!({
            "doc_id": "d1",
            "chunk_id": "d1_chunk_3",
            "source": "handbook.pdf",
            "title": "Handbook",
            "section": "Benefits",
            "position": 3,
            "total_chunks": 9,
            "department": "hr",
        });
        let hit = SearchHit {
            id: "d1_chunk_3".into(),
            score: 0.82,
            text: "Employees accrue leave monthly.".into(),
            metadata: metadata.as_object().cloned().unwrap(),
        };

        let cand = RankedCandidate::from_hit(hit);
        assert_eq!(cand.chunk_id, "d1_chunk_3");
        assert_eq!(cand.doc_id.as_deref(), Some("d1"));
        assert_eq!(cand.position, Some(3));
        assert_eq!(cand.total_chunks, Some(9));
        assert_eq!(cand.metadata.len(), 1);
        assert_eq!(cand.metadata["department"], json!("hr"));
    }

    #[test]
    fn test_from_hit_without_payload_uses_hit_id() {
        let hit = SearchHit {
            id: "x".into(),
            score: 0.1,
            text: "t".into(),
            metadata: Map::new(),
        };
        let cand = RankedCandidate::from_hit(hit);
        assert_eq!(cand.chunk_id, "x");
        assert!(cand.source.is_none());
        assert_eq!(cand.effective_score(), 0.1);
    }

    #[test]
    fn test_language_serializes_kebab_case() {
        let s = serde_json::to_string(&Language::NonEnglish).unwrap();
        assert_eq!(s, "\"non-english\"");
        assert_eq!(Language::Korean.to_string(), "korean");
    }
}

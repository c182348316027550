//! Core data models used throughout Health Copilot.
//!
//! These types represent the documents, chunks, index entries, and
//! per-request results that flow through the build and query pipelines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Source tag applied when a raw record does not name its corpus.
pub const DEFAULT_SOURCE_TAG: &str = "pubmed";

/// Canonical document produced by the normalizer.
///
/// Identified implicitly by its position in the ingested batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub title: String,
    pub text: String,
    pub url: String,
    pub source_tag: String,
    /// Source-native identifier (PMID, NCT id, feed id), empty when unknown.
    pub origin_id: String,
}

/// A word window of a document's text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub parent_document_index: usize,
    pub chunk_ordinal: usize,
    pub text: String,
}

/// Metadata record for one indexed vector.
///
/// Position `i` in the metadata sequence describes vector `i` in the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub title: String,
    pub url: String,
    pub source_tag: String,
    #[serde(default)]
    pub origin_id: String,
    pub parent_document_index: usize,
    pub chunk_ordinal: usize,
    pub text: String,
}

impl IndexEntry {
    pub fn from_chunk(doc: &Document, chunk: &Chunk) -> Self {
        Self {
            title: doc.title.clone(),
            url: doc.url.clone(),
            source_tag: doc.source_tag.clone(),
            origin_id: doc.origin_id.clone(),
            parent_document_index: chunk.parent_document_index,
            chunk_ordinal: chunk.chunk_ordinal,
            text: chunk.text.clone(),
        }
    }
}

/// A ranked piece of evidence returned for a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalHit {
    /// 1-based rank within the producing source.
    pub rank: usize,
    /// Inner product with the query vector. Absent for live-source hits,
    /// whose scores are not comparable across sources.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
    pub title: String,
    pub url: String,
    pub source_tag: String,
    pub origin_id: String,
    pub text_snippet: String,
}

/// Reference to a grounding hit in an [`AnswerResult`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub rank: usize,
    pub source_tag: String,
    pub origin_id: String,
    pub url: String,
}

impl From<&RetrievalHit> for Citation {
    fn from(hit: &RetrievalHit) -> Self {
        Self {
            rank: hit.rank,
            source_tag: hit.source_tag.clone(),
            origin_id: hit.origin_id.clone(),
            url: hit.url.clone(),
        }
    }
}

/// Outcome of a synthesis attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnswerStatus {
    /// The completion service produced an answer from the evidence.
    Answered,
    /// Retrieval returned nothing; the completion service was not called.
    NoEvidence,
    /// The completion service failed; evidence is still attached.
    Unavailable { reason: String },
}

/// A grounded answer with its citations and evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerResult {
    pub answer_text: String,
    pub citations: Vec<Citation>,
    pub confidence: f32,
    #[serde(flatten)]
    pub status: AnswerStatus,
    pub hits: Vec<RetrievalHit>,
}

/// Build-time facts recorded alongside the artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub generation: String,
    pub model: String,
    pub dims: usize,
    pub vectors: usize,
    pub built_at: DateTime<Utc>,
}

/// Why a build produced no artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NothingToIndex {
    EmptyCorpus,
    NoChunks,
}

/// Result of an offline build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BuildReport {
    Built {
        documents: usize,
        chunks: usize,
        vectors: usize,
        dims: usize,
        generation: String,
    },
    NothingToIndex { reason: NothingToIndex },
}

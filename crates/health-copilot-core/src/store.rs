//! The aligned vector store: a [`FlatIpIndex`] paired with its metadata.
//!
//! A [`VectorStore`] can only come from two places: a [`StoreBuilder`],
//! which adds each vector together with its [`IndexEntry`], or
//! [`VectorStore::from_artifacts`], which checks that a decoded index and
//! metadata file belong to the same build. Either way, metadata position
//! `i` always describes vector `i`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::index::FlatIpIndex;
use crate::models::{IndexEntry, IndexManifest, RetrievalHit};

/// Default number of characters kept in a hit's snippet.
pub const DEFAULT_SNIPPET_CHARS: usize = 1500;

/// On-disk metadata artifact, aligned to vector insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataFile {
    pub generation: String,
    pub model: String,
    pub dims: usize,
    pub built_at: DateTime<Utc>,
    pub entries: Vec<IndexEntry>,
}

/// Read-only index + metadata pair serving similarity queries.
#[derive(Debug, Clone)]
pub struct VectorStore {
    index: FlatIpIndex,
    entries: Vec<IndexEntry>,
    manifest: IndexManifest,
    snippet_chars: usize,
}

impl VectorStore {
    /// Pair a decoded index with its metadata file.
    ///
    /// Fails with [`Error::Configuration`] if the two artifacts come from
    /// different builds or disagree on dimension or length.
    pub fn from_artifacts(
        index: FlatIpIndex,
        index_generation: &str,
        metadata: MetadataFile,
    ) -> Result<Self> {
        if index_generation != metadata.generation {
            return Err(Error::configuration(format!(
                "index generation {} does not match metadata generation {}",
                index_generation, metadata.generation
            )));
        }
        if index.dims() != metadata.dims {
            return Err(Error::configuration(format!(
                "index dimension {} does not match metadata dimension {}",
                index.dims(),
                metadata.dims
            )));
        }
        if index.len() != metadata.entries.len() {
            return Err(Error::configuration(format!(
                "index holds {} vectors but metadata holds {} entries",
                index.len(),
                metadata.entries.len()
            )));
        }

        let manifest = IndexManifest {
            generation: metadata.generation,
            model: metadata.model,
            dims: metadata.dims,
            vectors: index.len(),
            built_at: metadata.built_at,
        };
        Ok(Self {
            index,
            entries: metadata.entries,
            manifest,
            snippet_chars: DEFAULT_SNIPPET_CHARS,
        })
    }

    pub fn with_snippet_chars(mut self, snippet_chars: usize) -> Self {
        self.snippet_chars = snippet_chars;
        self
    }

    pub fn manifest(&self) -> &IndexManifest {
        &self.manifest
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Number of indexed vectors.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Fail fast when a query embedder differs from the build-time one.
    pub fn check_compatible(&self, model: &str, dims: usize) -> Result<()> {
        if dims != self.manifest.dims {
            return Err(Error::configuration(format!(
                "embedder produces {}-dimensional vectors but the index was built with {}",
                dims, self.manifest.dims
            )));
        }
        if model != self.manifest.model {
            return Err(Error::configuration(format!(
                "embedder model '{}' differs from index model '{}'; rebuild the index",
                model, self.manifest.model
            )));
        }
        Ok(())
    }

    /// Top `min(k, len)` hits for a unit-normalized query vector.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<RetrievalHit>> {
        let scored = self.index.search(query, k)?;
        Ok(scored
            .into_iter()
            .enumerate()
            .map(|(i, (position, score))| self.hit(i + 1, position, score))
            .collect())
    }

    /// Semantic top-k, keeping only hits whose title or text contains
    /// `query_text` (case-insensitive). May return fewer than `k` hits.
    pub fn search_filtered(
        &self,
        query_text: &str,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<RetrievalHit>> {
        let needle = query_text.to_lowercase();
        let scored = self.index.search(query, k)?;
        Ok(scored
            .into_iter()
            .enumerate()
            .filter(|(_, (position, _))| {
                let entry = &self.entries[*position];
                format!("{} {}", entry.title, entry.text)
                    .to_lowercase()
                    .contains(&needle)
            })
            .map(|(i, (position, score))| self.hit(i + 1, position, score))
            .collect())
    }

    fn hit(&self, rank: usize, position: usize, score: f32) -> RetrievalHit {
        let entry = &self.entries[position];
        RetrievalHit {
            rank,
            score: Some(score),
            title: entry.title.clone(),
            url: entry.url.clone(),
            source_tag: entry.source_tag.clone(),
            origin_id: entry.origin_id.clone(),
            text_snippet: entry.text.chars().take(self.snippet_chars).collect(),
        }
    }

    /// Encode both artifacts for persistence.
    pub fn to_artifacts(&self) -> Result<(Vec<u8>, MetadataFile)> {
        let bytes = self.index.to_bytes(&self.manifest.generation)?;
        let metadata = MetadataFile {
            generation: self.manifest.generation.clone(),
            model: self.manifest.model.clone(),
            dims: self.manifest.dims,
            built_at: self.manifest.built_at,
            entries: self.entries.clone(),
        };
        Ok((bytes, metadata))
    }
}

/// Accumulates vectors and their metadata in lockstep.
#[derive(Debug)]
pub struct StoreBuilder {
    model: String,
    index: FlatIpIndex,
    entries: Vec<IndexEntry>,
}

impl StoreBuilder {
    pub fn new(model: impl Into<String>, dims: usize) -> Result<Self> {
        Ok(Self {
            model: model.into(),
            index: FlatIpIndex::new(dims)?,
            entries: Vec::new(),
        })
    }

    pub fn push(&mut self, entry: IndexEntry, vector: &[f32]) -> Result<()> {
        self.index.add(vector)?;
        self.entries.push(entry);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Seal the builder under a fresh generation id.
    pub fn finish(self) -> VectorStore {
        let manifest = IndexManifest {
            generation: Uuid::new_v4().to_string(),
            model: self.model,
            dims: self.index.dims(),
            vectors: self.index.len(),
            built_at: Utc::now(),
        };
        VectorStore {
            index: self.index,
            entries: self.entries,
            manifest,
            snippet_chars: DEFAULT_SNIPPET_CHARS,
        }
    }
}

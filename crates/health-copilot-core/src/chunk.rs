//! Overlapping word-window chunker.
//!
//! Splits document text on whitespace and emits windows of `chunk_size`
//! words, each overlapping the previous one by `overlap` words. A window
//! that would add no words beyond the previous window's end is not
//! emitted, so a text of `n > overlap` words yields exactly
//! `ceil((n - overlap) / (chunk_size - overlap))` chunks.

use crate::error::{Error, Result};
use crate::models::{Chunk, Document};

/// Validated chunking parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkParams {
    chunk_size: usize,
    overlap: usize,
}

impl ChunkParams {
    /// Rejects configurations that cannot make forward progress.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::configuration("chunk_size must be > 0"));
        }
        if overlap >= chunk_size {
            return Err(Error::configuration(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    pub fn stride(&self) -> usize {
        self.chunk_size - self.overlap
    }
}

/// Split `text` into overlapping word windows.
///
/// Returns an empty sequence for empty or whitespace-only text.
pub fn chunk_words(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<String>> {
    let params = ChunkParams::new(chunk_size, overlap)?;
    Ok(windows(text, params))
}

fn windows(text: &str, params: ChunkParams) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < words.len() {
        let end = (start + params.chunk_size).min(words.len());
        chunks.push(words[start..end].join(" "));
        if end == words.len() {
            break;
        }
        start += params.stride();
    }

    chunks
}

/// Chunk one document, substituting a character-truncated fallback chunk
/// when word splitting yields nothing.
pub fn chunk_document(doc_index: usize, doc: &Document, params: ChunkParams) -> Vec<Chunk> {
    let mut pieces = windows(&doc.text, params);
    if pieces.is_empty() {
        pieces.push(doc.text.chars().take(params.chunk_size).collect());
    }

    pieces
        .into_iter()
        .enumerate()
        .map(|(ordinal, text)| Chunk {
            parent_document_index: doc_index,
            chunk_ordinal: ordinal,
            text,
        })
        .collect()
}

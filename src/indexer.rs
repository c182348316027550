//! Offline index build and artifact persistence.
//!
//! A build chunks every document, embeds the chunks batch by batch, and
//! seals the vectors and their metadata into a [`VectorStore`]. The
//! artifacts are then written under `index.dir`:
//!
//! ```text
//! index.dir/
//!   CURRENT                 # active generation id
//!   <generation>/index.hcvi # binary flat index
//!   <generation>/meta.json  # aligned metadata
//! ```
//!
//! Both files of a generation are complete on disk before `CURRENT` is
//! replaced (temp file + rename), so a reader always opens a matched pair
//! and a failed build leaves the previous index untouched. After the swap,
//! generations older than the previous one are removed.

use std::io::Write;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use health_copilot_core::chunk::{chunk_document, ChunkParams};
use health_copilot_core::index::FlatIpIndex;
use health_copilot_core::models::{BuildReport, Document, IndexEntry, NothingToIndex};
use health_copilot_core::store::{MetadataFile, StoreBuilder, VectorStore};
use health_copilot_core::{Error, Result};

use crate::embedding::{embed_normalized, Embedder};

pub const CURRENT_FILE: &str = "CURRENT";
pub const INDEX_FILE: &str = "index.hcvi";
pub const META_FILE: &str = "meta.json";

/// What [`build_store`] produced.
#[derive(Debug)]
pub enum BuildOutcome {
    Built {
        store: VectorStore,
        documents: usize,
        chunks: usize,
    },
    NothingToIndex(NothingToIndex),
}

/// Chunk, embed and seal `documents` into an in-memory store.
///
/// Documents with blank text are skipped. Any embedding failure aborts the
/// whole build.
pub async fn build_store(
    documents: &[Document],
    embedder: &dyn Embedder,
    params: ChunkParams,
    batch_size: usize,
) -> Result<BuildOutcome> {
    if batch_size == 0 {
        return Err(Error::configuration("batch_size must be > 0"));
    }
    if documents.is_empty() {
        return Ok(BuildOutcome::NothingToIndex(NothingToIndex::EmptyCorpus));
    }

    let entries: Vec<IndexEntry> = documents
        .iter()
        .enumerate()
        .filter(|(_, doc)| !doc.text.trim().is_empty())
        .flat_map(|(i, doc)| {
            chunk_document(i, doc, params)
                .into_iter()
                .map(move |chunk| IndexEntry::from_chunk(doc, &chunk))
        })
        .collect();

    if entries.is_empty() {
        return Ok(BuildOutcome::NothingToIndex(NothingToIndex::NoChunks));
    }

    let total = entries.len();
    let batches = total.div_ceil(batch_size);
    let mut builder = StoreBuilder::new(embedder.model_name(), embedder.dims())?;

    for (batch_no, batch) in entries.chunks(batch_size).enumerate() {
        let texts: Vec<String> = batch.iter().map(|e| e.text.clone()).collect();
        let vectors = embed_normalized(embedder, &texts).await?;
        for (entry, vector) in batch.iter().zip(vectors.iter()) {
            builder.push(entry.clone(), vector)?;
        }
        tracing::debug!(batch = batch_no + 1, batches, embedded = builder.len(), total, "embedded batch");
    }

    let store = builder.finish();
    tracing::info!(
        documents = documents.len(),
        chunks = total,
        dims = store.manifest().dims,
        model = %store.manifest().model,
        "index built"
    );
    Ok(BuildOutcome::Built {
        store,
        documents: documents.len(),
        chunks: total,
    })
}

/// Build and persist an index under `index_dir`.
pub async fn build(
    documents: &[Document],
    embedder: &dyn Embedder,
    params: ChunkParams,
    batch_size: usize,
    index_dir: &Path,
) -> Result<BuildReport> {
    match build_store(documents, embedder, params, batch_size).await? {
        BuildOutcome::NothingToIndex(reason) => {
            tracing::info!(?reason, "nothing to index; existing artifacts left in place");
            Ok(BuildReport::NothingToIndex { reason })
        }
        BuildOutcome::Built {
            store,
            documents,
            chunks,
        } => {
            persist(&store, index_dir)?;
            let manifest = store.manifest();
            Ok(BuildReport::Built {
                documents,
                chunks,
                vectors: manifest.vectors,
                dims: manifest.dims,
                generation: manifest.generation.clone(),
            })
        }
    }
}

/// Write a store as a new generation and make it current.
///
/// Returns the generation directory.
pub fn persist(store: &VectorStore, index_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(index_dir)?;
    let generation = store.manifest().generation.clone();
    let gen_dir = index_dir.join(&generation);
    std::fs::create_dir_all(&gen_dir)?;

    let (index_bytes, metadata) = store.to_artifacts()?;
    write_synced(&gen_dir.join(INDEX_FILE), &index_bytes)?;
    write_synced(&gen_dir.join(META_FILE), &serde_json::to_vec(&metadata)?)?;
    sync_dir(&gen_dir)?;

    let previous = read_current(index_dir)?;

    let mut pointer = tempfile::NamedTempFile::new_in(index_dir)?;
    pointer.write_all(generation.as_bytes())?;
    pointer.as_file().sync_all()?;
    pointer
        .persist(index_dir.join(CURRENT_FILE))
        .map_err(|e| Error::Io(e.error))?;
    sync_dir(index_dir)?;

    tracing::info!(generation = %generation, dir = %index_dir.display(), "index generation activated");

    prune_generations(index_dir, &generation, previous.as_deref());
    Ok(gen_dir)
}

fn write_synced(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = std::fs::File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(())
}

/// Flush a directory's entries so a completed rename survives power loss.
#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<()> {
    std::fs::File::open(dir)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}

/// Active generation id, or `None` when no index has been built.
pub fn read_current(index_dir: &Path) -> Result<Option<String>> {
    match std::fs::read_to_string(index_dir.join(CURRENT_FILE)) {
        Ok(content) => Ok(Some(content.trim().to_string())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Remove generation directories other than `current` and `previous`.
///
/// Only directories named like a generation id are touched. Failures are
/// logged, never returned: the new generation is already live.
fn prune_generations(index_dir: &Path, current: &str, previous: Option<&str>) {
    let entries = match std::fs::read_dir(index_dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(error = %e, "could not list index directory for pruning");
            return;
        }
    };
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        if name == current || Some(name.as_str()) == previous {
            continue;
        }
        if Uuid::parse_str(&name).is_err() || !entry.path().is_dir() {
            continue;
        }
        match std::fs::remove_dir_all(entry.path()) {
            Ok(()) => tracing::debug!(generation = %name, "pruned old index generation"),
            Err(e) => tracing::warn!(generation = %name, error = %e, "failed to prune index generation"),
        }
    }
}

/// Open the active generation under `index_dir`.
///
/// # Errors
///
/// [`Error::IndexMissing`] when nothing has been built yet or an artifact
/// of the active generation is absent.
pub fn open_store(index_dir: &Path) -> Result<VectorStore> {
    let generation =
        read_current(index_dir)?.ok_or_else(|| Error::IndexMissing(index_dir.join(CURRENT_FILE)))?;
    let gen_dir = index_dir.join(&generation);
    open(&gen_dir.join(INDEX_FILE), &gen_dir.join(META_FILE))
}

/// Open an index file and its metadata file as a checked pair.
pub fn open(index_path: &Path, metadata_path: &Path) -> Result<VectorStore> {
    for path in [index_path, metadata_path] {
        if !path.is_file() {
            return Err(Error::IndexMissing(path.to_path_buf()));
        }
    }

    let bytes = std::fs::read(index_path)?;
    let (index, generation) = FlatIpIndex::from_bytes(&bytes)?;
    let metadata: MetadataFile = serde_json::from_slice(&std::fs::read(metadata_path)?)
        .map_err(|e| Error::configuration(format!("malformed metadata file: {}", e)))?;

    let store = VectorStore::from_artifacts(index, &generation, metadata)?;
    tracing::debug!(
        generation = %store.manifest().generation,
        vectors = store.len(),
        "index opened"
    );
    Ok(store)
}

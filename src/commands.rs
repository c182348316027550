//! CLI command implementations for the `copilot` binary.
//!
//! Each `run_*` function loads what it needs from [`Config`], does the
//! work, and prints either a human-readable report or JSON to stdout.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Serialize;

use health_copilot_core::models::{AnswerStatus, BuildReport, RetrievalHit};

use crate::config::Config;
use crate::corpus::load_corpus;
use crate::embedding::create_embedder;
use crate::engine::Engine;
use crate::indexer;
use crate::router::{Cancellation, QueryRouter, RoutedResults, SourceOutcome};
use crate::sources::LiveSources;

const EXCERPT_CHARS: usize = 240;

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Load the corpus, build the index and activate it.
pub async fn run_build(config: &Config, corpus_override: Option<&Path>, json: bool) -> Result<()> {
    if !config.embedding.is_enabled() {
        bail!("Embedding provider is disabled. Set [embedding] provider in config.");
    }
    let corpus_dir = corpus_override.unwrap_or(config.corpus.dir.as_path());
    let documents = load_corpus(corpus_dir)
        .with_context(|| format!("Failed to load corpus from {}", corpus_dir.display()))?;
    let embedder = create_embedder(&config.embedding)?;

    let report = indexer::build(
        &documents,
        embedder.as_ref(),
        config.chunking.params()?,
        config.embedding.batch_size,
        &config.index.dir,
    )
    .await
    .context("Index build failed; the previous index is unchanged")?;

    if json {
        return print_json(&report);
    }

    match report {
        BuildReport::Built {
            documents,
            chunks,
            vectors,
            dims,
            generation,
        } => {
            println!("build ok");
            println!("  documents:  {}", documents);
            println!("  chunks:     {}", chunks);
            println!("  vectors:    {}", vectors);
            println!("  dims:       {}", dims);
            println!("  model:      {}", embedder.model_name());
            println!("  generation: {}", generation);
            println!("  index dir:  {}", config.index.dir.display());
        }
        BuildReport::NothingToIndex { reason } => {
            println!("build skipped: nothing to index ({:?})", reason);
        }
    }
    Ok(())
}

/// Semantic search over the local index.
pub async fn run_search(
    config: Config,
    query: &str,
    k: Option<usize>,
    filter: bool,
    json: bool,
) -> Result<()> {
    let engine = Engine::open(config)?;
    let k = k.unwrap_or_else(|| engine.default_k());
    let hits = if filter {
        engine.retrieve_filtered(query, k).await?
    } else {
        engine.retrieve(query, k).await?
    };
    engine.close();

    if json {
        return print_json(&hits);
    }
    print_hits(&hits);
    Ok(())
}

/// Grounded, cited answer from the local index.
pub async fn run_answer(config: Config, query: &str, k: Option<usize>, json: bool) -> Result<()> {
    let engine = Engine::open(config)?;
    let k = k.unwrap_or_else(|| engine.default_k());
    let result = engine.answer(query, k).await?;
    engine.close();

    if json {
        return print_json(&result);
    }

    println!("{}", result.answer_text);
    println!();
    let status = match &result.status {
        AnswerStatus::Answered => "answered".to_string(),
        AnswerStatus::NoEvidence => "no_evidence".to_string(),
        AnswerStatus::Unavailable { reason } => format!("unavailable ({})", reason),
    };
    println!("status:     {}", status);
    println!("confidence: {:.3}", result.confidence);
    if !result.citations.is_empty() {
        println!();
        println!("Citations:");
        for c in &result.citations {
            println!(
                "  [{}] {} {} {}",
                c.rank,
                c.source_tag.to_uppercase(),
                c.origin_id,
                c.url
            );
        }
    }
    Ok(())
}

fn live_router(config: &Config) -> Result<QueryRouter> {
    let sources = LiveSources::from_config(&config.sources, config.retrieval.snippet_chars)?;
    Ok(QueryRouter::new(
        sources,
        Duration::from_secs(config.sources.timeout_secs),
    ))
}

/// Cancellation wired to Ctrl-C for the lifetime of one command.
fn ctrl_c_cancellation() -> Cancellation {
    let cancel = Cancellation::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted; cancelling source calls");
            trigger.cancel();
        }
    });
    cancel
}

/// Planned multi-source lookup.
pub async fn run_route(config: &Config, query: &str, json: bool) -> Result<()> {
    let router = live_router(config)?;
    let results = router.route(query, &ctrl_c_cancellation()).await;
    print_routed(&results, json)
}

/// Every-source lookup.
pub async fn run_fallback(config: &Config, query: &str, json: bool) -> Result<()> {
    let router = live_router(config)?;
    let results = router.fallback(query, &ctrl_c_cancellation()).await;
    print_routed(&results, json)
}

fn print_routed(results: &RoutedResults, json: bool) -> Result<()> {
    if json {
        return print_json(results);
    }
    if let Some(class) = results.route {
        println!("route: {:?}", class);
    }
    for report in &results.reports {
        match &report.outcome {
            SourceOutcome::Ok { hits } => {
                println!("  {:<16} ok           {} hit(s)", report.source, hits)
            }
            SourceOutcome::Unavailable { reason } => {
                println!("  {:<16} unavailable  {}", report.source, reason)
            }
        }
    }
    println!();
    print_hits(&results.hits);
    Ok(())
}

fn print_hits(hits: &[RetrievalHit]) {
    if hits.is_empty() {
        println!("No results.");
        return;
    }
    for hit in hits {
        let title = if hit.title.is_empty() {
            "(untitled)"
        } else {
            hit.title.as_str()
        };
        match hit.score {
            Some(score) => println!(
                "{}. [{:.3}] {} / {}",
                hit.rank,
                score,
                hit.source_tag.to_uppercase(),
                title
            ),
            None => println!("{}. {} / {}", hit.rank, hit.source_tag.to_uppercase(), title),
        }
        if !hit.url.is_empty() {
            println!("    url: {}", hit.url);
        }
        if !hit.origin_id.is_empty() {
            println!("    id: {}", hit.origin_id);
        }
        let excerpt: String = hit.text_snippet.chars().take(EXCERPT_CHARS).collect();
        println!("    excerpt: \"{}\"", excerpt.replace('\n', " ").trim());
        println!();
    }
}

#[derive(Serialize)]
struct InspectReport<'a> {
    manifest: &'a health_copilot_core::models::IndexManifest,
    by_source: BTreeMap<&'a str, usize>,
    entries: &'a [health_copilot_core::models::IndexEntry],
}

/// Print the active index's manifest and its first `limit` entries.
pub fn run_inspect(config: &Config, limit: usize, json: bool) -> Result<()> {
    let store = indexer::open_store(&config.index.dir)?;
    let manifest = store.manifest();
    let mut by_source: BTreeMap<&str, usize> = BTreeMap::new();
    for entry in store.entries() {
        *by_source.entry(entry.source_tag.as_str()).or_default() += 1;
    }
    let shown = &store.entries()[..limit.min(store.len())];

    if json {
        return print_json(&InspectReport {
            manifest,
            by_source,
            entries: shown,
        });
    }

    println!("Health Copilot — Index");
    println!("======================");
    println!();
    println!("  Directory:   {}", config.index.dir.display());
    println!("  Generation:  {}", manifest.generation);
    println!("  Model:       {}", manifest.model);
    println!("  Dims:        {}", manifest.dims);
    println!("  Vectors:     {}", manifest.vectors);
    println!("  Built at:    {}", manifest.built_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!();
    println!("  {:<24} {:>8}", "SOURCE", "CHUNKS");
    println!("  {}", "-".repeat(33));
    for (source, count) in &by_source {
        println!("  {:<24} {:>8}", source, count);
    }

    for (i, entry) in shown.iter().enumerate() {
        println!();
        println!("--- Entry {} ---", i);
        println!("title:  {}", entry.title);
        println!("source: {}", entry.source_tag);
        println!("url:    {}", entry.url);
        println!("chunk:  doc {} / #{}", entry.parent_document_index, entry.chunk_ordinal);
        let text: String = entry.text.chars().take(200).collect();
        println!("text:   {}", text);
    }
    Ok(())
}

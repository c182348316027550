//! The query-time engine.
//!
//! An [`Engine`] owns everything a request needs: the opened
//! [`VectorStore`], the embedder that built it, the completion client and
//! the live-source router. The store sits behind `RwLock<Arc<_>>`:
//! requests clone the `Arc` and search without holding the lock, and
//! [`Engine::reload`] swaps in a freshly built generation.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use health_copilot_core::answer::{
    answered, build_context, build_user_prompt, no_evidence, unavailable, SYSTEM_INSTRUCTION,
};
use health_copilot_core::models::{AnswerResult, RetrievalHit};
use health_copilot_core::store::VectorStore;
use health_copilot_core::{Error, Result};

use crate::completion::{create_completion_client, CompletionClient};
use crate::config::Config;
use crate::embedding::{create_embedder, embed_query, Embedder};
use crate::indexer;
use crate::router::{Cancellation, QueryRouter, RoutedResults};
use crate::sources::LiveSources;

pub struct Engine {
    config: Config,
    store: RwLock<Arc<VectorStore>>,
    embedder: Box<dyn Embedder>,
    completion: Box<dyn CompletionClient>,
    router: QueryRouter,
}

impl Engine {
    /// Build every collaborator from `config` and open the active index.
    ///
    /// # Errors
    ///
    /// [`Error::IndexMissing`] when no index has been built, and
    /// [`Error::Configuration`] when the configured embedder does not
    /// match the one the index was built with.
    pub fn open(config: Config) -> Result<Self> {
        let embedder = create_embedder(&config.embedding)?;
        let completion = create_completion_client(&config.completion)?;
        let sources = LiveSources::from_config(&config.sources, config.retrieval.snippet_chars)?;
        Self::from_parts(config, embedder, completion, sources)
    }

    /// Assemble an engine from explicit collaborators.
    pub fn from_parts(
        config: Config,
        embedder: Box<dyn Embedder>,
        completion: Box<dyn CompletionClient>,
        sources: LiveSources,
    ) -> Result<Self> {
        if embedder.dims() == 0 {
            return Err(Error::configuration(
                "embedding provider is disabled; set [embedding] provider in config",
            ));
        }
        let store = open_checked(&config, embedder.as_ref())?;
        tracing::info!(
            generation = %store.manifest().generation,
            vectors = store.len(),
            model = %store.manifest().model,
            completion = completion.model_name(),
            "engine opened"
        );

        let router = QueryRouter::new(sources, Duration::from_secs(config.sources.timeout_secs));
        Ok(Self {
            config,
            store: RwLock::new(Arc::new(store)),
            embedder,
            completion,
            router,
        })
    }

    /// The store serving queries right now.
    pub fn store(&self) -> Arc<VectorStore> {
        self.store
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Re-open the active generation and swap it in.
    ///
    /// In-flight queries keep the store they started with. On error the
    /// current store stays in place.
    pub fn reload(&self) -> Result<()> {
        let store = Arc::new(open_checked(&self.config, self.embedder.as_ref())?);
        let generation = store.manifest().generation.clone();
        *self
            .store
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = store;
        tracing::info!(generation = %generation, "index reloaded");
        Ok(())
    }

    pub fn close(self) {
        tracing::debug!("engine closed");
    }

    pub fn default_k(&self) -> usize {
        self.config.retrieval.default_k
    }

    /// Top `k` chunks for `question`, best first.
    pub async fn retrieve(&self, question: &str, k: usize) -> Result<Vec<RetrievalHit>> {
        let query = embed_query(self.embedder.as_ref(), question).await?;
        self.store().search(&query, k)
    }

    /// Like [`retrieve`](Self::retrieve), keeping only hits that contain
    /// the question text.
    pub async fn retrieve_filtered(&self, question: &str, k: usize) -> Result<Vec<RetrievalHit>> {
        let query = embed_query(self.embedder.as_ref(), question).await?;
        self.store().search_filtered(question, &query, k)
    }

    /// Retrieve evidence and synthesize a cited answer.
    ///
    /// The completion service is skipped when nothing is retrieved, and
    /// its failure degrades to an `unavailable` answer that still carries
    /// the evidence. Only embedding and index errors are returned.
    pub async fn answer(&self, question: &str, k: usize) -> Result<AnswerResult> {
        let hits = self.retrieve(question, k).await?;
        if hits.is_empty() {
            tracing::info!("no evidence retrieved; skipping completion");
            return Ok(no_evidence());
        }

        let prompt = build_user_prompt(question, &build_context(&hits));
        match self.completion.complete(SYSTEM_INSTRUCTION, &prompt).await {
            Ok(text) => Ok(answered(hits, &text)),
            Err(e) => {
                tracing::warn!(error = %e, "completion failed; returning evidence only");
                Ok(unavailable(hits, e.to_string()))
            }
        }
    }

    pub async fn route(&self, query: &str, cancel: &Cancellation) -> RoutedResults {
        self.router.route(query, cancel).await
    }

    pub async fn fallback(&self, query: &str, cancel: &Cancellation) -> RoutedResults {
        self.router.fallback(query, cancel).await
    }
}

fn open_checked(config: &Config, embedder: &dyn Embedder) -> Result<VectorStore> {
    let store = indexer::open_store(&config.index.dir)?
        .with_snippet_chars(config.retrieval.snippet_chars);
    store.check_compatible(embedder.model_name(), embedder.dims())?;
    Ok(store)
}

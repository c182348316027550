//! Multi-source query planner and fan-out.
//!
//! The planner classifies a query, picks live sources for the route, and
//! calls them concurrently. Each call is bounded by a timeout and raced
//! against the request's [`Cancellation`]. A failing source contributes
//! nothing but a [`SourceReport`]; it never hides other sources' hits.
//! Hits are concatenated in invocation order with their per-source ranks.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use tokio::sync::watch;

use health_copilot_core::models::RetrievalHit;
use health_copilot_core::route::{classify, plan, QueryClass};
use health_copilot_core::{Error, Result};

use crate::sources::{LiveSources, SourceRetriever};

/// Hits requested from each source during a fallback fan-out.
pub const FALLBACK_K: usize = 2;

/// Per-request cancellation signal, cheap to clone.
#[derive(Clone)]
pub struct Cancellation {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl Default for Cancellation {
    fn default() -> Self {
        Self::new()
    }
}

impl Cancellation {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    /// Abort every in-flight source call sharing this handle.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            // Sender gone without cancelling: never resolve.
            std::future::pending::<()>().await;
        }
    }
}

/// Outcome of one source call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SourceOutcome {
    Ok { hits: usize },
    Unavailable { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceReport {
    pub source: String,
    pub k: usize,
    #[serde(flatten)]
    pub outcome: SourceOutcome,
}

impl SourceReport {
    pub fn is_ok(&self) -> bool {
        matches!(self.outcome, SourceOutcome::Ok { .. })
    }
}

/// Aggregated hits from a fan-out, plus what happened at each source.
#[derive(Debug, Clone, Serialize)]
pub struct RoutedResults {
    /// Query class for planned routes; absent for fallback fan-outs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<QueryClass>,
    pub hits: Vec<RetrievalHit>,
    pub reports: Vec<SourceReport>,
}

pub struct QueryRouter {
    sources: LiveSources,
    timeout: Duration,
}

impl QueryRouter {
    pub fn new(sources: LiveSources, timeout: Duration) -> Self {
        Self { sources, timeout }
    }

    /// Classify `query` and fan out to the sources its plan names.
    pub async fn route(&self, query: &str, cancel: &Cancellation) -> RoutedResults {
        let class = classify(query);
        let calls = plan(class)
            .into_iter()
            .map(|step| (self.sources.for_role(step.role), step.k))
            .collect();
        tracing::debug!(?class, "routing query");

        let (hits, reports) = self.fan_out(calls, query, cancel).await;
        RoutedResults {
            route: Some(class),
            hits,
            reports,
        }
    }

    /// Query every live source with [`FALLBACK_K`].
    pub async fn fallback(&self, query: &str, cancel: &Cancellation) -> RoutedResults {
        let calls = self
            .sources
            .all()
            .into_iter()
            .map(|source| (source, FALLBACK_K))
            .collect();

        let (hits, reports) = self.fan_out(calls, query, cancel).await;
        RoutedResults {
            route: None,
            hits,
            reports,
        }
    }

    async fn fan_out(
        &self,
        calls: Vec<(Arc<dyn SourceRetriever>, usize)>,
        query: &str,
        cancel: &Cancellation,
    ) -> (Vec<RetrievalHit>, Vec<SourceReport>) {
        let futures = calls
            .iter()
            .map(|(source, k)| call_source(source.as_ref(), query, *k, self.timeout, cancel));
        let results = join_all(futures).await;

        let mut hits = Vec::new();
        let mut reports = Vec::with_capacity(results.len());
        for ((source, k), result) in calls.iter().zip(results) {
            let outcome = match result {
                Ok(source_hits) => {
                    let count = source_hits.len();
                    hits.extend(source_hits);
                    SourceOutcome::Ok { hits: count }
                }
                Err(e) => {
                    tracing::warn!(source = source.name(), error = %e, "source unavailable");
                    SourceOutcome::Unavailable {
                        reason: match e {
                            Error::SourceUnavailable { reason, .. } => reason,
                            other => other.to_string(),
                        },
                    }
                }
            };
            reports.push(SourceReport {
                source: source.name().to_string(),
                k: *k,
                outcome,
            });
        }
        (hits, reports)
    }
}

async fn call_source(
    source: &dyn SourceRetriever,
    query: &str,
    k: usize,
    timeout: Duration,
    cancel: &Cancellation,
) -> Result<Vec<RetrievalHit>> {
    tokio::select! {
        _ = cancel.cancelled() => Err(Error::source_unavailable(source.name(), "cancelled")),
        result = tokio::time::timeout(timeout, source.search(query, k)) => match result {
            Ok(hits) => hits,
            Err(_) => Err(Error::source_unavailable(
                source.name(),
                format!("timed out after {:?}", timeout),
            )),
        },
    }
}

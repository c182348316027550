//! Live retrieval sources queried at request time.
//!
//! Each source implements [`SourceRetriever`]: given a query and a hit
//! budget it returns ranked [`RetrievalHit`]s (without scores) or a
//! [`Error::SourceUnavailable`]. The router decides which sources to call;
//! a source never decides whether its own failure is fatal.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                       LiveSources                         │
//! │  ┌──────────┐ ┌───────┐ ┌─────────┐ ┌────────┐ ┌────────┐ │
//! │  │EuropePMC │ │ arXiv │ │Wikipedia│ │CT.gov  │ │S2      │ │
//! │  │biomedical│ │preprnt│ │encyclop.│ │fallback│ │fallback│ │
//! │  └──────────┘ └───────┘ └─────────┘ └────────┘ └────────┘ │
//! └──────────────────────────┬────────────────────────────────┘
//!                            ▼
//!                 router::route() / router::fallback()
//! ```

mod arxiv;
mod clinicaltrials;
mod europepmc;
mod semantic_scholar;
mod wikipedia;

pub use arxiv::ArxivSource;
pub use clinicaltrials::ClinicalTrialsSource;
pub use europepmc::EuropePmcSource;
pub use semantic_scholar::SemanticScholarSource;
pub use wikipedia::WikipediaSource;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use health_copilot_core::models::RetrievalHit;
use health_copilot_core::route::SourceRole;
use health_copilot_core::{Error, Result};

use crate::config::SourcesConfig;

/// A live source that can be searched by free-text query.
///
/// Implementations must map every failure (transport, status, payload) to
/// [`Error::SourceUnavailable`] carrying their [`name`](SourceRetriever::name).
#[async_trait]
pub trait SourceRetriever: Send + Sync {
    /// Stable identifier used in logs and source reports (e.g. `"arxiv"`).
    fn name(&self) -> &str;

    /// Up to `k` hits ranked from 1, in the source's own order.
    async fn search(&self, query: &str, k: usize) -> Result<Vec<RetrievalHit>>;
}

/// The full set of live sources, addressable by routing role.
#[derive(Clone)]
pub struct LiveSources {
    pub biomedical: Arc<dyn SourceRetriever>,
    pub preprint: Arc<dyn SourceRetriever>,
    pub encyclopedic: Arc<dyn SourceRetriever>,
    pub trials: Arc<dyn SourceRetriever>,
    pub scholar: Arc<dyn SourceRetriever>,
}

impl LiveSources {
    /// Build the HTTP-backed sources from configuration, sharing one client.
    pub fn from_config(config: &SourcesConfig, snippet_chars: usize) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("health-copilot/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::configuration(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            biomedical: Arc::new(EuropePmcSource::new(
                client.clone(),
                &config.europepmc_url,
                snippet_chars,
            )),
            preprint: Arc::new(ArxivSource::new(
                client.clone(),
                &config.arxiv_url,
                snippet_chars,
            )),
            encyclopedic: Arc::new(WikipediaSource::new(
                client.clone(),
                &config.wikipedia_url,
                snippet_chars,
            )),
            trials: Arc::new(ClinicalTrialsSource::new(
                client.clone(),
                &config.clinicaltrials_url,
                snippet_chars,
            )),
            scholar: Arc::new(SemanticScholarSource::new(
                client,
                &config.semanticscholar_url,
                snippet_chars,
            )),
        })
    }

    /// The source that plays `role` in a route plan.
    pub fn for_role(&self, role: SourceRole) -> Arc<dyn SourceRetriever> {
        match role {
            SourceRole::Biomedical => self.biomedical.clone(),
            SourceRole::Preprint => self.preprint.clone(),
            SourceRole::Encyclopedic => self.encyclopedic.clone(),
        }
    }

    /// Every source, in fallback fan-out order.
    pub fn all(&self) -> Vec<Arc<dyn SourceRetriever>> {
        vec![
            self.biomedical.clone(),
            self.preprint.clone(),
            self.trials.clone(),
            self.scholar.clone(),
            self.encyclopedic.clone(),
        ]
    }
}

/// Send a request and decode a JSON body, mapping every failure to
/// [`Error::SourceUnavailable`].
pub(crate) async fn fetch_json(name: &str, request: reqwest::RequestBuilder) -> Result<Value> {
    let body = fetch_text(name, request).await?;
    serde_json::from_str(&body)
        .map_err(|e| Error::source_unavailable(name, format!("malformed JSON: {}", e)))
}

pub(crate) async fn fetch_text(name: &str, request: reqwest::RequestBuilder) -> Result<String> {
    let resp = request
        .send()
        .await
        .map_err(|e| Error::source_unavailable(name, e))?;
    let status = resp.status();
    if !status.is_success() {
        return Err(Error::source_unavailable(name, format!("HTTP {}", status)));
    }
    resp.text()
        .await
        .map_err(|e| Error::source_unavailable(name, e))
}

/// Collapse runs of whitespace and keep at most `max_chars` characters.
pub(crate) fn snippet(text: &str, max_chars: usize) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(max_chars)
        .collect()
}

/// String field at a JSON pointer, empty when absent or not a string.
pub(crate) fn str_at<'a>(value: &'a Value, pointer: &str) -> &'a str {
    value.pointer(pointer).and_then(Value::as_str).unwrap_or("")
}

/// Hit for a live source; scores from different sources are not comparable.
pub(crate) fn live_hit(
    rank: usize,
    title: &str,
    url: String,
    source_tag: &str,
    origin_id: &str,
    text: &str,
    snippet_chars: usize,
) -> RetrievalHit {
    RetrievalHit {
        rank,
        score: None,
        title: snippet(title, usize::MAX),
        url,
        source_tag: source_tag.to_string(),
        origin_id: origin_id.to_string(),
        text_snippet: snippet(text, snippet_chars),
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snippet_collapses_whitespace_and_truncates() {
        assert_eq!(snippet("  a \n b\t c  ", 100), "a b c");
        assert_eq!(snippet("abcdef", 3), "abc");
    }

    #[test]
    fn test_str_at() {
        let v = serde_json::json!({"a": {"b": "x", "n": 1}});
        assert_eq!(str_at(&v, "/a/b"), "x");
        assert_eq!(str_at(&v, "/a/n"), "");
        assert_eq!(str_at(&v, "/missing"), "");
    }

    #[test]
    fn test_from_config_roles() {
        let sources = LiveSources::from_config(&SourcesConfig::default(), 1500).unwrap();
        assert_eq!(sources.for_role(SourceRole::Biomedical).name(), "europepmc");
        assert_eq!(sources.for_role(SourceRole::Preprint).name(), "arxiv");
        assert_eq!(sources.for_role(SourceRole::Encyclopedic).name(), "wikipedia");
        let names: Vec<String> = sources.all().iter().map(|s| s.name().to_string()).collect();
        assert_eq!(
            names,
            vec!["europepmc", "arxiv", "clinicaltrials", "semanticscholar", "wikipedia"]
        );
    }
}

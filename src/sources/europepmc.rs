//! Europe PMC REST search (biomedical literature).

use async_trait::async_trait;
use serde_json::Value;

use health_copilot_core::models::RetrievalHit;
use health_copilot_core::{Error, Result};

use super::{fetch_json, live_hit, str_at, SourceRetriever};

const NAME: &str = "europepmc";

pub struct EuropePmcSource {
    client: reqwest::Client,
    endpoint: String,
    snippet_chars: usize,
}

impl EuropePmcSource {
    pub fn new(client: reqwest::Client, base_url: &str, snippet_chars: usize) -> Self {
        Self {
            client,
            endpoint: format!(
                "{}/europepmc/webservices/rest/search",
                base_url.trim_end_matches('/')
            ),
            snippet_chars,
        }
    }
}

/// Source tag and public URL for a Europe PMC record.
///
/// `MED` records are PubMed citations, `PMC` records are full-text
/// articles; anything else (preprints, patents, agricola, ...) links back
/// to Europe PMC itself.
fn tag_and_url(record_source: &str, id: &str) -> (&'static str, String) {
    match record_source {
        "MED" => ("pubmed", format!("https://pubmed.ncbi.nlm.nih.gov/{}/", id)),
        "PMC" => (
            "pmc",
            format!("https://www.ncbi.nlm.nih.gov/pmc/articles/{}/", id),
        ),
        other => (
            "europepmc",
            format!("https://europepmc.org/article/{}/{}", other, id),
        ),
    }
}

/// Europe PMC always returns `resultList.result`, even for zero hits.
fn parse_results(json: &Value, k: usize, snippet_chars: usize) -> Result<Vec<RetrievalHit>> {
    let results = json
        .pointer("/resultList/result")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            Error::source_unavailable(NAME, "malformed payload: no resultList.result array")
        })?;
    Ok(results
        .iter()
        .take(k)
        .enumerate()
        .map(|(i, record)| {
            let id = str_at(record, "/id");
            let title = str_at(record, "/title");
            let abstract_text = str_at(record, "/abstractText");
            let (tag, url) = tag_and_url(str_at(record, "/source"), id);
            let text = if abstract_text.is_empty() {
                title
            } else {
                abstract_text
            };
            live_hit(i + 1, title, url, tag, id, text, snippet_chars)
        })
        .collect())
}

#[async_trait]
impl SourceRetriever for EuropePmcSource {
    fn name(&self) -> &str {
        NAME
    }

    async fn search(&self, query: &str, k: usize) -> Result<Vec<RetrievalHit>> {
        let page_size = k.to_string();
        let request = self.client.get(&self.endpoint).query(&[
            ("query", query),
            ("format", "json"),
            ("resultType", "core"),
            ("pageSize", page_size.as_str()),
        ]);
        let json = fetch_json(NAME, request).await?;
        parse_results(&json, k, self.snippet_chars)
    }
}

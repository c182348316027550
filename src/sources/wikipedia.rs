//! Wikipedia search with plain-text intro extracts (encyclopedic).

use async_trait::async_trait;
use serde_json::Value;

use health_copilot_core::models::RetrievalHit;
use health_copilot_core::Result;

use super::{fetch_json, live_hit, str_at, SourceRetriever};

const NAME: &str = "wikipedia";

pub struct WikipediaSource {
    client: reqwest::Client,
    endpoint: String,
    snippet_chars: usize,
}

impl WikipediaSource {
    pub fn new(client: reqwest::Client, base_url: &str, snippet_chars: usize) -> Self {
        Self {
            client,
            endpoint: format!("{}/w/api.php", base_url.trim_end_matches('/')),
            snippet_chars,
        }
    }
}

/// Pages from a `formatversion=2` generator response, in search rank order.
///
/// A response without `query` means the search matched nothing.
fn parse_pages(json: &Value, k: usize, snippet_chars: usize) -> Vec<RetrievalHit> {
    let mut pages: Vec<&Value> = json
        .pointer("/query/pages")
        .and_then(Value::as_array)
        .map(|pages| pages.iter().collect())
        .unwrap_or_default();
    pages.sort_by_key(|page| page.get("index").and_then(Value::as_u64).unwrap_or(u64::MAX));

    pages
        .into_iter()
        .take(k)
        .enumerate()
        .map(|(i, page)| {
            let title = str_at(page, "/title");
            let page_id = page
                .get("pageid")
                .and_then(Value::as_u64)
                .map(|id| id.to_string())
                .unwrap_or_default();
            let url = match str_at(page, "/fullurl") {
                "" => format!("https://en.wikipedia.org/wiki/{}", title.replace(' ', "_")),
                full => full.to_string(),
            };
            live_hit(
                i + 1,
                title,
                url,
                NAME,
                &page_id,
                str_at(page, "/extract"),
                snippet_chars,
            )
        })
        .collect()
}

#[async_trait]
impl SourceRetriever for WikipediaSource {
    fn name(&self) -> &str {
        NAME
    }

    async fn search(&self, query: &str, k: usize) -> Result<Vec<RetrievalHit>> {
        let limit = k.to_string();
        let request = self.client.get(&self.endpoint).query(&[
            ("action", "query"),
            ("format", "json"),
            ("formatversion", "2"),
            ("generator", "search"),
            ("gsrsearch", query),
            ("gsrlimit", limit.as_str()),
            ("prop", "extracts|info"),
            ("exintro", "1"),
            ("explaintext", "1"),
            ("exlimit", "max"),
            ("inprop", "url"),
        ]);
        let json = fetch_json(NAME, request).await?;
        Ok(parse_pages(&json, k, self.snippet_chars))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::test_support::{client, serve};
    use axum::{extract::Query, routing::get, Json, Router};
    use std::collections::HashMap;

    #[tokio::test]
    async fn test_pages_sorted_by_search_index() {
        let app = Router::new().route(
            "/w/api.php",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                assert_eq!(params["gsrsearch"], "history of insulin");
                assert_eq!(params["generator"], "search");
                Json(serde_json::json!({
                    "query": {"pages": [
                        {"pageid": 2, "title": "Diabetes", "index": 2,
                         "extract": "Diabetes mellitus...", "fullurl": "https://en.wikipedia.org/wiki/Diabetes"},
                        {"pageid": 1, "title": "Insulin", "index": 1,
                         "extract": "Insulin is a peptide hormone."}
                    ]}
                }))
            }),
        );
        let base = serve(app).await;
        let source = WikipediaSource::new(client(), &base, 1500);

        let hits = source.search("history of insulin", 3).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title, "Insulin");
        assert_eq!(hits[0].origin_id, "1");
        assert_eq!(hits[0].url, "https://en.wikipedia.org/wiki/Insulin");
        assert_eq!(hits[1].rank, 2);
        assert_eq!(hits[1].url, "https://en.wikipedia.org/wiki/Diabetes");
    }

    #[test]
    fn test_no_query_block_means_no_hits() {
        let json = serde_json::json!({"batchcomplete": true});
        assert!(parse_pages(&json, 3, 100).is_empty());
    }
}

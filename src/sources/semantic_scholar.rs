//! Semantic Scholar Graph API paper search.

use async_trait::async_trait;
use serde_json::Value;

use health_copilot_core::models::RetrievalHit;
use health_copilot_core::Result;

use super::{fetch_json, live_hit, str_at, SourceRetriever};

const NAME: &str = "semanticscholar";

pub struct SemanticScholarSource {
    client: reqwest::Client,
    endpoint: String,
    snippet_chars: usize,
}

impl SemanticScholarSource {
    pub fn new(client: reqwest::Client, base_url: &str, snippet_chars: usize) -> Self {
        Self {
            client,
            endpoint: format!("{}/graph/v1/paper/search", base_url.trim_end_matches('/')),
            snippet_chars,
        }
    }
}

fn parse_papers(json: &Value, k: usize, snippet_chars: usize) -> Vec<RetrievalHit> {
    json.get("data")
        .and_then(Value::as_array)
        .map(|papers| {
            papers
                .iter()
                .take(k)
                .enumerate()
                .map(|(i, paper)| {
                    let paper_id = str_at(paper, "/paperId");
                    let title = str_at(paper, "/title");
                    // abstract is null for many papers
                    let abstract_text = str_at(paper, "/abstract");
                    let url = match str_at(paper, "/url") {
                        "" => format!("https://www.semanticscholar.org/paper/{}", paper_id),
                        url => url.to_string(),
                    };
                    live_hit(
                        i + 1,
                        title,
                        url,
                        NAME,
                        paper_id,
                        if abstract_text.is_empty() { title } else { abstract_text },
                        snippet_chars,
                    )
                })
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl SourceRetriever for SemanticScholarSource {
    fn name(&self) -> &str {
        NAME
    }

    async fn search(&self, query: &str, k: usize) -> Result<Vec<RetrievalHit>> {
        let limit = k.to_string();
        let request = self.client.get(&self.endpoint).query(&[
            ("query", query),
            ("limit", limit.as_str()),
            ("fields", "title,abstract,url"),
        ]);
        let json = fetch_json(NAME, request).await?;
        Ok(parse_papers(&json, k, self.snippet_chars))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_abstract_falls_back_to_title() {
        let json = serde_json::json!({
            "total": 2,
            "data": [
                {"paperId": "abc", "title": "GLP-1 agonists", "abstract": null, "url": null},
                {"paperId": "def", "title": "Second", "abstract": "Body.", "url": "https://s2.org/def"}
            ]
        });
        let hits = parse_papers(&json, 5, 1500);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].text_snippet, "GLP-1 agonists");
        assert_eq!(hits[0].url, "https://www.semanticscholar.org/paper/abc");
        assert_eq!(hits[1].url, "https://s2.org/def");
        assert_eq!(hits[1].rank, 2);
    }

    #[test]
    fn test_k_limits_hits() {
        let json = serde_json::json!({"data": [
            {"paperId": "1", "title": "a"}, {"paperId": "2", "title": "b"}, {"paperId": "3", "title": "c"}
        ]});
        assert_eq!(parse_papers(&json, 2, 100).len(), 2);
    }
}

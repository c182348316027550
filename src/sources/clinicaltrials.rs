//! ClinicalTrials.gov v2 study search.

use async_trait::async_trait;
use serde_json::Value;

use health_copilot_core::models::RetrievalHit;
use health_copilot_core::{Error, Result};

use super::{fetch_json, live_hit, str_at, SourceRetriever};

const NAME: &str = "clinicaltrials";

pub struct ClinicalTrialsSource {
    client: reqwest::Client,
    endpoint: String,
    snippet_chars: usize,
}

impl ClinicalTrialsSource {
    pub fn new(client: reqwest::Client, base_url: &str, snippet_chars: usize) -> Self {
        Self {
            client,
            endpoint: format!("{}/api/v2/studies", base_url.trim_end_matches('/')),
            snippet_chars,
        }
    }
}

fn parse_studies(json: &Value, k: usize, snippet_chars: usize) -> Result<Vec<RetrievalHit>> {
    let studies = json
        .get("studies")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::source_unavailable(NAME, "malformed payload: no studies array"))?;
    Ok(studies
        .iter()
        .take(k)
        .enumerate()
        .map(|(i, study)| {
            let nct_id = str_at(study, "/protocolSection/identificationModule/nctId");
            let title = str_at(study, "/protocolSection/identificationModule/briefTitle");
            let summary =
                str_at(study, "/protocolSection/descriptionModule/briefSummary");
            live_hit(
                i + 1,
                title,
                format!("https://clinicaltrials.gov/study/{}", nct_id),
                NAME,
                nct_id,
                if summary.is_empty() { title } else { summary },
                snippet_chars,
            )
        })
        .collect())
}

#[async_trait]
impl SourceRetriever for ClinicalTrialsSource {
    fn name(&self) -> &str {
        NAME
    }

    async fn search(&self, query: &str, k: usize) -> Result<Vec<RetrievalHit>> {
        let page_size = k.to_string();
        let request = self.client.get(&self.endpoint).query(&[
            ("query.term", query),
            ("pageSize", page_size.as_str()),
            ("format", "json"),
        ]);
        let json = fetch_json(NAME, request).await?;
        parse_studies(&json, k, self.snippet_chars)
    }
}

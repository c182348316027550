//! arXiv Atom API (preprints).

use async_trait::async_trait;
use quick_xml::events::Event;

use health_copilot_core::models::RetrievalHit;
use health_copilot_core::{Error, Result};

use super::{fetch_text, live_hit, SourceRetriever};

const NAME: &str = "arxiv";

pub struct ArxivSource {
    client: reqwest::Client,
    endpoint: String,
    snippet_chars: usize,
}

impl ArxivSource {
    pub fn new(client: reqwest::Client, base_url: &str, snippet_chars: usize) -> Self {
        Self {
            client,
            endpoint: format!("{}/api/query", base_url.trim_end_matches('/')),
            snippet_chars,
        }
    }
}

#[derive(Debug, Default)]
struct Entry {
    id: String,
    title: String,
    summary: String,
}

#[derive(Clone, Copy)]
enum Field {
    Id,
    Title,
    Summary,
}

/// Collect `<entry>` id, title and summary from an Atom feed.
fn parse_feed(xml: &str) -> Result<Vec<Entry>> {
    let mut reader = quick_xml::Reader::from_reader(xml.as_bytes());
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut entries = Vec::new();
    let mut current: Option<Entry> = None;
    let mut field: Option<Field> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"entry" => current = Some(Entry::default()),
                b"id" if current.is_some() => field = Some(Field::Id),
                b"title" if current.is_some() => field = Some(Field::Title),
                b"summary" if current.is_some() => field = Some(Field::Summary),
                _ => {}
            },
            Ok(Event::Text(te)) => {
                if let (Some(entry), Some(f)) = (current.as_mut(), field) {
                    let text = te
                        .unescape()
                        .map_err(|e| Error::source_unavailable(NAME, format!("bad XML text: {}", e)))?;
                    let target = match f {
                        Field::Id => &mut entry.id,
                        Field::Title => &mut entry.title,
                        Field::Summary => &mut entry.summary,
                    };
                    target.push_str(&text);
                }
            }
            Ok(Event::End(e)) => {
                if e.local_name().as_ref() == b"entry" {
                    if let Some(entry) = current.take() {
                        entries.push(entry);
                    }
                }
                field = None;
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::source_unavailable(
                    NAME,
                    format!("malformed Atom feed: {}", e),
                ))
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(entries)
}

/// `http://arxiv.org/abs/2401.01234v1` → `2401.01234v1`.
fn arxiv_id(url: &str) -> &str {
    url.rsplit_once("/abs/").map(|(_, id)| id).unwrap_or(url)
}

#[async_trait]
impl SourceRetriever for ArxivSource {
    fn name(&self) -> &str {
        NAME
    }

    async fn search(&self, query: &str, k: usize) -> Result<Vec<RetrievalHit>> {
        let search_query = format!("all:{}", query);
        let max_results = k.to_string();
        let request = self.client.get(&self.endpoint).query(&[
            ("search_query", search_query.as_str()),
            ("start", "0"),
            ("max_results", max_results.as_str()),
        ]);
        let xml = fetch_text(NAME, request).await?;
        let entries = parse_feed(&xml)?;

        Ok(entries
            .iter()
            .take(k)
            .enumerate()
            .map(|(i, entry)| {
                live_hit(
                    i + 1,
                    &entry.title,
                    entry.id.trim().to_string(),
                    NAME,
                    arxiv_id(entry.id.trim()),
                    &entry.summary,
                    self.snippet_chars,
                )
            })
            .collect())
    }
}

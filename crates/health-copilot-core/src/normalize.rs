//! Raw record → [`Document`] normalization.
//!
//! Ingestion sources disagree on field names (`abstract` vs `content`,
//! `link` vs `url`, ...). Each canonical attribute is resolved from a fixed,
//! priority-ordered alias list; the first alias holding a usable value wins.

use serde_json::{Map, Value};

use crate::models::{Document, DEFAULT_SOURCE_TAG};

/// A raw record as read from a corpus file.
pub type RawRecord = Map<String, Value>;

pub const TITLE_ALIASES: &[&str] = &["title", "name"];
pub const TEXT_ALIASES: &[&str] = &["text", "abstract", "content", "body", "summary"];
pub const URL_ALIASES: &[&str] = &["url", "link"];
pub const SOURCE_ALIASES: &[&str] = &["source", "collection"];
pub const ORIGIN_ID_ALIASES: &[&str] = &["id", "orig_id", "pmid", "nct_id"];

/// Resolve the first alias whose value is a non-empty scalar.
///
/// Strings are used as-is; numbers and booleans are stringified; `null`,
/// arrays and objects count as absent.
pub fn resolve_field(record: &RawRecord, aliases: &[&str]) -> Option<String> {
    aliases.iter().find_map(|key| {
        let value = match record.get(*key)? {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => return None,
        };
        if value.trim().is_empty() {
            None
        } else {
            Some(value)
        }
    })
}

/// Map a raw record to a well-formed [`Document`]. Never fails.
pub fn normalize(record: &RawRecord) -> Document {
    let title = resolve_field(record, TITLE_ALIASES).unwrap_or_default();
    let text = resolve_field(record, TEXT_ALIASES).unwrap_or_else(|| title.clone());

    Document {
        text,
        url: resolve_field(record, URL_ALIASES).unwrap_or_default(),
        source_tag: resolve_field(record, SOURCE_ALIASES)
            .unwrap_or_else(|| DEFAULT_SOURCE_TAG.to_string()),
        origin_id: resolve_field(record, ORIGIN_ID_ALIASES).unwrap_or_default(),
        title,
    }
}

/// Normalize a JSON value, or `None` when it is not an object.
pub fn normalize_value(value: &Value) -> Option<Document> {
    value.as_object().map(normalize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> RawRecord {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_canonical_fields() {
        let doc = normalize(&record(json!({
            "title": "Metformin",
            "text": "First-line therapy.",
            "url": "https://pubmed.ncbi.nlm.nih.gov/1/",
            "source": "pubmed",
            "id": "1"
        })));
        assert_eq!(doc.title, "Metformin");
        assert_eq!(doc.text, "First-line therapy.");
        assert_eq!(doc.url, "https://pubmed.ncbi.nlm.nih.gov/1/");
        assert_eq!(doc.source_tag, "pubmed");
        assert_eq!(doc.origin_id, "1");
    }

    #[test]
    fn test_title_alias_name() {
        let doc = normalize(&record(json!({"name": "Influenza", "text": "x"})));
        assert_eq!(doc.title, "Influenza");
    }

    #[test]
    fn test_text_alias_abstract() {
        let doc = normalize(&record(json!({"abstract": "from abstract"})));
        assert_eq!(doc.text, "from abstract");
    }

    #[test]
    fn test_text_alias_content() {
        let doc = normalize(&record(json!({"content": "from content"})));
        assert_eq!(doc.text, "from content");
    }

    #[test]
    fn test_text_alias_body() {
        let doc = normalize(&record(json!({"body": "from body"})));
        assert_eq!(doc.text, "from body");
    }

    #[test]
    fn test_text_alias_summary() {
        let doc = normalize(&record(json!({"summary": "from summary"})));
        assert_eq!(doc.text, "from summary");
    }

    #[test]
    fn test_text_alias_priority() {
        let doc = normalize(&record(json!({
            "body": "body",
            "content": "content",
            "abstract": "abstract"
        })));
        assert_eq!(doc.text, "abstract");
    }

    #[test]
    fn test_empty_alias_falls_through() {
        let doc = normalize(&record(json!({"text": "  ", "abstract": "real"})));
        assert_eq!(doc.text, "real");
    }

    #[test]
    fn test_url_alias_link() {
        let doc = normalize(&record(json!({"link": "https://who.int/news/1"})));
        assert_eq!(doc.url, "https://who.int/news/1");
    }

    #[test]
    fn test_source_alias_collection() {
        let doc = normalize(&record(json!({"collection": "who"})));
        assert_eq!(doc.source_tag, "who");
    }

    #[test]
    fn test_origin_id_aliases() {
        assert_eq!(normalize(&record(json!({"orig_id": "a"}))).origin_id, "a");
        assert_eq!(normalize(&record(json!({"pmid": 31415}))).origin_id, "31415");
        assert_eq!(
            normalize(&record(json!({"nct_id": "NCT0001"}))).origin_id,
            "NCT0001"
        );
    }

    #[test]
    fn test_defaults() {
        let doc = normalize(&record(json!({"title": "Only a title"})));
        assert_eq!(doc.text, "Only a title");
        assert_eq!(doc.url, "");
        assert_eq!(doc.source_tag, DEFAULT_SOURCE_TAG);
        assert_eq!(doc.origin_id, "");

        let empty = normalize(&RawRecord::new());
        assert_eq!(empty.title, "");
        assert_eq!(empty.text, "");
        assert_eq!(empty.source_tag, DEFAULT_SOURCE_TAG);
    }

    #[test]
    fn test_non_scalar_values_ignored() {
        let doc = normalize(&record(json!({
            "title": null,
            "name": "Fallback name",
            "text": ["not", "a", "string"],
            "content": {"nested": true}
        })));
        assert_eq!(doc.title, "Fallback name");
        assert_eq!(doc.text, "Fallback name");
    }

    #[test]
    fn test_normalize_value_rejects_non_objects() {
        assert!(normalize_value(&json!("plain string")).is_none());
        assert!(normalize_value(&json!([1, 2])).is_none());
        assert!(normalize_value(&json!({"title": "ok"})).is_some());
    }
}

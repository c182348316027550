//! Corpus loading from a directory of `.json`, `.jsonl` and `.csv` files.
//!
//! Files are read in name order (top level only) so builds are
//! reproducible. Each record goes through the normalizer. A bad record or an
//! unreadable file is logged and skipped; it never aborts the batch.

use std::path::Path;

use serde_json::{Map, Value};
use walkdir::WalkDir;

use health_copilot_core::models::Document;
use health_copilot_core::normalize::{normalize, normalize_value};
use health_copilot_core::{Error, Result};

/// Supported corpus file formats, keyed by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CorpusFormat {
    Json,
    JsonLines,
    Csv,
}

impl CorpusFormat {
    fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "jsonl" => Some(Self::JsonLines),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }
}

/// Load and normalize every record under `dir`.
///
/// # Errors
///
/// [`Error::Configuration`] when `dir` does not exist or is not a directory.
pub fn load_corpus(dir: &Path) -> Result<Vec<Document>> {
    if !dir.is_dir() {
        return Err(Error::configuration(format!(
            "corpus directory not found: {}",
            dir.display()
        )));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable corpus entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(format) = CorpusFormat::from_path(entry.path()) {
            files.push((entry.into_path(), format));
        }
    }
    files.sort_by(|a, b| a.0.cmp(&b.0));

    let mut documents = Vec::new();
    for (path, format) in files {
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "skipping unreadable corpus file");
                continue;
            }
        };
        let before = documents.len();
        let label = path.display().to_string();
        match format {
            CorpusFormat::Json => parse_json(&content, &label, &mut documents),
            CorpusFormat::JsonLines => parse_jsonl(&content, &label, &mut documents),
            CorpusFormat::Csv => parse_csv(&content, &label, &mut documents),
        }
        tracing::debug!(file = %label, records = documents.len() - before, "loaded corpus file");
    }

    tracing::info!(documents = documents.len(), dir = %dir.display(), "corpus loaded");
    Ok(documents)
}

/// A JSON file holds either an array of records or a single record.
fn parse_json(content: &str, label: &str, out: &mut Vec<Document>) {
    let value: Value = match serde_json::from_str(content) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(file = label, error = %e, "skipping malformed JSON file");
            return;
        }
    };
    match value {
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                push_value(item, label, i, out);
            }
        }
        other => push_value(&other, label, 0, out),
    }
}

fn parse_jsonl(content: &str, label: &str, out: &mut Vec<Document>) {
    for (i, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(line) {
            Ok(value) => push_value(&value, label, i + 1, out),
            Err(e) => {
                tracing::warn!(file = label, line = i + 1, error = %e, "skipping malformed JSONL record");
            }
        }
    }
}

fn parse_csv(content: &str, label: &str, out: &mut Vec<Document>) {
    let mut reader = csv::Reader::from_reader(content.as_bytes());
    let headers = match reader.headers() {
        Ok(headers) => headers.clone(),
        Err(e) => {
            tracing::warn!(file = label, error = %e, "skipping CSV file without a header row");
            return;
        }
    };

    for (i, row) in reader.records().enumerate() {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                tracing::warn!(file = label, row = i + 1, error = %e, "skipping malformed CSV row");
                continue;
            }
        };
        let record: Map<String, Value> = headers
            .iter()
            .zip(row.iter())
            .map(|(key, value)| (key.trim().to_string(), Value::String(value.to_string())))
            .collect();
        out.push(normalize(&record));
    }
}

fn push_value(value: &Value, label: &str, position: usize, out: &mut Vec<Document>) {
    match normalize_value(value) {
        Some(doc) => out.push(doc),
        None => {
            tracing::warn!(file = label, position, "skipping non-object corpus record");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_loads_all_formats_in_name_order() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("b_trials.jsonl"),
            "{\"title\": \"Trial A\", \"summary\": \"Statin trial.\", \"nct_id\": \"NCT01\"}\n\n\
             {\"title\": \"Trial B\", \"body\": \"Insulin trial.\"}\n",
        )
        .unwrap();
        fs::write(
            tmp.path().join("a_pubmed.json"),
            r#"[{"title": "Metformin", "abstract": "First-line therapy.", "pmid": 42}]"#,
        )
        .unwrap();
        fs::write(
            tmp.path().join("c_who.csv"),
            "title,content,link,source\nMalaria,Fact sheet text,https://who.int/m,who\n",
        )
        .unwrap();
        fs::write(tmp.path().join("notes.txt"), "ignored").unwrap();

        let docs = load_corpus(tmp.path()).unwrap();
        let titles: Vec<&str> = docs.iter().map(|d| d.title.as_str()).collect();
        assert_eq!(titles, vec!["Metformin", "Trial A", "Trial B", "Malaria"]);
        assert_eq!(docs[0].origin_id, "42");
        assert_eq!(docs[1].origin_id, "NCT01");
        assert_eq!(docs[3].source_tag, "who");
        assert_eq!(docs[3].url, "https://who.int/m");
    }

    #[test]
    fn test_single_object_json_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("one.json"),
            r#"{"name": "Aspirin", "text": "Antiplatelet."}"#,
        )
        .unwrap();
        let docs = load_corpus(tmp.path()).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].title, "Aspirin");
    }

    #[test]
    fn test_malformed_records_are_skipped() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("broken.json"), "{ not json").unwrap();
        fs::write(
            tmp.path().join("mixed.jsonl"),
            "{\"title\": \"Good\", \"text\": \"ok\"}\nnot json\n[1, 2]\n",
        )
        .unwrap();
        fs::write(tmp.path().join("list.json"), r#"["string", {"title": "Kept"}]"#).unwrap();

        let docs = load_corpus(tmp.path()).unwrap();
        let titles: Vec<&str> = docs.iter().map(|d| d.title.as_str()).collect();
        assert_eq!(titles, vec!["Kept", "Good"]);
    }

    #[test]
    fn test_missing_directory_is_configuration_error() {
        let err = load_corpus(Path::new("/nonexistent/corpora")).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_empty_directory() {
        let tmp = TempDir::new().unwrap();
        assert!(load_corpus(tmp.path()).unwrap().is_empty());
    }
}

//! End-to-end engine tests: build → open → retrieve → answer → route,
//! with the hash embedder and in-process stub collaborators.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;

use health_copilot::completion::CompletionClient;
use health_copilot::config::{
    ChunkingConfig, CompletionConfig, Config, CorpusConfig, EmbeddingConfig, IndexConfig,
    RetrievalConfig, SourcesConfig,
};
use health_copilot::embedding::HashProvider;
use health_copilot::engine::Engine;
use health_copilot::indexer;
use health_copilot::router::{Cancellation, SourceOutcome};
use health_copilot::sources::{LiveSources, SourceRetriever};
use health_copilot_core::answer::DISCLAIMER;
use health_copilot_core::chunk::ChunkParams;
use health_copilot_core::models::{AnswerStatus, BuildReport, Document, RetrievalHit};
use health_copilot_core::route::QueryClass;
use health_copilot_core::{Error, Result};

const DIMS: usize = 128;

fn config(index_dir: &Path) -> Config {
    Config {
        corpus: CorpusConfig::default(),
        index: IndexConfig {
            dir: index_dir.to_path_buf(),
        },
        chunking: ChunkingConfig::default(),
        embedding: EmbeddingConfig {
            provider: "hash".to_string(),
            dims: Some(DIMS),
            ..EmbeddingConfig::default()
        },
        completion: CompletionConfig::default(),
        retrieval: RetrievalConfig::default(),
        sources: SourcesConfig {
            timeout_secs: 1,
            ..SourcesConfig::default()
        },
    }
}

fn embedder() -> Box<HashProvider> {
    Box::new(HashProvider::new("token-hash", DIMS).unwrap())
}

fn doc(id: &str, title: &str, text: &str) -> Document {
    Document {
        title: title.to_string(),
        text: text.to_string(),
        url: format!("https://pubmed.ncbi.nlm.nih.gov/{}/", id),
        source_tag: "pubmed".to_string(),
        origin_id: id.to_string(),
    }
}

fn corpus() -> Vec<Document> {
    vec![
        doc(
            "1",
            "Diabetes mellitus",
            "Diabetes is a chronic disease in which blood glucose is too high.",
        ),
        doc(
            "2",
            "Hypertension",
            "Hypertension is persistently raised arterial blood pressure.",
        ),
    ]
}

async fn build_index(dir: &Path, documents: &[Document]) -> BuildReport {
    indexer::build(
        documents,
        embedder().as_ref(),
        ChunkParams::new(400, 50).unwrap(),
        32,
        dir,
    )
    .await
    .unwrap()
}

struct CannedCompletion {
    reply: Option<&'static str>,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl CompletionClient for CannedCompletion {
    fn model_name(&self) -> &str {
        "canned"
    }

    async fn complete(&self, system_instruction: &str, user_prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(system_instruction.contains("CONTEXT"));
        assert!(user_prompt.contains("CONTEXT:\n[1] PUBMED"));
        self.reply
            .map(str::to_string)
            .ok_or_else(|| Error::synthesis("HTTP 503"))
    }
}

fn completion(reply: Option<&'static str>) -> (Box<CannedCompletion>, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    (
        Box::new(CannedCompletion {
            reply,
            calls: calls.clone(),
        }),
        calls,
    )
}

struct FixedSource {
    name: &'static str,
    fail: bool,
}

#[async_trait]
impl SourceRetriever for FixedSource {
    fn name(&self) -> &str {
        self.name
    }

    async fn search(&self, _query: &str, k: usize) -> Result<Vec<RetrievalHit>> {
        if self.fail {
            return Err(Error::source_unavailable(self.name, "HTTP 500"));
        }
        Ok((1..=k)
            .map(|rank| RetrievalHit {
                rank,
                score: None,
                title: format!("{} #{}", self.name, rank),
                url: String::new(),
                source_tag: self.name.to_string(),
                origin_id: rank.to_string(),
                text_snippet: String::new(),
            })
            .collect())
    }
}

fn sources(failing: &'static str) -> LiveSources {
    let make = |name: &'static str| -> Arc<dyn SourceRetriever> {
        Arc::new(FixedSource {
            name,
            fail: name == failing,
        })
    };
    LiveSources {
        biomedical: make("europepmc"),
        preprint: make("arxiv"),
        encyclopedic: make("wikipedia"),
        trials: make("clinicaltrials"),
        scholar: make("semanticscholar"),
    }
}

fn open_engine(dir: &Path, reply: Option<&'static str>) -> (Engine, Arc<AtomicUsize>) {
    let (client, calls) = completion(reply);
    let engine = Engine::from_parts(config(dir), embedder(), client, sources("none")).unwrap();
    (engine, calls)
}

#[tokio::test]
async fn test_two_documents_give_two_vectors() {
    let tmp = TempDir::new().unwrap();
    let report = build_index(tmp.path(), &corpus()).await;
    assert!(matches!(report, BuildReport::Built { vectors: 2, .. }));

    let (engine, _) = open_engine(tmp.path(), Some("ok"));
    assert_eq!(engine.store().len(), 2);
}

#[tokio::test]
async fn test_retrieve_is_bounded_and_sorted() {
    let tmp = TempDir::new().unwrap();
    build_index(tmp.path(), &corpus()).await;
    let (engine, _) = open_engine(tmp.path(), Some("ok"));

    let hits = engine.retrieve("what is diabetes", 5).await.unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].origin_id, "1");
    for pair in hits.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
    for hit in &hits {
        let score = hit.score.unwrap();
        assert!((-1.0..=1.0).contains(&score));
    }
    assert_eq!(engine.retrieve("what is diabetes", 1).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_answer_with_citations_and_confidence() {
    let tmp = TempDir::new().unwrap();
    build_index(tmp.path(), &corpus()).await;
    let (engine, calls) = open_engine(tmp.path(), Some("Diabetes is high blood glucose [1]."));

    let result = engine.answer("what is diabetes", 5).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(result.status, AnswerStatus::Answered);
    assert!(result.answer_text.starts_with(DISCLAIMER));
    assert!(result.answer_text.ends_with("[1]."));
    assert_eq!(result.citations.len(), 2);
    assert_eq!(result.citations[0].origin_id, "1");
    assert!((0.0..=1.0).contains(&result.confidence));
    assert!(result.confidence > 0.0);
}

#[tokio::test]
async fn test_completion_failure_keeps_evidence() {
    let tmp = TempDir::new().unwrap();
    build_index(tmp.path(), &corpus()).await;
    let (engine, calls) = open_engine(tmp.path(), None);

    let result = engine.answer("what is diabetes", 5).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(matches!(result.status, AnswerStatus::Unavailable { .. }));
    assert_eq!(result.confidence, 0.0);
    assert_eq!(result.hits.len(), 2);
    assert_eq!(result.citations.len(), 2);
    assert!(result.answer_text.starts_with(DISCLAIMER));
    assert!(result.answer_text.contains("Unable to generate an answer"));
}

#[tokio::test]
async fn test_no_hits_skips_completion() {
    let tmp = TempDir::new().unwrap();
    build_index(tmp.path(), &corpus()).await;
    let (engine, calls) = open_engine(tmp.path(), Some("unused"));

    let result = engine.answer("what is diabetes", 0).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(result.status, AnswerStatus::NoEvidence);
    assert_eq!(result.confidence, 0.0);
    assert!(result.answer_text.starts_with(DISCLAIMER));
}

#[tokio::test]
async fn test_reload_picks_up_new_generation() {
    let tmp = TempDir::new().unwrap();
    build_index(tmp.path(), &corpus()).await;
    let (engine, _) = open_engine(tmp.path(), Some("ok"));
    let before = engine.store();

    let mut bigger = corpus();
    bigger.push(doc("3", "Asthma", "Asthma is a chronic airway disease."));
    build_index(tmp.path(), &bigger).await;

    assert_eq!(engine.store().len(), 2);
    engine.reload().unwrap();
    assert_eq!(engine.store().len(), 3);
    // earlier readers keep their snapshot
    assert_eq!(before.len(), 2);
    engine.close();
}

#[tokio::test]
async fn test_open_rejects_other_model() {
    let tmp = TempDir::new().unwrap();
    build_index(tmp.path(), &corpus()).await;
    let (client, _) = completion(Some("ok"));
    let other = Box::new(HashProvider::new("other-hash", DIMS).unwrap());
    let err = Engine::from_parts(config(tmp.path()), other, client, sources("none"))
        .err()
        .unwrap();
    assert!(matches!(err, Error::Configuration(_)));
}

#[tokio::test]
async fn test_open_without_index_is_index_missing() {
    let tmp = TempDir::new().unwrap();
    let (client, _) = completion(Some("ok"));
    let err = Engine::from_parts(config(tmp.path()), embedder(), client, sources("none"))
        .err()
        .unwrap();
    assert!(matches!(err, Error::IndexMissing(_)));
}

#[tokio::test]
async fn test_treatment_query_routes_to_biomedical_and_preprint() {
    let tmp = TempDir::new().unwrap();
    build_index(tmp.path(), &corpus()).await;
    let (engine, _) = open_engine(tmp.path(), Some("ok"));

    let results = engine
        .route("treatment of type 2 diabetes", &Cancellation::new())
        .await;
    assert_eq!(results.route, Some(QueryClass::Clinical));
    let sources: Vec<&str> = results.reports.iter().map(|r| r.source.as_str()).collect();
    assert_eq!(sources, vec!["europepmc", "arxiv"]);
    assert!(results
        .hits
        .iter()
        .all(|h| h.source_tag == "europepmc" || h.source_tag == "arxiv"));
}

#[tokio::test]
async fn test_one_failing_source_does_not_hide_others() {
    let tmp = TempDir::new().unwrap();
    build_index(tmp.path(), &corpus()).await;
    let (client, _) = completion(Some("ok"));
    let engine =
        Engine::from_parts(config(tmp.path()), embedder(), client, sources("europepmc")).unwrap();

    let results = engine.route("cancer screening", &Cancellation::new()).await;
    assert_eq!(results.hits.len(), 5);
    assert!(results.hits.iter().all(|h| h.source_tag == "arxiv"));
    assert!(matches!(
        results.reports[0].outcome,
        SourceOutcome::Unavailable { .. }
    ));

    let results = engine.fallback("cancer screening", &Cancellation::new()).await;
    assert_eq!(results.reports.len(), 5);
    assert_eq!(results.reports.iter().filter(|r| r.is_ok()).count(), 4);
}

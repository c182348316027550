use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use health_copilot_core::chunk::ChunkParams;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub corpus: CorpusConfig,
    pub index: IndexConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorpusConfig {
    #[serde(default = "default_corpus_dir")]
    pub dir: PathBuf,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            dir: default_corpus_dir(),
        }
    }
}

fn default_corpus_dir() -> PathBuf {
    PathBuf::from("data/corpora")
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    pub dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
        }
    }
}

impl ChunkingConfig {
    pub fn params(&self) -> health_copilot_core::Result<ChunkParams> {
        ChunkParams::new(self.chunk_size, self.overlap)
    }
}

fn default_chunk_size() -> usize {
    400
}
fn default_overlap() -> usize {
    50
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            dims: None,
            batch_size: 32,
            max_retries: 5,
            timeout_secs: 30,
            url: None,
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    32
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CompletionConfig {
    #[serde(default = "default_completion_provider")]
    pub provider: String,
    #[serde(default = "default_completion_model")]
    pub model: String,
    #[serde(default = "default_completion_base_url")]
    pub base_url: String,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_completion_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            provider: default_completion_provider(),
            model: default_completion_model(),
            base_url: default_completion_base_url(),
            api_key_env: default_api_key_env(),
            temperature: default_temperature(),
            timeout_secs: default_completion_timeout_secs(),
        }
    }
}

fn default_completion_provider() -> String {
    "disabled".to_string()
}
fn default_completion_model() -> String {
    "llama3-8b-8192".to_string()
}
fn default_completion_base_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}
fn default_api_key_env() -> String {
    "GROQ_API_KEY".to_string()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_completion_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_k")]
    pub default_k: usize,
    #[serde(default = "default_snippet_chars")]
    pub snippet_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_k: default_k(),
            snippet_chars: default_snippet_chars(),
        }
    }
}

fn default_k() -> usize {
    5
}
fn default_snippet_chars() -> usize {
    1500
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourcesConfig {
    #[serde(default = "default_source_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_europepmc_url")]
    pub europepmc_url: String,
    #[serde(default = "default_arxiv_url")]
    pub arxiv_url: String,
    #[serde(default = "default_wikipedia_url")]
    pub wikipedia_url: String,
    #[serde(default = "default_clinicaltrials_url")]
    pub clinicaltrials_url: String,
    #[serde(default = "default_semanticscholar_url")]
    pub semanticscholar_url: String,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_source_timeout_secs(),
            europepmc_url: default_europepmc_url(),
            arxiv_url: default_arxiv_url(),
            wikipedia_url: default_wikipedia_url(),
            clinicaltrials_url: default_clinicaltrials_url(),
            semanticscholar_url: default_semanticscholar_url(),
        }
    }
}

fn default_source_timeout_secs() -> u64 {
    10
}
fn default_europepmc_url() -> String {
    "https://www.ebi.ac.uk".to_string()
}
fn default_arxiv_url() -> String {
    "http://export.arxiv.org".to_string()
}
fn default_wikipedia_url() -> String {
    "https://en.wikipedia.org".to_string()
}
fn default_clinicaltrials_url() -> String {
    "https://clinicaltrials.gov".to_string()
}
fn default_semanticscholar_url() -> String {
    "https://api.semanticscholar.org".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    // Validate chunking
    config.chunking.params()?;

    // Validate retrieval
    if config.retrieval.default_k < 1 {
        anyhow::bail!("retrieval.default_k must be >= 1");
    }
    if config.retrieval.snippet_chars == 0 {
        anyhow::bail!("retrieval.snippet_chars must be > 0");
    }

    // Validate embedding
    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }
    match config.embedding.provider.as_str() {
        "disabled" => {}
        "hash" => {
            if config.embedding.dims.unwrap_or(0) == 0 {
                anyhow::bail!("embedding.dims must be > 0 when provider is 'hash'");
            }
        }
        "openai" | "ollama" | "local" => {
            if config.embedding.dims.unwrap_or(0) == 0 {
                anyhow::bail!(
                    "embedding.dims must be > 0 when provider is '{}'",
                    config.embedding.provider
                );
            }
            if config.embedding.model.is_none() {
                anyhow::bail!(
                    "embedding.model must be specified when provider is '{}'",
                    config.embedding.provider
                );
            }
        }
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, ollama, local, or hash.",
            other
        ),
    }

    // Validate completion
    match config.completion.provider.as_str() {
        "disabled" | "openai" => {}
        other => anyhow::bail!(
            "Unknown completion provider: '{}'. Must be disabled or openai.",
            other
        ),
    }
    if !(0.0..=2.0).contains(&config.completion.temperature) {
        anyhow::bail!("completion.temperature must be in [0.0, 2.0]");
    }

    if config.sources.timeout_secs == 0 {
        anyhow::bail!("sources.timeout_secs must be > 0");
    }

    Ok(())
}

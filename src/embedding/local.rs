//! In-process embeddings via fastembed (ONNX Runtime bundled).
//!
//! The model is downloaded once into the fastembed cache and then runs
//! without network access. Inference is CPU-bound, so it runs on the
//! blocking pool.

use async_trait::async_trait;

use health_copilot_core::embedding::EmbeddingProvider;
use health_copilot_core::{Error, Result};

use super::Embedder;
use crate::config::EmbeddingConfig;

pub struct LocalProvider {
    model: String,
    dims: usize,
    batch_size: usize,
}

impl LocalProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .unwrap_or_else(|| "all-minilm-l6-v2".to_string());
        // Fail at startup on unknown names rather than on first embed.
        fastembed_model(&model)?;
        Ok(Self {
            model,
            dims: config.dims.unwrap_or(384),
            batch_size: config.batch_size,
        })
    }
}

fn fastembed_model(name: &str) -> Result<fastembed::EmbeddingModel> {
    match name {
        "all-minilm-l6-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
        "bge-small-en-v1.5" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
        "nomic-embed-text-v1.5" => Ok(fastembed::EmbeddingModel::NomicEmbedTextV15),
        other => Err(Error::configuration(format!(
            "unsupported local embedding model: '{}'",
            other
        ))),
    }
}

impl EmbeddingProvider for LocalProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }
}

#[async_trait]
impl Embedder for LocalProvider {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let model = fastembed_model(&self.model)?;
        let batch_size = self.batch_size;
        let texts = texts.to_vec();

        tokio::task::spawn_blocking(move || {
            let mut model = fastembed::TextEmbedding::try_new(
                fastembed::InitOptions::new(model).with_show_download_progress(false),
            )
            .map_err(|e| Error::embedding(format!("failed to initialize local model: {}", e)))?;

            model
                .embed(texts, Some(batch_size))
                .map_err(|e| Error::embedding(format!("local embedding failed: {}", e)))
        })
        .await
        .map_err(|e| Error::embedding(format!("local embedding task panicked: {}", e)))?
    }
}

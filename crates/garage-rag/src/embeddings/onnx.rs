//! In-process sentence embeddings with ONNX Runtime
//!
//! Runs a sentence-transformers model (all-MiniLM-L6-v2 by default, 384
//! dimensions). Model and tokenizer are fetched from Hugging Face on first
//! start, cached on disk and loaded once.

use async_trait::async_trait;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use tokenizers::Tokenizer;

use super::{ensure_dimensions, ensure_embeddable, Embedder};
use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};
use crate::retry::retry_with_backoff;

const HUB_BASE: &str = "https://huggingface.co/sentence-transformers";

struct OnnxModel {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    max_length: usize,
    dimensions: usize,
}

/// ONNX Runtime text embedder
pub struct OnnxEmbedder {
    model: Arc<OnnxModel>,
    batch_size: usize,
}

impl OnnxEmbedder {
    /// Load the configured model, downloading it into the cache if needed
    pub async fn new(config: &EmbeddingConfig) -> Result<Self> {
        tracing::info!("Initializing ONNX embedder with model: {}", config.model());

        let model_dir = config.model_dir();
        tokio::fs::create_dir_all(&model_dir).await.map_err(|e| {
            Error::Config(format!(
                "Failed to create model cache {}: {}",
                model_dir.display(),
                e
            ))
        })?;

        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");
        if !model_path.exists() {
            download(&model_url(config.model()), &model_path, config.max_retries).await?;
        }
        if !tokenizer_path.exists() {
            download(&tokenizer_url(config.model()), &tokenizer_path, config.max_retries).await?;
        }

        let max_length = config.max_length;
        let dimensions = config.dimensions;
        let model = tokio::task::spawn_blocking(move || {
            load(&model_path, &tokenizer_path, max_length, dimensions)
        })
        .await
        .map_err(|e| Error::internal(format!("Task join error: {}", e)))??;

        tracing::info!("ONNX embedder initialized ({} dimensions)", dimensions);

        Ok(Self {
            model: Arc::new(model),
            batch_size: config.batch_size.max(1),
        })
    }

    async fn run(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let model = self.model.clone();
        let batch_size = self.batch_size;
        tokio::task::spawn_blocking(move || {
            let mut embeddings = Vec::with_capacity(texts.len());
            for batch in texts.chunks(batch_size) {
                embeddings.extend(model.embed_batch(batch)?);
            }
            Ok(embeddings)
        })
        .await
        .map_err(|e| Error::internal(format!("Task join error: {}", e)))?
    }
}

fn load(
    model_path: &Path,
    tokenizer_path: &Path,
    max_length: usize,
    dimensions: usize,
) -> Result<OnnxModel> {
    let session = Session::builder()
        .map_err(|e| Error::embedding(format!("Failed to create session builder: {}", e)))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| Error::embedding(format!("Failed to set optimization level: {}", e)))?
        .with_intra_threads(4)
        .map_err(|e| Error::embedding(format!("Failed to set threads: {}", e)))?
        .commit_from_file(model_path)
        .map_err(|e| Error::embedding(format!("Failed to load model: {}", e)))?;

    let tokenizer = Tokenizer::from_file(tokenizer_path)
        .map_err(|e| Error::embedding(format!("Failed to load tokenizer: {}", e)))?;

    Ok(OnnxModel {
        session: Mutex::new(session),
        tokenizer,
        max_length,
        dimensions,
    })
}

impl OnnxModel {
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let batch_size = texts.len();

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| Error::embedding(format!("Tokenization failed: {}", e)))?;

        let max_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0)
            .min(self.max_length);

        let mut input_ids = vec![0i64; batch_size * max_len];
        let mut attention_mask = vec![0i64; batch_size * max_len];
        let mut token_type_ids = vec![0i64; batch_size * max_len];

        for (i, encoding) in encodings.iter().enumerate() {
            let ids = encoding.get_ids();
            let mask = encoding.get_attention_mask();
            let types = encoding.get_type_ids();

            for j in 0..ids.len().min(max_len) {
                input_ids[i * max_len + j] = ids[j] as i64;
                attention_mask[i * max_len + j] = mask[j] as i64;
                token_type_ids[i * max_len + j] = types[j] as i64;
            }
        }

        let input_ids_tensor =
            Tensor::from_array((vec![batch_size, max_len], input_ids.into_boxed_slice()))
                .map_err(|e| Error::embedding(format!("Input tensor creation failed: {}", e)))?;
        let attention_mask_tensor = Tensor::from_array((
            vec![batch_size, max_len],
            attention_mask.clone().into_boxed_slice(),
        ))
        .map_err(|e| Error::embedding(format!("Attention mask tensor creation failed: {}", e)))?;
        let token_type_ids_tensor =
            Tensor::from_array((vec![batch_size, max_len], token_type_ids.into_boxed_slice()))
                .map_err(|e| Error::embedding(format!("Token type tensor creation failed: {}", e)))?;

        let inputs = vec![
            ("input_ids", input_ids_tensor.into_dyn()),
            ("attention_mask", attention_mask_tensor.into_dyn()),
            ("token_type_ids", token_type_ids_tensor.into_dyn()),
        ];

        let mut session = self.session.lock();
        let outputs = session
            .run(inputs)
            .map_err(|e| Error::embedding(format!("Inference failed: {}", e)))?;

        // last_hidden_state: [batch, tokens, hidden]
        let output_iter: Vec<_> = outputs.iter().collect();
        let output = output_iter
            .iter()
            .find(|(name, _)| *name == "last_hidden_state")
            .or_else(|| output_iter.first())
            .map(|(_, v)| v)
            .ok_or_else(|| Error::embedding("No output tensor"))?;

        let (shape, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| Error::embedding(format!("Failed to extract tensor: {}", e)))?;
        let hidden_size = shape
            .iter()
            .nth(2)
            .map(|&d| d as usize)
            .unwrap_or(self.dimensions);

        let embeddings = mean_pool(data, &attention_mask, batch_size, max_len, hidden_size);
        for embedding in &embeddings {
            ensure_dimensions(embedding, self.dimensions)?;
        }
        Ok(embeddings)
    }
}

/// Attention-masked mean over token states, then L2 normalization
fn mean_pool(
    hidden: &[f32],
    mask: &[i64],
    batch_size: usize,
    seq_len: usize,
    hidden_size: usize,
) -> Vec<Vec<f32>> {
    let mut embeddings = Vec::with_capacity(batch_size);

    for i in 0..batch_size {
        let mut sum = vec![0.0f32; hidden_size];
        let mut count = 0.0f32;

        for j in 0..seq_len {
            let weight = mask[i * seq_len + j] as f32;
            if weight <= 0.0 {
                continue;
            }
            let offset = (i * seq_len + j) * hidden_size;
            for (k, value) in sum.iter_mut().enumerate() {
                if let Some(state) = hidden.get(offset + k) {
                    *value += state * weight;
                }
            }
            count += weight;
        }

        if count > 0.0 {
            for value in &mut sum {
                *value /= count;
            }
        }

        let norm: f32 = sum.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut sum {
                *value /= norm;
            }
        }

        embeddings.push(sum);
    }

    embeddings
}

fn model_url(model: &str) -> String {
    format!("{}/{}/resolve/main/onnx/model.onnx", HUB_BASE, model)
}

fn tokenizer_url(model: &str) -> String {
    format!("{}/{}/resolve/main/tokenizer.json", HUB_BASE, model)
}

/// Fetch `url` into `path`; the file only appears once fully written
async fn download(url: &str, path: &Path, max_retries: u32) -> Result<()> {
    tracing::info!("Downloading {} to {}", url, path.display());

    let bytes = retry_with_backoff("Model download", max_retries, move || async move {
        let response = reqwest::get(url)
            .await
            .map_err(|e| Error::external("huggingface", format!("download failed: {}", e)))?;
        if !response.status().is_success() {
            return Err(Error::from_response("huggingface", response).await);
        }
        response
            .bytes()
            .await
            .map_err(|e| Error::external("huggingface", format!("download interrupted: {}", e)))
    })
    .await?;

    let partial = path.with_extension("part");
    tokio::fs::write(&partial, &bytes).await?;
    tokio::fs::rename(&partial, path).await?;

    tracing::info!("Downloaded {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

#[async_trait]
impl Embedder for OnnxEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        ensure_embeddable(text)?;
        self.run(vec![text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::embedding("Empty embedding result"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        for text in texts {
            ensure_embeddable(text)?;
        }
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.run(texts.to_vec()).await
    }

    fn dimensions(&self) -> usize {
        self.model.dimensions
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "onnx"
    }
}

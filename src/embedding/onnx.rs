use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use tokenizers::{Tokenizer, TruncationParams};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::{EmbedError, EmbedResult, Embedder, MODEL_NAME};
use crate::config::ModelConfig;
use crate::util::l2_normalize;

/// A loaded session plus its tokenizer.
struct TextModel {
    session: Session,
    tokenizer: Tokenizer,
    dimension: usize,
}

impl TextModel {
    fn load(
        model_path: &Path,
        tokenizer_path: &Path,
        dimension: usize,
        max_length: usize,
        intra_threads: usize,
    ) -> EmbedResult<Self> {
        if !model_path.exists() {
            return Err(EmbedError::ModelUnavailable(format!(
                "model file does not exist: {}",
                model_path.display()
            )));
        }
        if !tokenizer_path.exists() {
            return Err(EmbedError::ModelUnavailable(format!(
                "tokenizer file does not exist: {}",
                tokenizer_path.display()
            )));
        }

        let session = Session::builder()
            .map_err(unavailable)?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(unavailable)?
            .with_intra_threads(intra_threads)
            .map_err(unavailable)?
            .commit_from_file(model_path)
            .map_err(unavailable)?;

        let mut tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| EmbedError::ModelUnavailable(format!("failed to load tokenizer: {}", e)))?;
        tokenizer.with_padding(None);
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length,
                ..Default::default()
            }))
            .map_err(|e| EmbedError::ModelUnavailable(format!("bad truncation setting: {}", e)))?;

        Ok(Self {
            session,
            tokenizer,
            dimension,
        })
    }

    fn encode(&mut self, text: &str) -> EmbedResult<Vec<f32>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| EmbedError::Encoding(format!("tokenization failed: {}", e)))?;

        let input_ids: Vec<i64> = encoding.get_ids().iter().map(|&x| x as i64).collect();
        let attention_mask: Vec<i64> = encoding
            .get_attention_mask()
            .iter()
            .map(|&x| x as i64)
            .collect();
        let type_ids: Vec<i64> = encoding.get_type_ids().iter().map(|&x| x as i64).collect();
        let seq_len = input_ids.len();

        let ids = Value::from_array((vec![1, seq_len], input_ids)).map_err(encoding_error)?;
        let mask = Value::from_array((vec![1, seq_len], attention_mask.clone()))
            .map_err(encoding_error)?;
        let types = Value::from_array((vec![1, seq_len], type_ids)).map_err(encoding_error)?;

        let outputs = self
            .session
            .run(ort::inputs![
                "input_ids" => ids,
                "attention_mask" => mask,
                "token_type_ids" => types
            ])
            .map_err(encoding_error)?;

        let hidden = outputs
            .get("last_hidden_state")
            .or_else(|| outputs.get("sentence_embedding"))
            .ok_or_else(|| EmbedError::Encoding("model produced no usable output".into()))?;
        let (shape, data) = hidden.try_extract_tensor::<f32>().map_err(encoding_error)?;
        let dims: Vec<usize> = shape.iter().map(|&x| x as usize).collect();

        let mut embedding = pool(data, &dims, &attention_mask)?;
        if embedding.len() != self.dimension {
            return Err(EmbedError::Encoding(format!(
                "expected {} dimensions, model produced {}",
                self.dimension,
                embedding.len()
            )));
        }
        l2_normalize(&mut embedding);

        Ok(embedding)
    }
}

fn unavailable(e: impl std::fmt::Display) -> EmbedError {
    EmbedError::ModelUnavailable(e.to_string())
}

fn encoding_error(e: impl std::fmt::Display) -> EmbedError {
    EmbedError::Encoding(e.to_string())
}

/// Reduce model output to one vector.
///
/// `[1, dim]` is already pooled. `[1, tokens, dim]` is averaged over the
/// tokens the attention mask marks as real.
fn pool(data: &[f32], dims: &[usize], mask: &[i64]) -> EmbedResult<Vec<f32>> {
    match dims {
        [1, dim] if data.len() == *dim => Ok(data.to_vec()),
        [1, n, dim] if data.len() == n * dim && mask.len() == *n => {
            let mut pooled = vec![0.0f32; *dim];
            let mut count = 0.0f32;
            for (i, &m) in mask.iter().enumerate() {
                if m == 0 {
                    continue;
                }
                let row = &data[i * dim..(i + 1) * dim];
                pooled.iter_mut().zip(row).for_each(|(p, x)| *p += x);
                count += 1.0;
            }
            if count > 0.0 {
                pooled.iter_mut().for_each(|p| *p /= count);
            }
            Ok(pooled)
        }
        _ => Err(EmbedError::Encoding(format!(
            "unexpected output shape {:?}",
            dims
        ))),
    }
}

/// all-MiniLM-L6-v2 on ONNX Runtime, loaded at most once per process.
pub struct OnnxEmbedder {
    model_path: PathBuf,
    tokenizer_path: PathBuf,
    dimension: usize,
    max_length: usize,
    intra_threads: usize,
    model: OnceCell<Arc<Mutex<TextModel>>>,
}

impl OnnxEmbedder {
    pub fn new(config: &ModelConfig) -> Self {
        Self {
            model_path: config.model_path(),
            tokenizer_path: config.tokenizer_path(),
            dimension: config.dimension,
            max_length: config.max_length,
            intra_threads: config.intra_threads,
            model: OnceCell::new(),
        }
    }

    /// Load the model now rather than on the first request.
    pub async fn preload(&self) -> EmbedResult<()> {
        self.model().await.map(|_| ())
    }

    async fn model(&self) -> EmbedResult<Arc<Mutex<TextModel>>> {
        self.model
            .get_or_try_init(|| async {
                info!("Loading {} from {}", MODEL_NAME, self.model_path.display());
                let model_path = self.model_path.clone();
                let tokenizer_path = self.tokenizer_path.clone();
                let (dimension, max_length, intra_threads) =
                    (self.dimension, self.max_length, self.intra_threads);

                let model = tokio::task::spawn_blocking(move || {
                    TextModel::load(&model_path, &tokenizer_path, dimension, max_length, intra_threads)
                })
                .await
                .map_err(|e| EmbedError::ModelUnavailable(format!("model loader panicked: {}", e)))??;

                info!("Embedding model loaded");
                Ok::<_, EmbedError>(Arc::new(Mutex::new(model)))
            })
            .await
            .cloned()
    }
}

#[async_trait]
impl Embedder for OnnxEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> EmbedResult<Vec<f32>> {
        let model = self.model().await?;
        let text = text.to_string();
        debug!(chars = text.len(), "Encoding overview");

        tokio::task::spawn_blocking(move || {
            let mut model = model
                .lock()
                .map_err(|_| EmbedError::ModelUnavailable("model lock poisoned".into()))?;
            model.encode(&text)
        })
        .await
        .map_err(|e| EmbedError::Encoding(format!("encoder panicked: {}", e)))?
    }
}

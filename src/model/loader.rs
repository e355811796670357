use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use candle_core::quantized::gguf_file;
use candle_core::Device;
use candle_transformers::models::quantized_llama::ModelWeights;
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use crate::error::{EngineError, Result};

use super::backend::{InferenceBackend, LoadOptions, LoadedModel};
use super::runtime::CandleModel;
use super::ModelError;

/// Architectures `quantized_llama` can run
const SUPPORTED_ARCHITECTURES: &[&str] = &["llama", "mistral"];

/// Runs GGUF Llama-family models with candle
#[derive(Debug, Clone, Default)]
pub struct CandleBackend;

impl CandleBackend {
    /// Create the backend; nothing is loaded until `load`
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl InferenceBackend for CandleBackend {
    fn name(&self) -> &str {
        "candle-gguf"
    }

    async fn load(&self, options: &LoadOptions) -> Result<Arc<dyn LoadedModel>> {
        let task_options = options.clone();
        let model = tokio::task::spawn_blocking(move || load_gguf(&task_options))
            .await
            .map_err(|e| EngineError::ModelLoadError {
                path: options.model_path.clone(),
                message: "model loading task failed".to_string(),
                source: Some(Box::new(e)),
            })?
            .map_err(|e| EngineError::ModelLoadError {
                path: options.model_path.clone(),
                message: e.to_string(),
                source: Some(Box::new(e)),
            })?;

        Ok(Arc::new(model))
    }
}

fn load_gguf(options: &LoadOptions) -> std::result::Result<CandleModel, ModelError> {
    let mut file = File::open(&options.model_path)?;
    let content = gguf_file::Content::read(&mut file)
        .map_err(|e| ModelError::Format(e.to_string()))?;

    let architecture = metadata_string(&content, "general.architecture")
        .unwrap_or_else(|| "llama".to_string());
    if !SUPPORTED_ARCHITECTURES.contains(&architecture.as_str()) {
        return Err(ModelError::UnsupportedArchitecture(architecture));
    }

    if let Some(trained) = metadata_u32(&content, &format!("{}.context_length", architecture)) {
        if options.context_size > trained as usize {
            warn!(
                requested = options.context_size,
                trained,
                "Context size exceeds the model's training context"
            );
        }
    }

    let eos_token_id = metadata_u32(&content, "tokenizer.ggml.eos_token_id");
    debug!(
        architecture = %architecture,
        tensors = content.tensor_infos.len(),
        ?eos_token_id,
        "Read GGUF header"
    );

    let tokenizer_path = options
        .tokenizer_path
        .clone()
        .unwrap_or_else(|| default_tokenizer_path(&options.model_path));
    if !tokenizer_path.is_file() {
        return Err(ModelError::TokenizerMissing(tokenizer_path.display().to_string()));
    }
    let tokenizer = Tokenizer::from_file(&tokenizer_path)
        .map_err(|e| ModelError::Tokenizer(e.to_string()))?;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.threads)
        .thread_name(|i| format!("gguf-compute-{}", i))
        .build()?;

    let device = select_device();
    info!(device = ?device, threads = options.threads, "Loading weights");
    let weights = pool.install(|| ModelWeights::from_gguf(content, &mut file, &device))?;

    Ok(CandleModel::new(
        weights,
        tokenizer,
        device,
        eos_token_id,
        options.context_size,
        pool,
    ))
}

/// `tokenizer.json` next to the model file
pub(crate) fn default_tokenizer_path(model_path: &Path) -> PathBuf {
    model_path
        .parent()
        .map(|dir| dir.join("tokenizer.json"))
        .unwrap_or_else(|| PathBuf::from("tokenizer.json"))
}

fn metadata_string(content: &gguf_file::Content, key: &str) -> Option<String> {
    content.metadata.get(key).and_then(|v| v.to_string().ok()).cloned()
}

fn metadata_u32(content: &gguf_file::Content, key: &str) -> Option<u32> {
    content.metadata.get(key).and_then(|v| v.to_u32().ok())
}

/// Acceleration is whatever the build enables; CPU otherwise.
fn select_device() -> Device {
    #[cfg(feature = "cuda")]
    {
        if let Ok(device) = Device::new_cuda(0) {
            return device;
        }
    }

    #[cfg(feature = "metal")]
    {
        if let Ok(device) = Device::new_metal(0) {
            return device;
        }
    }

    Device::Cpu
}

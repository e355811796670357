//! Narrow interface to an inference engine

use std::path::PathBuf;
use std::sync::Arc;

use crate::error::Result;

/// Everything a backend needs to make a model resident
#[derive(Debug, Clone, PartialEq)]
pub struct LoadOptions {
    /// GGUF model file
    pub model_path: PathBuf,
    /// `tokenizer.json`; `None` looks next to the model
    pub tokenizer_path: Option<PathBuf>,
    /// Context window in tokens
    pub context_size: usize,
    /// Compute threads
    pub threads: usize,
}

/// Per-call generation parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingParams {
    /// Completion token budget
    pub max_tokens: usize,
    /// 0 selects argmax
    pub temperature: f64,
    /// Nucleus sampling threshold
    pub top_p: Option<f64>,
    /// Sampler seed
    pub seed: u64,
    /// 1.0 disables the penalty
    pub repeat_penalty: f32,
    /// Trailing tokens the penalty looks at
    pub repeat_last_n: usize,
    /// Literal strings that end generation
    pub stop_sequences: Vec<String>,
}

/// What a backend reports back. Usage counts are optional because not every
/// engine reports them; the session decides how to treat absent counts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawCompletion {
    /// Completion text, stop sequence excluded
    pub text: String,
    /// Tokens in the formatted prompt
    pub prompt_tokens: Option<usize>,
    /// Tokens counted toward `max_tokens`
    pub completion_tokens: Option<usize>,
    /// Prompt plus completion
    pub total_tokens: Option<usize>,
}

/// An inference engine able to load model files
#[async_trait::async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Short identifier used in logs
    fn name(&self) -> &str;

    /// Load the model described by `options`
    async fn load(&self, options: &LoadOptions) -> Result<Arc<dyn LoadedModel>>;
}

/// A resident model, immutable from the caller's side
#[async_trait::async_trait]
pub trait LoadedModel: Send + Sync {
    /// Context window the model was loaded with
    fn context_size(&self) -> usize;

    /// Run one completion for an already formatted prompt
    async fn generate(&self, prompt: &str, params: &SamplingParams) -> Result<RawCompletion>;
}

//! Model module: chat templating, the session lifecycle and the candle GGUF backend

mod backend;
mod loader;
mod runtime;
mod session;
mod stop;
mod template;

pub use backend::{InferenceBackend, LoadOptions, LoadedModel, RawCompletion, SamplingParams};
pub use loader::CandleBackend;
pub use runtime::CandleModel;
pub use session::{ModelHandle, ModelSession, SessionState};
pub use stop::{CompletionTracker, StopMatcher};
pub use template::{format_prompt, PromptTemplate, LLAMA3_TEMPLATE};

#[cfg(test)]
pub(crate) use backend::mock;

// Constants for model configuration
/// Context window in tokens
pub const DEFAULT_CONTEXT_SIZE: usize = 2048;
/// Completion token budget
pub const DEFAULT_MAX_TOKENS: usize = 256;
/// Sampling temperature
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
/// Threads used when the host core count cannot be read
pub const FALLBACK_THREAD_COUNT: usize = 4;
/// Llama 3 end-of-turn and end-of-text markers
pub const DEFAULT_STOP_SEQUENCES: &[&str] = &["<|eot_id|>", "<|end_of_text|>"];

/// Error type for backend-internal failures, attached as the source of an `EngineError`
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// Model file could not be opened or read
    #[error("Failed to open model file: {0}")]
    Io(#[from] std::io::Error),

    /// GGUF header could not be parsed
    #[error("Not a readable GGUF file: {0}")]
    Format(String),

    /// `general.architecture` is not a Llama-family model
    #[error("Unsupported model architecture: {0}")]
    UnsupportedArchitecture(String),

    /// No `tokenizer.json` at the resolved path
    #[error("Tokenizer not found at {0}")]
    TokenizerMissing(String),

    /// Tokenizer failed to load, encode or decode
    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    /// Tensor operation failed
    #[error("Tensor error: {0}")]
    Candle(#[from] candle_core::Error),

    /// Compute pool could not be created
    #[error("Failed to build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

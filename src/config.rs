// Location: src/config.rs

//! Engine configuration, loadable from JSON

use std::path::{Path, PathBuf};
use serde::{Serialize, Deserialize};

use crate::error::{EngineError, Result};
use crate::model::{
    DEFAULT_CONTEXT_SIZE, DEFAULT_MAX_TOKENS, DEFAULT_STOP_SEQUENCES, DEFAULT_TEMPERATURE,
};

/// Top-level configuration. Every section falls back to its defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Model loading
    pub model: ModelConfig,
    /// Sampling and limits
    pub generation: GenerationConfig,
    /// Log output
    pub logging: LoggingConfig,
}

/// How the model is made resident
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Path to a HuggingFace `tokenizer.json`; defaults to the model's directory
    pub tokenizer_path: Option<PathBuf>,

    /// Context window in tokens (prompt + completion)
    pub context_size: usize,

    /// Compute threads; `None` uses the host's logical core count
    pub threads: Option<usize>,
}

/// Sampling parameters and completion limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Maximum number of tokens to generate
    pub max_tokens: usize,

    /// Temperature for sampling, 0 selects greedy decoding
    pub temperature: f64,

    /// Top-p sampling threshold
    pub top_p: Option<f64>,

    /// Sampling seed; random per run when unset
    pub seed: Option<u64>,

    /// Repetition penalty, 1.0 disables it
    pub repeat_penalty: f32,

    /// Number of trailing tokens the repetition penalty looks at
    pub repeat_last_n: usize,

    /// Literal strings that end generation
    pub stop_sequences: Vec<String>,
}

/// Log output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: LogLevel,

    /// Optional log file, stderr otherwise
    pub file_path: Option<PathBuf>,
}

/// Minimum level of emitted log events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Errors only
    Error,
    /// Warnings and errors
    Warn,
    /// Phase boundaries
    Info,
    /// Parameters and timings
    Debug,
    /// Everything
    Trace,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            tokenizer_path: None,
            context_size: DEFAULT_CONTEXT_SIZE,
            threads: None,
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            top_p: None,
            seed: None,
            repeat_penalty: 1.1,
            repeat_last_n: 64,
            stop_sequences: DEFAULT_STOP_SEQUENCES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Warn,
            file_path: None,
        }
    }
}

impl EngineConfig {
    /// Read a JSON config file. Missing fields keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config {}: {}", path.display(), e))?;
        let config: EngineConfig = serde_json::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("Invalid config {}: {}", path.display(), e))?;
        Ok(config)
    }

    /// Reject values no run could use
    pub fn validate(&self) -> Result<()> {
        if self.model.context_size == 0 {
            return Err(EngineError::config("context_size", "Context size must be positive"));
        }

        if self.model.threads == Some(0) {
            return Err(EngineError::config("threads", "Thread count must be positive"));
        }

        self.generation.validate()
    }
}

impl GenerationConfig {
    /// Sampling values must be in range and at least one stop sequence set
    pub fn validate(&self) -> Result<()> {
        validate_temperature(self.temperature)?;
        validate_stop_sequences(&self.stop_sequences)?;

        if let Some(top_p) = self.top_p {
            if !(top_p > 0.0 && top_p <= 1.0) {
                return Err(EngineError::config("top_p", "Top-p must be in (0, 1]"));
            }
        }

        if !self.repeat_penalty.is_finite() || self.repeat_penalty <= 0.0 {
            return Err(EngineError::config("repeat_penalty", "Repeat penalty must be positive"));
        }

        Ok(())
    }
}

pub(crate) fn validate_temperature(temperature: f64) -> Result<()> {
    if !temperature.is_finite() || temperature < 0.0 {
        return Err(EngineError::config(
            "temperature",
            format!("Temperature must be a finite value >= 0, got {}", temperature),
        ));
    }
    Ok(())
}

pub(crate) fn validate_stop_sequences(stop_sequences: &[String]) -> Result<()> {
    if stop_sequences.is_empty() {
        return Err(EngineError::config("stop_sequences", "At least one stop sequence is required"));
    }
    if stop_sequences.iter().any(|s| s.is_empty()) {
        return Err(EngineError::config("stop_sequences", "Stop sequences cannot be empty strings"));
    }
    Ok(())
}

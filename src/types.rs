//! Common type definitions used throughout the engine

use std::path::PathBuf;
use serde::{Deserialize, Serialize};

use crate::config::{validate_stop_sequences, validate_temperature};
use crate::error::{EngineError, Result};
use crate::metrics::{GenerationStats, TimingRecord};

/// A single chat completion request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// GGUF model file
    pub model_path: PathBuf,
    /// Raw user message, formatted by the engine before generation
    pub prompt_text: String,
    /// Completion token budget, 0 yields an empty completion
    pub max_tokens: usize,
    /// Sampling temperature, 0 for greedy decoding
    pub temperature: f64,
    /// Literal strings that end generation
    pub stop_sequences: Vec<String>,
}

impl GenerationRequest {
    /// Checks that run before any model work
    pub fn validate(&self) -> Result<()> {
        if !self.model_path.exists() {
            return Err(EngineError::ModelFileNotFound {
                path: self.model_path.clone(),
            });
        }
        validate_temperature(self.temperature)?;
        validate_stop_sequences(&self.stop_sequences)
    }
}

/// Generated text with token usage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResult {
    /// Completion text
    pub text: String,
    /// Tokens in the formatted prompt
    pub prompt_tokens: usize,
    /// Generated tokens, never more than `max_tokens`
    pub completion_tokens: usize,
    /// Prompt plus completion
    pub total_tokens: usize,
}

/// Everything a run produces, handed to the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// The user message as given
    pub prompt: String,
    /// Generated text
    pub response: String,
    /// Tokens in the formatted prompt
    pub prompt_tokens: usize,
    /// Generated tokens
    pub completion_tokens: usize,
    /// Prompt plus completion
    pub total_tokens: usize,
    /// Load and inference durations
    pub timing: TimingRecord,
    /// Derived throughput
    pub stats: GenerationStats,
}

impl RunReport {
    /// Assemble a report from a finished run
    pub fn new(
        prompt: impl Into<String>,
        result: GenerationResult,
        timing: TimingRecord,
        stats: GenerationStats,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            response: result.text,
            prompt_tokens: result.prompt_tokens,
            completion_tokens: result.completion_tokens,
            total_tokens: result.total_tokens,
            timing,
            stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn request(path: PathBuf) -> GenerationRequest {
        GenerationRequest {
            model_path: path,
            prompt_text: "Tell me a joke.".to_string(),
            max_tokens: 256,
            temperature: 0.7,
            stop_sequences: vec!["<|eot_id|>".to_string()],
        }
    }

    #[test]
    fn test_request_validation() {
        let model = tempfile::NamedTempFile::new().unwrap();
        assert!(request(model.path().to_path_buf()).validate().is_ok());

        let error = request(PathBuf::from("/nonexistent/model.gguf")).validate().unwrap_err();
        assert_eq!(error.kind(), ErrorKind::ModelFileNotFound);

        let mut zero_budget = request(model.path().to_path_buf());
        zero_budget.max_tokens = 0;
        assert!(zero_budget.validate().is_ok());

        let mut cold = request(model.path().to_path_buf());
        cold.temperature = -0.5;
        assert_eq!(cold.validate().unwrap_err().kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_report_serialization() {
        let report = RunReport::new(
            "hi",
            GenerationResult {
                text: "hello".to_string(),
                prompt_tokens: 5,
                completion_tokens: 0,
                total_tokens: 5,
            },
            TimingRecord {
                load_seconds: 1.5,
                inference_seconds: 0.0,
            },
            GenerationStats { tokens_per_second: None },
        );

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["response"], "hello");
        assert_eq!(json["timing"]["load_seconds"], 1.5);
        assert!(json["stats"].get("tokens_per_second").is_none());
    }
}

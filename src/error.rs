//! Error types returned by the engine

use std::error::Error as StdError;
use std::fmt;
use std::path::PathBuf;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors a run can end with
#[derive(Debug)]
pub enum EngineError {
    /// The model path does not exist; nothing was loaded
    ModelFileNotFound {
        /// Path as given
        path: PathBuf,
    },
    /// The model or its tokenizer could not be made resident
    ModelLoadError {
        /// Model file
        path: PathBuf,
        /// What went wrong
        message: String,
        /// Underlying cause, if any
        source: Option<Box<dyn StdError + Send + Sync>>,
    },
    /// The backend failed during generation
    GenerationError {
        /// What went wrong
        message: String,
        /// Underlying cause, if any
        source: Option<Box<dyn StdError + Send + Sync>>,
    },
    /// Prompt plus completion budget exceeds the context window
    ContextOverflow {
        /// Tokens in the formatted prompt
        prompt_tokens: usize,
        /// Requested completion budget
        max_tokens: usize,
        /// Context window of the loaded model
        context_size: usize,
    },
    /// A configuration or request value is out of range
    ConfigurationError {
        /// Why the value was rejected
        message: String,
        /// Offending parameter
        parameter: String,
    },
}

/// Coarse classification used by callers that only care about the failing stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing model file
    ModelFileNotFound,
    /// Load failure
    ModelLoad,
    /// Generation failure, context overflow included
    Generation,
    /// Invalid configuration
    Configuration,
}

impl EngineError {
    /// Load failure without an underlying cause
    pub fn load(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        EngineError::ModelLoadError {
            path: path.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Generation failure without an underlying cause
    pub fn generation(message: impl Into<String>) -> Self {
        EngineError::GenerationError {
            message: message.into(),
            source: None,
        }
    }

    /// Invalid value for `parameter`
    pub fn config(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        EngineError::ConfigurationError {
            message: message.into(),
            parameter: parameter.into(),
        }
    }

    /// Stage the error belongs to
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::ModelFileNotFound { .. } => ErrorKind::ModelFileNotFound,
            EngineError::ModelLoadError { .. } => ErrorKind::ModelLoad,
            EngineError::GenerationError { .. } | EngineError::ContextOverflow { .. } => {
                ErrorKind::Generation
            }
            EngineError::ConfigurationError { .. } => ErrorKind::Configuration,
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::ModelFileNotFound { path } => {
                write!(f, "Model file not found: {}", path.display())
            }
            EngineError::ModelLoadError { path, message, .. } => {
                write!(f, "Failed to load model {}: {}", path.display(), message)
            }
            EngineError::GenerationError { message, .. } => {
                write!(f, "Generation error: {}", message)
            }
            EngineError::ContextOverflow { prompt_tokens, max_tokens, context_size } => {
                write!(
                    f,
                    "Context overflow: {} prompt tokens + {} max tokens exceeds context window of {}",
                    prompt_tokens, max_tokens, context_size
                )
            }
            EngineError::ConfigurationError { message, parameter } => {
                write!(f, "Configuration error for {}: {}", parameter, message)
            }
        }
    }
}

impl StdError for EngineError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        let source = match self {
            EngineError::ModelLoadError { source, .. } => source.as_ref(),
            EngineError::GenerationError { source, .. } => source.as_ref(),
            _ => None,
        };
        source.map(|s| s.as_ref() as &(dyn StdError + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = EngineError::ContextOverflow {
            prompt_tokens: 1900,
            max_tokens: 256,
            context_size: 2048,
        };
        assert_eq!(
            error.to_string(),
            "Context overflow: 1900 prompt tokens + 256 max tokens exceeds context window of 2048"
        );

        let error = EngineError::ModelFileNotFound { path: PathBuf::from("/tmp/missing.gguf") };
        assert_eq!(error.to_string(), "Model file not found: /tmp/missing.gguf");
    }

    #[test]
    fn test_error_kind_classification() {
        let overflow = EngineError::ContextOverflow {
            prompt_tokens: 10,
            max_tokens: 10,
            context_size: 8,
        };
        assert_eq!(overflow.kind(), ErrorKind::Generation);
        assert_eq!(EngineError::load("m.gguf", "bad magic").kind(), ErrorKind::ModelLoad);
        assert_eq!(EngineError::config("temperature", "negative").kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_error_source_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let error = EngineError::ModelLoadError {
            path: PathBuf::from("m.gguf"),
            message: "cannot open".to_string(),
            source: Some(Box::new(io)),
        };
        let source = error.source().expect("source is attached");
        assert_eq!(source.to_string(), "denied");
    }
}

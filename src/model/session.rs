use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::{
    config::{validate_stop_sequences, validate_temperature},
    error::{EngineError, ErrorKind, Result},
    types::GenerationResult,
    utils::Stopwatch,
};

use super::backend::{InferenceBackend, LoadOptions, LoadedModel, RawCompletion, SamplingParams};

/// Lifecycle of a session. Any stage may end in `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing loaded yet
    Idle,
    /// `load` in progress
    Loading,
    /// Model resident, ready to generate
    Loaded,
    /// `generate` in progress
    Generating,
    /// Last generation succeeded; the model stays resident
    Completed,
    /// A stage failed with this kind of error
    Failed(ErrorKind),
}

/// A resident model together with the settings it was loaded with
pub struct ModelHandle {
    model: Arc<dyn LoadedModel>,
    model_path: PathBuf,
    context_size: usize,
    threads: usize,
}

impl ModelHandle {
    /// Model file the handle was loaded from
    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    /// Context window in tokens
    pub fn context_size(&self) -> usize {
        self.context_size
    }

    /// Compute threads the backend was given
    pub fn threads(&self) -> usize {
        self.threads
    }
}

impl fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelHandle")
            .field("model_path", &self.model_path)
            .field("context_size", &self.context_size)
            .field("threads", &self.threads)
            .finish_non_exhaustive()
    }
}

/// Owns one model handle for its whole life: it loads once and never reloads.
pub struct ModelSession {
    backend: Arc<dyn InferenceBackend>,
    state: SessionState,
    handle: Option<ModelHandle>,
}

impl ModelSession {
    /// Idle session over `backend`
    pub fn new(backend: Arc<dyn InferenceBackend>) -> Self {
        Self {
            backend,
            state: SessionState::Idle,
            handle: None,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The loaded model, once `load` succeeded
    pub fn handle(&self) -> Option<&ModelHandle> {
        self.handle.as_ref()
    }

    /// Load the model and return how long it took.
    pub async fn load(&mut self, options: &LoadOptions) -> Result<Duration> {
        if self.state != SessionState::Idle {
            return Err(EngineError::load(
                &options.model_path,
                format!("session is {:?}; a session loads at most once", self.state),
            ));
        }

        if !options.model_path.is_file() {
            self.state = SessionState::Failed(ErrorKind::ModelLoad);
            return Err(EngineError::load(&options.model_path, "path does not exist or is not a file"));
        }

        self.state = SessionState::Loading;
        info!(
            backend = self.backend.name(),
            path = %options.model_path.display(),
            context_size = options.context_size,
            threads = options.threads,
            "Loading model"
        );

        let stopwatch = Stopwatch::start("load");
        let loaded = self.backend.load(options).await;
        let elapsed = stopwatch.stop();

        match loaded {
            Ok(model) => {
                self.handle = Some(ModelHandle {
                    model,
                    model_path: options.model_path.clone(),
                    context_size: options.context_size,
                    threads: options.threads,
                });
                self.state = SessionState::Loaded;
                info!(seconds = elapsed.as_secs_f64(), "Model loaded");
                Ok(elapsed)
            }
            Err(e) => {
                self.state = SessionState::Failed(e.kind());
                Err(e)
            }
        }
    }

    /// Run one completion for an already formatted prompt.
    pub async fn generate(
        &mut self,
        prompt_text: &str,
        params: &SamplingParams,
    ) -> Result<(GenerationResult, Duration)> {
        let model = match (self.state, self.handle.as_ref()) {
            (SessionState::Loaded | SessionState::Completed, Some(handle)) => handle.model.clone(),
            (SessionState::Failed(kind), _) => {
                return Err(EngineError::generation(format!(
                    "session failed earlier ({:?}); no usable model",
                    kind
                )));
            }
            (state, _) => {
                return Err(EngineError::generation(format!("no model loaded (session is {:?})", state)));
            }
        };

        validate_temperature(params.temperature)?;
        validate_stop_sequences(&params.stop_sequences)?;

        self.state = SessionState::Generating;
        debug!(
            prompt_bytes = prompt_text.len(),
            max_tokens = params.max_tokens,
            temperature = params.temperature,
            stops = params.stop_sequences.len(),
            "Generating"
        );

        let stopwatch = Stopwatch::start("generate");
        let raw = model.generate(prompt_text, params).await;
        let elapsed = stopwatch.stop();

        let result = raw.and_then(|raw| normalize(raw, params.max_tokens, model.context_size()));
        match result {
            Ok(result) => {
                self.state = SessionState::Completed;
                info!(
                    seconds = elapsed.as_secs_f64(),
                    completion_tokens = result.completion_tokens,
                    "Generation finished"
                );
                Ok((result, elapsed))
            }
            Err(e) => {
                self.state = SessionState::Failed(e.kind());
                Err(e)
            }
        }
    }
}

/// Turn a backend report into a result, defaulting absent usage counts to zero.
fn normalize(raw: RawCompletion, max_tokens: usize, context_size: usize) -> Result<GenerationResult> {
    let prompt_tokens = usage_or_zero(raw.prompt_tokens, "prompt_tokens");
    let completion_tokens = usage_or_zero(raw.completion_tokens, "completion_tokens");
    let total_tokens = usage_or_zero(raw.total_tokens, "total_tokens");

    if completion_tokens > max_tokens {
        return Err(EngineError::generation(format!(
            "backend produced {} completion tokens with a limit of {}",
            completion_tokens, max_tokens
        )));
    }

    let fits = prompt_tokens
        .checked_add(max_tokens)
        .map_or(false, |needed| needed <= context_size);
    if !fits {
        return Err(EngineError::ContextOverflow {
            prompt_tokens,
            max_tokens,
            context_size,
        });
    }

    Ok(GenerationResult {
        text: raw.text,
        prompt_tokens,
        completion_tokens,
        total_tokens,
    })
}

fn usage_or_zero(count: Option<usize>, field: &'static str) -> usize {
    count.unwrap_or_else(|| {
        warn!(field, "Backend did not report usage count, defaulting to 0");
        0
    })
}

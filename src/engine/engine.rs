use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hasher};
use std::sync::Arc;

use tracing::{debug, info, info_span, Instrument};

use crate::{
    config::EngineConfig,
    error::{EngineError, Result},
    metrics::{StatisticsCollector, TimingRecord},
    model::{format_prompt, InferenceBackend, LoadOptions, ModelSession, SamplingParams},
    types::{GenerationRequest, RunReport},
    HostInfo,
};

use super::builder::EngineBuilder;

/// Runs one chat completion end to end: format, load, generate, measure.
pub struct ChatEngine {
    pub(super) config: Arc<EngineConfig>,
    pub(super) host: HostInfo,
    pub(super) backend: Arc<dyn InferenceBackend>,
    pub(super) statistics: StatisticsCollector,
}

impl ChatEngine {
    /// Create a new engine builder
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Validated configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Identifier of the injected backend
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Threads the backend will be asked to use
    pub fn thread_count(&self) -> usize {
        self.config.model.threads.unwrap_or(self.host.logical_cores)
    }

    /// Load options for `request`, resolved against config and host facts
    pub fn load_options(&self, request: &GenerationRequest) -> LoadOptions {
        LoadOptions {
            model_path: request.model_path.clone(),
            tokenizer_path: self.config.model.tokenizer_path.clone(),
            context_size: self.config.model.context_size,
            threads: self.thread_count(),
        }
    }

    /// Sampling parameters for `request`; the remaining knobs come from config
    pub fn sampling_params(&self, request: &GenerationRequest) -> SamplingParams {
        let generation = &self.config.generation;
        SamplingParams {
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            top_p: generation.top_p,
            seed: generation.seed.unwrap_or_else(random_seed),
            repeat_penalty: generation.repeat_penalty,
            repeat_last_n: generation.repeat_last_n,
            stop_sequences: request.stop_sequences.clone(),
        }
    }

    /// Run the request. Any failure aborts the run and is returned unchanged.
    pub async fn run(&self, request: &GenerationRequest) -> Result<RunReport> {
        request.validate()?;

        let span = info_span!("run", model = %request.model_path.display());
        async {
            let formatted = format_prompt(&request.prompt_text);
            debug!(bytes = formatted.len(), "Formatted prompt");

            let mut session = ModelSession::new(self.backend.clone());
            let load = session.load(&self.load_options(request)).await?;
            if let Some(handle) = session.handle() {
                debug!(
                    path = %handle.model_path().display(),
                    context_size = handle.context_size(),
                    threads = handle.threads(),
                    "Model resident"
                );
            }

            let params = self.sampling_params(request);
            let (result, inference) = session.generate(&formatted, &params).await?;

            let timing = TimingRecord::from_durations(load, inference);
            let stats = self.statistics.compute(&result, timing.inference_seconds);
            info!(
                load_seconds = timing.load_seconds,
                inference_seconds = timing.inference_seconds,
                total_seconds = timing.total_seconds(),
                completion_tokens = result.completion_tokens,
                tokens_per_second = ?stats.tokens_per_second,
                "Run complete"
            );

            Ok::<_, EngineError>(RunReport::new(request.prompt_text.clone(), result, timing, stats))
        }
        .instrument(span)
        .await
    }
}

fn random_seed() -> u64 {
    RandomState::new().build_hasher().finish()
}

// Location: src/model/runtime.rs

use std::sync::Arc;

use candle_core::{DType, Device, Tensor};
use candle_transformers::generation::LogitsProcessor;
use candle_transformers::models::quantized_llama::ModelWeights;
use parking_lot::Mutex;
use tokenizers::Tokenizer;
use tracing::debug;

use crate::error::{EngineError, Result};

use super::backend::{LoadedModel, RawCompletion, SamplingParams};
use super::stop::{CompletionTracker, StopMatcher};
use super::ModelError;

/// A GGUF model resident in memory
pub struct CandleModel {
    inner: Arc<RuntimeInner>,
}

struct RuntimeInner {
    weights: Mutex<ModelWeights>,
    tokenizer: Tokenizer,
    device: Device,
    eos_token_id: Option<u32>,
    context_size: usize,
    pool: rayon::ThreadPool,
}

impl CandleModel {
    pub(crate) fn new(
        weights: ModelWeights,
        tokenizer: Tokenizer,
        device: Device,
        eos_token_id: Option<u32>,
        context_size: usize,
        pool: rayon::ThreadPool,
    ) -> Self {
        Self {
            inner: Arc::new(RuntimeInner {
                weights: Mutex::new(weights),
                tokenizer,
                device,
                eos_token_id,
                context_size,
                pool,
            }),
        }
    }
}

#[async_trait::async_trait]
impl LoadedModel for CandleModel {
    fn context_size(&self) -> usize {
        self.inner.context_size
    }

    async fn generate(&self, prompt: &str, params: &SamplingParams) -> Result<RawCompletion> {
        let inner = self.inner.clone();
        let prompt = prompt.to_string();
        let params = params.clone();

        tokio::task::spawn_blocking(move || inner.pool.install(|| inner.generate(&prompt, &params)))
            .await
            .map_err(|e| EngineError::GenerationError {
                message: "generation task failed".to_string(),
                source: Some(Box::new(e)),
            })?
    }
}

impl RuntimeInner {
    fn generate(&self, prompt: &str, params: &SamplingParams) -> Result<RawCompletion> {
        // The formatted prompt already carries <|begin_of_text|>
        let prompt_tokens = self
            .tokenizer
            .encode(prompt, false)
            .map_err(|e| generation_failure(ModelError::Tokenizer(e.to_string())))?
            .get_ids()
            .to_vec();

        check_context(prompt_tokens.len(), params.max_tokens, self.context_size)?;

        let (text, completion_tokens) = if params.max_tokens == 0 {
            (String::new(), 0)
        } else {
            self.sample(&prompt_tokens, params).map_err(generation_failure)?
        };

        Ok(RawCompletion {
            text,
            prompt_tokens: Some(prompt_tokens.len()),
            completion_tokens: Some(completion_tokens),
            total_tokens: Some(prompt_tokens.len() + completion_tokens),
        })
    }

    fn sample(
        &self,
        prompt_tokens: &[u32],
        params: &SamplingParams,
    ) -> std::result::Result<(String, usize), ModelError> {
        let mut weights = self.weights.lock();
        sample_tokens(
            &mut *weights,
            &self.device,
            prompt_tokens,
            params,
            self.eos_token_id,
            |ids| {
                self.tokenizer
                    .decode(ids, false)
                    .map_err(|e| ModelError::Tokenizer(e.to_string()))
            },
        )
    }
}

/// One forward step over a KV-cached model. `index_pos` 0 starts a fresh sequence.
pub(crate) trait ForwardStep {
    fn forward_step(&mut self, input: &Tensor, index_pos: usize) -> candle_core::Result<Tensor>;
}

impl ForwardStep for ModelWeights {
    fn forward_step(&mut self, input: &Tensor, index_pos: usize) -> candle_core::Result<Tensor> {
        self.forward(input, index_pos)
    }
}

/// Autoregressive loop: prompt prefill, then one token per step until EOS,
/// a stop sequence or the token budget.
fn sample_tokens<M, D>(
    model: &mut M,
    device: &Device,
    prompt_tokens: &[u32],
    params: &SamplingParams,
    eos_token_id: Option<u32>,
    decode: D,
) -> std::result::Result<(String, usize), ModelError>
where
    M: ForwardStep,
    D: Fn(&[u32]) -> std::result::Result<String, ModelError>,
{
    let mut logits_processor = logits_processor(params);
    let mut tracker = CompletionTracker::new(
        StopMatcher::new(&params.stop_sequences),
        params.max_tokens,
    );
    let mut generated: Vec<u32> = Vec::new();

    // index_pos 0 also resets the KV cache from any previous call
    let input = Tensor::new(prompt_tokens, device)?.unsqueeze(0)?;
    let mut logits = model.forward_step(&input, 0)?;

    loop {
        let logits_f32 = logits.squeeze(0)?.to_dtype(DType::F32)?;
        let logits_f32 = if params.repeat_penalty == 1.0 {
            logits_f32
        } else {
            let start_at = generated.len().saturating_sub(params.repeat_last_n);
            candle_transformers::utils::apply_repeat_penalty(
                &logits_f32,
                params.repeat_penalty,
                &generated[start_at..],
            )?
        };

        let next_token = logits_processor.sample(&logits_f32)?;
        if Some(next_token) == eos_token_id {
            tracker.end_of_sequence();
            break;
        }

        generated.push(next_token);
        if tracker.observe(decode(&generated)?) {
            break;
        }

        let input = Tensor::new(&[next_token], device)?.unsqueeze(0)?;
        logits = model.forward_step(&input, prompt_tokens.len() + generated.len() - 1)?;
    }

    debug!(
        sampled = generated.len(),
        counted = tracker.completion_tokens(),
        stopped = tracker.stopped(),
        "Sampling finished"
    );

    let completion_tokens = tracker.completion_tokens();
    Ok((tracker.into_text(), completion_tokens))
}

fn logits_processor(params: &SamplingParams) -> LogitsProcessor {
    // Temperature 0 becomes argmax, which ignores the seed
    let temperature = if params.temperature > 0.0 {
        Some(params.temperature)
    } else {
        None
    };
    LogitsProcessor::new(params.seed, temperature, params.top_p)
}

/// Prompt plus completion budget must fit the context window.
pub(crate) fn check_context(prompt_tokens: usize, max_tokens: usize, context_size: usize) -> Result<()> {
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
    Ok(())
}

fn generation_failure(error: ModelError) -> EngineError {
    EngineError::GenerationError {
        message: error.to_string(),
        source: Some(Box::new(error)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn params(temperature: f64) -> SamplingParams {
        SamplingParams {
            max_tokens: 8,
            temperature,
            top_p: None,
            seed: 299792458,
            repeat_penalty: 1.0,
            repeat_last_n: 64,
            stop_sequences: vec!["<|eot_id|>".to_string()],
        }
    }

    #[test]
    fn test_check_context() {
        assert!(check_context(1792, 256, 2048).is_ok());

        let error = check_context(1793, 256, 2048).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Generation);
        assert!(matches!(
            error,
            EngineError::ContextOverflow { prompt_tokens: 1793, max_tokens: 256, context_size: 2048 }
        ));
    }

    #[test]
    fn test_check_context_huge_budget() {
        let error = check_context(10, usize::MAX, 2048).unwrap_err();
        assert!(matches!(
            error,
            EngineError::ContextOverflow { prompt_tokens: 10, max_tokens: usize::MAX, context_size: 2048 }
        ));
        assert!(check_context(usize::MAX, 1, usize::MAX).is_err());
    }

    /// KV-cached stand-in: rejects positions that do not continue the cache
    /// and favours token `cached % 5 + 1` after each step.
    struct CachedModel {
        vocab: usize,
        cached: usize,
        positions: Vec<usize>,
    }

    impl CachedModel {
        fn new() -> Self {
            Self { vocab: 8, cached: 0, positions: Vec::new() }
        }
    }

    impl ForwardStep for CachedModel {
        fn forward_step(&mut self, input: &Tensor, index_pos: usize) -> candle_core::Result<Tensor> {
            if index_pos == 0 {
                self.cached = 0;
            } else if index_pos != self.cached {
                return Err(candle_core::Error::Msg(format!(
                    "position {} does not continue a cache of {}",
                    index_pos, self.cached
                )));
            }
            self.positions.push(index_pos);
            self.cached += input.dim(1)?;

            let mut logits = vec![0f32; self.vocab];
            logits[self.cached % 5 + 1] = 10.0;
            Tensor::from_vec(logits, (1, self.vocab), &Device::Cpu)
        }
    }

    fn decode(ids: &[u32]) -> std::result::Result<String, ModelError> {
        Ok(ids.iter().map(|id| format!("t{} ", id)).collect())
    }

    fn greedy(max_tokens: usize, stop: &str) -> SamplingParams {
        SamplingParams {
            max_tokens,
            stop_sequences: vec![stop.to_string()],
            ..params(0.0)
        }
    }

    #[test]
    fn test_sampling_loop_positions() -> anyhow::Result<()> {
        let mut model = CachedModel::new();
        let (text, count) =
            sample_tokens(&mut model, &Device::Cpu, &[1, 2, 3], &greedy(4, "<|eot_id|>"), None, decode)?;

        assert_eq!(text, "t4 t5 t1 t2 ");
        assert_eq!(count, 4);
        assert_eq!(model.positions, vec![0, 3, 4, 5]);
        Ok(())
    }

    #[test]
    fn test_repeated_greedy_calls_reset_cache() -> anyhow::Result<()> {
        let mut model = CachedModel::new();
        let params = greedy(6, "<|eot_id|>");

        let first = sample_tokens(&mut model, &Device::Cpu, &[1, 2, 3], &params, None, decode)?;
        let second = sample_tokens(&mut model, &Device::Cpu, &[1, 2, 3], &params, None, decode)?;
        assert_eq!(first, second);
        assert_eq!(model.positions.iter().filter(|&&p| p == 0).count(), 2);
        Ok(())
    }

    #[test]
    fn test_sampling_loop_eos_and_stop() -> anyhow::Result<()> {
        let mut model = CachedModel::new();
        let (text, count) =
            sample_tokens(&mut model, &Device::Cpu, &[1, 2, 3], &greedy(8, "<|eot_id|>"), Some(5), decode)?;
        assert_eq!((text.as_str(), count), ("t4 ", 1));

        let (text, count) =
            sample_tokens(&mut model, &Device::Cpu, &[1, 2, 3], &greedy(8, "t1"), None, decode)?;
        assert_eq!((text.as_str(), count), ("t4 t5 ", 2));
        Ok(())
    }

    #[test]
    fn test_greedy_sampling_is_deterministic() -> anyhow::Result<()> {
        let logits = Tensor::new(&[0.1f32, 2.5, -1.0, 2.4], &Device::Cpu)?;

        let mut first = logits_processor(&params(0.0));
        let mut second = logits_processor(&params(0.0));
        for _ in 0..5 {
            assert_eq!(first.sample(&logits)?, 1);
            assert_eq!(second.sample(&logits)?, 1);
        }
        Ok(())
    }

    #[test]
    fn test_seeded_sampling_is_reproducible() -> anyhow::Result<()> {
        let logits = Tensor::new(&[1.0f32, 1.1, 0.9, 1.05], &Device::Cpu)?;

        let mut first = logits_processor(&params(0.8));
        let mut second = logits_processor(&params(0.8));
        for _ in 0..16 {
            assert_eq!(first.sample(&logits)?, second.sample(&logits)?);
        }
        Ok(())
    }

    #[test]
    fn test_generation_failure_keeps_source() {
        use std::error::Error as _;

        let error = generation_failure(ModelError::Tokenizer("bad token".to_string()));
        assert_eq!(error.kind(), ErrorKind::Generation);
        assert_eq!(error.source().unwrap().to_string(), "Tokenizer error: bad token");
    }
}

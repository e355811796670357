//! Drive a `ModelSession` directly: load once, generate twice greedily and
//! compare the outputs.
//!
//! cargo run --release --example run_once -- [model.gguf] [prompt]

use std::path::PathBuf;
use std::sync::Arc;

use gguf_chat::{
    cli::{default_model_path, DEFAULT_PROMPT},
    format_prompt,
    model::{LoadOptions, SamplingParams, DEFAULT_STOP_SEQUENCES},
    CandleBackend, HostInfo, ModelSession, StatisticsCollector, TimingRecord,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let model_path = args.next().map(PathBuf::from).unwrap_or_else(default_model_path);
    let prompt = args.next().unwrap_or_else(|| DEFAULT_PROMPT.to_string());

    let host = HostInfo::detect();
    let mut session = ModelSession::new(Arc::new(CandleBackend::new()));
    let load = session
        .load(&LoadOptions {
            model_path,
            tokenizer_path: None,
            context_size: 2048,
            threads: host.logical_cores,
        })
        .await?;

    if let Some(handle) = session.handle() {
        println!(
            "Loaded {} ({} ctx, {} threads) in {:.2}s",
            handle.model_path().display(),
            handle.context_size(),
            handle.threads(),
            load.as_secs_f64()
        );
    }

    let params = SamplingParams {
        max_tokens: 64,
        temperature: 0.0,
        top_p: None,
        seed: 0,
        repeat_penalty: 1.0,
        repeat_last_n: 64,
        stop_sequences: DEFAULT_STOP_SEQUENCES.iter().map(|s| s.to_string()).collect(),
    };
    let formatted = format_prompt(&prompt);

    let (first, inference) = session.generate(&formatted, &params).await?;
    let (second, _) = session.generate(&formatted, &params).await?;

    let timing = TimingRecord::from_durations(load, inference);
    let stats = StatisticsCollector::new().compute(&first, timing.inference_seconds);

    println!("{}", first.text.trim());
    println!(
        "{} completion tokens, {:.2}s total, {}",
        first.completion_tokens,
        timing.total_seconds(),
        stats
            .tokens_per_second
            .map(|rate| format!("{:.2} tokens/sec", rate))
            .unwrap_or_else(|| "no rate".to_string())
    );
    println!("Repeat identical: {}", first == second);
    Ok(())
}

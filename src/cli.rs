//! Command-line surface: argument parsing, config layering and report output

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use tracing::debug;

use crate::{
    config::{EngineConfig, LogLevel},
    engine::ChatEngine,
    model::InferenceBackend,
    types::{GenerationRequest, RunReport},
    HostInfo, NAME, VERSION,
};

/// Prompt used when `--prompt` is not given
pub const DEFAULT_PROMPT: &str = "Tell me a short joke about programming.";
/// File name of the default model
pub const MODEL_FILE_NAME: &str = "Llama-3.2-1B-Instruct-f16.gguf";
/// Download location of the default model
pub const MODEL_URL: &str =
    "https://huggingface.co/bartowski/Llama-3.2-1B-Instruct-GGUF/resolve/main/Llama-3.2-1B-Instruct-f16.gguf";
/// Download location of the matching `tokenizer.json`
pub const TOKENIZER_URL: &str =
    "https://huggingface.co/unsloth/Llama-3.2-1B-Instruct/resolve/main/tokenizer.json";

/// Exit status for a missing model file and for every run failure
pub const EXIT_FAILURE: u8 = 1;

const RULE_WIDTH: usize = 60;
const SECTION_WIDTH: usize = 40;

/// Command-line arguments
#[derive(Parser, Debug, Clone)]
#[command(
    name = "gguf-chat",
    version,
    about = "Run one chat completion against a local GGUF model",
    long_about = None
)]
pub struct Args {
    /// Path to the GGUF model file
    #[arg(long, default_value_os_t = default_model_path())]
    pub model: PathBuf,

    /// User message sent to the model
    #[arg(long, default_value = DEFAULT_PROMPT)]
    pub prompt: String,

    /// Maximum number of tokens to generate [default: 256]
    #[arg(long)]
    pub max_tokens: Option<usize>,

    /// Sampling temperature, 0 for greedy decoding [default: 0.7]
    #[arg(long, allow_negative_numbers = true)]
    pub temperature: Option<f64>,

    /// tokenizer.json to use [default: next to the model]
    #[arg(long)]
    pub tokenizer: Option<PathBuf>,

    /// Compute threads [default: logical cores]
    #[arg(long)]
    pub threads: Option<usize>,

    /// Context window in tokens [default: 2048]
    #[arg(long)]
    pub ctx_size: Option<usize>,

    /// Sampling seed [default: random]
    #[arg(long)]
    pub seed: Option<u64>,

    /// Nucleus sampling threshold
    #[arg(long)]
    pub top_p: Option<f64>,

    /// JSON configuration file; flags override its values
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,

    /// Log verbosity on stderr [default: warn]
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,
}

/// `~/.llama/models/Llama-3.2-1B-Instruct-f16.gguf`
pub fn default_model_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".llama")
        .join("models")
        .join(MODEL_FILE_NAME)
}

/// Defaults, then the config file, then flags.
pub fn resolve_config(args: &Args) -> anyhow::Result<EngineConfig> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };

    if let Some(path) = &args.tokenizer {
        config.model.tokenizer_path = Some(path.clone());
    }
    if let Some(threads) = args.threads {
        config.model.threads = Some(threads);
    }
    if let Some(context_size) = args.ctx_size {
        config.model.context_size = context_size;
    }
    if let Some(max_tokens) = args.max_tokens {
        config.generation.max_tokens = max_tokens;
    }
    if let Some(temperature) = args.temperature {
        config.generation.temperature = temperature;
    }
    if let Some(seed) = args.seed {
        config.generation.seed = Some(seed);
    }
    if let Some(top_p) = args.top_p {
        config.generation.top_p = Some(top_p);
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }

    config.validate()?;
    Ok(config)
}

/// Request for the model and prompt in `args`, limits taken from `config`
pub fn to_request(args: &Args, config: &EngineConfig) -> GenerationRequest {
    GenerationRequest {
        model_path: args.model.clone(),
        prompt_text: args.prompt.clone(),
        max_tokens: config.generation.max_tokens,
        temperature: config.generation.temperature,
        stop_sequences: config.generation.stop_sequences.clone(),
    }
}

/// Tool name, version and host facts
pub fn print_banner(out: &mut impl Write, host: &HostInfo) -> std::io::Result<()> {
    writeln!(out, "{}", "=".repeat(RULE_WIDTH))?;
    writeln!(out, "{} {}", NAME, VERSION)?;
    writeln!(out, "{}", "=".repeat(RULE_WIDTH))?;
    writeln!(out, "{}", host)?;
    if let Ok(exe) = std::env::current_exe() {
        writeln!(out, "Executable: {}", exe.display())?;
    }
    writeln!(out, "{}", "=".repeat(RULE_WIDTH))
}

/// Shell commands that fetch the model and tokenizer to `model_path`
pub fn print_download_instructions(out: &mut impl Write, model_path: &Path) -> std::io::Result<()> {
    let dir = model_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    writeln!(out, "\nTo download the model:")?;
    writeln!(out, "  mkdir -p {}", dir.display())?;
    writeln!(out, "  curl -L -o {} \\", model_path.display())?;
    writeln!(out, "    \"{}\"", MODEL_URL)?;
    writeln!(out, "  curl -L -o {} \\", dir.join("tokenizer.json").display())?;
    writeln!(out, "    \"{}\"", TOKENIZER_URL)
}

/// Human-readable run report
pub fn print_report(out: &mut impl Write, report: &RunReport) -> std::io::Result<()> {
    writeln!(out, "Model loaded in {:.2}s", report.timing.load_seconds)?;
    writeln!(out, "\nPrompt: {}", report.prompt)?;
    writeln!(out, "{}", "-".repeat(SECTION_WIDTH))?;
    writeln!(out, "Response:")?;
    writeln!(out, "{}", report.response.trim())?;
    writeln!(out, "{}", "-".repeat(SECTION_WIDTH))?;

    writeln!(out, "\nStats:")?;
    writeln!(out, "  Load time: {:.2}s", report.timing.load_seconds)?;
    writeln!(out, "  Inference time: {:.2}s", report.timing.inference_seconds)?;
    writeln!(out, "  Prompt tokens: {}", report.prompt_tokens)?;
    writeln!(out, "  Completion tokens: {}", report.completion_tokens)?;
    writeln!(out, "  Total tokens: {}", report.total_tokens)?;
    if let Some(rate) = report.stats.tokens_per_second {
        writeln!(out, "  Tokens/sec: {:.2}", rate)?;
    }
    Ok(())
}

/// Runs the command and returns the process exit status. Only output
/// failures surface as `Err`.
pub async fn run(
    args: &Args,
    config: EngineConfig,
    host: HostInfo,
    backend: Arc<dyn InferenceBackend>,
    out: &mut impl Write,
    err: &mut impl Write,
) -> anyhow::Result<u8> {
    if !args.json {
        print_banner(out, &host)?;
    }

    // Nothing reaches the backend without a model file
    if !args.model.exists() {
        writeln!(err, "\nError: Model file not found: {}", args.model.display())?;
        print_download_instructions(err, &args.model)?;
        return Ok(EXIT_FAILURE);
    }

    let request = to_request(args, &config);
    let engine = match ChatEngine::builder()
        .with_config(config)
        .with_host(host)
        .with_backend(backend)
        .build()
    {
        Ok(engine) => engine,
        Err(e) => {
            writeln!(err, "Error: {}", e)?;
            return Ok(EXIT_FAILURE);
        }
    };
    debug!(backend = engine.backend_name(), "Engine ready");

    if !args.json {
        writeln!(out, "\nLoading model: {}", request.model_path.display())?;
        writeln!(out, "Using {} CPU threads", engine.thread_count())?;
    }

    match engine.run(&request).await {
        Ok(report) => {
            if args.json {
                serde_json::to_writer_pretty(&mut *out, &report)?;
                writeln!(out)?;
            } else {
                print_report(out, &report)?;
            }
            Ok(0)
        }
        Err(e) => {
            writeln!(err, "Error: {}", e)?;
            Ok(EXIT_FAILURE)
        }
    }
}

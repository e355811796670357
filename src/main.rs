use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use gguf_chat::{
    cli::{self, Args},
    utils::{setup_logging, LogConfig},
    CandleBackend, HostInfo,
};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match cli::resolve_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = setup_logging(LogConfig::from(&config.logging)) {
        eprintln!("Warning: {}", e);
    }

    let host = HostInfo::detect();
    let backend = Arc::new(CandleBackend::new());

    // Unlocked handles; tracing writes to stderr from worker threads
    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();

    match cli::run(&args, config, host, backend, &mut stdout, &mut stderr).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

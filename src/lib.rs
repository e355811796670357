//! gguf-chat - single-shot chat completion against a local quantized model
//!
//! Loads a GGUF model, runs one chat-formatted prompt through it and reports
//! the response together with load time, inference time and tokens/second.

#![warn(missing_docs)]

use std::fmt;

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod model;
pub mod types;
pub mod utils;

// Version information
/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");

// Re-exports for public API
pub use config::EngineConfig;
pub use engine::{ChatEngine, EngineBuilder};
pub use error::{EngineError, ErrorKind, Result};
pub use metrics::{GenerationStats, StatisticsCollector, TimingRecord};
pub use model::{format_prompt, CandleBackend, ModelSession};
pub use types::{GenerationRequest, GenerationResult, RunReport};

/// Facts about the host, detected once at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostInfo {
    /// Logical cores available to this process
    pub logical_cores: usize,
    /// Operating system, e.g. `linux`
    pub os: &'static str,
    /// CPU architecture, e.g. `x86_64`
    pub arch: &'static str,
    /// OS family, `unix` or `windows`
    pub family: &'static str,
    /// Accelerator compiled into this build
    pub accelerator: &'static str,
}

impl HostInfo {
    /// Detect host facts at runtime
    pub fn detect() -> Self {
        let logical_cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(model::FALLBACK_THREAD_COUNT);

        Self {
            logical_cores,
            os: std::env::consts::OS,
            arch: std::env::consts::ARCH,
            family: std::env::consts::FAMILY,
            accelerator: compiled_accelerator(),
        }
    }
}

fn compiled_accelerator() -> &'static str {
    if cfg!(feature = "cuda") {
        "cuda"
    } else if cfg!(feature = "metal") {
        "metal"
    } else {
        "cpu"
    }
}

impl fmt::Display for HostInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Platform: {} {} ({})", self.os, self.arch, self.family)?;
        writeln!(f, "Logical cores: {}", self.logical_cores)?;
        write!(f, "Accelerator: {}", self.accelerator)
    }
}

use std::path::PathBuf;
use std::sync::{Mutex, Once};
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

static INIT: Once = Once::new();

/// Logging configuration options
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level, `RUST_LOG` takes precedence when set
    pub level: Level,
    /// Whether to include timestamps
    pub timestamps: bool,
    /// Whether to include source code locations
    pub source_location: bool,
    /// Output file path (None for stderr)
    pub file_path: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::WARN,
            timestamps: true,
            source_location: false,
            file_path: None,
        }
    }
}

impl From<&LoggingConfig> for LogConfig {
    fn from(config: &LoggingConfig) -> Self {
        Self {
            level: config.level.into(),
            file_path: config.file_path.clone(),
            ..Default::default()
        }
    }
}

/// Initialize logging system. Only the first call installs a subscriber.
pub fn setup_logging(config: LogConfig) -> Result<(), String> {
    let mut result = Ok(());

    INIT.call_once(|| {
        result = setup_logging_internal(config);
    });

    result
}

fn build_filter(level: Level) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy()
}

fn setup_logging_internal(config: LogConfig) -> Result<(), String> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(build_filter(config.level))
        .with_target(true)
        .with_file(config.source_location)
        .with_line_number(config.source_location);

    match (config.file_path, config.timestamps) {
        (Some(path), timestamps) => {
            use std::fs::OpenOptions;
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|e| format!("Failed to open log file: {}", e))?;

            let builder = builder.with_ansi(false).with_writer(Mutex::new(file));
            if timestamps {
                builder.try_init()
            } else {
                builder.without_time().try_init()
            }
        }
        (None, true) => builder.with_writer(std::io::stderr).try_init(),
        (None, false) => builder.with_writer(std::io::stderr).without_time().try_init(),
    }
    .map_err(|e| format!("Failed to set global subscriber: {}", e))
}

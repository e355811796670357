//! Utility functions for logging and phase timing

mod logging;
mod profiler;

pub use logging::{setup_logging, LogConfig};
pub use profiler::Stopwatch;

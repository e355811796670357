use std::time::{Duration, Instant};

/// Monotonic timer for one phase of a run
#[derive(Debug)]
pub struct Stopwatch {
    name: &'static str,
    start: Instant,
}

impl Stopwatch {
    /// Start timing a named phase
    pub fn start(name: &'static str) -> Self {
        Self {
            name,
            start: Instant::now(),
        }
    }

    /// Stop the timer, log the phase duration and return it
    pub fn stop(self) -> Duration {
        let elapsed = self.start.elapsed();
        tracing::debug!(
            phase = self.name,
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            "Phase complete"
        );
        elapsed
    }
}

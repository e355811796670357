use std::time::Duration;
use serde::{Deserialize, Serialize};

/// Wall-clock duration of the two phases of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TimingRecord {
    /// Time to make the model resident
    pub load_seconds: f64,
    /// Time spent in generation
    pub inference_seconds: f64,
}

impl TimingRecord {
    /// Record two measured phases
    pub fn from_durations(load: Duration, inference: Duration) -> Self {
        Self {
            load_seconds: load.as_secs_f64(),
            inference_seconds: inference.as_secs_f64(),
        }
    }

    /// Load plus inference
    pub fn total_seconds(&self) -> f64 {
        self.load_seconds + self.inference_seconds
    }
}

/// Throughput derived from one generation
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationStats {
    /// Completion tokens per second; absent when it cannot be computed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_per_second: Option<f64>,
}

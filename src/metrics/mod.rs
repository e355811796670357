//! Performance statistics derived from a run

mod collector;
mod types;

pub use collector::StatisticsCollector;
pub use types::{GenerationStats, TimingRecord};

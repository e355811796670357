use crate::types::GenerationResult;

use super::types::GenerationStats;

/// Derives throughput from a finished generation
#[derive(Debug, Clone, Copy, Default)]
pub struct StatisticsCollector;

impl StatisticsCollector {
    /// Create a collector
    pub fn new() -> Self {
        Self
    }

    /// Tokens per second is only defined for a non-empty completion that took
    /// measurable, finite time.
    pub fn compute(&self, result: &GenerationResult, inference_seconds: f64) -> GenerationStats {
        let tokens_per_second = if result.completion_tokens > 0
            && inference_seconds > 0.0
            && inference_seconds.is_finite()
        {
            Some(result.completion_tokens as f64 / inference_seconds)
        } else {
            None
        };

        GenerationStats { tokens_per_second }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(completion_tokens: usize) -> GenerationResult {
        GenerationResult {
            text: "x".repeat(completion_tokens),
            prompt_tokens: 30,
            completion_tokens,
            total_tokens: 30 + completion_tokens,
        }
    }

    #[test]
    fn test_tokens_per_second() {
        let stats = StatisticsCollector::new().compute(&result(100), 4.0);
        let tps = stats.tokens_per_second.unwrap();
        assert!((tps - 25.0).abs() < 1e-9);

        let stats = StatisticsCollector::new().compute(&result(7), 0.3);
        assert!((stats.tokens_per_second.unwrap() - 7.0 / 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_undefined_without_completion_tokens() {
        let stats = StatisticsCollector::new().compute(&result(0), 2.0);
        assert_eq!(stats.tokens_per_second, None);
    }

    #[test]
    fn test_undefined_without_elapsed_time() {
        let collector = StatisticsCollector::new();
        assert_eq!(collector.compute(&result(10), 0.0).tokens_per_second, None);
        assert_eq!(collector.compute(&result(10), -1.0).tokens_per_second, None);
        assert_eq!(collector.compute(&result(10), f64::NAN).tokens_per_second, None);
        assert_eq!(collector.compute(&result(10), f64::INFINITY).tokens_per_second, None);
    }

    #[test]
    fn test_compute_is_pure() {
        let collector = StatisticsCollector::new();
        let r = result(42);
        assert_eq!(collector.compute(&r, 1.25), collector.compute(&r, 1.25));
    }
}

use std::sync::Arc;
use crate::{
    config::EngineConfig,
    error::{EngineError, Result},
    metrics::StatisticsCollector,
    model::{CandleBackend, InferenceBackend},
    HostInfo,
};

use super::engine::ChatEngine;

/// Builder for constructing a ChatEngine instance
pub struct EngineBuilder {
    config: Option<EngineConfig>,
    host: Option<HostInfo>,
    backend: Option<Arc<dyn InferenceBackend>>,
}

impl EngineBuilder {
    /// Create a new builder instance
    pub fn new() -> Self {
        Self {
            config: None,
            host: None,
            backend: None,
        }
    }

    /// Set the engine configuration
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Host facts resolved once at startup
    pub fn with_host(mut self, host: HostInfo) -> Self {
        self.host = Some(host);
        self
    }

    /// Inference backend; the candle GGUF backend when unset
    pub fn with_backend(mut self, backend: Arc<dyn InferenceBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Build the engine instance
    pub fn build(self) -> Result<ChatEngine> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let host = self.host.unwrap_or_else(HostInfo::detect);
        if host.logical_cores == 0 {
            return Err(EngineError::config("logical_cores", "Host must report at least one core"));
        }

        let backend = self
            .backend
            .unwrap_or_else(|| Arc::new(CandleBackend::new()));

        Ok(ChatEngine {
            config: Arc::new(config),
            host,
            backend,
            statistics: StatisticsCollector::new(),
        })
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_builder_default() {
        let engine = EngineBuilder::default().build().unwrap();
        assert_eq!(engine.config().model.context_size, 2048);
        assert!(engine.thread_count() >= 1);
    }

    #[test]
    fn test_builder_validation() {
        let mut config = EngineConfig::default();
        config.generation.stop_sequences.clear();
        let result = EngineBuilder::default().with_config(config).build();
        assert_eq!(result.err().unwrap().kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_builder_rejects_empty_host() {
        let host = HostInfo {
            logical_cores: 0,
            ..HostInfo::detect()
        };
        let result = EngineBuilder::default().with_host(host).build();
        assert!(result.is_err());
    }
}

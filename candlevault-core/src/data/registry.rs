//! Exchange identifier → source adapter.

use super::bybit::BybitSource;
use super::source::{FetchError, SourceAdapter};
use crate::config::Config;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("unknown exchange '{name}' (known: {known})")]
    UnknownExchange { name: String, known: String },

    #[error("failed to initialise source: {0}")]
    Init(#[from] FetchError),
}

/// Registry of source adapters, keyed by lowercase exchange id.
///
/// Resolved once at the entry point of a command; pipelines only ever see the
/// resolved `SourceAdapter`.
#[derive(Default)]
pub struct SourceRegistry {
    adapters: BTreeMap<String, Arc<dyn SourceAdapter>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in exchange configured from `config`.
    pub fn from_config(config: &Config) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        registry.register(Arc::new(BybitSource::from_config(&config.sources.bybit)?));
        Ok(registry)
    }

    /// Add or replace the adapter for `adapter.exchange()`.
    pub fn register(&mut self, adapter: Arc<dyn SourceAdapter>) {
        self.adapters
            .insert(adapter.exchange().to_ascii_lowercase(), adapter);
    }

    /// Look up an adapter, case-insensitively.
    pub fn resolve(&self, exchange: &str) -> Result<Arc<dyn SourceAdapter>, RegistryError> {
        self.adapters
            .get(&exchange.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| RegistryError::UnknownExchange {
                name: exchange.to_string(),
                known: self.exchanges().join(", "),
            })
    }

    /// Registered exchange ids, sorted.
    pub fn exchanges(&self) -> Vec<&str> {
        self.adapters.keys().map(String::as_str).collect()
    }
}

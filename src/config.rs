//! # Pipeline Configuration
//!
//! Every knob is fixed before the pipeline is built. There are no setters on
//! running components; change the config and build a new pipeline instead.
//!
//! ```toml
//! max_batch_size = 10000
//! pool_size = 8
//! context_mode = "inject"      # or "accumulate"
//! query_cache_capacity = 1000
//! progress_interval = 100000
//! ```
//!
//! Missing keys take their defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cache::{QueryPlanCache, DEFAULT_QUERY_CACHE_CAPACITY};
use crate::collector::{StatementCollector, DEFAULT_MAX_BATCH_SIZE};
use crate::context::ContextMode;
use crate::dispatcher::{default_pool_size, DispatcherConfig};
use crate::progress::DEFAULT_PROGRESS_INTERVAL;
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Statements per batch before a flush.
    pub max_batch_size: usize,
    /// Worker threads running batch jobs.
    pub pool_size: usize,
    pub context_mode: ContextMode,
    /// Parsed query plans kept in the cache.
    pub query_cache_capacity: usize,
    /// Rows between progress log lines; 0 disables them.
    pub progress_interval: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            pool_size: default_pool_size(),
            context_mode: ContextMode::default(),
            query_cache_capacity: DEFAULT_QUERY_CACHE_CAPACITY,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

impl PipelineConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_batch_size == 0 {
            return Err(Error::Config("max_batch_size must be at least 1".to_string()));
        }
        if self.pool_size == 0 {
            return Err(Error::Config("pool_size must be at least 1".to_string()));
        }
        if self.query_cache_capacity == 0 {
            return Err(Error::Config(
                "query_cache_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig::new(self.pool_size).with_context_mode(self.context_mode)
    }

    pub fn collector(&self) -> StatementCollector {
        StatementCollector::new(self.max_batch_size)
    }

    pub fn query_cache(&self) -> QueryPlanCache {
        QueryPlanCache::new(self.query_cache_capacity)
    }
}

//! Graph configuration.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::storage::DEFAULT_LARGE_VALUE_THRESHOLD;
use crate::visibility::DEFAULT_CACHE_CAPACITY;
use crate::{Error, Result};

/// Settings for a [`crate::Graph`]. Every field has a default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Flush the backend after every save.
    pub auto_flush: bool,
    /// Parsed expressions memoized before the cache is cleared.
    pub visibility_cache_capacity: usize,
    /// `Bytes` values longer than this go to the large-value store.
    pub large_value_threshold: usize,
    /// Prefix of generated element ids.
    pub id_prefix: String,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            auto_flush: true,
            visibility_cache_capacity: DEFAULT_CACHE_CAPACITY,
            large_value_threshold: DEFAULT_LARGE_VALUE_THRESHOLD,
            id_prefix: String::new(),
        }
    }
}

impl GraphConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: GraphConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Build from string key/value pairs, e.g. environment or CLI options.
    /// Unknown keys are an error.
    pub fn from_map(map: &HashMap<String, String>) -> Result<Self> {
        let mut config = GraphConfig::default();
        for (key, raw) in map {
            match key.as_str() {
                "auto_flush" => config.auto_flush = parse_field(key, raw)?,
                "visibility_cache_capacity" => config.visibility_cache_capacity = parse_field(key, raw)?,
                "large_value_threshold" => config.large_value_threshold = parse_field(key, raw)?,
                "id_prefix" => config.id_prefix = raw.clone(),
                other => return Err(Error::Config(format!("unknown setting {other:?}"))),
            }
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.visibility_cache_capacity == 0 {
            return Err(Error::Config("visibility_cache_capacity must be positive".into()));
        }
        if self.id_prefix.contains(crate::storage::columns::VALUE_SEPARATOR) {
            return Err(Error::Config("id_prefix contains the reserved separator".into()));
        }
        Ok(())
    }
}

fn parse_field<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| Error::Config(format!("{key}: cannot parse {raw:?}: {e}")))
}

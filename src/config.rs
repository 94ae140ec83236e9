use std::{collections::HashMap, fs, path::Path};

use serde::Deserialize;

use crate::{FlowError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// store config
    pub store: StoreConfig,
    /// number of async worker threads, range [1, 32768), defaults to 16
    pub async_worker_thread_number: u16,
    /// read-only deployment variables, exposed to templates as `env.*`
    pub env: HashMap<String, String>,
    /// unit of the retry backoff, attempt k waits `base * 2^(k-1)`
    pub retry_backoff_base_ms: u64,
    /// how long in-flight nodes may drain after a timeout or cancel
    pub cancel_grace_ms: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreConfig {
    /// store type
    #[serde(default)]
    pub store_type: StoreType,
    /// postgres config
    pub postgres: Option<PostgresConfig>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StoreType {
    #[default]
    Mem,
    Postgres,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PostgresConfig {
    /// postgres database url
    pub database_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            async_worker_thread_number: 16,
            env: HashMap::new(),
            retry_backoff_base_ms: 1000,
            cancel_grace_ms: 1000,
        }
    }
}

impl Config {
    pub fn create<T: AsRef<Path>>(path: T) -> Result<Self> {
        let data = fs::read_to_string(path.as_ref()).map_err(|err| FlowError::Config(format!("failed to load config file {:?}: {}", path.as_ref(), err)))?;

        Self::load_from_str(data.as_str())
    }

    pub fn load_from_str(toml_str: &str) -> Result<Self> {
        toml::from_str::<Config>(toml_str).map_err(|err| FlowError::Config(format!("failed to parse the toml str: {}", err)))
    }
}

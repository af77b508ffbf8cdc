//! Runtime configuration
//!
//! Settings come from three layers, later layers winning:
//!
//! 1. `GeneratronConfig::default()`
//! 2. A TOML document (`generatron.toml`), see `GeneratronConfig::from_toml_str`
//! 3. `GENERATRON_*` environment variables, see `GeneratronConfig::apply_env`
//!
//! ## TOML format
//!
//! ```toml
//! strategy = "thread"
//! worker_stack_size = 1048576
//! worker_name_prefix = "gen"
//! ```

use serde::Deserialize;
use std::path::Path;

/// Environment variable selecting the continuation strategy
pub const ENV_STRATEGY: &str = "GENERATRON_STRATEGY";
/// Environment variable for the generator worker stack size in bytes
pub const ENV_WORKER_STACK_SIZE: &str = "GENERATRON_WORKER_STACK_SIZE";
/// Environment variable for the generator worker thread name prefix
pub const ENV_WORKER_NAME_PREFIX: &str = "GENERATRON_WORKER_NAME_PREFIX";

const DEFAULT_WORKER_NAME_PREFIX: &str = "generator-worker";

/// How a generator or async function activation suspends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Re-enter the evaluator with a stored frame snapshot (single-threaded)
    #[default]
    Snapshot,
    /// Run the body on a dedicated worker thread and block at suspend points
    Thread,
}

impl std::str::FromStr for Strategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "snapshot" => Ok(Strategy::Snapshot),
            "thread" => Ok(Strategy::Thread),
            _ => Err(ConfigError::InvalidValue {
                key: ENV_STRATEGY,
                value: s.to_string(),
            }),
        }
    }
}

/// Configuration for continuations and generator workers
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneratronConfig {
    /// Strategy used by `Coroutine::new`
    pub strategy: Strategy,
    /// Stack size for generator worker threads (platform default if unset)
    pub worker_stack_size: Option<usize>,
    /// Worker threads are named `<prefix>-<n>`
    pub worker_name_prefix: String,
}

impl Default for GeneratronConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            worker_stack_size: None,
            worker_name_prefix: DEFAULT_WORKER_NAME_PREFIX.to_string(),
        }
    }
}

impl GeneratronConfig {
    /// Parse a TOML document; missing keys keep their defaults
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        toml::from_str(source).map_err(ConfigError::Parse)
    }

    /// Load a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_toml_str(&source)
    }

    /// Defaults overridden by the environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().apply_env()
    }

    /// Override fields from `GENERATRON_*` environment variables
    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    fn apply_vars(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        if let Some(value) = lookup(ENV_STRATEGY) {
            self.strategy = value.parse()?;
        }
        if let Some(value) = lookup(ENV_WORKER_STACK_SIZE) {
            let size = value
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|size| *size > 0)
                .ok_or(ConfigError::InvalidValue {
                    key: ENV_WORKER_STACK_SIZE,
                    value,
                })?;
            self.worker_stack_size = Some(size);
        }
        if let Some(value) = lookup(ENV_WORKER_NAME_PREFIX) {
            if value.is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: ENV_WORKER_NAME_PREFIX,
                    value,
                });
            }
            self.worker_name_prefix = value;
        }
        Ok(self)
    }

    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_worker_stack_size(mut self, size: usize) -> Self {
        self.worker_stack_size = Some(size);
        self
    }
}

/// Errors raised while loading configuration
#[derive(Debug)]
pub enum ConfigError {
    /// Malformed TOML or unknown keys
    Parse(toml::de::Error),
    /// Config file could not be read
    Io(std::io::Error),
    /// An environment override has an unusable value
    InvalidValue { key: &'static str, value: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(e) => write!(f, "Invalid config: {}", e),
            Self::Io(e) => write!(f, "Cannot read config: {}", e),
            Self::InvalidValue { key, value } => {
                write!(f, "Invalid value for {}: {:?}", key, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Parse(e) => Some(e),
            Self::Io(e) => Some(e),
            Self::InvalidValue { .. } => None,
        }
    }
}

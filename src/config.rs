//! Mediator configuration.
//!
//! Supports YAML files and environment variable overrides.

use serde::Deserialize;

/// Configuration file read from the working directory when present.
pub const DEFAULT_CONFIG_FILE: &str = "courier.yaml";

/// Environment variable naming an additional configuration file.
pub const CONFIG_ENV_VAR: &str = "COURIER_CONFIG";

/// Prefix for environment overrides, e.g. `COURIER__NOTIFICATIONS__STRATEGY=concurrent`.
pub const CONFIG_ENV_PREFIX: &str = "COURIER";

/// Environment variable holding the tracing filter directive.
pub const LOG_ENV_VAR: &str = "COURIER_LOG";

/// Environment variable selecting log output format (`json` or text).
pub const LOG_FORMAT_ENV_VAR: &str = "COURIER_LOG_FORMAT";

/// Top-level mediator configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MediatorConfig {
    /// Notification fan-out behaviour.
    pub notifications: NotificationConfig,
}

/// How notification handlers are scheduled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FanOutStrategy {
    /// One task per handler on the runtime's worker pool.
    #[default]
    Spawned,
    /// All handlers polled concurrently inside the publishing task.
    Concurrent,
}

/// Notification fan-out configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub strategy: FanOutStrategy,
    /// Upper bound on handlers in flight per publish. Unbounded when unset.
    pub max_concurrency: Option<usize>,
}

impl MediatorConfig {
    /// Load configuration from files and environment.
    ///
    /// Sources, later overriding earlier:
    /// 1. `courier.yaml` in the working directory (if present)
    /// 2. File given by `path` (required if provided)
    /// 3. File named by `COURIER_CONFIG` (required if set)
    /// 4. `COURIER__*` environment variables
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let config: MediatorConfig = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from inline YAML.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: MediatorConfig =
            serde_yaml::from_str(yaml).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the mediator cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.notifications.max_concurrency == Some(0) {
            return Err(ConfigError::Invalid(
                "notifications.max_concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load config: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

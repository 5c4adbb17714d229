//! Layered configuration loading and validation.

use std::path::Path;

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::{Config, DriverKind};
use crate::domain::models::query::validate_integration_prompt;
use crate::domain::models::ERROR_LOG_CAPACITY;

/// Prefix of environment overrides; `__` separates nested keys.
pub const ENV_PREFIX: &str = "MULTI_ANSWER_";

/// Project config file, lowest-precedence file layer.
pub const PROJECT_CONFIG: &str = ".multi-answer/config.yaml";

/// Local overrides on top of the project config.
pub const LOCAL_CONFIG: &str = ".multi-answer/local.yaml";

/// Configuration error types
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// `retry.max_retries` outside 1..=10
    #[error("Invalid max_retries: {0}. Must be between 1 and 10")]
    InvalidMaxRetries(u32),

    /// `stability.timeout_secs` outside 30..=300
    #[error("Invalid stability timeout: {0}s. Must be between 30 and 300")]
    InvalidStabilityTimeout(u64),

    /// `stability.quiet_interval_ms` is zero
    #[error("Invalid quiet interval: {0}ms. Must be positive")]
    InvalidQuietInterval(u64),

    /// A driver timeout is zero
    #[error("Invalid {name}: must be positive")]
    ZeroTimeout {
        /// Config key of the timeout
        name: &'static str,
    },

    /// Command driver selected without a helper program
    #[error("driver.command is required when driver.kind is 'command'")]
    MissingDriverCommand,

    /// Unknown `logging.level`
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    /// `error_log.capacity` outside 1..=100
    #[error("Invalid error_log.capacity: {0}. Must be between 1 and 100")]
    InvalidErrorLogCapacity(usize),

    /// Any other invalid value
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .multi-answer/config.yaml (project config)
    /// 3. .multi-answer/local.yaml (local overrides, optional)
    /// 4. Environment variables (MULTI_ANSWER_* prefix)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(PROJECT_CONFIG))
            .merge(Yaml::file(LOCAL_CONFIG))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file; environment overrides still apply.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        if !path.exists() {
            anyhow::bail!("Config file {} does not exist", path.display());
        }

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if !(1..=10).contains(&config.retry.max_retries) {
            return Err(ConfigError::InvalidMaxRetries(config.retry.max_retries));
        }

        if !(30..=300).contains(&config.stability.timeout_secs) {
            return Err(ConfigError::InvalidStabilityTimeout(config.stability.timeout_secs));
        }

        if config.stability.quiet_interval_ms == 0 {
            return Err(ConfigError::InvalidQuietInterval(0));
        }

        let driver = &config.driver;
        for (name, value) in [
            ("driver.ping_timeout_ms", driver.ping_timeout_ms),
            ("driver.session_start_timeout_secs", driver.session_start_timeout_secs),
            ("driver.submit_timeout_secs", driver.submit_timeout_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroTimeout { name });
            }
        }

        validate_integration_prompt(&config.default_prompt)
            .map_err(|e| ConfigError::ValidationFailed(format!("default_prompt: {e}")))?;

        if !(1..=ERROR_LOG_CAPACITY).contains(&config.error_log.capacity) {
            return Err(ConfigError::InvalidErrorLogCapacity(config.error_log.capacity));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        Ok(())
    }

    /// Check that the configured driver can actually be built.
    ///
    /// Kept apart from [`Self::validate`] so commands that never open a
    /// session (`logs`, `config show`) work without a helper program.
    pub fn validate_driver(config: &Config) -> Result<(), ConfigError> {
        let driver = &config.driver;
        let has_command = driver.command.as_deref().is_some_and(|c| !c.trim().is_empty());
        if driver.kind == DriverKind::Command && !has_command {
            return Err(ConfigError::MissingDriverCommand);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::config::LogFormat;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn valid() -> Config {
        let mut config = Config::default();
        config.driver.command = Some("answer-helper".to_string());
        config
    }

    fn yaml_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{contents}").unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.stability.quiet_interval_ms, 3000);
        assert_eq!(config.logging.level, "info");
        ConfigLoader::validate(&config).expect("Default config should be valid");
    }

    #[test]
    fn test_command_driver_needs_a_command() {
        assert_eq!(
            ConfigLoader::validate_driver(&Config::default()),
            Err(ConfigError::MissingDriverCommand)
        );
        assert!(ConfigLoader::validate_driver(&valid()).is_ok());

        let mut config = Config::default();
        config.driver.kind = DriverKind::Scripted;
        assert!(ConfigLoader::validate_driver(&config).is_ok());
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r"
retry:
  max_retries: 5
stability:
  timeout_secs: 90
  quiet_interval_ms: 2000
driver:
  kind: command
  command: /usr/local/bin/answer-helper
  args: [--headless]
logging:
  level: debug
  format: json
";
        let config: Config = serde_yaml::from_str(yaml).expect("YAML should parse");

        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.retry_delay_ms, 1000);
        assert_eq!(config.stability.timeout_secs, 90);
        assert_eq!(config.stability.min_answer_chars, 20);
        assert_eq!(config.driver.args, vec!["--headless".to_string()]);
        assert_eq!(config.logging.format, LogFormat::Json);
        ConfigLoader::validate(&config).expect("Parsed config should be valid");
    }

    #[test]
    fn test_validate_retry_bounds() {
        for bad in [0, 11] {
            let mut config = valid();
            config.retry.max_retries = bad;
            assert_eq!(
                ConfigLoader::validate(&config),
                Err(ConfigError::InvalidMaxRetries(bad))
            );
        }
    }

    #[test]
    fn test_validate_error_log_capacity_bounds() {
        for bad in [0, 101, 500] {
            let mut config = valid();
            config.error_log.capacity = bad;
            assert_eq!(
                ConfigLoader::validate(&config),
                Err(ConfigError::InvalidErrorLogCapacity(bad))
            );
        }

        let mut config = valid();
        config.error_log.capacity = 100;
        assert!(ConfigLoader::validate(&config).is_ok());
    }

    #[test]
    fn test_validate_stability_timeout_bounds() {
        for bad in [29, 301] {
            let mut config = valid();
            config.stability.timeout_secs = bad;
            assert_eq!(
                ConfigLoader::validate(&config),
                Err(ConfigError::InvalidStabilityTimeout(bad))
            );
        }
    }

    #[test]
    fn test_validate_zero_timeouts() {
        let mut config = valid();
        config.driver.submit_timeout_secs = 0;
        assert_eq!(
            ConfigLoader::validate(&config),
            Err(ConfigError::ZeroTimeout {
                name: "driver.submit_timeout_secs"
            })
        );

        let mut config = valid();
        config.stability.quiet_interval_ms = 0;
        assert_eq!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidQuietInterval(0))
        );
    }

    #[test]
    fn test_validate_default_prompt() {
        let mut config = valid();
        config.default_prompt = "   ".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::ValidationFailed(_))
        ));
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = valid();
        config.logging.level = "verbose".to_string();
        match ConfigLoader::validate(&config) {
            Err(ConfigError::InvalidLogLevel(level)) => assert_eq!(level, "verbose"),
            other => panic!("Expected InvalidLogLevel error, got {other:?}"),
        }
    }

    #[test]
    fn test_load_from_file_with_env_override() {
        let file = yaml_file("driver:\n  command: helper\nretry:\n  max_retries: 2\n");

        let config = temp_env::with_vars(
            [
                ("MULTI_ANSWER_RETRY__MAX_RETRIES", Some("7")),
                ("MULTI_ANSWER_LOGGING__LEVEL", Some("warn")),
            ],
            || ConfigLoader::load_from_file(file.path()),
        )
        .unwrap();

        assert_eq!(config.retry.max_retries, 7, "env wins over file");
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.driver.command.as_deref(), Some("helper"));
    }

    #[test]
    fn test_load_from_missing_file_fails() {
        let err = ConfigLoader::load_from_file("/nonexistent/multi-answer.yaml").unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_load_from_file_rejects_invalid_values() {
        let file = yaml_file("driver:\n  command: helper\nstability:\n  timeout_secs: 5\n");
        let err = ConfigLoader::load_from_file(file.path()).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ConfigError>(),
            Some(&ConfigError::InvalidStabilityTimeout(5))
        );
    }

    #[test]
    fn test_hierarchical_merging() {
        let base = yaml_file("retry:\n  max_retries: 2\nlogging:\n  level: info\n  format: json\n");
        let local = yaml_file("retry:\n  max_retries: 4\nlogging:\n  level: debug\n");

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(base.path()))
            .merge(Yaml::file(local.path()))
            .extract()
            .unwrap();

        assert_eq!(config.retry.max_retries, 4, "Override should win");
        assert_eq!(config.logging.level, "debug", "Override should win for nested fields");
        assert_eq!(
            config.logging.format,
            LogFormat::Json,
            "Base value should persist when not overridden"
        );
    }
}

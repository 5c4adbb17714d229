//! Application configuration, loaded by the config infrastructure.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::error_log::ERROR_LOG_CAPACITY;
use super::retry::RetryPolicy;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Integration prompt used when a request does not supply one
    #[serde(default = "default_prompt")]
    pub default_prompt: String,

    /// Retry policy configuration
    #[serde(default)]
    pub retry: RetryConfig,

    /// Answer stability detection
    #[serde(default)]
    pub stability: StabilityConfig,

    /// Interaction driver selection and timeouts
    #[serde(default)]
    pub driver: DriverConfig,

    /// Persisted error log
    #[serde(default)]
    pub error_log: ErrorLogConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_prompt() -> String {
    "Combine the answers above into one clear, well-organized report.".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_prompt: default_prompt(),
            retry: RetryConfig::default(),
            stability: StabilityConfig::default(),
            driver: DriverConfig::default(),
            error_log: ErrorLogConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Retry policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetryConfig {
    /// Retries allowed per item after the first attempt (1-10)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Pause before a retry, in milliseconds
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_retry_delay_ms() -> u64 {
    1000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl RetryConfig {
    /// Retry policy built from `max_retries`.
    pub const fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries)
    }

    /// Pause between a failed attempt and the next one.
    pub const fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Answer stability detection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StabilityConfig {
    /// How long the answer must stay unchanged, in milliseconds
    #[serde(default = "default_quiet_interval_ms")]
    pub quiet_interval_ms: u64,

    /// Overall budget for one answer, in seconds (30-300)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Snapshots shorter than this never count as an answer
    #[serde(default = "default_min_answer_chars")]
    pub min_answer_chars: usize,
}

const fn default_quiet_interval_ms() -> u64 {
    3000
}

const fn default_timeout_secs() -> u64 {
    60
}

const fn default_min_answer_chars() -> usize {
    20
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            quiet_interval_ms: default_quiet_interval_ms(),
            timeout_secs: default_timeout_secs(),
            min_answer_chars: default_min_answer_chars(),
        }
    }
}

/// Which interaction driver backs the sessions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    /// One helper process per session, JSON lines over stdio
    Command,
    /// Canned answers, no external process
    Scripted,
}

/// Interaction driver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DriverConfig {
    /// Which driver implementation to build
    #[serde(default = "default_driver_kind")]
    pub kind: DriverKind,

    /// Helper program launched for each session (command driver)
    #[serde(default)]
    pub command: Option<String>,

    /// Arguments passed to the helper program
    #[serde(default)]
    pub args: Vec<String>,

    /// Liveness probe window, in milliseconds
    #[serde(default = "default_ping_timeout_ms")]
    pub ping_timeout_ms: u64,

    /// Budget for a new session to report ready, in seconds
    #[serde(default = "default_session_start_timeout_secs")]
    pub session_start_timeout_secs: u64,

    /// Budget for a submission to be acknowledged, in seconds
    #[serde(default = "default_submit_timeout_secs")]
    pub submit_timeout_secs: u64,
}

const fn default_driver_kind() -> DriverKind {
    DriverKind::Command
}

const fn default_ping_timeout_ms() -> u64 {
    2000
}

const fn default_session_start_timeout_secs() -> u64 {
    30
}

const fn default_submit_timeout_secs() -> u64 {
    15
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            kind: default_driver_kind(),
            command: None,
            args: vec![],
            ping_timeout_ms: default_ping_timeout_ms(),
            session_start_timeout_secs: default_session_start_timeout_secs(),
            submit_timeout_secs: default_submit_timeout_secs(),
        }
    }
}

/// Error log storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ErrorLogConfig {
    /// JSON file holding the retained entries
    #[serde(default = "default_error_log_path")]
    pub path: PathBuf,

    /// Entries retained before the oldest are evicted
    #[serde(default = "default_error_log_capacity")]
    pub capacity: usize,
}

fn default_error_log_path() -> PathBuf {
    PathBuf::from(".multi-answer/error-log.json")
}

const fn default_error_log_capacity() -> usize {
    ERROR_LOG_CAPACITY
}

impl Default for ErrorLogConfig {
    fn default() -> Self {
        Self {
            path: default_error_log_path(),
            capacity: default_error_log_capacity(),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line
    Json,
    /// Human-readable multi-line output
    Pretty,
}

/// Log file rotation policy
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RotationPolicy {
    /// New file every day
    Daily,
    /// New file every hour
    Hourly,
    /// Single file
    Never,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self::Daily
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: LogFormat,

    /// Directory for log files (stderr only when unset)
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Log file rotation (only with `log_dir`)
    #[serde(default)]
    pub rotation: RotationPolicy,
}

fn default_log_level() -> String {
    "info".to_string()
}

const fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: RotationPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.retry.policy(), RetryPolicy::new(3));
        assert_eq!(config.stability.timeout_secs, 60);
        assert_eq!(config.stability.quiet_interval_ms, 3000);
        assert_eq!(config.stability.min_answer_chars, 20);
        assert_eq!(config.driver.kind, DriverKind::Command);
        assert_eq!(config.error_log.capacity, 100);
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = "retry:\n  max_retries: 5\ndriver:\n  kind: scripted\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.retry_delay_ms, 1000);
        assert_eq!(config.driver.kind, DriverKind::Scripted);
        assert_eq!(config.driver.ping_timeout_ms, 2000);
    }
}

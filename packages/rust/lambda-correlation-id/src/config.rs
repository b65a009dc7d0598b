use crate::constants::{defaults, env_vars};
use bon::Builder;
use std::env;
use thiserror::Error;

/// Errors raised while reading configuration from the environment.
///
/// These never reach the invocation: callers log them and fall back.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid boolean value for {name}: {value:?}")]
    InvalidFlag { name: &'static str, value: String },
}

/// Controls which correlation fields are mirrored into the logger's persistent attributes.
///
/// Only relevant when the manager has a logger. Without explicit options
/// ([`LoggerOptions::default`]) only the correlation id is mirrored. Options
/// built with [`LoggerOptions::builder`] mirror only the fields switched on.
///
/// # Configuration
///
/// Each flag can be overridden with an environment variable, which takes
/// precedence over programmatic configuration:
///
/// - `LAMBDA_CORRELATION_LOG_ID`
/// - `LAMBDA_CORRELATION_LOG_TRIGGER`
/// - `LAMBDA_CORRELATION_LOG_STATUS`
///
/// Accepted values are `true`/`false`, `1`/`0`, `yes`/`no` and `on`/`off`.
///
/// # Example
///
/// ```
/// use lambda_correlation_id::LoggerOptions;
///
/// let options = LoggerOptions::builder()
///     .log_correlation_trigger(true)
///     .build();
///
/// assert!(!options.log_correlation_id);
/// assert!(options.log_correlation_trigger);
/// assert!(!options.log_correlation_status);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Builder)]
pub struct LoggerOptions {
    /// Mirror `x_correlation_id`.
    #[builder(default)]
    pub log_correlation_id: bool,

    /// Mirror `x_correlation_trigger`.
    #[builder(default)]
    pub log_correlation_trigger: bool,

    /// Mirror `x_correlation_status`.
    #[builder(default)]
    pub log_correlation_status: bool,
}

impl Default for LoggerOptions {
    fn default() -> Self {
        Self {
            log_correlation_id: defaults::LOG_CORRELATION_ID,
            log_correlation_trigger: defaults::LOG_CORRELATION_TRIGGER,
            log_correlation_status: defaults::LOG_CORRELATION_STATUS,
        }
    }
}

impl LoggerOptions {
    /// Resolve options from environment variables or the provided configuration.
    ///
    /// Every flag set in the environment overrides the configured (or default)
    /// value; invalid values are logged and ignored.
    pub fn resolve(config: Option<LoggerOptions>) -> Self {
        let config = config.unwrap_or_default();

        Self {
            log_correlation_id: resolve_flag(
                env_vars::LOG_CORRELATION_ID,
                config.log_correlation_id,
            ),
            log_correlation_trigger: resolve_flag(
                env_vars::LOG_CORRELATION_TRIGGER,
                config.log_correlation_trigger,
            ),
            log_correlation_status: resolve_flag(
                env_vars::LOG_CORRELATION_STATUS,
                config.log_correlation_status,
            ),
        }
    }
}

fn parse_flag(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidFlag {
            name,
            value: value.to_string(),
        }),
    }
}

fn resolve_flag(name: &'static str, configured: bool) -> bool {
    let Ok(value) = env::var(name) else {
        return configured;
    };

    parse_flag(name, &value).unwrap_or_else(|err| {
        tracing::warn!(error = %err, configured, "ignoring invalid logger option");
        configured
    })
}

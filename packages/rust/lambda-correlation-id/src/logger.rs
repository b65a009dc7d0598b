//! Structured logging with persistent attributes.
//!
//! The lifecycle manager mirrors correlation fields into any [`StructuredLogger`].
//! This module also ships [`Logger`], a small JSON-lines logger with level
//! filtering whose persistent attributes are merged into every line.
//!
//! # Example
//! ```
//! use lambda_correlation_id::logger::{Logger, StructuredLogger};
//! use std::collections::HashMap;
//!
//! let logger = Logger::new("orders");
//! logger.add_persistent_log_attributes(HashMap::from([(
//!     "x_correlation_id".to_string(),
//!     "abc".to_string(),
//! )]));
//!
//! // {"level":"INFO","message":"order stored","service":"orders","x_correlation_id":"abc"}
//! logger.info("order stored");
//! ```
//!
//! # Static Logger Example
//! ```
//! use lambda_correlation_id::logger::Logger;
//!
//! static LOGGER: Logger = Logger::const_new("orders");
//!
//! LOGGER.info("Starting module");
//! ```

use crate::constants::env_vars;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::env;
use std::sync::{OnceLock, PoisonError, RwLock};

/// A logger that keeps attributes attached to every subsequent log line.
pub trait StructuredLogger: Send + Sync {
    /// Add (or overwrite) persistent attributes.
    fn add_persistent_log_attributes(&self, attributes: HashMap<String, String>);

    /// Remove persistent attributes by key; unknown keys are ignored.
    fn remove_persistent_log_attributes(&self, keys: &[&str]);
}

/// Severity of a log line, most severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Level {
    Error,
    Warn,
    Info,
    Debug,
}

impl Level {
    fn name(self) -> &'static str {
        match self {
            Level::Error => "ERROR",
            Level::Warn => "WARN",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
        }
    }
}

/// Parse a threshold; `Ok(None)` means logging is switched off.
fn parse_threshold(value: &str) -> Result<Option<Level>, ()> {
    match value.trim().to_lowercase().as_str() {
        "none" => Ok(None),
        "error" => Ok(Some(Level::Error)),
        "warn" => Ok(Some(Level::Warn)),
        "info" => Ok(Some(Level::Info)),
        "debug" => Ok(Some(Level::Debug)),
        _ => Err(()),
    }
}

fn default_threshold() -> Option<Level> {
    Some(Level::Info)
}

static THRESHOLD: OnceLock<Option<Level>> = OnceLock::new();

/// Threshold from `AWS_LAMBDA_LOG_LEVEL`, then `LOG_LEVEL`, read once per process.
fn env_threshold() -> Option<Level> {
    *THRESHOLD.get_or_init(|| {
        env::var(env_vars::AWS_LAMBDA_LOG_LEVEL)
            .or_else(|_| env::var(env_vars::LOG_LEVEL))
            .ok()
            .and_then(|value| parse_threshold(&value).ok())
            .unwrap_or_else(default_threshold)
    })
}

/// JSON-lines logger with level filtering and persistent attributes.
#[derive(Debug)]
pub struct Logger {
    service: &'static str,
    threshold_fn: fn() -> Option<Level>,
    attributes: RwLock<BTreeMap<String, String>>,
}

impl Logger {
    /// Create a new logger for the given service, honouring `AWS_LAMBDA_LOG_LEVEL`/`LOG_LEVEL`.
    pub fn new(service: impl Into<String>) -> Self {
        let static_service = Box::leak(service.into().into_boxed_str());

        Self {
            service: static_service,
            threshold_fn: env_threshold,
            attributes: RwLock::new(BTreeMap::new()),
        }
    }

    /// Create a logger usable in `static` items; it always logs at `info`.
    pub const fn const_new(service: &'static str) -> Self {
        Self {
            service,
            threshold_fn: default_threshold,
            attributes: RwLock::new(BTreeMap::new()),
        }
    }

    /// Snapshot of the current persistent attributes.
    pub fn persistent_log_attributes(&self) -> BTreeMap<String, String> {
        self.attributes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn should_log(&self, level: Level) -> bool {
        (self.threshold_fn)().is_some_and(|threshold| level <= threshold)
    }

    fn format_line(&self, level: Level, message: &str) -> String {
        let mut line = Map::new();
        for (key, value) in self.persistent_log_attributes() {
            line.insert(key, Value::String(value));
        }
        line.insert("level".to_string(), level.name().into());
        line.insert("message".to_string(), message.into());
        line.insert("service".to_string(), self.service.into());
        Value::Object(line).to_string()
    }

    // Errors and warnings go to stderr, everything else to stdout.
    fn log(&self, level: Level, message: &str) {
        if !self.should_log(level) {
            return;
        }
        let line = self.format_line(level, message);
        if level <= Level::Warn {
            eprintln!("{line}");
        } else {
            println!("{line}");
        }
    }

    /// Log a debug message
    pub fn debug(&self, message: impl AsRef<str>) {
        self.log(Level::Debug, message.as_ref());
    }

    /// Log an info message
    pub fn info(&self, message: impl AsRef<str>) {
        self.log(Level::Info, message.as_ref());
    }

    /// Log a warning message
    pub fn warn(&self, message: impl AsRef<str>) {
        self.log(Level::Warn, message.as_ref());
    }

    /// Log an error message
    pub fn error(&self, message: impl AsRef<str>) {
        self.log(Level::Error, message.as_ref());
    }
}

impl StructuredLogger for Logger {
    fn add_persistent_log_attributes(&self, attributes: HashMap<String, String>) {
        self.attributes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(attributes);
    }

    fn remove_persistent_log_attributes(&self, keys: &[&str]) {
        let mut attributes = self.attributes.write().unwrap_or_else(PoisonError::into_inner);
        for key in keys {
            attributes.remove(*key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::defaults;

    #[test]
    fn test_log_levels() {
        let logger = Logger::const_new("test");

        assert!(logger.should_log(Level::Error));
        assert!(logger.should_log(Level::Warn));
        assert!(logger.should_log(Level::Info));
        assert!(!logger.should_log(Level::Debug));
    }

    #[test]
    fn test_parse_threshold() {
        assert_eq!(parse_threshold("none"), Ok(None));
        assert_eq!(parse_threshold(" DEBUG "), Ok(Some(Level::Debug)));
        assert_eq!(parse_threshold("warn"), Ok(Some(Level::Warn)));
        assert_eq!(parse_threshold("verbose"), Err(()));
        assert_eq!(parse_threshold(defaults::LOG_LEVEL), Ok(default_threshold()));
    }

    #[test]
    fn test_silenced_logger() {
        let logger = Logger {
            service: "test",
            threshold_fn: || None,
            attributes: RwLock::new(BTreeMap::new()),
        };
        assert!(!logger.should_log(Level::Error));
    }

    #[test]
    fn test_persistent_attributes() {
        let logger = Logger::const_new("test");
        logger.add_persistent_log_attributes(HashMap::from([
            ("x_correlation_id".to_string(), "abc".to_string()),
            ("x_correlation_status".to_string(), "passed".to_string()),
        ]));
        logger.add_persistent_log_attributes(HashMap::from([(
            "x_correlation_id".to_string(),
            "def".to_string(),
        )]));

        let attributes = logger.persistent_log_attributes();
        assert_eq!(attributes.len(), 2);
        assert_eq!(attributes["x_correlation_id"], "def");

        logger.remove_persistent_log_attributes(&["x_correlation_status", "unknown"]);
        assert_eq!(
            logger.persistent_log_attributes().keys().collect::<Vec<_>>(),
            vec!["x_correlation_id"]
        );
    }

    #[test]
    fn test_format_line() {
        let logger = Logger::const_new("test");
        assert_eq!(
            logger.format_line(Level::Info, "hello"),
            r#"{"level":"INFO","message":"hello","service":"test"}"#
        );

        logger.add_persistent_log_attributes(HashMap::from([(
            "x_correlation_id".to_string(),
            "abc".to_string(),
        )]));
        let line: Value = serde_json::from_str(&logger.format_line(Level::Warn, "careful")).unwrap();
        assert_eq!(line["level"], "WARN");
        assert_eq!(line["message"], "careful");
        assert_eq!(line["x_correlation_id"], "abc");
    }
}

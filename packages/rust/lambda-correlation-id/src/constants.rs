//! Constants for the lambda-correlation-id package.
//!
//! State keys, trigger labels and configuration names live here so the
//! classifier, the lifecycle manager and the logger all agree on them.

/// Keys written into process-wide state (and mirrored into the logger).
pub mod keys {
    /// Correlation id used to tie logs and traces of one logical request together.
    pub const CORRELATION_ID: &str = "x_correlation_id";

    /// Name of the event source that invoked the function.
    pub const CORRELATION_TRIGGER: &str = "x_correlation_trigger";

    /// Either `created` (minted from invocation metadata) or `passed` (found in the event).
    pub const CORRELATION_STATUS: &str = "x_correlation_status";

    /// All three keys, in the order they are written.
    pub const ALL: [&str; 3] = [CORRELATION_ID, CORRELATION_TRIGGER, CORRELATION_STATUS];
}

/// Trigger labels stored under [`keys::CORRELATION_TRIGGER`].
pub mod triggers {
    pub const API_GATEWAY: &str = "APIGateway";
    pub const SNS: &str = "SNS";
    pub const SQS: &str = "SQS";
    /// Prefix; the event's `detail-type` is appended after `": "`.
    pub const EVENT_BRIDGE: &str = "EventBridge";
    pub const LAMBDA: &str = "Lambda";
}

/// Values stored under [`keys::CORRELATION_STATUS`].
pub mod status {
    pub const CREATED: &str = "created";
    pub const PASSED: &str = "passed";
}

/// Placeholder id used when an SQS message carries the correlation attribute
/// without a string value.
pub const SQS_MISSING_VALUE: &str = "N/A";

/// Environment variable names for configuration.
pub mod env_vars {
    /// Mirror the correlation id into the logger's persistent attributes.
    pub const LOG_CORRELATION_ID: &str = "LAMBDA_CORRELATION_LOG_ID";

    /// Mirror the trigger label into the logger's persistent attributes.
    pub const LOG_CORRELATION_TRIGGER: &str = "LAMBDA_CORRELATION_LOG_TRIGGER";

    /// Mirror the correlation status into the logger's persistent attributes.
    pub const LOG_CORRELATION_STATUS: &str = "LAMBDA_CORRELATION_LOG_STATUS";

    /// Lambda managed log level, checked first by [`crate::logger::Logger`].
    pub const AWS_LAMBDA_LOG_LEVEL: &str = "AWS_LAMBDA_LOG_LEVEL";

    /// Generic log level fallback.
    pub const LOG_LEVEL: &str = "LOG_LEVEL";
}

/// Default values for configuration parameters.
pub mod defaults {
    pub const LOG_CORRELATION_ID: bool = true;
    pub const LOG_CORRELATION_TRIGGER: bool = false;
    pub const LOG_CORRELATION_STATUS: bool = false;

    /// Log level used when neither log level variable is set.
    pub const LOG_LEVEL: &str = "info";
}

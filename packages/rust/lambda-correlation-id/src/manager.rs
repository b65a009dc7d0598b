//! Correlation id lifecycle around a single invocation.
//!
//! [`CorrelationIdManager`] is the piece both the [`layer`](crate::layer) and the
//! [`handler`](crate::handler) wrapper delegate to. On invocation start
//! ([`before`](CorrelationIdManager::before)) it classifies the event, picks up
//! an existing correlation id or derives one, and publishes the resulting
//! [`CorrelationRecord`] into a [`StateStore`] (and optionally a logger). On
//! invocation end ([`after`](CorrelationIdManager::after)) it removes it again.
//!
//! # Where the id comes from
//!
//! | Trigger     | Passed id                                                  | Created id                  |
//! |-------------|------------------------------------------------------------|-----------------------------|
//! | API Gateway | `headers.x_correlation_id`                                 | `requestContext.requestId`  |
//! | SNS         | `Records[0].Sns.MessageAttributes.x_correlation_id.Value`  | `Records[0].Sns.MessageId`  |
//! | SQS         | `Records[0].messageAttributes.x_correlation_id.stringValue`| `Records[0].messageId`      |
//! | EventBridge | `detail.x_correlation_id`                                  | `id`                        |
//! | Lambda      | `x_correlation_id` at the top of the payload               | the invocation's request id |
//!
//! An SQS message that carries the attribute without a string value is still
//! considered passed, with the id `N/A`. When a created-id field is missing the
//! invocation's request id is used instead.
//!
//! # Example
//!
//! ```
//! use lambda_correlation_id::{CorrelationIdManager, InvocationContext};
//! use lambda_correlation_id::state::InMemoryState;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let state = InMemoryState::new();
//! let manager = CorrelationIdManager::new().with_state(Arc::new(state.clone()));
//!
//! let event = json!({ "x_correlation_id": "abc" });
//! let context = InvocationContext::new("my-function", "request-id");
//!
//! {
//!     let scope = manager.enter(&event, &context);
//!     assert_eq!(scope.record().map(|r| r.id.as_str()), Some("abc"));
//! }
//!
//! // Dropping the scope cleared the state.
//! assert!(state.is_empty());
//! ```

use crate::config::LoggerOptions;
use crate::constants::{keys, SQS_MISSING_VALUE};
use crate::logger::StructuredLogger;
use crate::state::{CorrelationRecord, CorrelationStatus, ProcessState, StateStore};
use crate::trigger::{classify, str_field, InvocationContext, Trigger};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Publishes and clears the correlation record for each invocation.
///
/// Cheap to clone; clones share the store and the logger.
#[derive(Clone)]
pub struct CorrelationIdManager {
    state: Arc<dyn StateStore>,
    logger: Option<Arc<dyn StructuredLogger>>,
    options: LoggerOptions,
}

impl fmt::Debug for CorrelationIdManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CorrelationIdManager")
            .field("logger", &self.logger.is_some())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Default for CorrelationIdManager {
    fn default() -> Self {
        Self::new()
    }
}

impl CorrelationIdManager {
    /// A manager writing to [`ProcessState`] with no logger attached.
    pub fn new() -> Self {
        Self {
            state: Arc::new(ProcessState),
            logger: None,
            options: LoggerOptions::resolve(None),
        }
    }

    /// Mirror correlation fields into `logger`.
    ///
    /// Unless [`with_logger_options`](Self::with_logger_options) is also used,
    /// only the correlation id is mirrored. Explicit options replace that
    /// default entirely: fields they leave off are not mirrored.
    pub fn with_logger(mut self, logger: Arc<dyn StructuredLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Choose which fields are mirrored. Environment variables still take precedence.
    pub fn with_logger_options(mut self, options: LoggerOptions) -> Self {
        self.options = LoggerOptions::resolve(Some(options));
        self
    }

    /// Publish into `state` instead of the process-wide store.
    pub fn with_state(mut self, state: Arc<dyn StateStore>) -> Self {
        self.state = state;
        self
    }

    /// The mirroring options in effect, after environment overrides.
    pub fn logger_options(&self) -> LoggerOptions {
        self.options
    }

    /// Set up correlation state for an invocation.
    ///
    /// Returns the published record, or `None` when the event was not
    /// recognized (in which case nothing is written).
    pub fn before(&self, event: &Value, context: &InvocationContext) -> Option<CorrelationRecord> {
        let trigger = classify(event, context);
        let Some(record) = extract_record(&trigger, context) else {
            tracing::debug!("no known trigger shape, correlation id not set");
            return None;
        };

        record.store(self.state.as_ref());
        if let Some(logger) = &self.logger {
            let attributes: HashMap<String, String> = self
                .mirrored_keys()
                .map(|key| {
                    let value = match key {
                        keys::CORRELATION_ID => record.id.clone(),
                        keys::CORRELATION_TRIGGER => record.trigger.clone(),
                        _ => record.status.to_string(),
                    };
                    (key.to_string(), value)
                })
                .collect();
            if !attributes.is_empty() {
                logger.add_persistent_log_attributes(attributes);
            }
        }

        tracing::debug!(
            correlation_id = %record.id,
            trigger = %record.trigger,
            status = %record.status,
            "correlation id set"
        );
        Some(record)
    }

    /// Remove correlation state. Safe to call when nothing was set.
    pub fn after(&self) {
        for key in keys::ALL {
            self.state.delete(key);
        }
        if let Some(logger) = &self.logger {
            let mirrored: Vec<&str> = self.mirrored_keys().collect();
            if !mirrored.is_empty() {
                logger.remove_persistent_log_attributes(&mirrored);
            }
        }
        tracing::debug!("correlation id cleared");
    }

    /// Run [`before`](Self::before) and return a guard that runs
    /// [`after`](Self::after) when dropped.
    pub fn enter(&self, event: &Value, context: &InvocationContext) -> CorrelationScope {
        let record = self.before(event, context);
        CorrelationScope {
            manager: self.clone(),
            record,
        }
    }

    fn mirrored_keys(&self) -> impl Iterator<Item = &'static str> {
        let options = self.options;
        [
            (keys::CORRELATION_ID, options.log_correlation_id),
            (keys::CORRELATION_TRIGGER, options.log_correlation_trigger),
            (keys::CORRELATION_STATUS, options.log_correlation_status),
        ]
        .into_iter()
        .filter_map(|(key, enabled)| enabled.then_some(key))
    }
}

/// Guard holding correlation state for one invocation.
///
/// Clears the state when dropped, whether the handler succeeded, failed,
/// panicked or was cancelled.
#[must_use = "correlation state is cleared as soon as the scope is dropped"]
pub struct CorrelationScope {
    manager: CorrelationIdManager,
    record: Option<CorrelationRecord>,
}

impl CorrelationScope {
    /// The record published for this invocation, if the event was recognized.
    pub fn record(&self) -> Option<&CorrelationRecord> {
        self.record.as_ref()
    }
}

impl fmt::Debug for CorrelationScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CorrelationScope")
            .field("record", &self.record)
            .finish_non_exhaustive()
    }
}

impl Drop for CorrelationScope {
    fn drop(&mut self) {
        self.manager.after();
    }
}

fn non_empty_str<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    str_field(object, key).filter(|value| !value.is_empty())
}

fn correlation_attribute<'a>(
    object: &'a Map<String, Value>,
    container: &str,
) -> Option<&'a Map<String, Value>> {
    object.get(container)?.get(keys::CORRELATION_ID)?.as_object()
}

/// Work out id and status for a classified event.
fn extract_record(trigger: &Trigger<'_>, context: &InvocationContext) -> Option<CorrelationRecord> {
    let label = trigger.label()?;

    let (passed, created) = match trigger {
        Trigger::ApiGateway(request) => (
            request
                .get("headers")
                .and_then(Value::as_object)
                .and_then(|headers| non_empty_str(headers, keys::CORRELATION_ID)),
            request
                .get("requestContext")
                .and_then(Value::as_object)
                .and_then(|request_context| non_empty_str(request_context, "requestId")),
        ),
        Trigger::Sns(notification) => (
            correlation_attribute(notification, "MessageAttributes")
                .and_then(|attribute| non_empty_str(attribute, "Value")),
            non_empty_str(notification, "MessageId"),
        ),
        Trigger::Sqs(record) => (
            correlation_attribute(record, "messageAttributes").map(|attribute| {
                non_empty_str(attribute, "stringValue").unwrap_or(SQS_MISSING_VALUE)
            }),
            non_empty_str(record, "messageId"),
        ),
        Trigger::EventBridge(event) => (
            event
                .get("detail")
                .and_then(Value::as_object)
                .and_then(|detail| non_empty_str(detail, keys::CORRELATION_ID)),
            non_empty_str(event, "id"),
        ),
        Trigger::Lambda(event) => (
            event.get(keys::CORRELATION_ID).and_then(Value::as_str),
            None,
        ),
        Trigger::Unrecognized => return None,
    };

    let (id, status) = match passed {
        Some(id) => (id.to_string(), CorrelationStatus::Passed),
        None => (
            created.unwrap_or(&context.request_id).to_string(),
            CorrelationStatus::Created,
        ),
    };

    Some(CorrelationRecord {
        id,
        trigger: label,
        status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::Logger;
    use crate::state::InMemoryState;
    use serde_json::json;
    use serial_test::serial;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum LoggerCall {
        Add(Vec<(String, String)>),
        Remove(Vec<String>),
    }

    // Logger that records every call it receives
    #[derive(Default)]
    struct RecordingLogger {
        calls: Mutex<Vec<LoggerCall>>,
    }

    impl RecordingLogger {
        fn calls(&self) -> Vec<LoggerCall> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl StructuredLogger for RecordingLogger {
        fn add_persistent_log_attributes(&self, attributes: HashMap<String, String>) {
            let mut attributes: Vec<_> = attributes.into_iter().collect();
            attributes.sort();
            self.calls.lock().unwrap().push(LoggerCall::Add(attributes));
        }

        fn remove_persistent_log_attributes(&self, keys: &[&str]) {
            let keys = keys.iter().map(|key| key.to_string()).collect();
            self.calls.lock().unwrap().push(LoggerCall::Remove(keys));
        }
    }

    fn context() -> InvocationContext {
        InvocationContext::new("functionName", "awsRequestId")
    }

    fn manager() -> (CorrelationIdManager, InMemoryState) {
        let state = InMemoryState::new();
        let manager = CorrelationIdManager::new().with_state(Arc::new(state.clone()));
        (manager, state)
    }

    fn record(id: &str, trigger: &str, status: CorrelationStatus) -> CorrelationRecord {
        CorrelationRecord {
            id: id.to_string(),
            trigger: trigger.to_string(),
            status,
        }
    }

    fn assert_before(event: Value, context: &InvocationContext, expected: CorrelationRecord) {
        let (manager, state) = manager();
        let record = manager.before(&event, context);
        assert_eq!(record.as_ref(), Some(&expected), "Failed for event: {}", event);
        assert_eq!(CorrelationRecord::load(&state), Some(expected));

        manager.after();
        assert!(state.is_empty());
    }

    #[test]
    #[serial]
    fn test_api_gateway() {
        let event = json!({
            "resource": "r",
            "httpMethod": "GET",
            "isBase64Encoded": false,
            "requestContext": { "requestId": "requestId" }
        });
        assert_before(
            event.clone(),
            &context(),
            record("requestId", "APIGateway", CorrelationStatus::Created),
        );

        let mut passed = event.clone();
        passed["headers"] = json!({ "x_correlation_id": "abc" });
        assert_before(
            passed,
            &context(),
            record("abc", "APIGateway", CorrelationStatus::Passed),
        );

        let mut empty_header = event;
        empty_header["headers"] = json!({ "x_correlation_id": "" });
        assert_before(
            empty_header,
            &context(),
            record("requestId", "APIGateway", CorrelationStatus::Created),
        );
    }

    #[test]
    #[serial]
    fn test_sns() {
        let event = json!({
            "Records": [{
                "Sns": { "MessageId": "messageId", "Message": "message", "Timestamp": "timestamp" }
            }]
        });
        assert_before(
            event.clone(),
            &context(),
            record("messageId", "SNS", CorrelationStatus::Created),
        );

        let mut passed = event.clone();
        passed["Records"][0]["Sns"]["MessageAttributes"] = json!({
            "x_correlation_id": { "Type": "String", "Value": "abc" }
        });
        assert_before(passed, &context(), record("abc", "SNS", CorrelationStatus::Passed));

        for attribute in [
            json!({ "Type": "String", "Value": "" }),
            json!({ "Type": "String" }),
        ] {
            let mut unusable = event.clone();
            unusable["Records"][0]["Sns"]["MessageAttributes"] =
                json!({ "x_correlation_id": attribute });
            assert_before(
                unusable,
                &context(),
                record("messageId", "SNS", CorrelationStatus::Created),
            );
        }
    }

    #[test]
    #[serial]
    fn test_sqs() {
        let event = json!({
            "Records": [{ "messageId": "m1", "receiptHandle": "rh", "md5OfBody": "x", "body": "" }]
        });
        assert_before(
            event.clone(),
            &context(),
            record("m1", "SQS", CorrelationStatus::Created),
        );

        let mut passed = event.clone();
        passed["Records"][0]["messageAttributes"] = json!({
            "x_correlation_id": { "stringValue": "abc", "dataType": "String" }
        });
        assert_before(passed, &context(), record("abc", "SQS", CorrelationStatus::Passed));

        let mut without_value = event;
        without_value["Records"][0]["messageAttributes"] = json!({
            "x_correlation_id": { "dataType": "String" }
        });
        assert_before(
            without_value,
            &context(),
            record("N/A", "SQS", CorrelationStatus::Passed),
        );
    }

    #[test]
    #[serial]
    fn test_event_bridge() {
        let event = json!({
            "id": "e1",
            "detail-type": "dt",
            "source": "s",
            "account": "a",
            "detail": {}
        });
        assert_before(
            event.clone(),
            &context(),
            record("e1", "EventBridge: dt", CorrelationStatus::Created),
        );

        let mut passed = event.clone();
        passed["detail"] = json!({ "x_correlation_id": "abc" });
        assert_before(
            passed,
            &context(),
            record("abc", "EventBridge: dt", CorrelationStatus::Passed),
        );

        let mut empty = event;
        empty["detail"] = json!({ "x_correlation_id": "" });
        assert_before(
            empty,
            &context(),
            record("e1", "EventBridge: dt", CorrelationStatus::Created),
        );
    }

    #[test]
    #[serial]
    fn test_direct_invocation() {
        let context = InvocationContext::new("f", "rid");
        assert_before(
            json!({}),
            &context,
            record("rid", "Lambda", CorrelationStatus::Created),
        );
        assert_before(
            json!({ "x_correlation_id": "abc" }),
            &context,
            record("abc", "Lambda", CorrelationStatus::Passed),
        );
        // Any string counts for direct invocations, even an empty one.
        assert_before(
            json!({ "x_correlation_id": "" }),
            &context,
            record("", "Lambda", CorrelationStatus::Passed),
        );
        // Only string ids are picked up.
        assert_before(
            json!({ "x_correlation_id": 42 }),
            &context,
            record("rid", "Lambda", CorrelationStatus::Created),
        );
    }

    #[test]
    #[serial]
    fn test_missing_fallback_uses_request_id() {
        let event = json!({ "resource": "r", "httpMethod": "GET", "isBase64Encoded": true });
        assert_before(
            event,
            &context(),
            record("awsRequestId", "APIGateway", CorrelationStatus::Created),
        );
    }

    #[test]
    #[serial]
    fn test_unrecognized_event_is_a_no_op() {
        let (manager, state) = manager();
        assert_eq!(manager.before(&json!({}), &InvocationContext::default()), None);
        assert!(state.is_empty());

        let scope = manager.enter(&Value::Null, &InvocationContext::default());
        assert!(scope.record().is_none());
        drop(scope);
        assert!(state.is_empty());
    }

    #[test]
    #[serial]
    fn test_scope_clears_state_on_drop() {
        let (manager, state) = manager();
        {
            let scope = manager.enter(&json!({}), &context());
            assert_eq!(scope.record().map(|r| r.id.as_str()), Some("awsRequestId"));
            assert_eq!(state.len(), 3);
        }
        assert!(state.is_empty());
    }

    #[test]
    #[serial]
    fn test_default_logger_options_mirror_only_the_id() {
        let (manager, _state) = manager();
        let logger = Arc::new(RecordingLogger::default());
        let manager = manager.with_logger(logger.clone());

        manager.before(&json!({}), &context());
        manager.after();

        assert_eq!(
            logger.calls(),
            vec![
                LoggerCall::Add(vec![(
                    "x_correlation_id".to_string(),
                    "awsRequestId".to_string()
                )]),
                LoggerCall::Remove(vec!["x_correlation_id".to_string()]),
            ]
        );
    }

    #[test]
    #[serial]
    fn test_all_fields_mirrored() {
        let (manager, _state) = manager();
        let logger = Arc::new(Logger::new("test"));
        let manager = manager.with_logger(logger.clone()).with_logger_options(
            LoggerOptions::builder()
                .log_correlation_id(true)
                .log_correlation_trigger(true)
                .log_correlation_status(true)
                .build(),
        );

        manager.before(&json!({ "x_correlation_id": "abc" }), &context());
        let attributes = logger.persistent_log_attributes();
        assert_eq!(attributes["x_correlation_id"], "abc");
        assert_eq!(attributes["x_correlation_trigger"], "Lambda");
        assert_eq!(attributes["x_correlation_status"], "passed");

        manager.after();
        assert!(logger.persistent_log_attributes().is_empty());
    }

    #[test]
    #[serial]
    fn test_disabled_mirroring_never_touches_logger() {
        let (manager, state) = manager();
        let logger = Arc::new(RecordingLogger::default());
        let manager = manager
            .with_logger(logger.clone())
            .with_logger_options(LoggerOptions::builder().log_correlation_id(false).build());

        manager.before(&json!({}), &context());
        assert_eq!(state.len(), 3);
        manager.after();

        assert!(logger.calls().is_empty());
    }

    #[test]
    #[serial]
    fn test_explicit_options_mirror_only_selected_fields() {
        let (manager, _state) = manager();
        let logger = Arc::new(RecordingLogger::default());
        let manager = manager
            .with_logger(logger.clone())
            .with_logger_options(LoggerOptions::builder().log_correlation_trigger(true).build());

        assert_eq!(
            manager.logger_options(),
            LoggerOptions {
                log_correlation_id: false,
                log_correlation_trigger: true,
                log_correlation_status: false,
            }
        );

        manager.before(&json!({}), &context());
        manager.after();

        assert_eq!(
            logger.calls(),
            vec![
                LoggerCall::Add(vec![(
                    "x_correlation_trigger".to_string(),
                    "Lambda".to_string()
                )]),
                LoggerCall::Remove(vec!["x_correlation_trigger".to_string()]),
            ]
        );
    }
}

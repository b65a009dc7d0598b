//! Trigger classification for Lambda invocation events.
//!
//! Lambda hands every function an untyped JSON payload; which service produced it
//! can only be told from its shape. This module inspects the payload (and, as a
//! last resort, the invocation context) and classifies it into a [`Trigger`].
//!
//! # Precedence
//!
//! Shapes are checked in a fixed order and the first match wins:
//!
//! 1. API Gateway (REST) request: string `resource` and `httpMethod`, boolean `isBase64Encoded`
//! 2. SNS notification: `Records[0].Sns` with string `MessageId`, `Message` and `Timestamp`
//! 3. SQS message batch: `Records[0]` with string `messageId`, `receiptHandle` and `md5OfBody`
//! 4. EventBridge event: string `id`, `source` and `account`
//! 5. Direct invocation: the context carries a function name and a request id
//!
//! Anything else is [`Trigger::Unrecognized`]. The checks never fail: missing,
//! `null` or wrongly typed fields simply do not match.
//!
//! # Example
//!
//! ```
//! use lambda_correlation_id::{classify, InvocationContext, Trigger};
//! use serde_json::json;
//!
//! let event = json!({
//!     "Records": [{ "messageId": "m1", "receiptHandle": "rh", "md5OfBody": "x" }]
//! });
//! let context = InvocationContext::new("my-function", "request-id");
//!
//! let trigger = classify(&event, &context);
//! assert!(matches!(trigger, Trigger::Sqs(_)));
//! assert_eq!(trigger.label().as_deref(), Some("SQS"));
//! ```

use crate::constants::triggers;
use serde_json::{Map, Value};

/// Invocation metadata used for classification and as the id of last resort.
///
/// Empty strings are treated as missing values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvocationContext {
    /// Name of the invoked function.
    pub function_name: String,
    /// Unique id Lambda assigned to this invocation.
    pub request_id: String,
}

impl InvocationContext {
    pub fn new(function_name: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self {
            function_name: function_name.into(),
            request_id: request_id.into(),
        }
    }
}

impl From<&lambda_runtime::Context> for InvocationContext {
    fn from(context: &lambda_runtime::Context) -> Self {
        Self {
            function_name: context.env_config.function_name.clone(),
            request_id: context.request_id.clone(),
        }
    }
}

/// The event source that produced an invocation.
///
/// Shape-bearing variants borrow the part of the event that holds the
/// correlation data, so extraction does not have to walk the payload twice.
#[derive(Debug, Clone, PartialEq)]
pub enum Trigger<'a> {
    /// API Gateway REST request; borrows the whole request object.
    ApiGateway(&'a Map<String, Value>),
    /// SNS notification; borrows the `Sns` object of the first record.
    Sns(&'a Map<String, Value>),
    /// SQS message batch; borrows the first record.
    Sqs(&'a Map<String, Value>),
    /// EventBridge event; borrows the whole event object.
    EventBridge(&'a Map<String, Value>),
    /// Direct invocation; borrows the raw payload, whatever its type.
    Lambda(&'a Value),
    /// No known shape matched.
    Unrecognized,
}

impl Trigger<'_> {
    /// Label stored under `x_correlation_trigger`, or `None` when unrecognized.
    ///
    /// EventBridge events are labelled `EventBridge: <detail-type>`.
    pub fn label(&self) -> Option<String> {
        let label = match self {
            Trigger::ApiGateway(_) => triggers::API_GATEWAY.to_string(),
            Trigger::Sns(_) => triggers::SNS.to_string(),
            Trigger::Sqs(_) => triggers::SQS.to_string(),
            Trigger::EventBridge(event) => match str_field(event, "detail-type") {
                Some(detail_type) => format!("{}: {}", triggers::EVENT_BRIDGE, detail_type),
                None => triggers::EVENT_BRIDGE.to_string(),
            },
            Trigger::Lambda(_) => triggers::LAMBDA.to_string(),
            Trigger::Unrecognized => return None,
        };
        Some(label)
    }
}

/// Classify an invocation, honouring the precedence documented on the module.
pub fn classify<'a>(event: &'a Value, context: &InvocationContext) -> Trigger<'a> {
    if let Some(request) = api_gateway_shape(event) {
        Trigger::ApiGateway(request)
    } else if let Some(notification) = sns_shape(event) {
        Trigger::Sns(notification)
    } else if let Some(record) = sqs_shape(event) {
        Trigger::Sqs(record)
    } else if let Some(bus_event) = event_bridge_shape(event) {
        Trigger::EventBridge(bus_event)
    } else if is_lambda(context) {
        Trigger::Lambda(event)
    } else {
        Trigger::Unrecognized
    }
}

/// Whether the event looks like an API Gateway REST request.
pub fn is_api_gateway(event: &Value) -> bool {
    api_gateway_shape(event).is_some()
}

/// Whether the event looks like an SNS notification batch.
pub fn is_sns(event: &Value) -> bool {
    sns_shape(event).is_some()
}

/// Whether the event looks like an SQS message batch.
pub fn is_sqs(event: &Value) -> bool {
    sqs_shape(event).is_some()
}

/// Whether the event looks like an EventBridge event.
pub fn is_event_bridge(event: &Value) -> bool {
    event_bridge_shape(event).is_some()
}

/// Whether the context describes a real Lambda invocation.
pub fn is_lambda(context: &InvocationContext) -> bool {
    !context.function_name.is_empty() && !context.request_id.is_empty()
}

pub(crate) fn str_field<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    object.get(key).and_then(Value::as_str)
}

fn has_str_fields(object: &Map<String, Value>, keys: &[&str]) -> bool {
    keys.iter().all(|key| str_field(object, key).is_some())
}

fn first_record(event: &Value) -> Option<&Map<String, Value>> {
    event.get("Records")?.as_array()?.first()?.as_object()
}

fn api_gateway_shape(event: &Value) -> Option<&Map<String, Value>> {
    let request = event.as_object()?;
    let is_base64 = request.get("isBase64Encoded").is_some_and(Value::is_boolean);
    (is_base64 && has_str_fields(request, &["resource", "httpMethod"])).then_some(request)
}

fn sns_shape(event: &Value) -> Option<&Map<String, Value>> {
    let notification = first_record(event)?.get("Sns")?.as_object()?;
    has_str_fields(notification, &["MessageId", "Message", "Timestamp"]).then_some(notification)
}

fn sqs_shape(event: &Value) -> Option<&Map<String, Value>> {
    let record = first_record(event)?;
    has_str_fields(record, &["messageId", "receiptHandle", "md5OfBody"]).then_some(record)
}

fn event_bridge_shape(event: &Value) -> Option<&Map<String, Value>> {
    let bus_event = event.as_object()?;
    has_str_fields(bus_event, &["id", "source", "account"]).then_some(bus_event)
}

//! Correlation id middleware for AWS Lambda functions.
//!
//! This crate works out a correlation id for every Lambda invocation from the
//! shape of the triggering event and publishes it, together with the trigger
//! name and whether the id was passed in or created locally, for as long as the
//! invocation runs.
//!
//! # Features
//!
//! - **Event classification**: API Gateway, SNS, SQS, EventBridge and direct invocations
//! - **Id reuse**: ids already attached by the caller are passed through unchanged
//! - **Scoped state**: the record is cleared after every invocation, including on errors
//! - **Logger mirroring**: optionally copies the fields into a structured logger
//!
//! # Architecture
//!
//! - [`trigger`]: classification of the incoming event
//! - [`manager`]: the set-up / tear-down lifecycle
//! - [`state`]: process-wide state and accessors for the current record
//! - [`logger`]: the logger capability and a JSON logger implementation
//! - [`layer`]: Tower middleware
//! - [`handler`]: function wrapper for handlers without a middleware stack
//!
//! # Published keys
//!
//! | Key                     | Value                                              |
//! |-------------------------|----------------------------------------------------|
//! | `x_correlation_id`      | the correlation id                                 |
//! | `x_correlation_trigger` | `APIGateway`, `SNS`, `SQS`, `EventBridge: <detail-type>` or `Lambda` |
//! | `x_correlation_status`  | `created` or `passed`                              |
//!
//! Events that match none of the supported shapes leave the state untouched.
//!
//! # Quick Start
//!
//! ```no_run
//! use lambda_correlation_id::{current_correlation_id, CorrelationIdLayer, CorrelationIdManager};
//! use lambda_correlation_id::logger::Logger;
//! use lambda_runtime::{service_fn, Error, LambdaEvent, Runtime};
//! use serde_json::Value;
//! use std::sync::Arc;
//! use tower::ServiceBuilder;
//!
//! async fn handler(event: LambdaEvent<Value>) -> Result<Value, Error> {
//!     Ok(serde_json::json!({ "correlationId": current_correlation_id() }))
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     let logger = Arc::new(Logger::new("my-service"));
//!     let manager = CorrelationIdManager::new().with_logger(logger);
//!
//!     let service = ServiceBuilder::new()
//!         .layer(CorrelationIdLayer::new(manager))
//!         .service_fn(handler);
//!
//!     Runtime::new(service).run().await
//! }
//! ```
//!
//! # Configuration
//!
//! Logger mirroring is configured with [`LoggerOptions`]; the environment
//! variables `LAMBDA_CORRELATION_LOG_ID`, `LAMBDA_CORRELATION_LOG_TRIGGER` and
//! `LAMBDA_CORRELATION_LOG_STATUS` override it.

pub mod constants;
pub mod handler;
pub mod layer;
pub mod logger;
pub mod manager;
pub mod state;
pub mod trigger;

mod config;

pub use config::{ConfigError, LoggerOptions};
pub use handler::correlated_handler;
pub use layer::{CorrelationFuture, CorrelationIdLayer, CorrelationIdService};
pub use logger::{Logger, StructuredLogger};
pub use manager::{CorrelationIdManager, CorrelationScope};
pub use state::{
    current, current_correlation_id, CorrelationRecord, CorrelationStatus, InMemoryState,
    ProcessState, StateStore,
};
pub use trigger::{classify, InvocationContext, Trigger};

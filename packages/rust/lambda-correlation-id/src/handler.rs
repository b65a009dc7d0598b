//! Lambda function handler wrapper with correlation id scoping.
//!
//! An alternative to [`CorrelationIdLayer`](crate::CorrelationIdLayer) for functions
//! that do not use a Tower middleware stack.
//!
//! # Example
//!
//! ```rust,no_run
//! use lambda_correlation_id::{correlated_handler, current_correlation_id, CorrelationIdManager};
//! use lambda_runtime::{service_fn, Error, LambdaEvent};
//! use serde_json::Value;
//!
//! async fn function_handler(_event: LambdaEvent<Value>) -> Result<Value, Error> {
//!     Ok(serde_json::json!({ "correlationId": current_correlation_id() }))
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     let manager = CorrelationIdManager::new();
//!
//!     lambda_runtime::run(service_fn(|event| {
//!         let manager = manager.clone();
//!         async move { correlated_handler(&manager, event, function_handler).await }
//!     }))
//!     .await
//! }
//! ```

use crate::manager::CorrelationIdManager;
use crate::trigger::InvocationContext;
use lambda_runtime::{Error, LambdaEvent};
use serde::Serialize;
use serde_json::Value;
use std::future::Future;

/// Run `handler_fn` with correlation state set up for `event`.
///
/// The state is cleared when the handler finishes, whatever its outcome, and
/// the handler's result is returned unchanged.
pub async fn correlated_handler<T, R, F, Fut>(
    manager: &CorrelationIdManager,
    event: LambdaEvent<T>,
    handler_fn: F,
) -> Result<R, Error>
where
    T: Serialize,
    F: FnOnce(LambdaEvent<T>) -> Fut,
    Fut: Future<Output = Result<R, Error>>,
{
    let payload = serde_json::to_value(&event.payload).unwrap_or(Value::Null);
    let context = InvocationContext::from(&event.context);

    let _scope = manager.enter(&payload, &context);
    handler_fn(event).await
}

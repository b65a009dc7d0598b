//! Tower middleware that scopes correlation state to each Lambda invocation.
//!
//! The layer wraps any Lambda service. For every invocation it:
//! 1. Serializes the payload to JSON and classifies it
//! 2. Publishes the correlation record through its [`CorrelationIdManager`]
//! 3. Runs the inner service
//! 4. Clears the record once the inner future resolves, fails, or is dropped
//!
//! # Basic Usage
//!
//! ```no_run
//! use lambda_correlation_id::{current_correlation_id, CorrelationIdLayer, CorrelationIdManager};
//! use lambda_runtime::{service_fn, Error, LambdaEvent, Runtime};
//! use tower::ServiceBuilder;
//!
//! async fn function_handler(event: LambdaEvent<serde_json::Value>) -> Result<serde_json::Value, Error> {
//!     Ok(serde_json::json!({ "correlationId": current_correlation_id() }))
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     let service = ServiceBuilder::new()
//!         .layer(CorrelationIdLayer::new(CorrelationIdManager::new()))
//!         .service_fn(function_handler);
//!
//!     Runtime::new(service).run().await
//! }
//! ```
//!
//! Typed payloads work too, as long as they implement `Serialize`; the
//! classifier only looks at their JSON shape.

use crate::manager::{CorrelationIdManager, CorrelationScope};
use crate::trigger::InvocationContext;
use lambda_runtime::{Error, LambdaEvent};
use pin_project::pin_project;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::task::{self, Poll};
use tower::{Layer, Service};

/// Tower layer applying the correlation id lifecycle around a Lambda service.
#[derive(Clone, Debug, Default)]
pub struct CorrelationIdLayer {
    manager: CorrelationIdManager,
}

impl CorrelationIdLayer {
    pub fn new(manager: CorrelationIdManager) -> Self {
        Self { manager }
    }
}

impl<S> Layer<S> for CorrelationIdLayer {
    type Service = CorrelationIdService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CorrelationIdService {
            inner,
            manager: self.manager.clone(),
        }
    }
}

/// Tower service returned by [`CorrelationIdLayer`].
#[derive(Clone, Debug)]
pub struct CorrelationIdService<S> {
    inner: S,
    manager: CorrelationIdManager,
}

impl<S, T> Service<LambdaEvent<T>> for CorrelationIdService<S>
where
    S: Service<LambdaEvent<T>, Error = Error>,
    T: Serialize,
{
    type Response = S::Response;
    type Error = Error;
    type Future = CorrelationFuture<S::Future>;

    fn poll_ready(&mut self, cx: &mut task::Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, event: LambdaEvent<T>) -> Self::Future {
        let payload = serde_json::to_value(&event.payload).unwrap_or(Value::Null);
        let context = InvocationContext::from(&event.context);
        let scope = self.manager.enter(&payload, &context);

        CorrelationFuture {
            future: self.inner.call(event),
            scope: Some(scope),
        }
    }
}

/// Future that keeps correlation state alive until the inner future completes.
///
/// Created by [`CorrelationIdService`]; the state is cleared before the
/// result is handed back, or when the future is dropped unfinished.
#[pin_project]
pub struct CorrelationFuture<Fut> {
    #[pin]
    future: Fut,
    scope: Option<CorrelationScope>,
}

impl<Fut, R> Future for CorrelationFuture<Fut>
where
    Fut: Future<Output = Result<R, Error>>,
{
    type Output = Result<R, Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut task::Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let output = match this.future.poll(cx) {
            Poll::Ready(output) => output,
            Poll::Pending => return Poll::Pending,
        };

        this.scope.take();
        Poll::Ready(output)
    }
}

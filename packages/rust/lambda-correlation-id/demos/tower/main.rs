use aws_lambda_events::event::apigw::ApiGatewayProxyRequest;
use lambda_correlation_id::{current, CorrelationIdLayer, CorrelationIdManager};
use lambda_runtime::{tower::ServiceBuilder, Error, LambdaEvent, Runtime};
use serde_json::Value;
use tracing::{info, instrument};
use tracing_subscriber::EnvFilter;

/// Echoes the correlation id back to the caller.
///
/// Send an `x_correlation_id` header to see it passed through; without it the
/// API Gateway request id is used.
async fn handler(event: LambdaEvent<ApiGatewayProxyRequest>) -> Result<Value, Error> {
    let record = current().ok_or("correlation record missing")?;
    info!(
        correlation_id = %record.id,
        status = %record.status,
        "handling request"
    );

    downstream_call().await;

    Ok(serde_json::json!({
        "statusCode": 200,
        "headers": { "x_correlation_id": record.id },
        "body": format!("triggered by {}", record.trigger)
    }))
}

/// Nested function reading the correlation id without it being passed in.
#[instrument(skip_all)]
async fn downstream_call() {
    let correlation_id = lambda_correlation_id::current_correlation_id().unwrap_or_default();
    tracing::debug!(correlation_id = %correlation_id, "calling downstream service");
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .without_time()
        .init();

    let service = ServiceBuilder::new()
        .layer(CorrelationIdLayer::new(CorrelationIdManager::new()))
        .service_fn(handler);

    Runtime::new(service).run().await
}

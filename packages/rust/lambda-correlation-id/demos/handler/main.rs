use aws_lambda_events::event::sqs::SqsEvent;
use lambda_correlation_id::{
    correlated_handler, current, CorrelationIdManager, Logger, LoggerOptions,
};
use lambda_runtime::{service_fn, Error, LambdaEvent, Runtime};
use serde_json::Value;
use std::sync::Arc;

/// Processes an SQS batch, logging every message with the correlation attributes attached.
///
/// Messages whose body is `"fail"` make the invocation fail, to show that the
/// correlation state is still cleared afterwards.
async fn handler(event: LambdaEvent<SqsEvent>, logger: Arc<Logger>) -> Result<Value, Error> {
    let record = current().ok_or("correlation record missing")?;

    for message in &event.payload.records {
        let body = message.body.as_deref().unwrap_or_default();
        if body == "fail" {
            logger.error(format!("refusing message {:?}", message.message_id));
            return Err(Error::from("message processing failed"));
        }
        logger.info(format!("processed message {:?}", message.message_id));
    }

    Ok(serde_json::json!({
        "processed": event.payload.records.len(),
        "correlationId": record.id,
        "correlationStatus": record.status.to_string(),
    }))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let logger = Arc::new(Logger::new("handler-demo"));

    // Mirror every correlation field into the logger
    let manager = CorrelationIdManager::new()
        .with_logger(logger.clone())
        .with_logger_options(
            LoggerOptions::builder()
                .log_correlation_id(true)
                .log_correlation_trigger(true)
                .log_correlation_status(true)
                .build(),
        );

    let func = service_fn(move |event: LambdaEvent<SqsEvent>| {
        let manager = manager.clone();
        let logger = logger.clone();
        async move { correlated_handler(&manager, event, |event| handler(event, logger)).await }
    });

    Runtime::new(func).run().await
}

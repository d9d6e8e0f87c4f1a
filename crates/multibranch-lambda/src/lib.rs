//! Shared bootstrap and handlers for the branch Lambda functions.
use lambda_runtime::{Error, LambdaEvent};
use multibranch::{
    codebuild::BuildService, lifecycle, BranchConfig, DestroyConfig, ReferenceEvent,
};
use serde_json::Value;

/// Installs a CloudWatch friendly subscriber.
///
/// Records emitted through the `log` facade by the `multibranch` library are
/// forwarded to the same subscriber.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        // disable printing the name of the module in every log line.
        .with_target(false)
        // disabling time is handy because CloudWatch will add the ingestion time.
        .without_time()
        .init();
}

/// Loads the AWS configuration for the region the function runs in.
pub async fn sdk_config(region: &str) -> aws_config::SdkConfig {
    multibranch::load_sdk_config(Some(region.to_owned())).await
}

/// Handles a "reference created" event.
///
/// A payload that is not a reference event fails the invocation. Failures of
/// the branch flow itself are only logged, so the trigger always succeeds.
pub async fn create_handler(
    service: &impl BuildService,
    config: &BranchConfig,
    event: LambdaEvent<Value>,
) -> Result<(), Error> {
    let event = ReferenceEvent::from_value(event.payload)?;
    let _ = lifecycle::handle_create(service, config, &event).await;
    Ok(())
}

/// Handles a "reference deleted" event, see [`create_handler`].
pub async fn destroy_handler(
    service: &impl BuildService,
    config: &DestroyConfig,
    event: LambdaEvent<Value>,
) -> Result<(), Error> {
    let event = ReferenceEvent::from_value(event.payload)?;
    let _ = lifecycle::handle_destroy(service, config, &event).await;
    Ok(())
}

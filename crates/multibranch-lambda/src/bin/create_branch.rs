//! Lambda target of the repository's "reference created" rule.
use lambda_runtime::{service_fn, Error};
use multibranch::{codebuild::CodeBuild, BranchConfig};

#[tokio::main]
async fn main() -> Result<(), Error> {
    multibranch_lambda::init_tracing();
    let config = BranchConfig::from_env()?;
    let cfg = multibranch_lambda::sdk_config(&config.region).await;
    let service = CodeBuild::new(&cfg);
    lambda_runtime::run(service_fn(|event| {
        multibranch_lambda::create_handler(&service, &config, event)
    }))
    .await
}

//! Lambda target of the repository's "reference deleted" rule.
use lambda_runtime::{service_fn, Error};
use multibranch::{codebuild::CodeBuild, DestroyConfig};

#[tokio::main]
async fn main() -> Result<(), Error> {
    multibranch_lambda::init_tracing();
    let config = DestroyConfig::from_env()?;
    log::info!("destroy cleanup policy: {:?}", config.cleanup);
    let cfg = multibranch_lambda::sdk_config(&config.branch.region).await;
    let service = CodeBuild::new(&cfg);
    lambda_runtime::run(service_fn(|event| {
        multibranch_lambda::destroy_handler(&service, &config, event)
    }))
    .await
}

//! # Multibranch
//!
//! Glue for running one CodePipeline per repository branch on AWS.
//!
//! A CodeCommit repository emits "reference created" and "reference deleted"
//! events. This library turns those events into CodeBuild projects:
//!
//! - **Branch creation** defines a `{prefix}-{branch}-create` project that
//!   synthesizes and deploys the branch's pipeline stack, then starts it.
//! - **Branch deletion** defines a `{prefix}-{branch}-destroy` project that
//!   tears the branch stacks down, starts it, and removes both project
//!   definitions.
//!
//! It also provides a small pull request client used from pipeline build
//! steps to find the open pull request for a branch and approve it.
//!
//! ## Seams
//!
//! Every remote call goes through a trait ([`codebuild::BuildService`],
//! [`pull_request::PullRequestService`], [`pull_request::RoleAssumer`]). The
//! AWS implementations live next to the traits. Handlers receive their
//! configuration and clients explicitly, so nothing is read from the process
//! environment at load time.
//!
//! ## Error Handling
//!
//! Configuration problems are reported as [`ConfigError`], branch handler
//! failures as [`lifecycle::LifecycleError`] (which names the phase that
//! failed) and pull request failures as [`pull_request::PullRequestError`].
//! The Lambda boundary ([`lifecycle::handle_create`] and
//! [`lifecycle::handle_destroy`]) logs lifecycle errors instead of failing the
//! trigger.

use snafu::Snafu;

pub mod buildspec;
pub mod codebuild;
pub mod config;
pub mod event;
pub mod lifecycle;
pub mod naming;
pub mod policy;
pub mod pull_request;
pub mod settings;


pub use config::{BranchConfig, CleanupPolicy, DestroyConfig, StartBuildNaming};
pub use event::ReferenceEvent;

/// Errors raised while assembling configuration or decoding inputs.
#[derive(Snafu, Debug)]
#[snafu(visibility(pub(crate)))]
pub enum ConfigError {
    #[snafu(display("Missing required environment variable '{name}'"))]
    MissingVar { name: String },

    #[snafu(display("Environment variable '{name}' has an invalid value '{value}': {reason}"))]
    InvalidVar {
        name: String,
        value: String,
        reason: String,
    },

    #[snafu(display("Could not decode reference event: {source}"))]
    Event { source: serde_json::Error },

    #[snafu(display("Could not read settings file '{path:?}': {source}"))]
    SettingsRead {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Could not parse settings file '{path:?}': {source}"))]
    SettingsParse {
        path: std::path::PathBuf,
        source: toml::de::Error,
    },
}

/// Loads the default AWS configuration from the environment.
pub async fn load_sdk_config(region: Option<String>) -> aws_config::SdkConfig {
    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
    if let Some(region) = region {
        loader = loader.region(aws_config::Region::new(region));
    }
    loader.load().await
}

/// Asserts a `Result` is `Err` and matches the pattern.
#[cfg(test)]
macro_rules! assert_err {
    ($result:expr, $pattern:pat) => {
        match $result {
            Err($pattern) => {}
            other => panic!("expected {}, got {other:?}", stringify!($pattern)),
        }
    };
}

#[cfg(test)]
pub(crate) use assert_err;

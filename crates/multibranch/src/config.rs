//! Handler configuration.
//!
//! Both branch handlers are configured through environment variables set on
//! the Lambda function. Configuration is read once at start-up and passed
//! into every invocation.
use std::time::Duration;

use snafu::OptionExt;

use crate::{ConfigError, InvalidVarSnafu, MissingVarSnafu};

pub const AWS_REGION: &str = "AWS_REGION";
pub const ACCOUNT_ID: &str = "ACCOUNT_ID";
pub const CODE_BUILD_ROLE_ARN: &str = "CODE_BUILD_ROLE_ARN";
pub const ARTIFACT_BUCKET: &str = "ARTIFACT_BUCKET";
pub const CODEBUILD_NAME_PREFIX: &str = "CODEBUILD_NAME_PREFIX";
pub const DEV_STAGE_NAME: &str = "DEV_STAGE_NAME";
pub const START_BUILD_NAMING: &str = "START_BUILD_NAMING";
pub const AWAIT_DESTROY_BUILD_SECS: &str = "AWAIT_DESTROY_BUILD_SECS";
pub const PIPELINE_STACK_PREFIX: &str = "PIPELINE_STACK_PREFIX";

pub const DEFAULT_PIPELINE_STACK_PREFIX: &str = "cdk-pipelines-multi-branch";

/// Literal project prefix historically used when starting the create build.
pub const LEGACY_START_PREFIX: &str = "CodeBuild";

/// Which project name the create flow passes to `StartBuild`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StartBuildNaming {
    /// Start `CodeBuild-{branch}-create`, regardless of the configured prefix.
    ///
    /// This only names the project that was just created when the prefix is
    /// `CodeBuild`.
    #[default]
    Legacy,
    /// Start `{prefix}-{branch}-create`, the project that was just created.
    Prefixed,
}

impl std::str::FromStr for StartBuildNaming {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "legacy" => Ok(Self::Legacy),
            "prefixed" => Ok(Self::Prefixed),
            other => Err(format!("expected 'legacy' or 'prefixed', saw '{other}'")),
        }
    }
}

/// What the destroy flow does between starting the teardown build and
/// deleting the project definitions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CleanupPolicy {
    /// Delete both projects right after `StartBuild` returns.
    ///
    /// A started build keeps running after its project is deleted, so the
    /// teardown still happens; its outcome is only visible in the build logs.
    #[default]
    Immediate,
    /// Poll the teardown build until it reaches a terminal state, then delete.
    AwaitCompletion {
        timeout: Duration,
        poll_interval: Duration,
    },
}

/// Configuration shared by the create and destroy handlers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BranchConfig {
    pub region: String,
    pub account_id: String,
    pub code_build_role_arn: String,
    pub artifact_bucket: String,
    pub codebuild_name_prefix: String,
    pub start_build_naming: StartBuildNaming,
}

fn required(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Result<String, ConfigError> {
    lookup(name)
        .filter(|value| !value.is_empty())
        .context(MissingVarSnafu { name })
}

fn optional<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name).filter(|value| !value.is_empty()) {
        None => Ok(None),
        Some(value) => match value.parse::<T>() {
            Ok(parsed) => Ok(Some(parsed)),
            Err(e) => InvalidVarSnafu {
                name,
                value,
                reason: e.to_string(),
            }
            .fail(),
        },
    }
}

fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

impl BranchConfig {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    /// Reads the configuration through `lookup`, which maps a variable name
    /// to its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(BranchConfig {
            region: required(&lookup, AWS_REGION)?,
            account_id: required(&lookup, ACCOUNT_ID)?,
            code_build_role_arn: required(&lookup, CODE_BUILD_ROLE_ARN)?,
            artifact_bucket: required(&lookup, ARTIFACT_BUCKET)?,
            codebuild_name_prefix: required(&lookup, CODEBUILD_NAME_PREFIX)?,
            start_build_naming: optional(&lookup, START_BUILD_NAMING)?.unwrap_or_default(),
        })
    }

    /// Name of the project that deploys the branch pipeline.
    pub fn create_project_name(&self, branch: &str) -> String {
        format!("{}-{branch}-create", self.codebuild_name_prefix)
    }

    /// Name of the project that tears the branch resources down.
    pub fn destroy_project_name(&self, branch: &str) -> String {
        format!("{}-{branch}-destroy", self.codebuild_name_prefix)
    }

    /// Name passed to `StartBuild` by the create flow.
    pub fn create_start_name(&self, branch: &str) -> String {
        match self.start_build_naming {
            StartBuildNaming::Legacy => format!("{LEGACY_START_PREFIX}-{branch}-create"),
            StartBuildNaming::Prefixed => self.create_project_name(branch),
        }
    }
}

/// Configuration of the destroy handler.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DestroyConfig {
    pub branch: BranchConfig,
    pub dev_stage_name: String,
    pub pipeline_stack_prefix: String,
    pub cleanup: CleanupPolicy,
}

impl DestroyConfig {
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let branch = BranchConfig::from_lookup(&lookup)?;
        let dev_stage_name = required(&lookup, DEV_STAGE_NAME)?;
        let pipeline_stack_prefix = lookup(PIPELINE_STACK_PREFIX)
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_PIPELINE_STACK_PREFIX.to_owned());
        let cleanup = match optional::<u64>(&lookup, AWAIT_DESTROY_BUILD_SECS)? {
            None => CleanupPolicy::Immediate,
            Some(secs) => CleanupPolicy::AwaitCompletion {
                timeout: Duration::from_secs(secs),
                poll_interval: Self::DEFAULT_POLL_INTERVAL,
            },
        };
        Ok(DestroyConfig {
            branch,
            dev_stage_name,
            pipeline_stack_prefix,
            cleanup,
        })
    }

    /// CloudFormation stack holding the branch's dev stage.
    pub fn stack_name(&self, branch: &str) -> String {
        format!("{}-{branch}", self.dev_stage_name)
    }
}

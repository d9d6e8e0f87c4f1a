//! Project settings file used by the command line tools.
//!
//! ```toml
//! [general]
//! region = "eu-west-1"
//! codebuild_project_name_prefix = "CodeBuild"
//! repository_name = "cdk-pipelines-multi-branch"
//! ```
use std::path::Path;

use snafu::ResultExt;

use crate::{ConfigError, SettingsParseSnafu, SettingsReadSnafu};

pub const DEFAULT_PATH: &str = "cicd.toml";

#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct General {
    pub region: Option<String>,
    pub codebuild_project_name_prefix: Option<String>,
    pub repository_name: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Settings {
    pub general: General,
}

impl Settings {
    pub fn parse(path: impl AsRef<Path>, contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).context(SettingsParseSnafu {
            path: path.as_ref(),
        })
    }

    /// Reads settings from `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).context(SettingsReadSnafu { path })?;
        Self::parse(path, &contents)
    }

    /// Reads settings from `path` if given, otherwise from [`DEFAULT_PATH`]
    /// when that file exists. Returns defaults when there is nothing to read.
    pub fn discover(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None if Path::new(DEFAULT_PATH).exists() => Self::load(DEFAULT_PATH),
            None => {
                log::debug!("no settings file, using defaults");
                Ok(Settings::default())
            }
        }
    }
}

//! AWS CodeBuild projects for branch lifecycles.
use std::future::Future;

use anyhow::Context;
use aws_config::SdkConfig;
use aws_sdk_codebuild::{
    operation::{batch_get_builds::BatchGetBuildsOutput, start_build::StartBuildOutput},
    types::{
        ArtifactPackaging, ArtifactsType, ComputeType, EnvironmentType, ProjectArtifacts,
        ProjectEnvironment, ProjectSource, SourceType, StatusType,
    },
};

use crate::{buildspec, BranchConfig, DestroyConfig};

pub const IMAGE: &str = "aws/codebuild/standard:6.0";
pub const ARTIFACT_IDENTIFIER: &str = "BranchBuildArtifact";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Source {
    /// A CodeCommit repository checked out at `version`.
    CodeCommit { location: String, version: String },
    /// A prefix in S3, eg. the artifacts of a previous build.
    S3 { location: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Artifacts {
    None,
    /// Unpackaged files written to `{bucket}/{path}`.
    S3 { bucket: String, path: String },
}

/// Everything needed to create a CodeBuild project.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProjectDefinition {
    pub name: String,
    pub description: String,
    pub source: Source,
    pub buildspec: String,
    pub artifacts: Artifacts,
    pub image: String,
    pub service_role: String,
}

impl ProjectDefinition {
    /// The project that deploys the pipeline of a newly created branch.
    pub fn create_flow(config: &BranchConfig, branch: &str, repository: &str) -> Self {
        ProjectDefinition {
            name: config.create_project_name(branch),
            description: "Build project to deploy branch pipeline".into(),
            source: Source::CodeCommit {
                location: format!(
                    "https://git-codecommit.{}.amazonaws.com/v1/repos/{repository}",
                    config.region
                ),
                version: format!("refs/heads/{branch}"),
            },
            buildspec: buildspec::create_build_spec(branch, &config.account_id, &config.region),
            artifacts: Artifacts::S3 {
                bucket: config.artifact_bucket.clone(),
                path: branch.to_owned(),
            },
            image: IMAGE.into(),
            service_role: config.code_build_role_arn.clone(),
        }
    }

    /// The project that tears down the resources of a deleted branch.
    ///
    /// Its source is the artifact output of the create build, which CodeBuild
    /// writes under `{bucket}/{branch}/{start name}/`.
    pub fn destroy_flow(config: &DestroyConfig, branch: &str) -> Self {
        let common = &config.branch;
        ProjectDefinition {
            name: common.destroy_project_name(branch),
            description: "Build project to destroy branch resources".into(),
            source: Source::S3 {
                location: format!(
                    "{}/{branch}/{}/",
                    common.artifact_bucket,
                    common.create_start_name(branch)
                ),
            },
            buildspec: buildspec::destroy_build_spec(
                branch,
                &common.account_id,
                &common.region,
                &config.pipeline_stack_prefix,
                &config.stack_name(branch),
                &common.artifact_bucket,
            ),
            artifacts: Artifacts::None,
            image: IMAGE.into(),
            service_role: common.code_build_role_arn.clone(),
        }
    }
}

/// Status of a single build.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BuildStatus {
    InProgress,
    Succeeded,
    /// Any other terminal status, eg. `FAILED` or `TIMED_OUT`.
    Failed(String),
}

impl BuildStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, BuildStatus::InProgress)
    }
}

impl From<&StatusType> for BuildStatus {
    fn from(status: &StatusType) -> Self {
        match status {
            StatusType::InProgress => BuildStatus::InProgress,
            StatusType::Succeeded => BuildStatus::Succeeded,
            other => BuildStatus::Failed(other.as_str().to_owned()),
        }
    }
}

/// The subset of the CodeBuild API used by the branch handlers.
pub trait BuildService {
    fn create_project(
        &self,
        project: &ProjectDefinition,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;

    /// Starts a build of `project`, returning the build id if the service
    /// reported one.
    fn start_build(
        &self,
        project: &str,
    ) -> impl Future<Output = anyhow::Result<Option<String>>> + Send;

    fn build_status(&self, build_id: &str)
        -> impl Future<Output = anyhow::Result<BuildStatus>> + Send;

    fn delete_project(&self, project: &str) -> impl Future<Output = anyhow::Result<()>> + Send;
}

/// [`BuildService`] backed by AWS CodeBuild.
#[derive(Clone, Debug)]
pub struct CodeBuild {
    client: aws_sdk_codebuild::Client,
}

impl CodeBuild {
    pub fn new(cfg: &SdkConfig) -> Self {
        CodeBuild {
            client: aws_sdk_codebuild::Client::new(cfg),
        }
    }
}

fn project_source(project: &ProjectDefinition) -> anyhow::Result<ProjectSource> {
    let (ty, location) = match &project.source {
        Source::CodeCommit { location, .. } => (SourceType::Codecommit, location),
        Source::S3 { location } => (SourceType::S3, location),
    };
    ProjectSource::builder()
        .r#type(ty)
        .location(location)
        .buildspec(&project.buildspec)
        .build()
        .context("invalid project source")
}

fn project_artifacts(project: &ProjectDefinition) -> anyhow::Result<ProjectArtifacts> {
    let builder = match &project.artifacts {
        Artifacts::None => ProjectArtifacts::builder().r#type(ArtifactsType::NoArtifacts),
        Artifacts::S3 { bucket, path } => ProjectArtifacts::builder()
            .r#type(ArtifactsType::S3)
            .location(bucket)
            .path(path)
            .packaging(ArtifactPackaging::None)
            .artifact_identifier(ARTIFACT_IDENTIFIER),
    };
    builder.build().context("invalid project artifacts")
}

fn project_environment(project: &ProjectDefinition) -> anyhow::Result<ProjectEnvironment> {
    ProjectEnvironment::builder()
        .r#type(EnvironmentType::LinuxContainer)
        .image(&project.image)
        .compute_type(ComputeType::BuildGeneral1Small)
        .build()
        .context("invalid project environment")
}

fn started_build_id(out: StartBuildOutput) -> Option<String> {
    out.build_value.and_then(|build| build.id)
}

fn build_status_of(out: BatchGetBuildsOutput, build_id: &str) -> anyhow::Result<BuildStatus> {
    let build = out
        .builds
        .unwrap_or_default()
        .into_iter()
        .find(|build| build.id.as_deref() == Some(build_id))
        .with_context(|| format!("no such build {build_id}"))?;
    let status = build.build_status.context("missing build status")?;
    Ok(BuildStatus::from(&status))
}

impl BuildService for CodeBuild {
    async fn create_project(&self, project: &ProjectDefinition) -> anyhow::Result<()> {
        let source_version = match &project.source {
            Source::CodeCommit { version, .. } => Some(version.clone()),
            Source::S3 { .. } => None,
        };
        let out = self
            .client
            .create_project()
            .name(&project.name)
            .description(&project.description)
            .source(project_source(project)?)
            .set_source_version(source_version)
            .artifacts(project_artifacts(project)?)
            .environment(project_environment(project)?)
            .service_role(&project.service_role)
            .send()
            .await
            .with_context(|| format!("could not create project {}", project.name))?;
        let arn = out.project.and_then(|p| p.arn).unwrap_or_default();
        log::info!("...created project {} {arn}", project.name);
        Ok(())
    }

    async fn start_build(&self, project: &str) -> anyhow::Result<Option<String>> {
        let out = self
            .client
            .start_build()
            .project_name(project)
            .send()
            .await
            .with_context(|| format!("could not start a build of {project}"))?;
        let build_id = started_build_id(out);
        log::info!("...started build {build_id:?} of {project}");
        Ok(build_id)
    }

    async fn build_status(&self, build_id: &str) -> anyhow::Result<BuildStatus> {
        let out = self
            .client
            .batch_get_builds()
            .ids(build_id)
            .send()
            .await
            .with_context(|| format!("could not get build {build_id}"))?;
        build_status_of(out, build_id)
    }

    async fn delete_project(&self, project: &str) -> anyhow::Result<()> {
        self.client
            .delete_project()
            .name(project)
            .send()
            .await
            .with_context(|| format!("could not delete project {project}"))?;
        log::info!("...deleted project {project}");
        Ok(())
    }
}

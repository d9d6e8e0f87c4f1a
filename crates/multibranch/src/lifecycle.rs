//! Branch lifecycle handlers.
//!
//! [`create_branch`] and [`destroy_branch`] return a typed
//! [`LifecycleError`] naming the phase that failed. [`handle_create`] and
//! [`handle_destroy`] are the trigger boundary: they log failures and return
//! normally so the event source never sees an error.
use std::time::Instant;

use snafu::prelude::*;

use crate::{
    codebuild::{BuildService, BuildStatus, ProjectDefinition},
    BranchConfig, CleanupPolicy, DestroyConfig, ReferenceEvent,
};

/// The step of a lifecycle handler that talks to CodeBuild.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    CreateProject,
    StartBuild,
    AwaitBuild,
    DeleteProject,
}

impl core::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Phase::CreateProject => "create-project",
            Phase::StartBuild => "start-build",
            Phase::AwaitBuild => "await-build",
            Phase::DeleteProject => "delete-project",
        })
    }
}

#[derive(Debug, Snafu)]
pub enum LifecycleError {
    #[snafu(display("Could not create project '{project}': {source}"))]
    CreateProject {
        project: String,
        source: anyhow::Error,
    },

    #[snafu(display("Could not start a build of '{project}': {source}"))]
    StartBuild {
        project: String,
        source: anyhow::Error,
    },

    #[snafu(display("Could not read the status of build '{build_id}' of '{project}': {source}"))]
    AwaitBuild {
        project: String,
        build_id: String,
        source: anyhow::Error,
    },

    #[snafu(display(
        "Build '{build_id}' of '{project}' did not finish within {secs} seconds"
    ))]
    BuildTimeout {
        project: String,
        build_id: String,
        secs: u64,
    },

    #[snafu(display("Could not delete project '{project}': {source}"))]
    DeleteProject {
        project: String,
        source: anyhow::Error,
    },
}

impl LifecycleError {
    pub fn phase(&self) -> Phase {
        match self {
            LifecycleError::CreateProject { .. } => Phase::CreateProject,
            LifecycleError::StartBuild { .. } => Phase::StartBuild,
            LifecycleError::AwaitBuild { .. } | LifecycleError::BuildTimeout { .. } => {
                Phase::AwaitBuild
            }
            LifecycleError::DeleteProject { .. } => Phase::DeleteProject,
        }
    }

    pub fn project(&self) -> &str {
        match self {
            LifecycleError::CreateProject { project, .. }
            | LifecycleError::StartBuild { project, .. }
            | LifecycleError::AwaitBuild { project, .. }
            | LifecycleError::BuildTimeout { project, .. }
            | LifecycleError::DeleteProject { project, .. } => project,
        }
    }
}

/// What a handler did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The reference was not a branch; nothing was called.
    Ignored { reference_type: String },
    Created {
        project: String,
        build_id: Option<String>,
    },
    Destroyed {
        project: String,
        build_id: Option<String>,
        /// Final status of the teardown build, when the cleanup policy waited.
        awaited: Option<BuildStatus>,
    },
}

fn ignored(event: &ReferenceEvent) -> Outcome {
    log::info!(
        "ignoring {} reference '{}'",
        event.detail.reference_type,
        event.detail.reference_name
    );
    Outcome::Ignored {
        reference_type: event.detail.reference_type.clone(),
    }
}

/// Defines and starts the project that deploys a new branch's pipeline.
pub async fn create_branch(
    service: &impl BuildService,
    config: &BranchConfig,
    event: &ReferenceEvent,
) -> Result<Outcome, LifecycleError> {
    let Some(branch) = event.branch() else {
        return Ok(ignored(event));
    };

    let project = ProjectDefinition::create_flow(config, branch, event.repository());
    log::info!("creating project {} for branch {branch}", project.name);
    service
        .create_project(&project)
        .await
        .context(CreateProjectSnafu {
            project: &project.name,
        })?;

    let start_name = config.create_start_name(branch);
    if start_name != project.name {
        log::warn!(
            "starting '{start_name}', which differs from the created project '{}'",
            project.name
        );
    }
    let build_id = service
        .start_build(&start_name)
        .await
        .context(StartBuildSnafu {
            project: &start_name,
        })?;

    Ok(Outcome::Created {
        project: project.name,
        build_id,
    })
}

async fn await_build(
    service: &impl BuildService,
    project: &str,
    build_id: &str,
    timeout: std::time::Duration,
    poll_interval: std::time::Duration,
) -> Result<BuildStatus, LifecycleError> {
    let start = Instant::now();
    log::info!("awaiting build {build_id} of {project}");
    loop {
        let status = service
            .build_status(build_id)
            .await
            .context(AwaitBuildSnafu { project, build_id })?;
        log::debug!("build {build_id}: {status:?}");
        if status.is_terminal() {
            return Ok(status);
        }
        if start.elapsed() >= timeout {
            return BuildTimeoutSnafu {
                project,
                build_id,
                secs: timeout.as_secs(),
            }
            .fail();
        }
        tokio::time::sleep(poll_interval).await;
    }
}

/// Defines and starts the teardown project of a deleted branch, then removes
/// the branch's project definitions.
pub async fn destroy_branch(
    service: &impl BuildService,
    config: &DestroyConfig,
    event: &ReferenceEvent,
) -> Result<Outcome, LifecycleError> {
    let Some(branch) = event.branch() else {
        return Ok(ignored(event));
    };

    let project = ProjectDefinition::destroy_flow(config, branch);
    log::info!("creating project {} for branch {branch}", project.name);
    service
        .create_project(&project)
        .await
        .context(CreateProjectSnafu {
            project: &project.name,
        })?;

    let build_id = service
        .start_build(&project.name)
        .await
        .context(StartBuildSnafu {
            project: &project.name,
        })?;

    let awaited = match (config.cleanup, build_id.as_deref()) {
        (CleanupPolicy::Immediate, _) => None,
        (CleanupPolicy::AwaitCompletion { .. }, None) => {
            log::warn!("no build id for {}, deleting without waiting", project.name);
            None
        }
        (
            CleanupPolicy::AwaitCompletion {
                timeout,
                poll_interval,
            },
            Some(id),
        ) => {
            let status = await_build(service, &project.name, id, timeout, poll_interval).await?;
            if status != BuildStatus::Succeeded {
                log::error!("teardown build {id} of branch {branch} finished as {status:?}");
            }
            Some(status)
        }
    };

    let create_project = config.branch.create_project_name(branch);
    for name in [&project.name, &create_project] {
        service
            .delete_project(name)
            .await
            .context(DeleteProjectSnafu { project: name })?;
    }

    Ok(Outcome::Destroyed {
        project: project.name,
        build_id,
        awaited,
    })
}

fn report(result: Result<Outcome, LifecycleError>) -> Option<Outcome> {
    match result {
        Ok(outcome) => {
            log::info!("{outcome:?}");
            Some(outcome)
        }
        Err(e) => {
            log::error!("{} failed for '{}': {e}", e.phase(), e.project());
            None
        }
    }
}

/// Runs [`create_branch`], logging instead of returning any failure.
pub async fn handle_create(
    service: &impl BuildService,
    config: &BranchConfig,
    event: &ReferenceEvent,
) -> Option<Outcome> {
    log::info!("{event:?}");
    report(create_branch(service, config, event).await)
}

/// Runs [`destroy_branch`], logging instead of returning any failure.
pub async fn handle_destroy(
    service: &impl BuildService,
    config: &DestroyConfig,
    event: &ReferenceEvent,
) -> Option<Outcome> {
    log::info!("{event:?}");
    report(destroy_branch(service, config, event).await)
}

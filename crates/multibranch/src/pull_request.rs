//! Finding and approving CodeCommit pull requests.
use std::future::Future;

use aws_config::SdkConfig;
use aws_sdk_codecommit::{
    operation::list_pull_requests::ListPullRequestsOutput,
    types::{ApprovalState, PullRequestStatusEnum},
};
use snafu::prelude::*;

/// Session name used when approving on behalf of another role.
pub const SESSION_NAME: &str = "AssumeRoleSession";

#[derive(Debug, Snafu)]
pub enum PullRequestError {
    #[snafu(display("Could not list open pull requests of '{repository}': {source}"))]
    List {
        repository: String,
        source: anyhow::Error,
    },

    #[snafu(display("Could not get pull request '{id}': {source}"))]
    Get { id: String, source: anyhow::Error },

    #[snafu(display("Could not assume role '{role_arn}': {source}"))]
    AssumeRole {
        role_arn: String,
        source: anyhow::Error,
    },

    #[snafu(display("Could not approve revision '{revision_id}' of pull request '{id}': {source}"))]
    Approve {
        id: String,
        revision_id: String,
        source: anyhow::Error,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestTarget {
    pub repository_name: Option<String>,
    pub source_reference: Option<String>,
    pub destination_reference: Option<String>,
    pub source_commit: Option<String>,
    pub destination_commit: Option<String>,
}

/// Details of a pull request.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequest {
    pub pull_request_id: String,
    pub title: Option<String>,
    pub status: Option<String>,
    pub revision_id: Option<String>,
    pub author_arn: Option<String>,
    pub targets: Vec<PullRequestTarget>,
}

impl PullRequest {
    /// Whether any target merges from exactly `reference`.
    pub fn has_source_reference(&self, reference: &str) -> bool {
        self.targets
            .iter()
            .any(|target| target.source_reference.as_deref() == Some(reference))
    }
}

impl From<aws_sdk_codecommit::types::PullRequest> for PullRequest {
    fn from(pr: aws_sdk_codecommit::types::PullRequest) -> Self {
        PullRequest {
            pull_request_id: pr.pull_request_id.unwrap_or_default(),
            title: pr.title,
            status: pr.pull_request_status.map(|s| s.as_str().to_owned()),
            revision_id: pr.revision_id,
            author_arn: pr.author_arn,
            targets: pr
                .pull_request_targets
                .unwrap_or_default()
                .into_iter()
                .map(|t| PullRequestTarget {
                    repository_name: t.repository_name,
                    source_reference: t.source_reference,
                    destination_reference: t.destination_reference,
                    source_commit: t.source_commit,
                    destination_commit: t.destination_commit,
                })
                .collect(),
        }
    }
}

/// One page of pull request ids.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Page {
    pub ids: Vec<String>,
    pub next_token: Option<String>,
}

impl From<ListPullRequestsOutput> for Page {
    fn from(out: ListPullRequestsOutput) -> Self {
        Page {
            ids: out.pull_request_ids().to_vec(),
            next_token: out.next_token,
        }
    }
}

/// Short-lived credentials returned by a role assumption.
#[derive(Clone, PartialEq, Eq)]
pub struct TemporaryCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
}

impl core::fmt::Debug for TemporaryCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemporaryCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"** redacted **")
            .field("session_token", &"** redacted **")
            .finish()
    }
}

/// The subset of the CodeCommit API used by [`PullRequestClient`].
pub trait PullRequestService: Sized {
    fn list_open_pull_requests(
        &self,
        repository: &str,
        next_token: Option<String>,
    ) -> impl Future<Output = anyhow::Result<Page>> + Send;

    fn get_pull_request(
        &self,
        id: &str,
    ) -> impl Future<Output = anyhow::Result<PullRequest>> + Send;

    fn update_approval_state(
        &self,
        id: &str,
        revision_id: &str,
        state: ApprovalState,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;

    /// A service that makes its calls with `credentials`.
    fn with_credentials(&self, credentials: TemporaryCredentials) -> Self;
}

pub trait RoleAssumer {
    fn assume_role(
        &self,
        role_arn: &str,
        session_name: &str,
    ) -> impl Future<Output = anyhow::Result<TemporaryCredentials>> + Send;
}

/// [`PullRequestService`] backed by AWS CodeCommit.
#[derive(Clone, Debug)]
pub struct CodeCommit {
    cfg: SdkConfig,
    client: aws_sdk_codecommit::Client,
}

impl CodeCommit {
    pub fn new(cfg: &SdkConfig) -> Self {
        CodeCommit {
            cfg: cfg.clone(),
            client: aws_sdk_codecommit::Client::new(cfg),
        }
    }
}

impl PullRequestService for CodeCommit {
    async fn list_open_pull_requests(
        &self,
        repository: &str,
        next_token: Option<String>,
    ) -> anyhow::Result<Page> {
        let out = self
            .client
            .list_pull_requests()
            .repository_name(repository)
            .pull_request_status(PullRequestStatusEnum::Open)
            .set_next_token(next_token)
            .send()
            .await?;
        Ok(Page::from(out))
    }

    async fn get_pull_request(&self, id: &str) -> anyhow::Result<PullRequest> {
        let out = self
            .client
            .get_pull_request()
            .pull_request_id(id)
            .send()
            .await?;
        let pr = out
            .pull_request
            .ok_or_else(|| anyhow::anyhow!("missing pull request {id}"))?;
        Ok(pr.into())
    }

    async fn update_approval_state(
        &self,
        id: &str,
        revision_id: &str,
        state: ApprovalState,
    ) -> anyhow::Result<()> {
        self.client
            .update_pull_request_approval_state()
            .pull_request_id(id)
            .revision_id(revision_id)
            .approval_state(state)
            .send()
            .await?;
        Ok(())
    }

    fn with_credentials(&self, credentials: TemporaryCredentials) -> Self {
        let credentials = aws_sdk_codecommit::config::Credentials::new(
            credentials.access_key_id,
            credentials.secret_access_key,
            Some(credentials.session_token),
            None,
            SESSION_NAME,
        );
        let conf = aws_sdk_codecommit::config::Builder::from(&self.cfg)
            .credentials_provider(credentials)
            .build();
        CodeCommit {
            cfg: self.cfg.clone(),
            client: aws_sdk_codecommit::Client::from_conf(conf),
        }
    }
}

/// [`RoleAssumer`] backed by AWS STS.
#[derive(Clone, Debug)]
pub struct Sts {
    client: aws_sdk_sts::Client,
}

impl Sts {
    pub fn new(cfg: &SdkConfig) -> Self {
        Sts {
            client: aws_sdk_sts::Client::new(cfg),
        }
    }
}

impl RoleAssumer for Sts {
    async fn assume_role(
        &self,
        role_arn: &str,
        session_name: &str,
    ) -> anyhow::Result<TemporaryCredentials> {
        let out = self
            .client
            .assume_role()
            .role_arn(role_arn)
            .role_session_name(session_name)
            .send()
            .await?;
        let credentials = out
            .credentials
            .ok_or_else(|| anyhow::anyhow!("no credentials in response"))?;
        log::debug!("assumed role {role_arn}");
        Ok(TemporaryCredentials {
            access_key_id: credentials.access_key_id,
            secret_access_key: credentials.secret_access_key,
            session_token: credentials.session_token,
        })
    }
}

/// Finds and approves pull requests.
pub struct PullRequestClient<S, A> {
    service: S,
    assumer: A,
}

impl PullRequestClient<CodeCommit, Sts> {
    pub fn from_sdk_config(cfg: &SdkConfig) -> Self {
        Self::new(CodeCommit::new(cfg), Sts::new(cfg))
    }
}

impl<S: PullRequestService, A: RoleAssumer> PullRequestClient<S, A> {
    pub fn new(service: S, assumer: A) -> Self {
        PullRequestClient { service, assumer }
    }

    pub async fn get_pr_details_by_id(&self, id: &str) -> Result<PullRequest, PullRequestError> {
        self.service
            .get_pull_request(id)
            .await
            .context(GetSnafu { id })
    }

    /// Returns the first open pull request, in listing order, with a target
    /// whose source reference is exactly `destination_reference`.
    ///
    /// Details are fetched one pull request at a time and the scan stops at
    /// the first match.
    pub async fn find_open_pr_by_destination_reference(
        &self,
        repository: &str,
        destination_reference: &str,
    ) -> Result<Option<PullRequest>, PullRequestError> {
        let mut next_token = None;
        loop {
            let page = self
                .service
                .list_open_pull_requests(repository, next_token)
                .await
                .context(ListSnafu { repository })?;
            log::debug!("scanning {} open pull requests", page.ids.len());

            for id in page.ids.iter() {
                let details = self.get_pr_details_by_id(id).await?;
                if details.has_source_reference(destination_reference) {
                    log::info!("pull request {id} matches {destination_reference}");
                    return Ok(Some(details));
                }
            }

            match page.next_token {
                Some(token) if !token.is_empty() => next_token = Some(token),
                _ => return Ok(None),
            }
        }
    }

    /// Approves `revision_id` of the pull request, as `with_role` when given.
    pub async fn approve_pr(
        &self,
        pull_request_id: &str,
        revision_id: &str,
        with_role: Option<&str>,
    ) -> Result<(), PullRequestError> {
        let scoped;
        let service = match with_role.filter(|role| !role.is_empty()) {
            None => &self.service,
            Some(role_arn) => {
                let credentials = self
                    .assumer
                    .assume_role(role_arn, SESSION_NAME)
                    .await
                    .context(AssumeRoleSnafu { role_arn })?;
                scoped = self.service.with_credentials(credentials);
                &scoped
            }
        };

        service
            .update_approval_state(pull_request_id, revision_id, ApprovalState::Approve)
            .await
            .context(ApproveSnafu {
                id: pull_request_id,
                revision_id,
            })?;
        log::info!("approved revision {revision_id} of pull request {pull_request_id}");
        Ok(())
    }
}

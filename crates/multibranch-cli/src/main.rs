//! `cicd` - pull request and IAM helpers for the multi-branch pipelines.
//!
//! Used from pipeline build steps, eg. to approve the pull request of a branch
//! once its pipeline succeeded:
//!
//! ```sh
//! cicd approve-pr --pull-request-id 42 --revision-id "$REVISION" --with-role "$APPROVER_ROLE_ARN"
//! cicd find-pr --destination-reference refs/heads/feature-42
//! cicd roles --account 111122223333 --artifact-bucket-arn arn:aws:s3:::branch-artifacts
//! ```
//!
//! Run with `RUST_LOG=info` to see what happens under the hood.
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use multibranch::{policy::BranchRoles, pull_request::PullRequestClient, settings::Settings};

#[derive(Parser)]
#[command(name = "cicd", version, about = "Helpers for multi-branch CI/CD pipelines")]
struct Cli {
    /// TOML settings file with a `[general]` section. Defaults to `cicd.toml`
    /// when it exists.
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// AWS region, overriding the settings file and the SDK default.
    #[arg(long, global = true, env = "AWS_REGION")]
    region: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Approve a pull request revision.
    ApprovePr {
        /// Pull request id
        #[arg(long)]
        pull_request_id: String,
        /// Revision id
        #[arg(long)]
        revision_id: String,
        /// Role to be used for approving the PR
        #[arg(long)]
        with_role: Option<String>,
    },
    /// Print the open pull request whose source is the given reference.
    FindPr {
        /// Repository name, defaults to `general.repository_name`.
        #[arg(long)]
        repository: Option<String>,
        /// Full reference, eg. `refs/heads/feature-42`.
        #[arg(long)]
        destination_reference: String,
    },
    /// Print the IAM roles used by the branch automation.
    Roles {
        /// Account the branch pipelines deploy to.
        #[arg(long, env = "ACCOUNT_ID")]
        account: String,
        /// Repository name, defaults to `general.repository_name`.
        #[arg(long)]
        repository: Option<String>,
        /// ARN of the branch artifact bucket.
        #[arg(long)]
        artifact_bucket_arn: String,
        /// CodeBuild project name prefix, defaults to
        /// `general.codebuild_project_name_prefix`.
        #[arg(long)]
        prefix: Option<String>,
    },
}

fn or_setting(
    flag: Option<String>,
    setting: &Option<String>,
    name: &str,
) -> anyhow::Result<String> {
    flag.or_else(|| setting.clone())
        .with_context(|| format!("missing --{name} and no value in the settings file"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let settings = Settings::discover(cli.settings.as_deref())?;
    let region = cli.region.or_else(|| settings.general.region.clone());

    match cli.command {
        Command::ApprovePr {
            pull_request_id,
            revision_id,
            with_role,
        } => {
            let cfg = multibranch::load_sdk_config(region).await;
            let client = PullRequestClient::from_sdk_config(&cfg);
            client
                .approve_pr(&pull_request_id, &revision_id, with_role.as_deref())
                .await?;
            println!(
                "{} revision {revision_id} of pull request {pull_request_id}",
                "approved".green()
            );
        }
        Command::FindPr {
            repository,
            destination_reference,
        } => {
            let repository =
                or_setting(repository, &settings.general.repository_name, "repository")?;
            let cfg = multibranch::load_sdk_config(region).await;
            let client = PullRequestClient::from_sdk_config(&cfg);
            match client
                .find_open_pr_by_destination_reference(&repository, &destination_reference)
                .await?
            {
                Some(pr) => println!("{}", serde_json::to_string_pretty(&pr)?),
                None => println!(
                    "{} open pull request from {destination_reference} in {repository}",
                    "no".yellow()
                ),
            }
        }
        Command::Roles {
            account,
            repository,
            artifact_bucket_arn,
            prefix,
        } => {
            let region = region.context("missing --region and no value in the settings file")?;
            let repository =
                or_setting(repository, &settings.general.repository_name, "repository")?;
            let prefix = or_setting(
                prefix,
                &settings.general.codebuild_project_name_prefix,
                "prefix",
            )?;
            let roles = BranchRoles::new(
                &account,
                &region,
                &repository,
                &artifact_bucket_arn,
                &prefix,
            );
            for role in [&roles.create_branch, &roles.delete_branch, &roles.code_build] {
                println!("{}", role.name.bold());
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "AssumeRolePolicyDocument": role.trust_policy(),
                        "ManagedPolicyArns": role.managed_policies,
                        "PolicyDocument": role.policy,
                    }))?
                );
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn approve_pr_flags() {
        let cli = Cli::try_parse_from([
            "cicd",
            "approve-pr",
            "--pull-request-id",
            "42",
            "--revision-id",
            "rev",
        ])
        .unwrap();
        match cli.command {
            Command::ApprovePr {
                pull_request_id,
                revision_id,
                with_role,
            } => {
                assert_eq!("42", pull_request_id);
                assert_eq!("rev", revision_id);
                assert_eq!(None, with_role);
            }
            _ => panic!("expected approve-pr"),
        }
    }

    #[test]
    fn approve_pr_requires_ids() {
        assert!(Cli::try_parse_from(["cicd", "approve-pr", "--revision-id", "rev"]).is_err());
    }

    #[test]
    fn flags_win_over_settings() {
        let setting = Some("from-file".to_owned());
        assert_eq!(
            "from-flag",
            or_setting(Some("from-flag".into()), &setting, "repository").unwrap()
        );
        assert_eq!("from-file", or_setting(None, &setting, "repository").unwrap());
        assert!(or_setting(None, &None, "repository").is_err());
    }
}

//! Inline CodeBuild build specs for the branch projects.
//!
//! Both specs export the same variables the pipeline app reads at synth time:
//! `BRANCH`, `DEV_ACCOUNT_ID`, `PROD_ACCOUNT_ID` and `REGION`. Feature branches
//! never deploy to production, so the production account is the dev account.

pub const VERSION: &str = "0.2";

const PRE_BUILD: &str = "npm install -g aws-cdk && pip install -r requirements.txt";

fn header(branch: &str, account_id: &str, region: &str) -> String {
    format!(
        "version: {VERSION}
env:
  variables:
    BRANCH: {branch}
    DEV_ACCOUNT_ID: {account_id}
    PROD_ACCOUNT_ID: {account_id}
    REGION: {region}
phases:
  pre_build:
    commands:
      - {PRE_BUILD}
  build:
    commands:"
    )
}

/// Build spec of the `-create` project: synthesize and deploy the branch
/// pipeline, keeping every file as an artifact for the later teardown.
pub fn create_build_spec(branch: &str, account_id: &str, region: &str) -> String {
    let header = header(branch, account_id, region);
    format!(
        "{header}
      - cdk synth
      - cdk deploy --require-approval=never
artifacts:
  files:
    - '**/*'"
    )
}

/// Build spec of the `-destroy` project: remove the pipeline stack, the dev
/// stage stack and the branch artifacts.
pub fn destroy_build_spec(
    branch: &str,
    account_id: &str,
    region: &str,
    pipeline_stack_prefix: &str,
    stack_name: &str,
    artifact_bucket: &str,
) -> String {
    let header = header(branch, account_id, region);
    format!(
        "{header}
      - cdk destroy {pipeline_stack_prefix}-{branch} --force
      - aws cloudformation delete-stack --stack-name {stack_name}
      - aws s3 rm s3://{artifact_bucket}/{branch} --recursive"
    )
}

/// Reads the value of `name` from the spec's `env.variables` block.
pub fn variable<'a>(spec: &'a str, name: &str) -> Option<&'a str> {
    spec.lines()
        .skip_while(|line| line.trim_end() != "  variables:")
        .skip(1)
        .take_while(|line| line.starts_with("    "))
        .find_map(|line| {
            let (key, value) = line.trim().split_once(':')?;
            (key == name).then(|| value.trim())
        })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn create_spec_embeds_values() {
        let spec = create_build_spec("feature-42", "111122223333", "eu-west-1");
        assert!(spec.starts_with("version: 0.2\n"));
        assert_eq!(Some("feature-42"), variable(&spec, "BRANCH"));
        assert_eq!(Some("111122223333"), variable(&spec, "DEV_ACCOUNT_ID"));
        assert_eq!(Some("111122223333"), variable(&spec, "PROD_ACCOUNT_ID"));
        assert_eq!(Some("eu-west-1"), variable(&spec, "REGION"));
        assert!(spec.contains("      - cdk deploy --require-approval=never\n"));
        assert!(spec.ends_with("artifacts:\n  files:\n    - '**/*'"));
    }

    #[test]
    fn destroy_spec_has_teardown_commands() {
        let spec = destroy_build_spec(
            "user/feature-7",
            "111122223333",
            "us-east-1",
            "cdk-pipelines-multi-branch",
            "DEV-InfraStack-user/feature-7",
            "artifacts",
        );
        assert_eq!(Some("user/feature-7"), variable(&spec, "BRANCH"));
        assert!(spec.contains("cdk destroy cdk-pipelines-multi-branch-user/feature-7 --force"));
        assert!(spec
            .contains("aws cloudformation delete-stack --stack-name DEV-InfraStack-user/feature-7"));
        assert!(spec.contains("aws s3 rm s3://artifacts/user/feature-7 --recursive"));
        assert!(!spec.contains("artifacts:\n"));
    }

    #[test]
    fn branch_round_trips_through_spec() {
        for branch in ["main", "feature-42", "fix_1.2", "a.b-c_d", "x"] {
            let spec = create_build_spec(branch, "1", "r");
            assert_eq!(Some(branch), variable(&spec, "BRANCH"), "{spec}");
        }
    }

    #[test]
    fn unknown_variable() {
        let spec = create_build_spec("main", "1", "r");
        assert_eq!(None, variable(&spec, "STAGE"));
        assert_eq!(None, variable("", "BRANCH"));
    }
}

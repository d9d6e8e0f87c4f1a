//! IAM roles used by the branch automation.
//!
//! Three roles are involved: one for each branch Lambda and one for the
//! CodeBuild projects they define. This module renders their names and
//! policy documents; provisioning them is left to the IaC tool of choice.
use serde_json::{json, Value};

use crate::naming::truncate_with_hash;

/// IAM role names are limited to 64 characters.
pub const MAX_ROLE_NAME_LEN: usize = 64;

/// A role name, the service allowed to assume it and its inline policy.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct RoleDocument {
    pub name: String,
    pub assumed_by: String,
    /// AWS managed policies to attach, by ARN.
    pub managed_policies: Vec<String>,
    pub policy: Value,
}

impl RoleDocument {
    fn new(prefix: &str, purpose: &str, assumed_by: &str, statements: Vec<Value>) -> Self {
        RoleDocument {
            name: truncate_with_hash(&format!("{prefix}-{purpose}"), MAX_ROLE_NAME_LEN),
            assumed_by: assumed_by.to_owned(),
            managed_policies: vec![],
            policy: json!({
                "Version": "2012-10-17",
                "Statement": statements,
            }),
        }
    }

    /// The assume-role policy document of this role.
    pub fn trust_policy(&self) -> Value {
        json!({
            "Version": "2012-10-17",
            "Statement": [
                {
                    "Effect": "Allow",
                    "Action": ["sts:AssumeRole"],
                    "Principal": {
                        "Service": [self.assumed_by]
                    }
                }
            ]
        })
    }

    /// Every action granted by the inline policy.
    pub fn actions(&self) -> Vec<&str> {
        self.policy["Statement"]
            .as_array()
            .into_iter()
            .flatten()
            .flat_map(|statement| statement["Action"].as_array().into_iter().flatten())
            .filter_map(Value::as_str)
            .collect()
    }
}

fn allow(actions: &[&str], resources: &[String]) -> Value {
    json!({
        "Effect": "Allow",
        "Action": actions,
        "Resource": resources,
    })
}

const LAMBDA_BASIC_EXECUTION: &str =
    "arn:aws:iam::aws:policy/service-role/AWSLambdaBasicExecutionRole";

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct BranchRoles {
    pub create_branch: RoleDocument,
    pub delete_branch: RoleDocument,
    pub code_build: RoleDocument,
}

impl BranchRoles {
    pub fn new(
        account: &str,
        region: &str,
        repository: &str,
        artifact_bucket_arn: &str,
        codebuild_prefix: &str,
    ) -> Self {
        let projects = vec![format!(
            "arn:aws:codebuild:{region}:{account}:project/{codebuild_prefix}*"
        )];

        let mut create_branch = RoleDocument::new(
            codebuild_prefix,
            "LambdaCreateBranchRole",
            "lambda.amazonaws.com",
            vec![allow(
                &["codebuild:CreateProject", "codebuild:StartBuild"],
                &projects,
            )],
        );
        create_branch
            .managed_policies
            .push(LAMBDA_BASIC_EXECUTION.to_owned());

        let mut delete_branch = RoleDocument::new(
            codebuild_prefix,
            "LambdaDeleteBranchRole",
            "lambda.amazonaws.com",
            vec![allow(
                &[
                    "codebuild:StartBuild",
                    "codebuild:DeleteProject",
                    "codebuild:CreateProject",
                    "codebuild:BatchGetBuilds",
                ],
                &projects,
            )],
        );
        delete_branch
            .managed_policies
            .push(LAMBDA_BASIC_EXECUTION.to_owned());

        let log_group = format!(
            "arn:aws:logs:{region}:{account}:log-group:/aws/codebuild/{codebuild_prefix}-*"
        );
        let mut assume_bootstrap = allow(
            &["sts:AssumeRole"],
            &[format!("arn:*:iam::{account}:role/*")],
        );
        assume_bootstrap["Condition"] = json!({
            "ForAnyValue:StringEquals": {
                "iam:ResourceTag/aws-cdk:bootstrap-role": [
                    "image-publishing",
                    "file-publishing",
                    "deploy"
                ]
            }
        });
        let code_build = RoleDocument::new(
            codebuild_prefix,
            "CodeBuildExecutionRole",
            "codebuild.amazonaws.com",
            vec![
                allow(
                    &["cloudformation:DescribeStacks", "cloudformation:DeleteStack"],
                    &[format!("arn:aws:cloudformation:{region}:{account}:stack/*/*")],
                ),
                allow(
                    &["logs:CreateLogGroup", "logs:CreateLogStream", "logs:PutLogEvents"],
                    &[log_group.clone(), format!("{log_group}:*")],
                ),
                allow(
                    &["codecommit:Get*", "codecommit:List*", "codecommit:GitPull"],
                    &[format!("arn:aws:codecommit:{region}:{account}:{repository}")],
                ),
                allow(
                    &["s3:DeleteObject", "s3:PutObject", "s3:GetObject", "s3:ListBucket"],
                    &[format!("{artifact_bucket_arn}/*"), artifact_bucket_arn.to_owned()],
                ),
                assume_bootstrap,
            ],
        );

        BranchRoles {
            create_branch,
            delete_branch,
            code_build,
        }
    }
}

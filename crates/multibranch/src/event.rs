//! CodeCommit reference events, as delivered by EventBridge.
use snafu::ResultExt;

use crate::{ConfigError, EventSnafu};

/// The `detail` of a "CodeCommit Repository State Change" event.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceDetail {
    pub reference_type: String,
    pub reference_name: String,
    pub repository_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ReferenceEvent {
    pub detail: ReferenceDetail,
}

impl ReferenceEvent {
    pub const BRANCH: &'static str = "branch";

    pub fn from_value(value: serde_json::Value) -> Result<Self, ConfigError> {
        serde_json::from_value(value).context(EventSnafu)
    }

    /// The branch name, if this event is about a branch.
    pub fn branch(&self) -> Option<&str> {
        (self.detail.reference_type == Self::BRANCH).then_some(self.detail.reference_name.as_str())
    }

    pub fn repository(&self) -> &str {
        &self.detail.repository_name
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn decodes_eventbridge_envelope() {
        let event = ReferenceEvent::from_value(serde_json::json!({
            "version": "0",
            "detail-type": "CodeCommit Repository State Change",
            "source": "aws.codecommit",
            "detail": {
                "event": "referenceCreated",
                "referenceType": "branch",
                "referenceName": "feature-42",
                "repositoryName": "repo",
                "commitId": "0123456789abcdef"
            }
        }))
        .unwrap();
        assert_eq!(Some("feature-42"), event.branch());
        assert_eq!("repo", event.repository());
    }

    #[test]
    fn tags_are_not_branches() {
        let event = ReferenceEvent::from_value(serde_json::json!({
            "detail": {
                "referenceType": "tag",
                "referenceName": "v1.0.0",
                "repositoryName": "repo"
            }
        }))
        .unwrap();
        assert_eq!(None, event.branch());
    }

    #[test]
    fn missing_detail_is_an_error() {
        crate::assert_err!(
            ReferenceEvent::from_value(serde_json::json!({"detail": {"referenceType": "branch"}})),
            ConfigError::Event { .. }
        );
    }
}

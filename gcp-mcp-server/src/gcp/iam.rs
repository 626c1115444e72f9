//! IAM policy models.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IamPolicy {
    #[serde(default)]
    pub version: Option<i32>,
    #[serde(default)]
    pub bindings: Vec<Binding>,
    #[serde(default)]
    pub etag: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Binding {
    pub role: String,
    #[serde(default)]
    pub members: Vec<String>,
    #[serde(default)]
    pub condition: Option<Condition>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Condition {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub expression: Option<String>,
}

impl IamPolicy {
    /// Roles granted to `member` (e.g. `user:alice@example.com`).
    pub fn roles_for_member(&self, member: &str) -> Vec<&str> {
        self.bindings
            .iter()
            .filter(|b| b.members.iter().any(|m| m == member))
            .map(|b| b.role.as_str())
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GetIamPolicyBody {
    pub options: PolicyOptions,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyOptions {
    pub requested_policy_version: i32,
}

impl Default for GetIamPolicyBody {
    fn default() -> Self {
        Self {
            options: PolicyOptions {
                requested_policy_version: 3,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TestPermissionsBody<'a> {
    pub permissions: &'a [String],
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TestPermissionsResponse {
    #[serde(default)]
    pub permissions: Vec<String>,
}

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Remote billing and membership operations the reconciliation engine needs.
///
/// [`crate::client::GitHubClient`] talks to the GitHub REST API; tests use
/// an in-memory implementation.
#[async_trait]
pub trait BillingApi: Send + Sync {
    async fn list_org_teams(&self, org: &str) -> Result<Vec<Team>>;
    async fn list_enterprise_teams(&self) -> Result<Vec<Team>>;
    async fn list_org_team_members(&self, org: &str, team_slug: &str) -> Result<Vec<String>>;
    async fn list_enterprise_team_members(&self, team_slug: &str) -> Result<Vec<String>>;

    /// Active cost centers keyed by name.
    async fn list_active_cost_centers(&self) -> Result<HashMap<String, String>>;

    /// Creates a cost center and returns its id. A duplicate name surfaces
    /// as an API error with status 409.
    async fn create_cost_center(&self, name: &str) -> Result<String>;

    /// Users currently assigned to the cost center.
    async fn cost_center_members(&self, cost_center_id: &str) -> Result<Vec<String>>;

    /// The cost center a user currently belongs to, if any.
    async fn current_cost_center(&self, user: &str) -> Result<Option<CostCenterRef>>;

    async fn add_users(&self, cost_center_id: &str, users: &[String]) -> Result<()>;
    async fn remove_users(&self, cost_center_id: &str, users: &[String]) -> Result<()>;

    /// Creates a budget for one product or SKU. Returns `true` when the
    /// budget exists afterwards, including when it already existed.
    async fn create_product_budget(
        &self,
        cost_center_id: &str,
        cost_center_name: &str,
        product: &str,
        amount: u64
    ) -> Result<bool>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    #[serde(default)]
    pub id: u64,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: Option<String>
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostCenter {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub resources: Vec<CostCenterResource>
}

impl CostCenter {
    pub fn is_active(&self) -> bool {
        self.state.eq_ignore_ascii_case("active") && !self.id.is_empty() && !self.name.is_empty()
    }

    pub fn user_logins(&self) -> Vec<String> {
        self.resources
            .iter()
            .filter(|r| r.resource_type == "User")
            .map(|r| r.name.clone())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostCenterResource {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub name: String
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostCenterRef {
    pub id: String,
    pub name: String
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_requires_id_and_name() {
        let cc: CostCenter =
            serde_json::from_str(r#"{"id": "abc", "name": "Platform", "state": "active"}"#)
                .unwrap();
        assert!(cc.is_active());

        let deleted: CostCenter =
            serde_json::from_str(r#"{"id": "abc", "name": "Platform", "state": "deleted"}"#)
                .unwrap();
        assert!(!deleted.is_active());

        let nameless: CostCenter =
            serde_json::from_str(r#"{"id": "abc", "state": "active"}"#).unwrap();
        assert!(!nameless.is_active());
    }

    #[test]
    fn test_user_logins_ignore_other_resources() {
        let cc: CostCenter = serde_json::from_str(
            r#"{
                "id": "abc",
                "name": "Platform",
                "state": "active",
                "resources": [
                    {"type": "User", "name": "alice"},
                    {"type": "Repo", "name": "acme/api"},
                    {"type": "User", "name": "bob"}
                ]
            }"#
        )
        .unwrap();
        assert_eq!(cc.user_logins(), vec!["alice", "bob"]);
    }
}

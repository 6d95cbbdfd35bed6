use super::GitHubClient;
use crate::api::{CostCenter, CostCenterRef};
use crate::error::Result;
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct CostCenterList {
    #[serde(rename = "costCenters", default)]
    cost_centers: Vec<CostCenter>
}

#[derive(Debug, Deserialize)]
struct CreatedCostCenter {
    id: String
}

#[derive(Debug, Deserialize)]
struct MembershipList {
    #[serde(default)]
    memberships: Vec<Membership>
}

#[derive(Debug, Deserialize)]
struct Membership {
    cost_center: CostCenterRef
}

impl GitHubClient {
    pub(crate) async fn fetch_active_cost_centers(&self) -> Result<HashMap<String, String>> {
        let url = self.enterprise_url("/settings/billing/cost-centers");
        let list: CostCenterList = self.request_json(Method::GET, &url, None).await?;

        let total = list.cost_centers.len();
        let mut active = HashMap::new();
        for cc in list.cost_centers.into_iter().filter(CostCenter::is_active) {
            self.remember(&cc.name, &cc.id);
            active.insert(cc.name, cc.id);
        }

        debug!(active = active.len(), total, "Fetched cost centers");
        Ok(active)
    }

    pub(crate) async fn fetch_cost_center(&self, id: &str) -> Result<CostCenter> {
        let url = self.enterprise_url(&format!(
            "/settings/billing/cost-centers/{}",
            urlencoding::encode(id)
        ));
        self.request_json(Method::GET, &url, None).await
    }

    pub(crate) async fn post_cost_center(&self, name: &str) -> Result<String> {
        let url = self.enterprise_url("/settings/billing/cost-centers");
        let body = json!({ "name": name });
        let created: CreatedCostCenter = self.request_json(Method::POST, &url, Some(&body)).await?;

        info!(name = %name, id = %created.id, "Created cost center");
        self.remember(name, &created.id);
        Ok(created.id)
    }

    /// A failed lookup is reported as "not in any cost center".
    pub(crate) async fn fetch_membership(&self, user: &str) -> Result<Option<CostCenterRef>> {
        let url = self.enterprise_url(&format!(
            "/settings/billing/cost-centers/memberships?resource_type=user&name={}",
            urlencoding::encode(user)
        ));

        match self
            .request_json::<MembershipList>(Method::GET, &url, None)
            .await
        {
            Ok(list) => Ok(list.memberships.into_iter().next().map(|m| m.cost_center)),
            Err(e) => {
                debug!(user = %user, error = %e, "Failed to check cost center membership");
                Ok(None)
            }
        }
    }

    pub(crate) async fn modify_resources(
        &self,
        method: Method,
        cost_center_id: &str,
        users: &[String]
    ) -> Result<()> {
        if users.is_empty() {
            return Ok(());
        }
        let url = self.enterprise_url(&format!(
            "/settings/billing/cost-centers/{}/resource",
            urlencoding::encode(cost_center_id)
        ));
        let body = json!({ "users": users });
        self.request(method, &url, Some(&body)).await?;
        Ok(())
    }
}

use super::GitHubClient;
use crate::error::{CostCenterError, Result};
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

/// Product-level identifiers, budgeted across the whole product.
const PRODUCT_LEVEL: [&str; 6] = ["actions", "packages", "codespaces", "copilot", "ghas", "ghec"];

/// SKU-level identifiers known to the billing API. Not exhaustive.
const SKU_LEVEL: [&str; 21] = [
    "copilot_premium_request",
    "copilot_agent_premium_request",
    "copilot_enterprise",
    "copilot_for_business",
    "copilot_standalone",
    "actions_linux",
    "actions_macos",
    "actions_windows",
    "actions_storage",
    "codespaces_storage",
    "codespaces_prebuild_storage",
    "packages_storage",
    "packages_bandwidth",
    "ghas_licenses",
    "ghas_code_security_licenses",
    "ghas_secret_protection_licenses",
    "ghec_licenses",
    "git_lfs_storage",
    "git_lfs_bandwidth",
    "models_inference",
    "spark_premium_request"
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetType {
    ProductPricing,
    SkuPricing
}

impl BudgetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProductPricing => "ProductPricing",
            Self::SkuPricing => "SkuPricing"
        }
    }
}

/// Budget type and SKU for a configured product name.
///
/// Unknown names are passed through as custom SKUs.
pub fn classify_product(product: &str) -> (BudgetType, String) {
    let sku = product.trim().to_lowercase();
    if SKU_LEVEL.contains(&sku.as_str()) {
        return (BudgetType::SkuPricing, sku);
    }
    if PRODUCT_LEVEL.contains(&sku.as_str()) {
        return (BudgetType::ProductPricing, sku);
    }
    warn!(product = %product, "Unknown product or SKU, defaulting to SkuPricing");
    (BudgetType::SkuPricing, sku)
}

#[derive(Debug, Deserialize)]
struct BudgetList {
    #[serde(default)]
    budgets: Vec<Budget>
}

#[derive(Debug, Deserialize)]
struct Budget {
    #[serde(default)]
    budget_scope: Option<String>,
    #[serde(default)]
    budget_entity_name: Option<String>,
    #[serde(default)]
    budget_product_sku: Option<String>
}

impl Budget {
    fn matches(&self, cost_center_id: &str, sku: &str) -> bool {
        self.budget_scope.as_deref() == Some("cost_center")
            && self.budget_entity_name.as_deref() == Some(cost_center_id)
            && self.budget_product_sku.as_deref() == Some(sku)
    }
}

impl GitHubClient {
    fn budgets_unavailable(&self) -> CostCenterError {
        CostCenterError::BudgetsUnavailable {
            enterprise: self.enterprise.clone()
        }
    }

    /// Whether a budget for the cost center and SKU already exists.
    ///
    /// Lookup failures other than 404 are treated as "no budget".
    async fn has_budget(&self, cost_center_id: &str, sku: &str) -> Result<bool> {
        let url = self.enterprise_url("/settings/billing/budgets");
        match self
            .request_json::<BudgetList>(Method::GET, &url, None)
            .await
        {
            Ok(list) => Ok(list.budgets.iter().any(|b| b.matches(cost_center_id, sku))),
            Err(e) if e.status() == Some(404) => Err(self.budgets_unavailable()),
            Err(e) => {
                warn!(cost_center_id = %cost_center_id, error = %e, "Failed to check existing budgets");
                Ok(false)
            }
        }
    }

    pub(crate) async fn ensure_product_budget(
        &self,
        cost_center_id: &str,
        cost_center_name: &str,
        product: &str,
        amount: u64
    ) -> Result<bool> {
        let (budget_type, sku) = classify_product(product);

        if self.has_budget(cost_center_id, &sku).await? {
            info!(product = %product, cost_center = %cost_center_name, "Budget already exists");
            return Ok(true);
        }

        let url = self.enterprise_url("/settings/billing/budgets");
        let body = json!({
            "budget_type": budget_type.as_str(),
            "budget_product_sku": sku,
            "budget_scope": "cost_center",
            "budget_amount": amount,
            "prevent_further_usage": true,
            "budget_entity_name": cost_center_id,
            "budget_alerting": {
                "will_alert": false,
                "alert_recipients": []
            }
        });

        debug!(product = %product, budget_type = budget_type.as_str(), "Creating budget");
        match self.request(Method::POST, &url, Some(&body)).await {
            Ok(_) => Ok(true),
            Err(e) if e.status() == Some(404) => Err(self.budgets_unavailable()),
            Err(e) => Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_product_level() {
        assert_eq!(
            classify_product("Copilot"),
            (BudgetType::ProductPricing, "copilot".to_string())
        );
        assert_eq!(
            classify_product("actions"),
            (BudgetType::ProductPricing, "actions".to_string())
        );
    }

    #[test]
    fn test_classify_sku_level() {
        assert_eq!(
            classify_product("copilot_premium_request"),
            (BudgetType::SkuPricing, "copilot_premium_request".to_string())
        );
    }

    #[test]
    fn test_classify_unknown_defaults_to_sku() {
        assert_eq!(
            classify_product("Shiny_New_Thing"),
            (BudgetType::SkuPricing, "shiny_new_thing".to_string())
        );
    }

    #[test]
    fn test_budget_match_requires_scope_entity_and_sku() {
        let budget = Budget {
            budget_scope: Some("cost_center".to_string()),
            budget_entity_name: Some("cc-1".to_string()),
            budget_product_sku: Some("copilot".to_string())
        };
        assert!(budget.matches("cc-1", "copilot"));
        assert!(!budget.matches("cc-2", "copilot"));
        assert!(!budget.matches("cc-1", "actions"));
    }
}

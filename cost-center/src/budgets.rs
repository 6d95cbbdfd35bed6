use crate::api::BillingApi;
use crate::error::CostCenterError;
use config::ProductBudget;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Creates the configured product budgets for newly created cost centers.
///
/// Once the billing API reports budgets as unavailable, every later call is
/// a no-op for the rest of the run.
pub struct BudgetManager {
    api: Arc<dyn BillingApi>,
    products: BTreeMap<String, ProductBudget>,
    unavailable: bool
}

/// Per-product outcome of [`BudgetManager::ensure_budgets`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BudgetOutcome {
    Created,
    Skipped,
    Failed(String)
}

impl BudgetManager {
    pub fn new(api: Arc<dyn BillingApi>, products: BTreeMap<String, ProductBudget>) -> Self {
        Self {
            api,
            products,
            unavailable: false
        }
    }

    pub fn is_available(&self) -> bool {
        !self.unavailable
    }

    pub async fn ensure_budgets(
        &mut self,
        cost_center_id: &str,
        cost_center_name: &str
    ) -> BTreeMap<String, BudgetOutcome> {
        let mut outcomes = BTreeMap::new();
        if self.unavailable {
            return outcomes;
        }

        info!(name = %cost_center_name, "Creating budgets for cost center");

        for (product, budget) in &self.products {
            if !budget.enabled {
                debug!(product = %product, "Skipping disabled product budget");
                outcomes.insert(product.clone(), BudgetOutcome::Skipped);
                continue;
            }

            match self
                .api
                .create_product_budget(cost_center_id, cost_center_name, product, budget.amount)
                .await
            {
                Ok(true) => {
                    info!(
                        product = %product,
                        cost_center = %cost_center_name,
                        amount = budget.amount,
                        "Budget created"
                    );
                    outcomes.insert(product.clone(), BudgetOutcome::Created);
                }
                Ok(false) => {
                    outcomes.insert(product.clone(), BudgetOutcome::Skipped);
                }
                Err(e @ CostCenterError::BudgetsUnavailable { .. }) => {
                    warn!(error = %e, "Budgets API unavailable, disabling budget creation");
                    self.unavailable = true;
                    outcomes.insert(product.clone(), BudgetOutcome::Failed(e.to_string()));
                    return outcomes;
                }
                Err(e) => {
                    error!(
                        product = %product,
                        cost_center = %cost_center_name,
                        error = %e,
                        "Failed to create budget"
                    );
                    outcomes.insert(product.clone(), BudgetOutcome::Failed(e.to_string()));
                }
            }
        }

        outcomes
    }
}

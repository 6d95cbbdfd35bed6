use crate::api::BillingApi;
use crate::error::Result;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{error, info};

/// Maximum subjects per add call accepted by the billing API.
pub const BATCH_SIZE: usize = 50;

/// Applies membership changes to individual cost centers.
pub struct Reconciler {
    api: Arc<dyn BillingApi>
}

impl Reconciler {
    pub fn new(api: Arc<dyn BillingApi>) -> Self {
        Self { api }
    }

    /// Add subjects to a cost center in batches of [`BATCH_SIZE`].
    ///
    /// Subjects already in the cost center succeed without a call. Unless
    /// `ignore_current` is set, a subject that belongs to another cost center
    /// is skipped and reported as failed. A failed batch fails every subject
    /// in it and does not stop later batches.
    ///
    /// Errors only when the cost center's current members cannot be read.
    pub async fn add_subjects(
        &self,
        cost_center_id: &str,
        subjects: &[String],
        ignore_current: bool
    ) -> Result<BTreeMap<String, bool>> {
        let mut results = BTreeMap::new();
        if subjects.is_empty() {
            return Ok(results);
        }

        let current: HashSet<String> = self
            .api
            .cost_center_members(cost_center_id)
            .await
            .map_err(|e| e.context(format!("checking members of cost center {}", cost_center_id)))?
            .into_iter()
            .collect();

        let mut to_add = Vec::new();
        for subject in subjects {
            if current.contains(subject) {
                results.insert(subject.clone(), true);
                continue;
            }

            if !ignore_current {
                if let Ok(Some(other)) = self.api.current_cost_center(subject).await {
                    info!(
                        user = %subject,
                        current_cost_center = %other.name,
                        "Skipping user already in another cost center"
                    );
                    results.insert(subject.clone(), false);
                    continue;
                }
            }
            to_add.push(subject.clone());
        }

        if to_add.is_empty() {
            info!(cost_center_id = %cost_center_id, "All users already assigned");
            return Ok(results);
        }

        info!(
            cost_center_id = %cost_center_id,
            to_add = to_add.len(),
            already_assigned = subjects.len() - to_add.len(),
            "Adding users to cost center"
        );

        for batch in to_add.chunks(BATCH_SIZE) {
            let ok = match self.api.add_users(cost_center_id, batch).await {
                Ok(()) => {
                    info!(cost_center_id = %cost_center_id, batch_size = batch.len(), "Added users batch");
                    true
                }
                Err(e) => {
                    error!(
                        cost_center_id = %cost_center_id,
                        batch_size = batch.len(),
                        error = %e,
                        "Failed to add users batch"
                    );
                    false
                }
            };
            for subject in batch {
                results.insert(subject.clone(), ok);
            }
        }

        Ok(results)
    }

    /// Members of the cost center that are not in `desired`, sorted.
    pub async fn detect_stale(&self, cost_center_id: &str, desired: &[String]) -> Result<Vec<String>> {
        let desired: HashSet<&str> = desired.iter().map(String::as_str).collect();
        let mut stale: Vec<String> = self
            .api
            .cost_center_members(cost_center_id)
            .await
            .map_err(|e| e.context(format!("reading members of cost center {}", cost_center_id)))?
            .into_iter()
            .filter(|member| !desired.contains(member.as_str()))
            .collect();
        stale.sort();
        stale.dedup();
        Ok(stale)
    }

    /// Remove subjects in one call. Every subject fails if the call fails.
    pub async fn remove_subjects(
        &self,
        cost_center_id: &str,
        subjects: &[String]
    ) -> BTreeMap<String, bool> {
        if subjects.is_empty() {
            return BTreeMap::new();
        }

        let ok = match self.api.remove_users(cost_center_id, subjects).await {
            Ok(()) => {
                info!(cost_center_id = %cost_center_id, count = subjects.len(), "Removed users from cost center");
                true
            }
            Err(e) => {
                error!(cost_center_id = %cost_center_id, error = %e, "Failed to remove users");
                false
            }
        };
        subjects.iter().map(|s| (s.clone(), ok)).collect()
    }
}

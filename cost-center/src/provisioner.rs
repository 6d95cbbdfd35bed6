use crate::api::BillingApi;
use crate::cache::CostCenterCache;
use crate::error::{CostCenterError, Result};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Outcome of resolving cost center names to ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Provisioned {
    /// Name -> id. Names that could not be resolved map to themselves.
    pub ids: BTreeMap<String, String>,
    /// Ids created during this call.
    pub newly_created: BTreeSet<String>,
    /// Names that do not exist yet and would be created (preview only).
    pub would_create: BTreeSet<String>,
    /// Name -> error for names that could not be created or found.
    pub failed: BTreeMap<String, String>
}

impl Provisioned {
    fn identity(names: &[String]) -> Self {
        Self {
            ids: names.iter().map(|n| (n.clone(), n.clone())).collect(),
            ..Default::default()
        }
    }

    pub fn id_for<'a>(&'a self, name: &'a str) -> &'a str {
        self.ids.get(name).map(String::as_str).unwrap_or(name)
    }

    pub fn is_newly_created(&self, id: &str) -> bool {
        self.newly_created.contains(id)
    }
}

/// Pull the existing cost center id out of a 409 response body.
pub fn extract_existing_id(body: &str) -> Option<String> {
    let re = regex::Regex::new(
        r"(?i)existing cost center UUID:\s*([a-f0-9]{8}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{12})"
    )
    .ok()?;
    re.captures(body)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

pub struct CostCenterProvisioner {
    api: Arc<dyn BillingApi>,
    auto_create: bool,
    cache: Option<Arc<CostCenterCache>>
}

impl CostCenterProvisioner {
    pub fn new(api: Arc<dyn BillingApi>, auto_create: bool) -> Self {
        Self {
            api,
            auto_create,
            cache: None
        }
    }

    pub fn with_cache(mut self, cache: Arc<CostCenterCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn auto_create(&self) -> bool {
        self.auto_create
    }

    fn remember(&self, name: &str, id: &str) {
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.set(name, id, name) {
                warn!(name = %name, error = %e, "Failed to update cost center cache");
            }
        }
    }

    fn cached_id(&self, name: &str) -> Option<String> {
        self.cache.as_ref()?.get(name).map(|entry| entry.id)
    }

    /// Active cost centers, or `None` when the preload failed.
    async fn preload(&self) -> Option<HashMap<String, String>> {
        match self.api.list_active_cost_centers().await {
            Ok(active) => {
                info!(count = active.len(), "Preloaded active cost centers");
                Some(active)
            }
            Err(e) => {
                warn!(error = %e, "Failed to preload cost centers, falling back to individual creation");
                None
            }
        }
    }

    /// Make sure every name exists remotely and return its id.
    ///
    /// With auto-creation disabled the names are returned as their own ids
    /// and nothing is created. A name that can neither be created nor found
    /// is recorded in `failed` and used as its own id.
    pub async fn ensure_exists(&self, names: &[String]) -> Provisioned {
        if !self.auto_create {
            info!("Auto-creation disabled, assuming cost center names are valid ids");
            return Provisioned::identity(names);
        }

        info!(count = names.len(), "Ensuring cost centers exist");

        let preload = self.preload().await;
        let degraded = preload.is_none();
        let mut active = preload.unwrap_or_default();

        let mut result = Provisioned::default();
        let mut preload_hits = 0usize;
        let mut create_calls = 0usize;

        for name in names {
            if let Some(id) = active.get(name) {
                debug!(name = %name, id = %id, "Preload hit");
                result.ids.insert(name.clone(), id.clone());
                preload_hits += 1;
                continue;
            }

            if degraded {
                if let Some(id) = self.cached_id(name) {
                    debug!(name = %name, id = %id, "Found cost center in cache");
                    active.insert(name.clone(), id.clone());
                    result.ids.insert(name.clone(), id);
                    continue;
                }
            }

            create_calls += 1;
            match self.create_or_find(name).await {
                Ok((id, created)) => {
                    if created {
                        result.newly_created.insert(id.clone());
                    }
                    active.insert(name.clone(), id.clone());
                    result.ids.insert(name.clone(), id);
                }
                Err(e) => {
                    error!(name = %name, error = %e, "Failed to create or find cost center");
                    result.ids.insert(name.clone(), name.clone());
                    result.failed.insert(name.clone(), e.to_string());
                }
            }
        }

        let total = preload_hits + create_calls;
        let hit_rate = if total > 0 {
            preload_hits as f64 / total as f64 * 100.0
        } else {
            0.0
        };
        info!(
            resolved = result.ids.len(),
            preload_hits,
            api_calls = create_calls,
            hit_rate_pct = %format!("{:.1}", hit_rate),
            "Cost center resolution complete"
        );

        result
    }

    /// Create `name`, resolving a 409 to the existing id.
    ///
    /// Returns the id and whether it was created by this call.
    async fn create_or_find(&self, name: &str) -> Result<(String, bool)> {
        let err = match self.api.create_cost_center(name).await {
            Ok(id) => return Ok((id, true)),
            Err(e) => e
        };

        if !err.is_conflict() {
            return Err(err.context(format!("creating cost center {}", name)));
        }
        let body = match &err {
            CostCenterError::Api { body, .. } => body.as_str(),
            _ => ""
        };

        info!(name = %name, "Cost center already exists, extracting existing id");
        if let Some(id) = extract_existing_id(body) {
            info!(name = %name, id = %id, "Extracted existing cost center id from conflict");
            self.remember(name, &id);
            return Ok((id, false));
        }

        warn!(name = %name, "Could not extract id from conflict, searching by name");
        let active = self
            .api
            .list_active_cost_centers()
            .await
            .map_err(|e| e.context(format!("finding cost center {} by name", name)))?;
        match active.get(name) {
            Some(id) => {
                info!(name = %name, id = %id, "Found active cost center by name");
                Ok((id.clone(), false))
            }
            None => Err(CostCenterError::CostCenterNotFound {
                name: name.to_string()
            })
        }
    }

    /// Read-only resolution for plan mode: never creates anything.
    ///
    /// Existing names resolve to their ids; names that would be created map
    /// to themselves and are listed in `would_create`.
    pub async fn preview(&self, names: &[String]) -> Provisioned {
        if !self.auto_create {
            return Provisioned::identity(names);
        }

        let preload = self.preload().await;
        let mut result = Provisioned::default();
        for name in names {
            let existing = match &preload {
                Some(active) => active.get(name).cloned(),
                None => self.cached_id(name)
            };
            match existing {
                Some(id) => {
                    result.ids.insert(name.clone(), id);
                }
                None => {
                    result.ids.insert(name.clone(), name.clone());
                    result.would_create.insert(name.clone());
                }
            }
        }

        info!(
            existing = result.ids.len() - result.would_create.len(),
            would_create = result.would_create.len(),
            "Plan mode: cost center resolution"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_existing_id() {
        let body = r#"{"message":"Cost center with name 'Platform' already exists. Existing cost center UUID: 0b6a7b1e-9f0c-4d2a-8e51-3c4d5e6f7a8b"}"#;
        assert_eq!(
            extract_existing_id(body).as_deref(),
            Some("0b6a7b1e-9f0c-4d2a-8e51-3c4d5e6f7a8b")
        );
    }

    #[test]
    fn test_extract_existing_id_case_insensitive() {
        let body = "EXISTING COST CENTER UUID:AAAAAAAA-BBBB-CCCC-DDDD-EEEEEEEEEEEE";
        assert_eq!(
            extract_existing_id(body).as_deref(),
            Some("AAAAAAAA-BBBB-CCCC-DDDD-EEEEEEEEEEEE")
        );
    }

    #[test]
    fn test_extract_existing_id_missing() {
        assert!(extract_existing_id("Cost center already exists").is_none());
        assert!(extract_existing_id("existing cost center UUID: not-a-uuid").is_none());
    }

    #[test]
    fn test_identity() {
        let names = vec!["A".to_string(), "B".to_string()];
        let provisioned = Provisioned::identity(&names);
        assert_eq!(provisioned.id_for("A"), "A");
        assert_eq!(provisioned.id_for("B"), "B");
        assert!(provisioned.newly_created.is_empty());
        assert_eq!(provisioned.id_for("unknown"), "unknown");
    }
}

use crate::api::{BillingApi, Team};
use crate::error::Result;
use config::{TeamsConfig, TeamsScope};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Fetches teams and team members, caching both for the lifetime of the
/// instance.
///
/// Teams are keyed by their source: the organization login in organization
/// scope, the enterprise slug in enterprise scope.
pub struct MembershipFetcher {
    api: Arc<dyn BillingApi>,
    scope: TeamsScope,
    enterprise: String,
    organizations: Vec<String>,
    groups: Option<BTreeMap<String, Vec<Team>>>,
    members: HashMap<String, Vec<String>>
}

impl MembershipFetcher {
    pub fn new(api: Arc<dyn BillingApi>, teams: &TeamsConfig, enterprise: &str) -> Self {
        Self {
            api,
            scope: teams.scope,
            enterprise: enterprise.to_string(),
            organizations: teams.organizations.clone(),
            groups: None,
            members: HashMap::new()
        }
    }

    pub fn scope(&self) -> TeamsScope {
        self.scope
    }

    /// `org/slug` in organization scope, the bare slug in enterprise scope.
    pub fn team_key(&self, source: &str, slug: &str) -> String {
        match self.scope {
            TeamsScope::Enterprise => slug.to_string(),
            TeamsScope::Organization => format!("{}/{}", source, slug)
        }
    }

    /// Number of teams fetched so far.
    pub fn total_groups(&self) -> usize {
        self.groups
            .as_ref()
            .map(|g| g.values().map(Vec::len).sum())
            .unwrap_or(0)
    }

    /// All teams per source, sorted by slug within each source.
    ///
    /// A failure for any single organization fails the whole call.
    pub async fn fetch_all_groups(&mut self) -> Result<BTreeMap<String, Vec<Team>>> {
        if let Some(groups) = &self.groups {
            return Ok(groups.clone());
        }

        let mut groups = BTreeMap::new();
        match self.scope {
            TeamsScope::Enterprise => {
                info!(enterprise = %self.enterprise, "Fetching enterprise teams");
                let teams = self.api.list_enterprise_teams().await.map_err(|e| {
                    e.context(format!("fetching enterprise teams for {}", self.enterprise))
                })?;
                info!(count = teams.len(), "Found enterprise teams");
                groups.insert(self.enterprise.clone(), teams);
            }
            TeamsScope::Organization => {
                if self.organizations.is_empty() {
                    warn!("No organizations configured for organization scope");
                }
                for org in &self.organizations {
                    info!(org = %org, "Fetching teams from organization");
                    let teams = self
                        .api
                        .list_org_teams(org)
                        .await
                        .map_err(|e| e.context(format!("fetching teams for org {}", org)))?;
                    info!(org = %org, count = teams.len(), "Found teams in organization");
                    groups.insert(org.clone(), teams);
                }
            }
        }

        for teams in groups.values_mut() {
            teams.sort_by(|a, b| a.slug.cmp(&b.slug));
        }

        let total: usize = groups.values().map(Vec::len).sum();
        info!(count = total, "Total teams fetched");

        self.groups = Some(groups.clone());
        Ok(groups)
    }

    pub async fn fetch_members(&mut self, source: &str, slug: &str) -> Result<Vec<String>> {
        let key = self.team_key(source, slug);
        if let Some(cached) = self.members.get(&key) {
            return Ok(cached.clone());
        }

        let members = match self.scope {
            TeamsScope::Enterprise => self.api.list_enterprise_team_members(slug).await,
            TeamsScope::Organization => self.api.list_org_team_members(source, slug).await
        }
        .map_err(|e| e.context(format!("fetching members for team {}", key)))?;

        let members: Vec<String> = members.into_iter().filter(|m| !m.is_empty()).collect();
        debug!(team = %key, count = members.len(), "Fetched team members");
        self.members.insert(key, members.clone());
        Ok(members)
    }
}

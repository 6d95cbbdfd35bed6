use crate::fixtures::TEST_ENTERPRISE;
use async_trait::async_trait;
use cost_center::{BillingApi, CostCenterError, CostCenterRef, Result, Team};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// A remote call observed by [`FakeBillingService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ListCostCenters,
    CreateCostCenter(String),
    AddUsers {
        cost_center_id: String,
        users: Vec<String>
    },
    RemoveUsers {
        cost_center_id: String,
        users: Vec<String>
    },
    CreateBudget {
        cost_center_id: String,
        product: String
    }
}

impl Call {
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Self::ListCostCenters)
    }
}

#[derive(Default)]
struct FakeState {
    org_teams: HashMap<String, Vec<Team>>,
    enterprise_teams: Vec<Team>,
    /// `org/slug` or bare enterprise slug -> logins
    team_members: HashMap<String, Vec<String>>,
    /// name -> id
    cost_centers: BTreeMap<String, String>,
    /// id -> logins
    members: HashMap<String, Vec<String>>,
    budgets: BTreeSet<(String, String)>,
    next_id: u64,
    calls: Vec<Call>,

    failing_add_users: HashSet<String>,
    failing_member_reads: HashSet<String>,
    failing_orgs: HashSet<String>,
    conflict_bodies: HashMap<String, String>,
    list_failures: u32,
    budgets_unavailable: bool
}

impl FakeState {
    fn allocate_id(&mut self) -> String {
        self.next_id += 1;
        format!("cc000000-0000-4000-8000-{:012x}", self.next_id)
    }

    fn team(&mut self, slug: &str) -> Team {
        self.next_id += 1;
        Team {
            id: self.next_id,
            name: slug.to_string(),
            slug: slug.to_string(),
            description: None
        }
    }

    fn name_of(&self, id: &str) -> Option<String> {
        self.cost_centers
            .iter()
            .find(|(_, cc_id)| cc_id.as_str() == id)
            .map(|(name, _)| name.clone())
    }
}

fn not_found(what: &str) -> CostCenterError {
    CostCenterError::Api {
        status: 404,
        body: format!("{} not found", what)
    }
}

fn logins(users: &[&str]) -> Vec<String> {
    users.iter().map(|u| u.to_string()).collect()
}

/// In-memory billing API.
///
/// Cost centers behave like the real service: a user belongs to at most one
/// cost center, adding a user moves them, and creating a duplicate name
/// fails with a 409 carrying the existing id.
#[derive(Default)]
pub struct FakeBillingService {
    state: Mutex<FakeState>
}

impl FakeBillingService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_org_team(self, org: &str, slug: &str, members: &[&str]) -> Self {
        {
            let mut state = self.state.lock();
            let team = state.team(slug);
            state.org_teams.entry(org.to_string()).or_default().push(team);
            state
                .team_members
                .insert(format!("{}/{}", org, slug), logins(members));
        }
        self
    }

    pub fn with_enterprise_team(self, slug: &str, members: &[&str]) -> Self {
        {
            let mut state = self.state.lock();
            let team = state.team(slug);
            state.enterprise_teams.push(team);
            state.team_members.insert(slug.to_string(), logins(members));
        }
        self
    }

    /// An existing cost center with a generated id.
    pub fn with_cost_center(self, name: &str, members: &[&str]) -> Self {
        let id = self.state.lock().allocate_id();
        self.with_cost_center_id(name, &id, members)
    }

    pub fn with_cost_center_id(self, name: &str, id: &str, members: &[&str]) -> Self {
        {
            let mut state = self.state.lock();
            state.cost_centers.insert(name.to_string(), id.to_string());
            state.members.insert(id.to_string(), logins(members));
        }
        self
    }

    /// Any add batch containing `user` fails.
    pub fn failing_add_for(self, user: &str) -> Self {
        self.state.lock().failing_add_users.insert(user.to_string());
        self
    }

    /// Reading the members of the cost center named `name` fails.
    pub fn failing_member_reads(self, name: &str) -> Self {
        {
            let mut state = self.state.lock();
            if let Some(id) = state.cost_centers.get(name).cloned() {
                state.failing_member_reads.insert(id);
            }
        }
        self
    }

    pub fn failing_org(self, org: &str) -> Self {
        self.state.lock().failing_orgs.insert(org.to_string());
        self
    }

    /// Creating `name` fails with a 409 carrying `body`.
    pub fn conflict_on_create(self, name: &str, body: &str) -> Self {
        self.state
            .lock()
            .conflict_bodies
            .insert(name.to_string(), body.to_string());
        self
    }

    /// The next `count` cost center listings fail with a 503.
    pub fn failing_lists(self, count: u32) -> Self {
        self.state.lock().list_failures = count;
        self
    }

    pub fn budgets_unavailable(self) -> Self {
        self.state.lock().budgets_unavailable = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn mutations(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_mutation).collect()
    }

    pub fn created(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::CreateCostCenter(name) => Some(name),
                _ => None
            })
            .collect()
    }

    pub fn add_batches(&self) -> Vec<Vec<String>> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::AddUsers { users, .. } => Some(users),
                _ => None
            })
            .collect()
    }

    pub fn cost_center_id(&self, name: &str) -> Option<String> {
        self.state.lock().cost_centers.get(name).cloned()
    }

    /// Sorted members of the cost center named `name`.
    pub fn members_of(&self, name: &str) -> Vec<String> {
        let state = self.state.lock();
        let mut members = state
            .cost_centers
            .get(name)
            .and_then(|id| state.members.get(id))
            .cloned()
            .unwrap_or_default();
        members.sort();
        members
    }

    pub fn budgets(&self) -> Vec<(String, String)> {
        self.state.lock().budgets.iter().cloned().collect()
    }
}

#[async_trait]
impl BillingApi for FakeBillingService {
    async fn list_org_teams(&self, org: &str) -> Result<Vec<Team>> {
        let state = self.state.lock();
        if state.failing_orgs.contains(org) {
            return Err(not_found(&format!("organization {}", org)));
        }
        Ok(state.org_teams.get(org).cloned().unwrap_or_default())
    }

    async fn list_enterprise_teams(&self) -> Result<Vec<Team>> {
        Ok(self.state.lock().enterprise_teams.clone())
    }

    async fn list_org_team_members(&self, org: &str, team_slug: &str) -> Result<Vec<String>> {
        let key = format!("{}/{}", org, team_slug);
        self.state
            .lock()
            .team_members
            .get(&key)
            .cloned()
            .ok_or_else(|| not_found(&format!("team {}", key)))
    }

    async fn list_enterprise_team_members(&self, team_slug: &str) -> Result<Vec<String>> {
        self.state
            .lock()
            .team_members
            .get(team_slug)
            .cloned()
            .ok_or_else(|| not_found(&format!("team {}", team_slug)))
    }

    async fn list_active_cost_centers(&self) -> Result<HashMap<String, String>> {
        let mut state = self.state.lock();
        state.calls.push(Call::ListCostCenters);
        if state.list_failures > 0 {
            state.list_failures -= 1;
            return Err(CostCenterError::Api {
                status: 503,
                body: "service unavailable".to_string()
            });
        }
        Ok(state.cost_centers.clone().into_iter().collect())
    }

    async fn create_cost_center(&self, name: &str) -> Result<String> {
        let mut state = self.state.lock();
        state.calls.push(Call::CreateCostCenter(name.to_string()));

        if let Some(body) = state.conflict_bodies.get(name) {
            return Err(CostCenterError::Api {
                status: 409,
                body: body.clone()
            });
        }
        if let Some(id) = state.cost_centers.get(name) {
            return Err(CostCenterError::Api {
                status: 409,
                body: format!(
                    r#"{{"message":"Cost center '{}' already exists. Existing cost center UUID: {}"}}"#,
                    name, id
                )
            });
        }

        let id = state.allocate_id();
        state.cost_centers.insert(name.to_string(), id.clone());
        state.members.insert(id.clone(), Vec::new());
        Ok(id)
    }

    async fn cost_center_members(&self, cost_center_id: &str) -> Result<Vec<String>> {
        let state = self.state.lock();
        if state.failing_member_reads.contains(cost_center_id) {
            return Err(CostCenterError::Api {
                status: 500,
                body: "internal error".to_string()
            });
        }
        state
            .members
            .get(cost_center_id)
            .cloned()
            .ok_or_else(|| not_found(&format!("cost center {}", cost_center_id)))
    }

    async fn current_cost_center(&self, user: &str) -> Result<Option<CostCenterRef>> {
        let state = self.state.lock();
        Ok(state
            .members
            .iter()
            .find(|(_, members)| members.iter().any(|m| m == user))
            .map(|(id, _)| CostCenterRef {
                id: id.clone(),
                name: state.name_of(id).unwrap_or_else(|| id.clone())
            }))
    }

    async fn add_users(&self, cost_center_id: &str, users: &[String]) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.push(Call::AddUsers {
            cost_center_id: cost_center_id.to_string(),
            users: users.to_vec()
        });

        if !state.members.contains_key(cost_center_id) {
            return Err(not_found(&format!("cost center {}", cost_center_id)));
        }
        if users.iter().any(|u| state.failing_add_users.contains(u)) {
            return Err(CostCenterError::Api {
                status: 422,
                body: "batch rejected".to_string()
            });
        }

        for members in state.members.values_mut() {
            members.retain(|m| !users.contains(m));
        }
        if let Some(members) = state.members.get_mut(cost_center_id) {
            members.extend(users.iter().cloned());
        }
        Ok(())
    }

    async fn remove_users(&self, cost_center_id: &str, users: &[String]) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.push(Call::RemoveUsers {
            cost_center_id: cost_center_id.to_string(),
            users: users.to_vec()
        });

        match state.members.get_mut(cost_center_id) {
            Some(members) => {
                members.retain(|m| !users.contains(m));
                Ok(())
            }
            None => Err(not_found(&format!("cost center {}", cost_center_id)))
        }
    }

    async fn create_product_budget(
        &self,
        cost_center_id: &str,
        _cost_center_name: &str,
        product: &str,
        _amount: u64
    ) -> Result<bool> {
        let mut state = self.state.lock();
        state.calls.push(Call::CreateBudget {
            cost_center_id: cost_center_id.to_string(),
            product: product.to_string()
        });

        if state.budgets_unavailable {
            return Err(CostCenterError::BudgetsUnavailable {
                enterprise: TEST_ENTERPRISE.to_string()
            });
        }
        state
            .budgets
            .insert((cost_center_id.to_string(), product.to_string()));
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_duplicate_returns_conflict_with_id() {
        let fake = FakeBillingService::new().with_cost_center("Platform", &[]);
        let id = fake.cost_center_id("Platform").unwrap();

        let err = fake.create_cost_center("Platform").await.unwrap_err();
        assert!(err.is_conflict());
        assert!(err.to_string().contains(&id));
    }

    #[tokio::test]
    async fn test_add_moves_users_between_cost_centers() {
        let fake = FakeBillingService::new()
            .with_cost_center("Old", &["alice"])
            .with_cost_center("New", &[]);
        let new_id = fake.cost_center_id("New").unwrap();

        fake.add_users(&new_id, &["alice".to_string()]).await.unwrap();
        assert!(fake.members_of("Old").is_empty());
        assert_eq!(fake.members_of("New"), vec!["alice"]);

        let current = fake.current_cost_center("alice").await.unwrap().unwrap();
        assert_eq!(current.name, "New");
    }
}

//! Teams-based cost center assignment.
//!
//! A run goes Fetch -> Resolve -> Provision -> Apply additions -> Detect and
//! remove stale members. Fetch and resolve failures abort the run; failures
//! while applying are recorded per subject and per cost center.

use crate::api::BillingApi;
use crate::budgets::{BudgetManager, BudgetOutcome};
use crate::cache::CostCenterCache;
use crate::error::Result;
use crate::membership::MembershipFetcher;
use crate::provisioner::{CostCenterProvisioner, Provisioned};
use crate::reconcile::Reconciler;
use crate::report::{PlannedAssignment, SyncMode, SyncReport};
use crate::resolver::{Assignment, AssignmentResolver, CostCenterNamer};
use crate::summary::Summary;
use config::{Config, TeamsConfig, TeamsScope};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Restricts a run to an explicit list of logins, compared case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubjectFilter {
    logins: HashSet<String>
}

impl SubjectFilter {
    /// Parse a comma-separated list. Blank entries are ignored.
    pub fn parse(list: &str) -> Self {
        Self {
            logins: list
                .split(',')
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.logins.is_empty()
    }

    pub fn matches(&self, subject: &str) -> bool {
        self.logins.contains(&subject.to_lowercase())
    }

    /// Keep only matching subjects, dropping cost centers left empty.
    pub fn apply(
        &self,
        assignments: BTreeMap<String, Vec<Assignment>>
    ) -> BTreeMap<String, Vec<Assignment>> {
        assignments
            .into_iter()
            .filter_map(|(name, subjects)| {
                let kept: Vec<Assignment> = subjects
                    .into_iter()
                    .filter(|a| self.matches(&a.subject))
                    .collect();
                (!kept.is_empty()).then_some((name, kept))
            })
            .collect()
    }
}

pub struct TeamsManager {
    teams: TeamsConfig,
    enterprise: String,
    resolver: AssignmentResolver,
    provisioner: CostCenterProvisioner,
    reconciler: Reconciler,
    budgets: Option<BudgetManager>,
    filter: Option<SubjectFilter>
}

impl TeamsManager {
    pub fn new(api: Arc<dyn BillingApi>, config: &Config) -> Self {
        let teams = config.teams.clone();
        let enterprise = config.github.enterprise.clone();
        let fetcher = MembershipFetcher::new(Arc::clone(&api), &teams, &enterprise);
        let resolver = AssignmentResolver::new(fetcher, CostCenterNamer::new(&teams));
        let provisioner =
            CostCenterProvisioner::new(Arc::clone(&api), teams.auto_create_cost_centers);

        let budgets = config
            .budgets
            .enabled
            .then(|| BudgetManager::new(Arc::clone(&api), config.budgets.products.clone()));

        Self {
            teams,
            enterprise,
            resolver,
            provisioner,
            reconciler: Reconciler::new(api),
            budgets,
            filter: None
        }
    }

    pub fn with_cache(mut self, cache: Arc<CostCenterCache>) -> Self {
        self.provisioner = self.provisioner.with_cache(cache);
        self
    }

    /// Budgets are created for new cost centers only when requested here and
    /// enabled in the configuration.
    pub fn with_budgets(mut self, create_budgets: bool) -> Self {
        if !create_budgets {
            self.budgets = None;
        }
        self
    }

    pub fn with_subject_filter(mut self, filter: SubjectFilter) -> Self {
        self.filter = (!filter.is_empty()).then_some(filter);
        self
    }

    pub fn scope(&self) -> TeamsScope {
        self.teams.scope
    }

    pub fn full_sync(&self) -> bool {
        self.teams.remove_users_no_longer_in_teams
    }

    /// Resolved assignments, grouped by cost center name.
    pub async fn build_assignments(&mut self) -> Result<BTreeMap<String, Vec<Assignment>>> {
        let assignments = self.resolver.build_assignments().await?;
        Ok(match &self.filter {
            Some(filter) => {
                let filtered = filter.apply(assignments);
                info!(cost_centers = filtered.len(), "Applied user filter");
                filtered
            }
            None => assignments
        })
    }

    pub async fn ensure_cost_centers_exist(&self, names: &[String]) -> Provisioned {
        self.provisioner.ensure_exists(names).await
    }

    pub async fn sync(&mut self, mode: SyncMode, ignore_current: bool) -> Result<SyncReport> {
        let mut report = SyncReport::new(mode);

        let assignments = self.build_assignments().await?;
        if assignments.is_empty() {
            warn!("No team assignments to sync");
            report.complete();
            return Ok(report);
        }

        let names: Vec<String> = assignments.keys().cloned().collect();
        let provisioned = match mode {
            SyncMode::Plan => self.provisioner.preview(&names).await,
            SyncMode::Apply => self.provisioner.ensure_exists(&names).await
        };
        for (name, error) in &provisioned.failed {
            report.add_issue("cost_center", name, error);
        }

        // Subjects per cost center id, deduplicated.
        let mut by_id: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (name, subjects) in &assignments {
            let id = provisioned.id_for(name).to_string();
            report.cost_center_names.insert(id.clone(), name.clone());
            let entry = by_id.entry(id.clone()).or_default();
            let mut seen: BTreeSet<&str> = entry.iter().map(String::as_str).collect();
            let mut added = Vec::new();
            for assignment in subjects {
                if seen.insert(assignment.subject.as_str()) {
                    added.push(assignment.subject.clone());
                }
            }
            entry.extend(added);

            report.planned.push(PlannedAssignment {
                cost_center: name.clone(),
                cost_center_id: id,
                subjects: subjects.len(),
                would_create: provisioned.would_create.contains(name)
            });
        }

        let total_subjects: usize = by_id.values().map(Vec::len).sum();
        info!(
            cost_centers = by_id.len(),
            total_users = total_subjects,
            "Prepared assignments"
        );

        match mode {
            SyncMode::Plan => self.plan(&provisioned, &by_id, &mut report).await,
            SyncMode::Apply => {
                self.create_budgets(&provisioned, &mut report).await;
                self.apply(&provisioned, &by_id, ignore_current, &mut report)
                    .await;
            }
        }

        report.complete();
        Ok(report)
    }

    async fn plan(
        &self,
        provisioned: &Provisioned,
        by_id: &BTreeMap<String, Vec<String>>,
        report: &mut SyncReport
    ) {
        for planned in &report.planned {
            info!(
                cost_center = %planned.cost_center,
                users = planned.subjects,
                would_create = planned.would_create,
                "Would assign"
            );
        }

        if self.filter.is_some() {
            return;
        }
        for (id, desired) in by_id {
            let name = report.name_of(id).to_string();
            if provisioned.would_create.contains(&name) {
                continue;
            }
            match self.reconciler.detect_stale(id, desired).await {
                Ok(stale) if !stale.is_empty() => {
                    info!(
                        cost_center = %name,
                        count = stale.len(),
                        full_sync = self.full_sync(),
                        "Would remove users no longer in team"
                    );
                    report.stale.insert(id.clone(), stale);
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(cost_center = %name, error = %e, "Could not check for stale members");
                    report.add_issue("cost_center", &name, e);
                }
            }
        }

        if self.full_sync() {
            info!("Full sync is enabled, users no longer in teams would be removed in apply mode");
        }
    }

    async fn create_budgets(&mut self, provisioned: &Provisioned, report: &mut SyncReport) {
        let Some(budgets) = self.budgets.as_mut() else {
            return;
        };
        if provisioned.newly_created.is_empty() {
            return;
        }

        for (name, id) in &provisioned.ids {
            if !provisioned.is_newly_created(id) {
                continue;
            }
            if !budgets.is_available() {
                break;
            }
            for (product, outcome) in budgets.ensure_budgets(id, name).await {
                if let BudgetOutcome::Failed(e) = outcome {
                    report.add_issue("budget", &format!("{}/{}", name, product), e);
                }
            }
        }
    }

    async fn apply(
        &self,
        provisioned: &Provisioned,
        by_id: &BTreeMap<String, Vec<String>>,
        ignore_current: bool,
        report: &mut SyncReport
    ) {
        info!("Syncing team-based assignments");

        for (id, subjects) in by_id {
            let results = match self
                .reconciler
                .add_subjects(id, subjects, ignore_current)
                .await
            {
                Ok(results) => results,
                Err(e) => {
                    error!(cost_center_id = %id, error = %e, "Failed to update cost center assignments");
                    report.add_issue("cost_center", id, &e);
                    subjects.iter().map(|s| (s.clone(), false)).collect()
                }
            };
            report.results.insert(id.clone(), results);
        }

        info!(
            successful = report.successful(),
            total = report.successful() + report.failed(),
            "Assignment results"
        );
        if report.failed() > 0 {
            error!(failed = report.failed(), "Some users failed assignment");
        }

        if self.filter.is_some() {
            info!("User filter active, skipping stale member detection");
            return;
        }
        self.handle_stale(provisioned, by_id, report).await;
    }

    async fn handle_stale(
        &self,
        provisioned: &Provisioned,
        by_id: &BTreeMap<String, Vec<String>>,
        report: &mut SyncReport
    ) {
        let skipped = by_id
            .keys()
            .filter(|id| provisioned.is_newly_created(id))
            .count();
        if skipped > 0 {
            info!(skipped, "Skipping newly created cost centers, no stale members possible");
        }

        for (id, desired) in by_id {
            if provisioned.is_newly_created(id) {
                continue;
            }
            let name = report.name_of(id).to_string();

            let stale = match self.reconciler.detect_stale(id, desired).await {
                Ok(stale) => stale,
                Err(e) => {
                    error!(cost_center = %name, error = %e, "Failed to get cost center members");
                    report.add_issue("cost_center", &name, e);
                    continue;
                }
            };
            if stale.is_empty() {
                continue;
            }

            warn!(cost_center = %name, count = stale.len(), "Users no longer in team");
            for user in &stale {
                warn!(user = %user, cost_center = %name, "User no longer in team");
            }

            if self.full_sync() {
                let removal = self.reconciler.remove_subjects(id, &stale).await;
                report.removed += removal.values().filter(|ok| **ok).count();
                report
                    .results
                    .entry(id.clone())
                    .or_default()
                    .extend(removal);
            } else {
                info!(cost_center = %name, "Full sync disabled, users remain in cost center");
            }
            report.stale.insert(id.clone(), stale);
        }

        let found = report.stale_count();
        if found == 0 {
            info!("All cost centers are in sync with teams");
        } else if self.full_sync() {
            info!(found, removed = report.removed, "User removal summary");
        } else {
            warn!(count = found, "Users no longer in teams were not removed, full sync disabled");
        }
    }

    /// Aggregate counts over the resolved assignments.
    pub async fn generate_summary(&mut self) -> Result<Summary> {
        let assignments = self.build_assignments().await?;
        let sources = match self.teams.scope {
            TeamsScope::Enterprise => vec![self.enterprise.clone()],
            TeamsScope::Organization => self.teams.organizations.clone()
        };

        Ok(Summary::from_assignments(
            self.resolver.namer().mode().as_str(),
            self.teams.scope,
            sources,
            self.resolver.fetcher().total_groups(),
            &assignments
        ))
    }
}

//! Team -> cost center resolution.
//!
//! Every subject ends up with exactly one [`Assignment`]. When a subject is
//! in several teams the last team processed wins, and teams are processed
//! in a fixed order (sources sorted by name, teams sorted by slug) so the
//! winner is reproducible.

use crate::api::Team;
use crate::error::Result;
use crate::membership::MembershipFetcher;
use config::{TeamsConfig, TeamsScope};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};

/// How many multi-team subjects are listed individually.
pub const CONFLICT_REPORT_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamingMode {
    Auto,
    Manual,
    Unknown(String)
}

impl NamingMode {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "auto" => Self::Auto,
            "manual" => Self::Manual,
            _ => Self::Unknown(value.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Auto => "auto",
            Self::Manual => "manual",
            Self::Unknown(mode) => mode
        }
    }
}

/// Maps a team to its cost center name. Results are memoized per team key.
pub struct CostCenterNamer {
    mode: NamingMode,
    scope: TeamsScope,
    mappings: BTreeMap<String, String>,
    memo: HashMap<String, Option<String>>
}

impl CostCenterNamer {
    pub fn new(teams: &TeamsConfig) -> Self {
        Self {
            mode: NamingMode::parse(&teams.mode),
            scope: teams.scope,
            mappings: teams.team_mappings.clone(),
            memo: HashMap::new()
        }
    }

    pub fn mode(&self) -> &NamingMode {
        &self.mode
    }

    fn team_key(&self, source: &str, team: &Team) -> String {
        match self.scope {
            TeamsScope::Enterprise => team.slug.clone(),
            TeamsScope::Organization => format!("{}/{}", source, team.slug)
        }
    }

    /// `None` means the team has no cost center and must be skipped.
    pub fn cost_center_for(&mut self, source: &str, team: &Team) -> Option<String> {
        let key = self.team_key(source, team);
        if let Some(name) = self.memo.get(&key) {
            return name.clone();
        }

        let name = match &self.mode {
            NamingMode::Auto => Some(match self.scope {
                TeamsScope::Enterprise => format!("[enterprise team] {}", team.name),
                TeamsScope::Organization => format!("[org team] {}/{}", source, team.name)
            }),
            NamingMode::Manual => {
                let mapped = self.mappings.get(&key).cloned();
                if mapped.is_none() {
                    warn!(
                        team = %key,
                        hint = "add a mapping to teams.team_mappings",
                        "No mapping found for team in manual mode"
                    );
                }
                mapped
            }
            NamingMode::Unknown(mode) => {
                warn!(mode = %mode, "Invalid teams mode, expected auto or manual");
                None
            }
        };

        self.memo.insert(key, name.clone());
        name
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Assignment {
    pub subject: String,
    pub cost_center: String,
    /// Organization login or enterprise slug the team came from.
    pub source: String,
    pub team_slug: String
}

/// Subjects found in more than one team.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConflictReport {
    /// First entries in subject order: (subject, team keys, winning cost center).
    pub listed: Vec<(String, Vec<String>, String)>,
    /// Conflicting subjects not listed.
    pub remaining: usize
}

impl ConflictReport {
    pub fn total(&self) -> usize {
        self.listed.len() + self.remaining
    }
}

/// Summarize multi-team subjects, capped at [`CONFLICT_REPORT_LIMIT`] entries.
pub fn summarize_conflicts(
    teams_by_subject: &BTreeMap<String, Vec<String>>,
    finals: &BTreeMap<String, Assignment>
) -> ConflictReport {
    let conflicting: Vec<&String> = teams_by_subject
        .iter()
        .filter(|(_, teams)| teams.len() > 1)
        .map(|(subject, _)| subject)
        .collect();

    let listed = conflicting
        .iter()
        .take(CONFLICT_REPORT_LIMIT)
        .map(|subject| {
            let winner = finals
                .get(*subject)
                .map(|a| a.cost_center.clone())
                .unwrap_or_default();
            ((*subject).clone(), teams_by_subject[*subject].clone(), winner)
        })
        .collect();

    ConflictReport {
        listed,
        remaining: conflicting.len().saturating_sub(CONFLICT_REPORT_LIMIT)
    }
}

pub struct AssignmentResolver {
    fetcher: MembershipFetcher,
    namer: CostCenterNamer
}

impl AssignmentResolver {
    pub fn new(fetcher: MembershipFetcher, namer: CostCenterNamer) -> Self {
        Self { fetcher, namer }
    }

    pub fn fetcher(&self) -> &MembershipFetcher {
        &self.fetcher
    }

    pub fn namer(&self) -> &CostCenterNamer {
        &self.namer
    }

    pub fn cost_center_for(&mut self, source: &str, team: &Team) -> Option<String> {
        self.namer.cost_center_for(source, team)
    }

    /// Resolve every subject to one cost center, grouped by cost center name.
    pub async fn build_assignments(&mut self) -> Result<BTreeMap<String, Vec<Assignment>>> {
        info!("Building team-based cost center assignments");

        let groups = self.fetcher.fetch_all_groups().await?;
        if groups.values().all(Vec::is_empty) {
            warn!("No teams found in any configured source");
            return Ok(BTreeMap::new());
        }

        let mut finals: BTreeMap<String, Assignment> = BTreeMap::new();
        let mut teams_by_subject: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for (source, teams) in &groups {
            info!(
                source_type = self.fetcher.scope().as_str(),
                source = %source,
                count = teams.len(),
                "Processing teams"
            );

            for team in teams {
                let Some(cost_center) = self.namer.cost_center_for(source, team) else {
                    debug!(team = %team.slug, "Skipping team without cost center");
                    continue;
                };

                let members = self.fetcher.fetch_members(source, &team.slug).await?;
                if members.is_empty() {
                    info!(team = %team.slug, "Team has no members, skipping");
                    continue;
                }

                let team_key = self.fetcher.team_key(source, &team.slug);
                for subject in &members {
                    teams_by_subject
                        .entry(subject.clone())
                        .or_default()
                        .push(team_key.clone());
                    finals.insert(
                        subject.clone(),
                        Assignment {
                            subject: subject.clone(),
                            cost_center: cost_center.clone(),
                            source: source.clone(),
                            team_slug: team.slug.clone()
                        }
                    );
                }

                info!(
                    team = %team.name,
                    key = %team_key,
                    cost_center = %cost_center,
                    members = members.len(),
                    "Team assignment"
                );
            }
        }

        let conflicts = summarize_conflicts(&teams_by_subject, &finals);
        if conflicts.total() > 0 {
            warn!(count = conflicts.total(), "Users in multiple teams, last team wins");
            for (subject, teams, winner) in &conflicts.listed {
                warn!(
                    user = %subject,
                    teams = %teams.join(", "),
                    assigned_to = %winner,
                    "Multi-team user"
                );
            }
            if conflicts.remaining > 0 {
                warn!(remaining = conflicts.remaining, "More multi-team users not shown");
            }
        }

        let unique_subjects = finals.len();
        let mut assignments: BTreeMap<String, Vec<Assignment>> = BTreeMap::new();
        for assignment in finals.into_values() {
            assignments
                .entry(assignment.cost_center.clone())
                .or_default()
                .push(assignment);
        }

        info!(
            cost_centers = assignments.len(),
            unique_users = unique_subjects,
            "Team assignment summary"
        );
        Ok(assignments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn team(slug: &str, name: &str) -> Team {
        Team {
            id: 1,
            name: name.to_string(),
            slug: slug.to_string(),
            description: None
        }
    }

    fn teams_config(scope: TeamsScope, mode: &str) -> TeamsConfig {
        TeamsConfig {
            scope,
            mode: mode.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_auto_names() {
        let mut org = CostCenterNamer::new(&teams_config(TeamsScope::Organization, "auto"));
        assert_eq!(
            org.cost_center_for("org1", &team("team-a", "Team A")),
            Some("[org team] org1/Team A".to_string())
        );

        let mut ent = CostCenterNamer::new(&teams_config(TeamsScope::Enterprise, "auto"));
        assert_eq!(
            ent.cost_center_for("acme", &team("platform", "Platform")),
            Some("[enterprise team] Platform".to_string())
        );
    }

    #[test]
    fn test_manual_mapping_keys() {
        let mut config = teams_config(TeamsScope::Organization, "manual");
        config
            .team_mappings
            .insert("org1/team-a".to_string(), "Engineering".to_string());
        let mut namer = CostCenterNamer::new(&config);

        assert_eq!(
            namer.cost_center_for("org1", &team("team-a", "Team A")),
            Some("Engineering".to_string())
        );
        assert_eq!(namer.cost_center_for("org2", &team("team-a", "Team A")), None);

        let mut config = teams_config(TeamsScope::Enterprise, "manual");
        config
            .team_mappings
            .insert("platform".to_string(), "Platform CC".to_string());
        let mut namer = CostCenterNamer::new(&config);
        assert_eq!(
            namer.cost_center_for("acme", &team("platform", "Platform")),
            Some("Platform CC".to_string())
        );
    }

    #[test]
    fn test_unknown_mode_yields_none() {
        let mut namer = CostCenterNamer::new(&teams_config(TeamsScope::Organization, "fancy"));
        assert_eq!(namer.mode(), &NamingMode::Unknown("fancy".to_string()));
        assert_eq!(namer.cost_center_for("org1", &team("team-a", "Team A")), None);
    }

    #[test]
    fn test_mode_parse_is_case_insensitive() {
        assert_eq!(NamingMode::parse("Manual"), NamingMode::Manual);
        assert_eq!(NamingMode::parse(" auto "), NamingMode::Auto);
    }

    #[test]
    fn test_summarize_conflicts_caps_listing() {
        let mut teams_by_subject = BTreeMap::new();
        let mut finals = BTreeMap::new();
        for i in 0..13 {
            let subject = format!("user{:02}", i);
            teams_by_subject.insert(
                subject.clone(),
                vec!["org1/a".to_string(), "org1/b".to_string()]
            );
            finals.insert(
                subject.clone(),
                Assignment {
                    subject: subject.clone(),
                    cost_center: "B".to_string(),
                    source: "org1".to_string(),
                    team_slug: "b".to_string()
                }
            );
        }
        teams_by_subject.insert("solo".to_string(), vec!["org1/a".to_string()]);

        let report = summarize_conflicts(&teams_by_subject, &finals);
        assert_eq!(report.listed.len(), CONFLICT_REPORT_LIMIT);
        assert_eq!(report.remaining, 3);
        assert_eq!(report.total(), 13);
        assert_eq!(report.listed[0].0, "user00");
        assert_eq!(report.listed[0].2, "B");
    }
}

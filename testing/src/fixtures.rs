use config::{Config, GitHubConfig, TeamsConfig, TeamsScope};
use std::sync::atomic::{AtomicU32, Ordering};

pub const TEST_ENTERPRISE: &str = "test-enterprise";

static TEST_COUNTER: AtomicU32 = AtomicU32::new(0);

pub fn unique_id(prefix: &str) -> String {
    let id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("{}-{}", prefix, id)
}

/// Organization scope, auto naming, auto-creation on, full sync on.
pub fn org_config(organizations: &[&str]) -> Config {
    Config {
        github: GitHubConfig {
            enterprise: TEST_ENTERPRISE.to_string(),
            ..Default::default()
        },
        teams: TeamsConfig {
            scope: TeamsScope::Organization,
            mode: "auto".to_string(),
            organizations: organizations.iter().map(|o| o.to_string()).collect(),
            auto_create_cost_centers: true,
            remove_users_no_longer_in_teams: true,
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Enterprise scope, auto naming, auto-creation on, full sync on.
pub fn enterprise_config() -> Config {
    let mut config = org_config(&[]);
    config.teams.scope = TeamsScope::Enterprise;
    config
}

/// Manual naming with the given `team key -> cost center` mappings.
pub fn manual_config(organizations: &[&str], mappings: &[(&str, &str)]) -> Config {
    let mut config = org_config(organizations);
    config.teams.mode = "manual".to_string();
    config.teams.team_mappings = mappings
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    config
}

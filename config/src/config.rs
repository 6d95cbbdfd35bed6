//! # Configuration Structures
//!
//! This module defines all configuration structures for the cost center
//! assignment tool.
//!
//! All configuration structures:
//! - Use `serde` for serialization/deserialization
//! - Use `validator` for input validation
//! - Default every section so a partial file is always loadable

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use validator::Validate;

/// Main configuration structure.
///
/// Aggregates the GitHub connection settings, the teams assignment settings,
/// budget creation, the durable cost center cache, HTTP retry policy and
/// logging.
///
/// ## Usage
/// ```rust,no_run
/// use config::Config;
///
/// let config = Config::default();
/// println!("API: {}", config.github.api_base_url);
/// ```
///
/// ## Validation
/// Nested sections are validated through `#[validate(nested)]`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default, PartialEq)]
pub struct Config {
    /// GitHub Enterprise connection settings
    #[serde(default)]
    #[validate(nested)]
    pub github: GitHubConfig,

    /// Teams-based assignment settings
    #[serde(default)]
    #[validate(nested)]
    pub teams: TeamsConfig,

    /// Budget creation for newly created cost centers
    #[serde(default)]
    #[validate(nested)]
    pub budgets: BudgetsConfig,

    /// Durable cost center lookup cache
    #[serde(default)]
    #[validate(nested)]
    pub cache: CacheConfig,

    /// HTTP retry and rate-limit policy
    #[serde(default)]
    #[validate(nested)]
    pub retry: RetryConfig,

    /// Log output settings
    #[serde(default)]
    #[validate(nested)]
    pub logging: LoggingConfig
}

/// GitHub Enterprise connection settings.
///
/// ## Fields
/// - `enterprise`: enterprise slug, required for every billing endpoint
/// - `api_base_url`: REST API root (default: "https://api.github.com")
/// - `timeout_seconds`: per-request timeout (default: 30)
/// - `token`: bearer token, only ever read from the environment
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct GitHubConfig {
    #[serde(default)]
    #[validate(length(min = 1, max = 100))]
    pub enterprise: String,

    #[serde(default = "default_api_base_url")]
    #[validate(url)]
    pub api_base_url: String,

    #[serde(default = "default_timeout_seconds")]
    #[validate(range(min = 1, max = 300))]
    pub timeout_seconds: u64,

    #[serde(skip)]
    pub token: Option<String>
}

fn default_api_base_url() -> String {
    "https://api.github.com".to_string()
}

fn default_timeout_seconds() -> u64 {
    30
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            enterprise: String::new(),
            api_base_url: default_api_base_url(),
            timeout_seconds: default_timeout_seconds(),
            token: None
        }
    }
}

/// Granularity at which teams are enumerated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TeamsScope {
    #[default]
    Organization,
    Enterprise
}

impl TeamsScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Organization => "organization",
            Self::Enterprise => "enterprise"
        }
    }
}

impl std::fmt::Display for TeamsScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Teams-based assignment settings.
///
/// `mode` is kept as a free-form string: an unrecognised value is reported
/// by the resolver at run time instead of failing the load.
///
/// `team_mappings` keys are `org/team-slug` in organization scope and the
/// bare `team-slug` in enterprise scope.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct TeamsConfig {
    #[serde(default)]
    pub scope: TeamsScope,

    #[serde(default = "default_teams_mode")]
    pub mode: String,

    #[serde(default)]
    pub organizations: Vec<String>,

    #[serde(default)]
    pub auto_create_cost_centers: bool,

    #[serde(default = "default_remove_users")]
    pub remove_users_no_longer_in_teams: bool,

    #[serde(default)]
    pub team_mappings: BTreeMap<String, String>
}

fn default_teams_mode() -> String {
    "auto".to_string()
}

fn default_remove_users() -> bool {
    true
}

impl Default for TeamsConfig {
    fn default() -> Self {
        Self {
            scope: TeamsScope::default(),
            mode: default_teams_mode(),
            organizations: Vec::new(),
            auto_create_cost_centers: false,
            remove_users_no_longer_in_teams: default_remove_users(),
            team_mappings: BTreeMap::new()
        }
    }
}

/// Budget creation settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, PartialEq)]
pub struct BudgetsConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Product or SKU name -> budget
    #[serde(default)]
    pub products: BTreeMap<String, ProductBudget>
}

/// A budget attached to a cost center at creation time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductBudget {
    pub amount: u64,

    #[serde(default = "default_product_enabled")]
    pub enabled: bool
}

fn default_product_enabled() -> bool {
    true
}

/// Durable cost center cache settings.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct CacheConfig {
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,

    #[serde(default = "default_cache_directory")]
    pub directory: PathBuf,

    #[serde(default = "default_ttl_hours")]
    #[validate(range(min = 1, max = 8760))]
    pub ttl_hours: u32
}

fn default_cache_enabled() -> bool {
    true
}

fn default_cache_directory() -> PathBuf {
    PathBuf::from(".cache")
}

fn default_ttl_hours() -> u32 {
    24
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            directory: default_cache_directory(),
            ttl_hours: default_ttl_hours()
        }
    }
}

/// HTTP retry policy.
///
/// ## Fields
/// - `max_attempts`: attempt budget shared by network errors and 5xx
///   responses (default: 3)
/// - `backoff_base_ms`: first backoff delay, doubled per attempt
///   (default: 1000)
/// - `rate_limit_fallback_ms`: wait used when a 429 carries no reset header
///   (default: 60000)
/// - `max_rate_limit_waits`: optional cap on consecutive 429 waits; unset
///   means wait for as long as the service keeps answering 429
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    #[validate(range(min = 1, max = 10))]
    pub max_attempts: u32,

    #[serde(default = "default_backoff_base_ms")]
    #[validate(range(max = 60000))]
    pub backoff_base_ms: u64,

    #[serde(default = "default_rate_limit_fallback_ms")]
    #[validate(range(max = 3600000))]
    pub rate_limit_fallback_ms: u64,

    #[serde(default)]
    pub max_rate_limit_waits: Option<u32>
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    1000
}

fn default_rate_limit_fallback_ms() -> u64 {
    60000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            rate_limit_fallback_ms: default_rate_limit_fallback_ms(),
            max_rate_limit_waits: None
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_level")]
    #[validate(custom(function = "validate_logging_level"))]
    pub level: String
}

fn default_logging_level() -> String {
    "info".to_string()
}

fn validate_logging_level(value: &str) -> Result<(), validator::ValidationError> {
    match value {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(validator::ValidationError::new("Invalid logging level"))
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_logging_level()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.github.api_base_url, "https://api.github.com");
        assert_eq!(config.teams.scope, TeamsScope::Organization);
        assert_eq!(config.teams.mode, "auto");
        assert!(config.teams.remove_users_no_longer_in_teams);
        assert!(!config.teams.auto_create_cost_centers);
        assert_eq!(config.cache.ttl_hours, 24);
        assert_eq!(config.cache.directory, PathBuf::from(".cache"));
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.backoff_base_ms, 1000);
        assert_eq!(config.retry.rate_limit_fallback_ms, 60000);
        assert!(config.retry.max_rate_limit_waits.is_none());
    }

    #[test]
    fn test_scope_serialization() {
        assert_eq!(
            serde_json::to_string(&TeamsScope::Enterprise).unwrap(),
            "\"enterprise\""
        );
        let scope: TeamsScope = serde_json::from_str("\"organization\"").unwrap();
        assert_eq!(scope, TeamsScope::Organization);
    }

    #[test]
    fn test_token_is_never_serialized() {
        let mut config = Config::default();
        config.github.token = Some("ghp_secret".to_string());
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("ghp_secret"));
    }

    #[test]
    fn test_unknown_mode_is_accepted_at_load() {
        let teams: TeamsConfig = serde_json::from_str(r#"{"mode": "bogus"}"#).unwrap();
        assert_eq!(teams.mode, "bogus");
    }

    #[test]
    fn test_product_budget_enabled_by_default() {
        let budget: ProductBudget = serde_json::from_str(r#"{"amount": 100}"#).unwrap();
        assert!(budget.enabled);
        assert_eq!(budget.amount, 100);
    }
}

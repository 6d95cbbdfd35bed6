//! # Configuration Precedence
//!
//! Merges configuration from multiple sources with precedence rules.
//!
//! # Precedence Order
//! 1. CLI arguments (highest priority)
//! 2. Environment variables
//! 3. Configuration file
//! 4. Default values (lowest priority)

use crate::config::Config;
use crate::file_loader::{ConfigFileError, load_from_file};
use crate::loader::EnvOverrides;
use std::path::Path;
use tracing::debug;

/// Settings that command-line flags can force.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CliOverrides {
    /// `--create-cost-centers`
    pub auto_create_cost_centers: bool,
    /// `--verbose`
    pub log_level: Option<String>
}

/// Error produced while resolving the effective configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    File(#[from] ConfigFileError),

    #[error("Invalid configuration: {0}")]
    Invalid(#[from] validator::ValidationErrors)
}

/// Merge environment and CLI overrides into a file-or-default configuration.
///
/// Every applied override is logged at debug level with its source name.
pub fn merge_configs(mut base: Config, env: &EnvOverrides, cli: &CliOverrides) -> Config {
    let mut changes = Vec::new();

    if let Some(token) = &env.token {
        base.github.token = Some(token.clone());
        changes.push(("github.token", "env"));
    }
    if let Some(enterprise) = &env.enterprise {
        base.github.enterprise = enterprise.clone();
        changes.push(("github.enterprise", "env"));
    }
    if let Some(url) = &env.api_base_url {
        base.github.api_base_url = url.clone();
        changes.push(("github.api_base_url", "env"));
    }
    if let Some(dir) = &env.cache_directory {
        base.cache.directory = dir.clone();
        changes.push(("cache.directory", "env"));
    }
    if let Some(level) = &env.log_level {
        base.logging.level = level.clone();
        changes.push(("logging.level", "env"));
    }

    if cli.auto_create_cost_centers && !base.teams.auto_create_cost_centers {
        base.teams.auto_create_cost_centers = true;
        changes.push(("teams.auto_create_cost_centers", "cli"));
    }
    if let Some(level) = &cli.log_level {
        base.logging.level = level.clone();
        changes.push(("logging.level", "cli"));
    }

    for (field, source) in changes {
        debug!(field, source, "Configuration override applied");
    }

    base
}

/// Resolve the effective configuration.
///
/// When `path` does not exist and `required` is false the defaults are used,
/// so the tool runs with environment-only configuration. The merged result
/// is validated before it is returned.
pub fn resolve(
    path: &Path,
    required: bool,
    env: &EnvOverrides,
    cli: &CliOverrides
) -> Result<Config, ConfigError> {
    let base = if path.exists() || required {
        load_from_file(path)?
    } else {
        debug!(path = %path.display(), "No configuration file, using defaults");
        Config::default()
    };

    let config = merge_configs(base, env, cli);
    crate::validator::validate(&config)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_env_overrides_file_values() {
        let mut base = Config::default();
        base.github.enterprise = "from-file".to_string();

        let env = EnvOverrides {
            enterprise: Some("from-env".to_string()),
            token: Some("t0k3n".to_string()),
            cache_directory: Some(PathBuf::from("/var/cache/cc")),
            ..Default::default()
        };

        let merged = merge_configs(base, &env, &CliOverrides::default());
        assert_eq!(merged.github.enterprise, "from-env");
        assert_eq!(merged.github.token.as_deref(), Some("t0k3n"));
        assert_eq!(merged.cache.directory, PathBuf::from("/var/cache/cc"));
    }

    #[test]
    fn test_cli_overrides_env() {
        let env = EnvOverrides {
            log_level: Some("warn".to_string()),
            ..Default::default()
        };
        let cli = CliOverrides {
            auto_create_cost_centers: true,
            log_level: Some("debug".to_string())
        };

        let merged = merge_configs(Config::default(), &env, &cli);
        assert_eq!(merged.logging.level, "debug");
        assert!(merged.teams.auto_create_cost_centers);
    }

    #[test]
    fn test_cli_flag_never_disables_auto_create() {
        let mut base = Config::default();
        base.teams.auto_create_cost_centers = true;

        let merged = merge_configs(base, &EnvOverrides::default(), &CliOverrides::default());
        assert!(merged.teams.auto_create_cost_centers);
    }

    #[test]
    fn test_resolve_missing_optional_file_uses_env() {
        let dir = TempDir::new().unwrap();
        let env = EnvOverrides {
            enterprise: Some("acme".to_string()),
            ..Default::default()
        };

        let config = resolve(
            &dir.path().join("config.yaml"),
            false,
            &env,
            &CliOverrides::default()
        )
        .unwrap();
        assert_eq!(config.github.enterprise, "acme");
    }

    #[test]
    fn test_resolve_missing_required_file_fails() {
        let dir = TempDir::new().unwrap();
        let result = resolve(
            &dir.path().join("config.yaml"),
            true,
            &EnvOverrides::default(),
            &CliOverrides::default()
        );
        assert!(matches!(
            result,
            Err(ConfigError::File(ConfigFileError::FileNotFound(_)))
        ));
    }

    #[test]
    fn test_resolve_rejects_missing_enterprise() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "teams:\n  mode: auto\n").unwrap();

        let result = resolve(&path, true, &EnvOverrides::default(), &CliOverrides::default());
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_resolve_rejects_bad_log_level() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "github:\n  enterprise: acme\nlogging:\n  level: loud\n").unwrap();

        let result = resolve(&path, true, &EnvOverrides::default(), &CliOverrides::default());
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }
}

//! # Environment Variable Loader
//!
//! Reads the handful of settings that may come from the environment.
//!
//! # Variables
//! - `GITHUB_TOKEN`, then `GH_TOKEN`: bearer token (the `gh` CLI injects
//!   these when running extensions)
//! - `GITHUB_ENTERPRISE`: enterprise slug
//! - `GITHUB_API_BASE_URL`: REST API root
//! - `COST_CENTER_CACHE_DIR`: cache directory
//! - `COST_CENTER_LOG_LEVEL`: logging level

use std::env;
use std::path::PathBuf;

/// Settings found in the environment. `None` means "not set".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvOverrides {
    pub token: Option<String>,
    pub enterprise: Option<String>,
    pub api_base_url: Option<String>,
    pub cache_directory: Option<PathBuf>,
    pub log_level: Option<String>
}

/// Load overrides from environment variables.
///
/// Empty values are treated as unset.
pub fn load_from_env() -> EnvOverrides {
    EnvOverrides {
        token: non_empty_env("GITHUB_TOKEN").or_else(|| non_empty_env("GH_TOKEN")),
        enterprise: non_empty_env("GITHUB_ENTERPRISE"),
        api_base_url: non_empty_env("GITHUB_API_BASE_URL"),
        cache_directory: non_empty_env("COST_CENTER_CACHE_DIR").map(PathBuf::from),
        log_level: non_empty_env("COST_CENTER_LOG_LEVEL")
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: [&str; 6] = [
        "GITHUB_TOKEN",
        "GH_TOKEN",
        "GITHUB_ENTERPRISE",
        "GITHUB_API_BASE_URL",
        "COST_CENTER_CACHE_DIR",
        "COST_CENTER_LOG_LEVEL"
    ];

    fn clear_vars() {
        for var in VARS {
            unsafe {
                env::remove_var(var);
            }
        }
    }

    #[test]
    #[serial]
    fn test_load_from_env_empty() {
        clear_vars();
        assert_eq!(load_from_env(), EnvOverrides::default());
    }

    #[test]
    #[serial]
    fn test_load_from_env_overrides() {
        clear_vars();
        unsafe {
            env::set_var("GITHUB_ENTERPRISE", "acme");
            env::set_var("GITHUB_API_BASE_URL", "https://ghe.example.com/api/v3");
            env::set_var("COST_CENTER_CACHE_DIR", "/tmp/cc-cache");
            env::set_var("COST_CENTER_LOG_LEVEL", "debug");
        }

        let overrides = load_from_env();
        assert_eq!(overrides.enterprise.as_deref(), Some("acme"));
        assert_eq!(
            overrides.api_base_url.as_deref(),
            Some("https://ghe.example.com/api/v3")
        );
        assert_eq!(
            overrides.cache_directory,
            Some(PathBuf::from("/tmp/cc-cache"))
        );
        assert_eq!(overrides.log_level.as_deref(), Some("debug"));
        clear_vars();
    }

    #[test]
    #[serial]
    fn test_github_token_preferred_over_gh_token() {
        clear_vars();
        unsafe {
            env::set_var("GH_TOKEN", "from-gh");
        }
        assert_eq!(load_from_env().token.as_deref(), Some("from-gh"));

        unsafe {
            env::set_var("GITHUB_TOKEN", "from-github");
        }
        assert_eq!(load_from_env().token.as_deref(), Some("from-github"));
        clear_vars();
    }

    #[test]
    #[serial]
    fn test_blank_values_are_unset() {
        clear_vars();
        unsafe {
            env::set_var("GITHUB_ENTERPRISE", "   ");
        }
        assert!(load_from_env().enterprise.is_none());
        clear_vars();
    }
}

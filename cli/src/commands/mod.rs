pub mod assign;
pub mod cache;
pub mod report;

use crate::logging::LogHandle;
use crate::ux_error;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::{CliOverrides, Config, load_from_env, load_from_file, merge_configs, resolve};
use cost_center::{CostCenterCache, GitHubClient};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

const DEFAULT_CONFIG_PATH: &str = "config/config.yaml";

#[derive(Parser)]
#[command(
    name = "gh-cost-center",
    author,
    version,
    about = "Assign GitHub Enterprise users to cost centers from team membership",
    long_about = "Reconciles GitHub Enterprise cost center membership with organization or \
                  enterprise teams.\n\nRun `assign --mode plan` first to preview changes, then \
                  `assign --mode apply` to push them."
)]
pub struct Cli {
    /// Configuration file (.yaml, .yml or .toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Assign users to cost centers based on team membership")]
    Assign(assign::AssignArgs),

    #[command(about = "Show the teams-based cost center summary")]
    Report(report::ReportArgs),

    #[command(about = "Inspect or maintain the cost center cache")]
    Cache(cache::CacheArgs)
}

pub async fn run(cli: Cli, logging: &LogHandle) -> Result<()> {
    let globals = Globals {
        config: cli.config,
        verbose: cli.verbose
    };

    match cli.command {
        Commands::Assign(args) => assign::run(args, &globals, logging).await,
        Commands::Report(args) => report::run(args, &globals, logging).await,
        Commands::Cache(args) => cache::run(args, &globals)
    }
}

/// Flags shared by every subcommand.
pub struct Globals {
    pub config: Option<PathBuf>,
    pub verbose: bool
}

impl Globals {
    fn config_path(&self) -> &Path {
        self.config
            .as_deref()
            .unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH))
    }

    fn cli_overrides(&self, auto_create_cost_centers: bool) -> CliOverrides {
        CliOverrides {
            auto_create_cost_centers,
            log_level: self.verbose.then(|| "debug".to_string())
        }
    }

    /// Fully validated configuration. An explicit `--config` must exist.
    pub fn load_config(&self, auto_create_cost_centers: bool, logging: &LogHandle) -> Result<Config> {
        let path = self.config_path();
        let config = resolve(
            path,
            self.config.is_some(),
            &load_from_env(),
            &self.cli_overrides(auto_create_cost_centers)
        )
        .with_context(|| format!("loading configuration from {}", path.display()))?;

        logging.apply_level(&config.logging.level);
        debug!(path = %path.display(), "Configuration loaded");
        Ok(config)
    }

    /// Configuration for commands that never call the API: parsed and
    /// merged, but not validated.
    pub fn load_config_unvalidated(&self) -> Result<Config> {
        let path = self.config_path();
        let base = if path.exists() || self.config.is_some() {
            load_from_file(path)
                .with_context(|| format!("loading configuration from {}", path.display()))?
        } else {
            Config::default()
        };
        Ok(merge_configs(base, &load_from_env(), &self.cli_overrides(false)))
    }
}

pub fn open_cache(config: &Config) -> Option<Arc<CostCenterCache>> {
    config.cache.enabled.then(|| {
        Arc::new(CostCenterCache::new(&config.cache.directory).with_ttl_hours(config.cache.ttl_hours))
    })
}

pub fn build_client(config: &Config, cache: Option<&Arc<CostCenterCache>>) -> Result<GitHubClient> {
    if config.github.token.is_none() {
        return Err(ux_error::missing_token().into());
    }

    let client = GitHubClient::new(&config.github, &config.retry)
        .context("creating GitHub client")?;
    Ok(match cache {
        Some(cache) => client.with_cache(Arc::clone(cache)),
        None => client
    })
}

//! # Configuration System
//!
//! Configuration management for the cost center assignment tool.
//!
//! This crate provides:
//! - Configuration structures for the GitHub connection, teams assignment,
//!   budgets, cache, retry policy and logging
//! - Environment variable loading
//! - Configuration file loading (TOML/YAML)
//! - Configuration precedence (CLI > env > file > defaults)
//! - Configuration validation

pub mod config;
pub mod file_loader;
pub mod loader;
pub mod precedence;
pub mod validator;

pub use config::{
    BudgetsConfig, CacheConfig, Config, GitHubConfig, LoggingConfig, ProductBudget, RetryConfig,
    TeamsConfig, TeamsScope,
};
pub use file_loader::{ConfigFileError, load_from_file, load_from_toml, load_from_yaml};
pub use loader::{EnvOverrides, load_from_env};
pub use precedence::{CliOverrides, ConfigError, merge_configs, resolve};
pub use validator::validate;

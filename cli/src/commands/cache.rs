//! Cache command - inspect and maintain the durable cost center cache

use anyhow::{Context, Result};
use clap::{Args, CommandFactory};
use colored::Colorize;
use cost_center::CostCenterCache;

use super::{Cli, Globals};
use crate::output;

#[derive(Args)]
pub struct CacheArgs {
    /// Show cache statistics
    #[arg(long)]
    pub stats: bool,

    /// Clear the entire cache
    #[arg(long)]
    pub clear: bool,

    /// Remove expired cache entries
    #[arg(long)]
    pub cleanup: bool
}

pub fn run(args: CacheArgs, globals: &Globals) -> Result<()> {
    if !args.stats && !args.clear && !args.cleanup {
        let mut cmd = Cli::command();
        if let Some(sub) = cmd.find_subcommand_mut("cache") {
            sub.print_help()?;
        }
        return Ok(());
    }

    let config = globals.load_config_unvalidated()?;
    if !config.cache.enabled {
        output::warn("Cache is disabled in configuration (cache.enabled = false)");
    }
    let cache =
        CostCenterCache::new(&config.cache.directory).with_ttl_hours(config.cache.ttl_hours);

    if args.stats {
        print_stats(&cache);
    }
    if args.clear {
        cache.clear().context("clearing cache")?;
        output::success("Cache cleared");
    }
    if args.cleanup {
        let removed = cache.cleanup_expired().context("cleaning up cache")?;
        output::success(&format!(
            "Removed {} expired entries, {} remaining",
            removed,
            cache.stats().total
        ));
    }

    Ok(())
}

fn print_stats(cache: &CostCenterCache) {
    let stats = cache.stats();

    println!();
    output::header("Cost Center Cache");
    println!();
    output::field("Cache file", stats.file_path.display());
    output::field("File size", format!("{} bytes", stats.size_bytes));
    output::field("Total entries", stats.total);
    output::field("Valid entries", stats.valid.to_string().green());
    output::field("Expired entries", stats.expired.to_string().yellow());
    println!();

    if stats.expired > 0 {
        output::hint("Run `gh-cost-center cache --cleanup` to drop expired entries");
    }
}

//! Report command - teams-based cost center summary

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use cost_center::{BillingApi, Summary, TeamsManager};
use std::sync::Arc;

use super::{Globals, build_client, open_cache};
use crate::logging::LogHandle;
use crate::output;

#[derive(Args)]
pub struct ReportArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool
}

pub async fn run(args: ReportArgs, globals: &Globals, logging: &LogHandle) -> Result<()> {
    let config = globals.load_config(false, logging)?;
    let cache = open_cache(&config);
    let api: Arc<dyn BillingApi> = Arc::new(build_client(&config, cache.as_ref())?);

    let mut manager = TeamsManager::new(api, &config);
    let summary = manager
        .generate_summary()
        .await
        .context("generating teams summary")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    print_summary(&summary, &config.github.enterprise);
    Ok(())
}

fn print_summary(summary: &Summary, enterprise: &str) {
    println!();
    output::header("Teams Cost Center Summary");
    println!();
    output::field("Enterprise", enterprise);
    output::field("Scope", summary.scope);
    output::field("Mode", &summary.mode);
    output::field(
        if summary.sources.len() == 1 {
            "Source"
        } else {
            "Sources"
        },
        summary.sources.join(", ")
    );
    output::field("Teams", summary.total_teams);
    output::field("Cost centers", summary.total_cost_centers);
    output::field("Unique users", summary.unique_subjects);
    println!();

    if summary.cost_centers.is_empty() {
        output::warn("No cost center assignments resolved from teams");
        return;
    }

    output::subheader("Users per cost center");
    let width = summary
        .cost_centers
        .keys()
        .map(|name| name.chars().count())
        .max()
        .unwrap_or(0);
    for (name, count) in &summary.cost_centers {
        println!(
            "  {:<width$}  {}",
            name,
            count.to_string().cyan(),
            width = width
        );
    }
    println!();
}

//! Assign command - reconcile cost center membership with teams
//!
//! Plan mode resolves and previews everything read-only. Apply mode asks
//! for confirmation (unless `--yes`) after showing the same preview, then
//! creates missing cost centers, adds members and removes stale ones.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use config::Config;
use console::Term;
use cost_center::{BillingApi, SubjectFilter, SyncMode, SyncReport, TeamsManager};
use dialoguer::{Input, theme::ColorfulTheme};
use std::sync::Arc;
use tracing::info;

use super::{Globals, build_client, open_cache};
use crate::logging::LogHandle;
use crate::output;

#[derive(Args)]
pub struct AssignArgs {
    /// Execution mode: plan (preview) or apply (push changes)
    #[arg(long, default_value = "plan")]
    pub mode: SyncMode,

    /// Skip the confirmation prompt in apply mode
    #[arg(long, short)]
    pub yes: bool,

    /// Create cost centers that do not exist yet
    #[arg(long)]
    pub create_cost_centers: bool,

    /// Create the configured budgets for newly created cost centers
    #[arg(long)]
    pub create_budgets: bool,

    /// Skip users that already belong to another cost center
    #[arg(long)]
    pub check_current: bool,

    /// Comma-separated list of logins to process
    #[arg(long, value_name = "LOGINS")]
    pub users: Option<String>
}

pub async fn run(args: AssignArgs, globals: &Globals, logging: &LogHandle) -> Result<()> {
    let config = globals.load_config(args.create_cost_centers, logging)?;
    print_config(&config, &args);

    if args.create_budgets && !config.budgets.enabled {
        output::warn("--create-budgets has no effect while budgets.enabled is false");
    }

    let cache = open_cache(&config);
    let api: Arc<dyn BillingApi> = Arc::new(build_client(&config, cache.as_ref())?);

    let mut manager = TeamsManager::new(api, &config).with_budgets(args.create_budgets);
    if let Some(cache) = &cache {
        manager = manager.with_cache(Arc::clone(cache));
    }
    if let Some(users) = &args.users {
        manager = manager.with_subject_filter(SubjectFilter::parse(users));
    }

    // Moving users out of their current cost center is the fast path.
    let ignore_current = !args.check_current;

    if args.mode == SyncMode::Apply && !args.yes {
        let preview = manager
            .sync(SyncMode::Plan, ignore_current)
            .await
            .context("planning team assignments")?;
        print_plan(&preview);

        if preview.planned.is_empty() {
            output::warn("Nothing to apply");
            return Ok(());
        }
        if !confirm_apply(&preview, args.check_current).await? {
            output::warn("Aborted, no changes were made");
            return Ok(());
        }
    }

    info!(mode = %args.mode, "Starting teams-based assignment");
    let report = manager
        .sync(args.mode, ignore_current)
        .await
        .context("syncing team assignments")?;

    match args.mode {
        SyncMode::Plan => {
            print_plan(&report);
            output::hint("Run with --mode apply to push these changes");
        }
        SyncMode::Apply => print_results(&report)
    }

    Ok(())
}

fn print_config(config: &Config, args: &AssignArgs) {
    let teams = &config.teams;

    println!();
    output::header("Teams Cost Center Assignment");
    println!();
    output::field("Enterprise", &config.github.enterprise);
    output::field("Scope", teams.scope);
    output::field("Mode", &teams.mode);
    if !teams.organizations.is_empty() {
        output::field("Organizations", teams.organizations.join(", "));
    }
    output::field("Execution", args.mode.to_string().to_uppercase());
    output::field("Auto-create cost centers", teams.auto_create_cost_centers);
    output::field("Full sync", teams.remove_users_no_longer_in_teams);
    output::field("Check current cost center", args.check_current);
    if let Some(users) = &args.users {
        output::field("Users", users);
    }
    println!();
}

fn print_plan(report: &SyncReport) {
    if report.planned.is_empty() {
        output::warn("No team assignments resolved");
        return;
    }

    output::subheader("Planned assignments");
    for planned in &report.planned {
        let marker = if planned.would_create {
            "+".green()
        } else {
            "=".dimmed()
        };
        let target = if planned.would_create {
            "(new)".green().to_string()
        } else {
            planned.cost_center_id.dimmed().to_string()
        };
        println!(
            "  {} {} {} {} users",
            marker,
            planned.cost_center,
            target,
            planned.subjects.to_string().cyan()
        );
    }
    println!();

    if report.stale_count() > 0 {
        output::subheader("Users no longer in their team");
        for (id, subjects) in &report.stale {
            println!(
                "  {} {} {}",
                "-".yellow(),
                report.name_of(id),
                subjects.join(", ").dimmed()
            );
        }
        println!();
    }

    print_issues(report);
}

fn print_results(report: &SyncReport) {
    output::subheader("Assignment results");
    for (id, results) in &report.results {
        let ok = results.values().filter(|ok| **ok).count();
        output::tally(report.name_of(id), ok, results.len() - ok);
    }
    println!();

    let failed = report.failed_subjects();
    if !failed.is_empty() {
        output::subheader("Failed users");
        for (id, subject) in &failed {
            println!("  {} {} ({})", "✗".red(), subject, report.name_of(id));
        }
        println!();
    }

    if report.stale_count() > 0 {
        if report.removed > 0 {
            output::info(&format!(
                "Removed {} of {} users no longer in their team",
                report.removed,
                report.stale_count()
            ));
        } else {
            output::warn(&format!(
                "{} users are no longer in their team and were kept (full sync disabled)",
                report.stale_count()
            ));
        }
    }

    print_issues(report);

    let total = report.successful() + report.failed();
    if report.has_errors() {
        output::warn(&format!(
            "Completed with errors: {}/{} users assigned, {} issues",
            report.successful(),
            total,
            report.issues.len()
        ));
    } else {
        output::success(&format!("{}/{} users assigned", report.successful(), total));
    }
}

fn print_issues(report: &SyncReport) {
    if report.issues.is_empty() {
        return;
    }
    output::subheader("Issues");
    for issue in &report.issues {
        println!(
            "  {} {} {}: {}",
            "!".red(),
            issue.entity_type.dimmed(),
            issue.entity_id,
            issue.error
        );
    }
    println!();
}

async fn confirm_apply(preview: &SyncReport, check_current: bool) -> Result<bool> {
    let users: usize = preview.planned.iter().map(|p| p.subjects).sum();
    output::warn(&format!(
        "About to assign {} users across {} cost centers",
        users,
        preview.planned.len()
    ));
    if !check_current {
        output::info("Users already in another cost center will be moved (use --check-current to skip them)");
    }

    let answer = tokio::task::spawn_blocking(|| {
        Input::<String>::with_theme(&ColorfulTheme::default())
            .with_prompt("Type 'apply' to continue")
            .allow_empty(true)
            .interact_text_on(&Term::stderr())
    })
    .await
    .context("confirmation prompt")??;

    Ok(is_confirmation(&answer))
}

fn is_confirmation(answer: &str) -> bool {
    answer.trim().eq_ignore_ascii_case("apply")
}

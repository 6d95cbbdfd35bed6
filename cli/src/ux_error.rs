use colored::Colorize;
use config::ConfigError;
use cost_center::CostCenterError;

#[derive(Debug, Clone)]
pub struct UxError {
    pub what: String,
    pub why: Option<String>,
    pub how_to_fix: Vec<String>,
    pub suggested_command: Option<String>,
}

impl UxError {
    pub fn new(what: impl Into<String>) -> Self {
        Self {
            what: what.into(),
            why: None,
            how_to_fix: Vec::new(),
            suggested_command: None,
        }
    }

    pub fn why(mut self, reason: impl Into<String>) -> Self {
        self.why = Some(reason.into());
        self
    }

    pub fn fix(mut self, suggestion: impl Into<String>) -> Self {
        self.how_to_fix.push(suggestion.into());
        self
    }

    pub fn suggest(mut self, cmd: impl Into<String>) -> Self {
        self.suggested_command = Some(cmd.into());
        self
    }

    pub fn display(&self) {
        eprintln!();
        eprintln!("{} {}", "error:".red().bold(), self.what.white().bold());

        if let Some(why) = &self.why {
            eprintln!("       {}", why.dimmed());
        }

        if !self.how_to_fix.is_empty() {
            eprintln!();
            eprintln!("{}", "How to fix:".yellow().bold());
            for (i, fix) in self.how_to_fix.iter().enumerate() {
                eprintln!("  {}. {}", i + 1, fix);
            }
        }

        if let Some(cmd) = &self.suggested_command {
            eprintln!();
            eprintln!("{}", "Try this:".green().bold());
            eprintln!("  $ {}", cmd.cyan());
        }
        eprintln!();
    }
}

impl std::fmt::Display for UxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.what)
    }
}

impl std::error::Error for UxError {}

pub fn missing_token() -> UxError {
    UxError::new("No GitHub token found")
        .why("Billing endpoints require an enterprise admin or billing manager token")
        .fix("Export GITHUB_TOKEN or GH_TOKEN")
        .fix("Or run through the gh CLI, which injects GH_TOKEN for extensions")
        .suggest("export GITHUB_TOKEN=$(gh auth token)")
}

pub fn config_error(detail: &str) -> UxError {
    UxError::new(format!("Invalid configuration: {}", detail))
        .why("The merged configuration from file, environment and flags did not validate")
        .fix("Check config/config.yaml or the file passed with --config")
        .fix("Set GITHUB_ENTERPRISE if the enterprise slug is missing")
        .suggest("gh-cost-center --config config/config.yaml report")
}

pub fn rate_limited(waits: u32) -> UxError {
    UxError::new("Rate limit exceeded")
        .why(format!("Still rate limited after {} waits", waits))
        .fix("Wait for the rate limit window to reset and run again")
        .fix("Raise or remove retry.max_rate_limit_waits")
}

pub fn budgets_unavailable(enterprise: &str) -> UxError {
    UxError::new(format!("Budgets API is not available for '{}'", enterprise))
        .why("The enterprise does not expose the billing budgets endpoints")
        .fix("Run without --create-budgets")
        .fix("Or set budgets.enabled to false")
}

pub fn api_error(status: u16, body: &str) -> UxError {
    let err = UxError::new(format!("GitHub API returned {}", status)).why(body.to_string());
    match status {
        401 => err
            .fix("Check that the token is valid and not expired")
            .suggest("gh auth status"),
        403 => err
            .fix("The token needs the manage_billing:enterprise scope")
            .fix("Or the account is not an enterprise owner or billing manager"),
        404 => err
            .fix("Check github.enterprise and the configured organizations")
            .fix("Check github.api_base_url for GitHub Enterprise Server"),
        _ => err.fix("Run again with --verbose for request details"),
    }
}

pub fn network_error(attempts: u32, detail: &str) -> UxError {
    UxError::new(format!("Network error after {} attempts", attempts))
        .why(detail.to_string())
        .fix("Check network connectivity to the GitHub API")
        .fix("Check github.api_base_url")
}

/// Presenter for errors the user can act on. `None` falls back to the
/// plain error chain.
pub fn from_error(err: &anyhow::Error) -> Option<UxError> {
    if let Some(ux) = err.downcast_ref::<UxError>() {
        return Some(ux.clone());
    }

    if let Some(ConfigError::Invalid(errors)) = err.downcast_ref::<ConfigError>() {
        return Some(config_error(&errors.to_string()));
    }

    let mut cost_center_err = err.downcast_ref::<CostCenterError>()?;
    while let CostCenterError::Context { source, .. } = cost_center_err {
        cost_center_err = source.as_ref();
    }

    match cost_center_err {
        CostCenterError::RateLimited { waits } => Some(rate_limited(*waits)),
        CostCenterError::BudgetsUnavailable { enterprise } => Some(budgets_unavailable(enterprise)),
        CostCenterError::Api { status, body } => Some(api_error(*status, body)),
        CostCenterError::Transient { attempts, source } => {
            Some(network_error(*attempts, &source.to_string()))
        }
        CostCenterError::Configuration(detail) => Some(config_error(detail)),
        _ => None,
    }
}

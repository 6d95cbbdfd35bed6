//! # Configuration Validation
//!
//! Field rules come from the `validator` derives on the configuration
//! structures. The checks here span several fields and cannot be expressed
//! as a single attribute.

use crate::config::{BudgetsConfig, Config, TeamsConfig};
use validator::{Validate, ValidationError, ValidationErrors};

/// Validate configuration structure.
///
/// ## Usage
/// ```rust,no_run
/// use config::{Config, validate};
///
/// let config = Config::default();
/// match validate(&config) {
///     Ok(()) => println!("Configuration is valid"),
///     Err(errors) => println!("Validation errors: {:?}", errors),
/// }
/// ```
///
/// ## Cross-field rules
/// - enabled budget products must have a non-zero amount
/// - manual team mappings must not map to an empty cost center name
pub fn validate(config: &Config) -> Result<(), ValidationErrors> {
    let mut errors = match config.validate() {
        Ok(()) => ValidationErrors::new(),
        Err(errors) => errors,
    };

    if let Err(e) = validate_budgets(&config.budgets) {
        errors.add("budgets", e);
    }
    if let Err(e) = validate_team_mappings(&config.teams) {
        errors.add("teams", e);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_budgets(budgets: &BudgetsConfig) -> Result<(), ValidationError> {
    if !budgets.enabled {
        return Ok(());
    }
    for (product, budget) in &budgets.products {
        if budget.enabled && budget.amount == 0 {
            let mut error = ValidationError::new("zero_budget_amount");
            error.add_param("product".into(), product);
            return Err(error);
        }
    }
    Ok(())
}

fn validate_team_mappings(teams: &TeamsConfig) -> Result<(), ValidationError> {
    for (key, name) in &teams.team_mappings {
        if key.trim().is_empty() || name.trim().is_empty() {
            let mut error = ValidationError::new("empty_team_mapping");
            error.add_param("key".into(), key);
            return Err(error);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProductBudget;

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.github.enterprise = "acme".to_string();
        config
    }

    #[test]
    fn test_valid_config() {
        assert!(validate(&valid_config()).is_ok());
    }

    #[test]
    fn test_missing_enterprise() {
        let config = Config::default();
        let errors = validate(&config).unwrap_err();
        assert!(errors.errors().contains_key("github"));
    }

    #[test]
    fn test_invalid_api_base_url() {
        let mut config = valid_config();
        config.github.api_base_url = "not a url".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_ttl_out_of_range() {
        let mut config = valid_config();
        config.cache.ttl_hours = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_retry_attempts_out_of_range() {
        let mut config = valid_config();
        config.retry.max_attempts = 0;
        assert!(validate(&config).is_err());

        config.retry.max_attempts = 11;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_budget_amount_rejected_when_enabled() {
        let mut config = valid_config();
        config.budgets.products.insert(
            "copilot".to_string(),
            ProductBudget {
                amount: 0,
                enabled: true,
            },
        );
        assert!(validate(&config).is_ok());

        config.budgets.enabled = true;
        let errors = validate(&config).unwrap_err();
        assert!(errors.errors().contains_key("budgets"));
    }

    #[test]
    fn test_disabled_product_with_zero_amount_is_fine() {
        let mut config = valid_config();
        config.budgets.enabled = true;
        config.budgets.products.insert(
            "actions".to_string(),
            ProductBudget {
                amount: 0,
                enabled: false,
            },
        );
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_empty_mapping_name_rejected() {
        let mut config = valid_config();
        config
            .teams
            .team_mappings
            .insert("org1/team-a".to_string(), "  ".to_string());
        let errors = validate(&config).unwrap_err();
        assert!(errors.errors().contains_key("teams"));
    }
}

use crate::cache::CacheError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CostCenterError>;

#[derive(Debug, Error)]
pub enum CostCenterError {
    #[error("Network error after {attempts} attempts: {source}")]
    Transient {
        attempts: u32,
        #[source]
        source: reqwest::Error
    },

    #[error("Still rate limited after {waits} waits")]
    RateLimited { waits: u32 },

    #[error("API error: {status} - {body}")]
    Api { status: u16, body: String },

    #[error("Failed to decode {context}: {source}")]
    Decode {
        context: String,
        #[source]
        source: serde_json::Error
    },

    #[error("Budgets API is not available for enterprise {enterprise}")]
    BudgetsUnavailable { enterprise: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Cost center not found: {name}")]
    CostCenterNotFound { name: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<CostCenterError>
    }
}

impl CostCenterError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transient { .. } | Self::RateLimited { .. } => true,
            Self::Api { status, .. } => matches!(status, 500 | 502 | 503 | 504),
            Self::Context { source, .. } => source.is_retryable(),
            _ => false
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Context { source, .. } => source.status(),
            _ => None
        }
    }

    /// Wrap with the operation that failed.
    pub fn context(self, context: impl Into<String>) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self)
        }
    }

    pub fn is_conflict(&self) -> bool {
        self.status() == Some(409)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_classification() {
        let conflict = CostCenterError::Api {
            status: 409,
            body: "exists".to_string()
        };
        assert!(conflict.is_conflict());
        assert!(!conflict.is_retryable());
        assert_eq!(conflict.status(), Some(409));

        let unavailable = CostCenterError::Api {
            status: 503,
            body: String::new()
        };
        assert!(unavailable.is_retryable());
        assert!(!unavailable.is_conflict());
    }

    #[test]
    fn test_context_keeps_classification() {
        let err = CostCenterError::Api {
            status: 409,
            body: String::new()
        }
        .context("creating cost center Platform");
        assert!(err.is_conflict());
        assert!(err.to_string().starts_with("creating cost center Platform: API error: 409"));
    }

    #[test]
    fn test_non_api_errors_have_no_status() {
        let err = CostCenterError::BudgetsUnavailable {
            enterprise: "acme".to_string()
        };
        assert_eq!(err.status(), None);
        assert!(!err.is_retryable());
        assert_eq!(
            err.to_string(),
            "Budgets API is not available for enterprise acme"
        );
    }
}

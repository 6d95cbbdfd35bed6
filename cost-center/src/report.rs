use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    #[default]
    Plan,
    Apply
}

impl SyncMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plan => "plan",
            Self::Apply => "apply"
        }
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "plan" => Ok(Self::Plan),
            "apply" => Ok(Self::Apply),
            other => Err(format!("invalid mode '{}', expected plan or apply", other))
        }
    }
}

/// Desired state for one cost center.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedAssignment {
    pub cost_center: String,
    pub cost_center_id: String,
    pub subjects: usize,
    pub would_create: bool
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncIssue {
    pub entity_type: String,
    pub entity_id: String,
    pub error: String,
    pub timestamp: DateTime<Utc>
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncReport {
    pub mode: SyncMode,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Cost center id -> subject -> success.
    pub results: BTreeMap<String, BTreeMap<String, bool>>,
    /// Cost center id -> display name.
    pub cost_center_names: BTreeMap<String, String>,
    pub planned: Vec<PlannedAssignment>,
    /// Cost center id -> members no longer in their team.
    pub stale: BTreeMap<String, Vec<String>>,
    pub removed: usize,
    pub issues: Vec<SyncIssue>
}

impl SyncReport {
    pub fn new(mode: SyncMode) -> Self {
        Self {
            mode,
            started_at: Utc::now(),
            ..Default::default()
        }
    }

    pub fn complete(&mut self) {
        self.completed_at = Some(Utc::now());
    }

    pub fn add_issue(&mut self, entity_type: &str, entity_id: &str, error: impl ToString) {
        self.issues.push(SyncIssue {
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            error: error.to_string(),
            timestamp: Utc::now()
        });
    }

    /// Display name for a cost center id, falling back to the id.
    pub fn name_of<'a>(&'a self, cost_center_id: &'a str) -> &'a str {
        self.cost_center_names
            .get(cost_center_id)
            .map(String::as_str)
            .unwrap_or(cost_center_id)
    }

    pub fn successful(&self) -> usize {
        self.results
            .values()
            .flat_map(BTreeMap::values)
            .filter(|ok| **ok)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.results
            .values()
            .flat_map(BTreeMap::values)
            .filter(|ok| !**ok)
            .count()
    }

    /// (cost center id, subject) pairs that failed.
    pub fn failed_subjects(&self) -> Vec<(&str, &str)> {
        self.results
            .iter()
            .flat_map(|(id, subjects)| {
                subjects
                    .iter()
                    .filter(|(_, ok)| !**ok)
                    .map(move |(subject, _)| (id.as_str(), subject.as_str()))
            })
            .collect()
    }

    pub fn stale_count(&self) -> usize {
        self.stale.values().map(Vec::len).sum()
    }

    pub fn has_errors(&self) -> bool {
        self.failed() > 0 || !self.issues.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parsing() {
        assert_eq!("plan".parse::<SyncMode>(), Ok(SyncMode::Plan));
        assert_eq!("APPLY".parse::<SyncMode>(), Ok(SyncMode::Apply));
        assert!("yolo".parse::<SyncMode>().is_err());
        assert_eq!(SyncMode::Apply.to_string(), "apply");
    }

    #[test]
    fn test_tallies() {
        let mut report = SyncReport::new(SyncMode::Apply);
        report.results.insert(
            "cc-1".to_string(),
            BTreeMap::from([("alice".to_string(), true), ("bob".to_string(), false)])
        );
        report
            .results
            .insert("cc-2".to_string(), BTreeMap::from([("carol".to_string(), true)]));

        assert_eq!(report.successful(), 2);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.failed_subjects(), vec![("cc-1", "bob")]);
        assert!(report.has_errors());
    }

    #[test]
    fn test_issues_count_as_errors() {
        let mut report = SyncReport::new(SyncMode::Plan);
        assert!(!report.has_errors());
        report.add_issue("cost_center", "Platform", "not found");
        assert!(report.has_errors());
        report.complete();
        assert!(report.completed_at.is_some());
    }

    #[test]
    fn test_name_of_falls_back_to_id() {
        let mut report = SyncReport::new(SyncMode::Apply);
        report
            .cost_center_names
            .insert("cc-1".to_string(), "Platform".to_string());
        assert_eq!(report.name_of("cc-1"), "Platform");
        assert_eq!(report.name_of("cc-2"), "cc-2");
    }
}

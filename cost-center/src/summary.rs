use crate::resolver::Assignment;
use config::TeamsScope;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Aggregate view of the resolved assignments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub mode: String,
    pub scope: TeamsScope,
    /// Configured organizations, or the enterprise slug in enterprise scope.
    pub sources: Vec<String>,
    pub total_teams: usize,
    pub total_cost_centers: usize,
    pub unique_subjects: usize,
    /// Cost center name -> subject count.
    pub cost_centers: BTreeMap<String, usize>
}

impl Summary {
    pub fn from_assignments(
        mode: &str,
        scope: TeamsScope,
        sources: Vec<String>,
        total_teams: usize,
        assignments: &BTreeMap<String, Vec<Assignment>>
    ) -> Self {
        let unique: BTreeSet<&str> = assignments
            .values()
            .flatten()
            .map(|a| a.subject.as_str())
            .collect();

        Self {
            mode: mode.to_string(),
            scope,
            sources,
            total_teams,
            total_cost_centers: assignments.len(),
            unique_subjects: unique.len(),
            cost_centers: assignments
                .iter()
                .map(|(name, subjects)| (name.clone(), subjects.len()))
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assignment(subject: &str, cost_center: &str) -> Assignment {
        Assignment {
            subject: subject.to_string(),
            cost_center: cost_center.to_string(),
            source: "org1".to_string(),
            team_slug: "team".to_string()
        }
    }

    #[test]
    fn test_summary_counts() {
        let mut assignments = BTreeMap::new();
        assignments.insert(
            "B".to_string(),
            vec![assignment("bob", "B"), assignment("carol", "B")]
        );
        assignments.insert("A".to_string(), vec![assignment("alice", "A")]);

        let summary = Summary::from_assignments(
            "auto",
            TeamsScope::Organization,
            vec!["org1".to_string()],
            2,
            &assignments
        );
        assert_eq!(summary.total_teams, 2);
        assert_eq!(summary.total_cost_centers, 2);
        assert_eq!(summary.unique_subjects, 3);
        assert_eq!(
            summary.cost_centers.keys().collect::<Vec<_>>(),
            vec!["A", "B"]
        );
        assert_eq!(summary.cost_centers["B"], 2);
    }
}

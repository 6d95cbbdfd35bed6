pub mod api;
pub mod budgets;
pub mod cache;
pub mod client;
pub mod error;
pub mod manager;
pub mod membership;
pub mod provisioner;
pub mod reconcile;
pub mod report;
pub mod resolver;
pub mod summary;

pub use api::{BillingApi, CostCenter, CostCenterRef, CostCenterResource, Team};
pub use budgets::{BudgetManager, BudgetOutcome};
pub use cache::{CacheEntry, CacheError, CacheStats, CostCenterCache};
pub use client::{BudgetType, GitHubClient, RetryPolicy, classify_product};
pub use error::{CostCenterError, Result};
pub use manager::{SubjectFilter, TeamsManager};
pub use membership::MembershipFetcher;
pub use provisioner::{CostCenterProvisioner, Provisioned, extract_existing_id};
pub use reconcile::{BATCH_SIZE, Reconciler};
pub use report::{PlannedAssignment, SyncIssue, SyncMode, SyncReport};
pub use resolver::{Assignment, AssignmentResolver, CostCenterNamer, NamingMode};
pub use summary::Summary;

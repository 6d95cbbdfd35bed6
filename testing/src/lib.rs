//! Shared test fixtures for the cost center workspace.
//!
//! Provides an in-memory [`cost_center::BillingApi`] with failure injection
//! and a call log, plus configuration builders for reconciliation tests.

mod fake;
mod fixtures;

pub use fake::*;
pub use fixtures::*;

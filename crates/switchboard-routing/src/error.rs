//! Routing-specific error types

use thiserror::Error;

use crate::catalog::TaskCategory;
use crate::policy::PolicyViolation;

/// Errors that can occur during model selection
#[derive(Debug, Error)]
pub enum RoutingError {
    /// The effective policy violates one or more invariants
    #[error("invalid policy: {}", join_violations(.violations))]
    Configuration { violations: Vec<PolicyViolation> },

    /// No allowed provider has any registered model
    #[error("no eligible model for task {task}: no allowed provider has a registered model")]
    NoEligibleModel { task: TaskCategory },

    /// A decision log could not be recorded
    #[error("failed to record decision: {0}")]
    DecisionLog(String),

    /// Free-text task category did not name a known category
    #[error("unknown task category: {0}")]
    UnknownTaskCategory(String),

    /// Engine configuration could not be applied
    #[error("invalid routing configuration: {0}")]
    InvalidConfig(String),
}

fn join_violations(violations: &[PolicyViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

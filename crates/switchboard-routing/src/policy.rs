//! Tenant policy resolution
//!
//! Merges a stored tenant policy over tier defaults, clamps trial tenants to
//! the trial ceilings and validates the result. Storage of policy documents
//! is the caller's concern; this module only consumes them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use switchboard_config::{PolicyDefaultsConfig, TierLimits};

use crate::catalog::TaskCategory;
use crate::error::RoutingError;

const DAILY_COST_MAX: f64 = 10_000.0;
const TOKENS_INPUT_MAX: u32 = 1_000_000;
const TOKENS_OUTPUT_MAX: u32 = 200_000;
const CONCURRENT_JOBS_MAX: u32 = 1_000;
const BURST_RATE_MAX: u32 = 10_000;
const SUSTAINED_RATE_MAX: u32 = 100_000;

/// Per-task exception to the catalog defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskOverride {
    /// Quality floor replacing the catalog default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_perf: Option<f64>,
    /// Models to consider instead of the whole registry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_models: Option<Vec<String>>,
}

impl TaskOverride {
    /// Overlay `other` on `self`, field by field
    fn merge(&mut self, other: &Self) {
        if other.min_perf.is_some() {
            self.min_perf = other.min_perf;
        }
        if other.preferred_models.is_some() {
            self.preferred_models.clone_from(&other.preferred_models);
        }
    }
}

/// Fully resolved policy for one organization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyConfig {
    /// Owning organization
    pub organization_id: String,
    /// Whether trial ceilings apply
    pub trial_mode: bool,
    /// Spend ceiling per day (USD)
    pub max_daily_cost_usd: f64,
    /// Spend ceiling per request (USD)
    pub max_request_cost_usd: f64,
    /// Maximum prompt tokens per request
    pub max_tokens_input: u32,
    /// Maximum completion tokens per request
    pub max_tokens_output: u32,
    /// Maximum jobs in flight
    pub max_concurrent_jobs: u32,
    /// Providers the selector may route to
    pub allowed_providers: Vec<String>,
    /// Per-task exceptions
    #[serde(default)]
    pub task_overrides: BTreeMap<TaskCategory, TaskOverride>,
    /// Short-window request allowance
    pub burst_rate_limit: u32,
    /// Long-window request allowance
    pub sustained_rate_limit: u32,
}

impl PolicyConfig {
    /// Policy built from tier limits alone
    pub fn from_tier(organization_id: &str, trial_mode: bool, limits: &TierLimits, providers: &[String]) -> Self {
        Self {
            organization_id: organization_id.to_owned(),
            trial_mode,
            max_daily_cost_usd: limits.max_daily_cost_usd,
            max_request_cost_usd: limits.max_request_cost_usd,
            max_tokens_input: limits.max_tokens_input,
            max_tokens_output: limits.max_tokens_output,
            max_concurrent_jobs: limits.max_concurrent_jobs,
            allowed_providers: providers.to_vec(),
            task_overrides: BTreeMap::new(),
            burst_rate_limit: limits.burst_rate_limit,
            sustained_rate_limit: limits.sustained_rate_limit,
        }
    }

    /// Whether a provider may be routed to
    pub fn allows(&self, provider: &str) -> bool {
        self.allowed_providers.iter().any(|p| p == provider)
    }

    /// Override for a task, if any
    pub fn task_override(&self, category: TaskCategory) -> Option<&TaskOverride> {
        self.task_overrides.get(&category)
    }

    /// Every invariant the policy violates; empty when valid
    pub fn validate(&self) -> Vec<PolicyViolation> {
        let mut violations = Vec::new();

        if self.allowed_providers.is_empty() {
            violations.push(PolicyViolation::NoAllowedProviders);
        }

        check_cost(&mut violations, "maxDailyCostUsd", self.max_daily_cost_usd);
        check_cost(&mut violations, "maxRequestCostUsd", self.max_request_cost_usd);

        if self.max_request_cost_usd > self.max_daily_cost_usd {
            violations.push(PolicyViolation::InvertedCostCaps {
                request: self.max_request_cost_usd,
                daily: self.max_daily_cost_usd,
            });
        }

        let counts = [
            ("maxTokensInput", self.max_tokens_input, TOKENS_INPUT_MAX),
            ("maxTokensOutput", self.max_tokens_output, TOKENS_OUTPUT_MAX),
            ("maxConcurrentJobs", self.max_concurrent_jobs, CONCURRENT_JOBS_MAX),
            ("burstRateLimit", self.burst_rate_limit, BURST_RATE_MAX),
            ("sustainedRateLimit", self.sustained_rate_limit, SUSTAINED_RATE_MAX),
        ];
        for (field, value, max) in counts {
            check_range(&mut violations, field, f64::from(value), 1.0, f64::from(max));
        }

        for (category, task_override) in &self.task_overrides {
            if let Some(min_perf) = task_override.min_perf
                && !(0.0..=1.0).contains(&min_perf)
            {
                violations.push(PolicyViolation::OverrideMinPerf {
                    category: *category,
                    value: min_perf,
                });
            }
        }

        violations
    }
}

/// One violated policy invariant
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PolicyViolation {
    /// `allowedProviders` is empty
    #[error("allowedProviders must not be empty")]
    NoAllowedProviders,

    /// Per-request cap exceeds the daily cap
    #[error("maxRequestCostUsd ({request}) exceeds maxDailyCostUsd ({daily})")]
    InvertedCostCaps { request: f64, daily: f64 },

    /// Numeric field outside its accepted range
    #[error("{field} must be within [{min}, {max}], got {value}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    /// Cost cap that is zero, negative or not a number
    #[error("{field} must be greater than 0, got {value}")]
    NotPositive { field: &'static str, value: f64 },

    /// Task override floor outside [0, 1]
    #[error("task override minPerf for {category} must be within [0, 1], got {value}")]
    OverrideMinPerf { category: TaskCategory, value: f64 },
}

fn check_cost(violations: &mut Vec<PolicyViolation>, field: &'static str, value: f64) {
    if value > 0.0 {
        check_range(violations, field, value, 0.0, DAILY_COST_MAX);
    } else {
        violations.push(PolicyViolation::NotPositive { field, value });
    }
}

pub(crate) fn check_range(violations: &mut Vec<PolicyViolation>, field: &'static str, value: f64, min: f64, max: f64) {
    if !(min..=max).contains(&value) {
        violations.push(PolicyViolation::OutOfRange { field, value, min, max });
    }
}

/// Tenant policy document as stored; every field optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StoredPolicy {
    pub trial_mode: Option<bool>,
    pub max_daily_cost_usd: Option<f64>,
    pub max_request_cost_usd: Option<f64>,
    pub max_tokens_input: Option<u32>,
    pub max_tokens_output: Option<u32>,
    pub max_concurrent_jobs: Option<u32>,
    pub allowed_providers: Option<Vec<String>>,
    pub task_overrides: BTreeMap<TaskCategory, TaskOverride>,
    pub burst_rate_limit: Option<u32>,
    pub sustained_rate_limit: Option<u32>,
}

/// Resolve effective tenant policies from configured defaults
#[derive(Debug, Clone)]
pub struct PolicyResolver {
    defaults: PolicyDefaultsConfig,
}

impl PolicyResolver {
    /// Create a resolver over the given defaults
    pub const fn new(defaults: PolicyDefaultsConfig) -> Self {
        Self { defaults }
    }

    /// Configured defaults
    pub const fn defaults(&self) -> &PolicyDefaultsConfig {
        &self.defaults
    }

    /// Overlay a stored policy on the tier defaults
    ///
    /// Stored values win when present. Task overrides merge key by key, and
    /// within a key field by field.
    pub fn merge_with_defaults(&self, stored: Option<&StoredPolicy>, organization_id: &str) -> PolicyConfig {
        let trial_mode = stored
            .and_then(|s| s.trial_mode)
            .unwrap_or(self.defaults.default_trial_mode);
        let mut policy = PolicyConfig::from_tier(
            organization_id,
            trial_mode,
            self.defaults.tier(trial_mode),
            &self.defaults.default_allowed_providers,
        );

        let Some(stored) = stored else {
            return policy;
        };

        overlay(&mut policy.max_daily_cost_usd, stored.max_daily_cost_usd);
        overlay(&mut policy.max_request_cost_usd, stored.max_request_cost_usd);
        overlay(&mut policy.max_tokens_input, stored.max_tokens_input);
        overlay(&mut policy.max_tokens_output, stored.max_tokens_output);
        overlay(&mut policy.max_concurrent_jobs, stored.max_concurrent_jobs);
        overlay(&mut policy.burst_rate_limit, stored.burst_rate_limit);
        overlay(&mut policy.sustained_rate_limit, stored.sustained_rate_limit);

        if let Some(providers) = &stored.allowed_providers {
            policy.allowed_providers = normalize_providers(providers);
        }

        for (category, stored_override) in &stored.task_overrides {
            policy
                .task_overrides
                .entry(*category)
                .or_default()
                .merge(stored_override);
        }

        policy
    }

    /// Clamp a trial policy to the trial ceilings; paid policies pass through
    ///
    /// Values are only ever lowered, whatever the stored policy requested.
    pub fn apply_trial_restrictions(&self, mut policy: PolicyConfig) -> PolicyConfig {
        if !policy.trial_mode {
            return policy;
        }

        let ceiling = &self.defaults.trial;
        policy.max_daily_cost_usd = policy.max_daily_cost_usd.min(ceiling.max_daily_cost_usd);
        policy.max_request_cost_usd = policy.max_request_cost_usd.min(ceiling.max_request_cost_usd);
        policy.max_tokens_input = policy.max_tokens_input.min(ceiling.max_tokens_input);
        policy.max_tokens_output = policy.max_tokens_output.min(ceiling.max_tokens_output);
        policy.max_concurrent_jobs = policy.max_concurrent_jobs.min(ceiling.max_concurrent_jobs);
        policy.burst_rate_limit = policy.burst_rate_limit.min(ceiling.burst_rate_limit);
        policy.sustained_rate_limit = policy.sustained_rate_limit.min(ceiling.sustained_rate_limit);

        policy
    }

    /// Merge, clamp and validate in one step
    pub fn resolve(&self, stored: Option<&StoredPolicy>, organization_id: &str) -> Result<PolicyConfig, RoutingError> {
        let merged = self.merge_with_defaults(stored, organization_id);
        let policy = self.apply_trial_restrictions(merged);
        let violations = policy.validate();

        if !violations.is_empty() {
            tracing::warn!(
                organization_id,
                violations = violations.len(),
                "rejecting invalid tenant policy"
            );
            return Err(RoutingError::Configuration { violations });
        }

        tracing::debug!(
            organization_id,
            trial_mode = policy.trial_mode,
            providers = ?policy.allowed_providers,
            "policy resolved"
        );

        Ok(policy)
    }
}

impl Default for PolicyResolver {
    fn default() -> Self {
        Self::new(PolicyDefaultsConfig::default())
    }
}

fn overlay<T: Copy>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}

fn normalize_providers(providers: &[String]) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::with_capacity(providers.len());
    for provider in providers {
        let provider = provider.trim().to_lowercase();
        if !provider.is_empty() && !normalized.contains(&provider) {
            normalized.push(provider);
        }
    }
    normalized
}

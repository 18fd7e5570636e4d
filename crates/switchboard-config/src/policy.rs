use serde::Deserialize;

/// Defaults a tenant policy is merged over
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyDefaultsConfig {
    /// Tier used when a stored policy does not say
    #[serde(default)]
    pub default_trial_mode: bool,
    /// Providers allowed when a stored policy does not list any
    #[serde(default = "default_allowed_providers")]
    pub default_allowed_providers: Vec<String>,
    /// Trial tier limits, also the hard ceilings for trial tenants
    #[serde(default = "TierLimits::trial")]
    pub trial: TierLimits,
    /// Paid tier limits
    #[serde(default = "TierLimits::paid")]
    pub paid: TierLimits,
}

impl Default for PolicyDefaultsConfig {
    fn default() -> Self {
        Self {
            default_trial_mode: false,
            default_allowed_providers: default_allowed_providers(),
            trial: TierLimits::trial(),
            paid: TierLimits::paid(),
        }
    }
}

impl PolicyDefaultsConfig {
    /// Limits for the given tier
    pub const fn tier(&self, trial_mode: bool) -> &TierLimits {
        if trial_mode { &self.trial } else { &self.paid }
    }
}

/// Cost, token, concurrency and rate limits for one tenant tier
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TierLimits {
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
    /// Short-window request allowance
    pub burst_rate_limit: u32,
    /// Long-window request allowance
    pub sustained_rate_limit: u32,
}

impl TierLimits {
    /// Built-in trial tier
    pub const fn trial() -> Self {
        Self {
            max_daily_cost_usd: 5.0,
            max_request_cost_usd: 0.25,
            max_tokens_input: 8_000,
            max_tokens_output: 2_000,
            max_concurrent_jobs: 2,
            burst_rate_limit: 5,
            sustained_rate_limit: 60,
        }
    }

    /// Built-in paid tier
    pub const fn paid() -> Self {
        Self {
            max_daily_cost_usd: 500.0,
            max_request_cost_usd: 5.0,
            max_tokens_input: 128_000,
            max_tokens_output: 16_000,
            max_concurrent_jobs: 20,
            burst_rate_limit: 50,
            sustained_rate_limit: 600,
        }
    }
}

fn default_allowed_providers() -> Vec<String> {
    vec!["openai".to_owned(), "anthropic".to_owned()]
}

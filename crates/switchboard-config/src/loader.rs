use std::collections::HashSet;
use std::path::Path;

use crate::{Config, TierLimits};

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Reads the file, expands `{{ env.VAR }}` placeholders, then
    /// deserializes and validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, environment variable
    /// expansion fails, TOML parsing fails, or validation fails
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

        Self::parse(&raw)
    }

    /// Load configuration if the file exists, otherwise use built-in defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be loaded
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            return Self::load(path);
        }

        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        Ok(Self::default())
    }

    /// Parse and validate configuration from raw TOML text
    ///
    /// # Errors
    ///
    /// Returns an error if expansion, parsing or validation fails
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let expanded =
            crate::env::expand_env(raw).map_err(|e| anyhow::anyhow!("config variable expansion failed: {e}"))?;

        let config: Self = toml::from_str(&expanded).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate that the configuration is internally consistent
    ///
    /// # Errors
    ///
    /// Returns an error describing the first inconsistency found
    pub fn validate(&self) -> anyhow::Result<()> {
        self.validate_policy_defaults()?;
        self.validate_telemetry()?;
        self.validate_models()?;
        Ok(())
    }

    fn validate_policy_defaults(&self) -> anyhow::Result<()> {
        if self.policy.default_allowed_providers.is_empty() {
            anyhow::bail!("policy.default_allowed_providers must not be empty");
        }

        validate_tier("policy.trial", &self.policy.trial)?;
        validate_tier("policy.paid", &self.policy.paid)?;

        Ok(())
    }

    fn validate_telemetry(&self) -> anyhow::Result<()> {
        let telemetry = &self.telemetry;

        if !(telemetry.smoothing_factor > 0.0 && telemetry.smoothing_factor <= 1.0) {
            anyhow::bail!("telemetry.smoothing_factor must be in (0, 1], got {}", telemetry.smoothing_factor);
        }

        if !(0.0..=1.0).contains(&telemetry.circuit_break_threshold) {
            anyhow::bail!(
                "telemetry.circuit_break_threshold must be in [0, 1], got {}",
                telemetry.circuit_break_threshold
            );
        }

        if telemetry.min_samples == 0 {
            anyhow::bail!("telemetry.min_samples must be greater than 0");
        }

        if telemetry.max_age_duration()?.is_zero() {
            anyhow::bail!("telemetry.max_age must be greater than 0");
        }

        Ok(())
    }

    fn validate_models(&self) -> anyhow::Result<()> {
        let mut seen = HashSet::new();

        for pricing in &self.models {
            if !seen.insert((pricing.provider.as_str(), pricing.model.as_str())) {
                anyhow::bail!("duplicate pricing entry for {}:{}", pricing.provider, pricing.model);
            }

            match (pricing.input_per_mtok, pricing.output_per_mtok) {
                (None, None) => {}
                (Some(input), Some(output)) => {
                    let valid = |price: f64| price.is_finite() && price >= 0.0;
                    if !valid(input) || !valid(output) {
                        anyhow::bail!(
                            "prices for {}:{} must be finite and non-negative",
                            pricing.provider,
                            pricing.model
                        );
                    }
                }
                _ => anyhow::bail!(
                    "{}:{} must set both input_per_mtok and output_per_mtok, or neither",
                    pricing.provider,
                    pricing.model
                ),
            }
        }

        Ok(())
    }
}

fn validate_tier(section: &str, tier: &TierLimits) -> anyhow::Result<()> {
    if !(tier.max_daily_cost_usd > 0.0 && tier.max_daily_cost_usd.is_finite()) {
        anyhow::bail!("{section}.max_daily_cost_usd must be positive");
    }

    if !(tier.max_request_cost_usd > 0.0 && tier.max_request_cost_usd <= tier.max_daily_cost_usd) {
        anyhow::bail!("{section}.max_request_cost_usd must be positive and not exceed max_daily_cost_usd");
    }

    let counts = [
        ("max_tokens_input", tier.max_tokens_input),
        ("max_tokens_output", tier.max_tokens_output),
        ("max_concurrent_jobs", tier.max_concurrent_jobs),
        ("burst_rate_limit", tier.burst_rate_limit),
        ("sustained_rate_limit", tier.sustained_rate_limit),
    ];

    if let Some((field, _)) = counts.iter().find(|(_, value)| *value == 0) {
        anyhow::bail!("{section}.{field} must be greater than 0");
    }

    Ok(())
}

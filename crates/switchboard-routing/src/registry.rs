//! Model registry with per-model token pricing
//!
//! Constructed once at startup, either from the built-in table or from
//! configuration, and shared by reference with the selector.

use std::collections::BTreeSet;

use serde::Serialize;
use switchboard_config::ModelPricingConfig;

/// Price applied to models registered without pricing
///
/// Lives outside the registry so iterating the table never yields it.
pub const FALLBACK_PRICE: TokenPrice = TokenPrice::new(5.0, 15.0);

/// USD per million input and output tokens
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPrice {
    /// Cost per million input tokens (USD)
    pub input_per_mtok: f64,
    /// Cost per million output tokens (USD)
    pub output_per_mtok: f64,
}

impl TokenPrice {
    /// Create a price pair
    pub const fn new(input_per_mtok: f64, output_per_mtok: f64) -> Self {
        Self {
            input_per_mtok,
            output_per_mtok,
        }
    }

    /// Estimate the cost of a request with the given token counts
    pub fn estimate_cost(&self, input_tokens: u32, output_tokens: u32) -> f64 {
        let input_cost = (f64::from(input_tokens) / 1_000_000.0) * self.input_per_mtok;
        let output_cost = (f64::from(output_tokens) / 1_000_000.0) * self.output_per_mtok;
        input_cost + output_cost
    }
}

/// A routable provider/model pair
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelProfile {
    /// Provider name
    pub provider: String,
    /// Model identifier
    pub model: String,
    /// Token pricing, `None` when unpriced
    pub price: Option<TokenPrice>,
}

impl ModelProfile {
    /// Create a priced profile
    pub fn new(provider: impl Into<String>, model: impl Into<String>, price: TokenPrice) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            price: Some(price),
        }
    }

    /// Canonical identifier in "provider:model" format
    pub fn id(&self) -> String {
        format!("{}:{}", self.provider, self.model)
    }

    /// Pricing used for cost estimates
    pub fn effective_price(&self) -> TokenPrice {
        self.price.unwrap_or(FALLBACK_PRICE)
    }

    /// Estimate the cost of a request with the given token counts
    pub fn estimate_cost(&self, input_tokens: u32, output_tokens: u32) -> f64 {
        self.effective_price().estimate_cost(input_tokens, output_tokens)
    }
}

/// Registry of all routable models
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    profiles: Vec<ModelProfile>,
}

impl ModelRegistry {
    /// Registry holding the given profiles
    pub const fn new(profiles: Vec<ModelProfile>) -> Self {
        Self { profiles }
    }

    /// Built-in OpenAI and Anthropic pricing
    pub fn builtin() -> Self {
        Self::new(vec![
            ModelProfile::new("openai", "gpt-4o-mini", TokenPrice::new(0.15, 0.60)),
            ModelProfile::new("openai", "gpt-3.5-turbo", TokenPrice::new(0.50, 1.50)),
            ModelProfile::new("openai", "gpt-4o", TokenPrice::new(5.0, 15.0)),
            ModelProfile::new("anthropic", "claude-3-haiku", TokenPrice::new(0.25, 1.25)),
            ModelProfile::new("anthropic", "claude-3-sonnet", TokenPrice::new(3.0, 15.0)),
            ModelProfile::new("anthropic", "claude-3-opus", TokenPrice::new(15.0, 75.0)),
        ])
    }

    /// Build a registry from configuration, falling back to the built-in table when empty
    pub fn from_config(configs: &[ModelPricingConfig]) -> Self {
        if configs.is_empty() {
            return Self::builtin();
        }

        let profiles = configs
            .iter()
            .map(|c| ModelProfile {
                provider: c.provider.clone(),
                model: c.model.clone(),
                price: c
                    .input_per_mtok
                    .zip(c.output_per_mtok)
                    .map(|(input, output)| TokenPrice::new(input, output)),
            })
            .collect();

        Self { profiles }
    }

    /// Get all profiles
    pub fn profiles(&self) -> &[ModelProfile] {
        &self.profiles
    }

    /// Find a profile by provider/model pair
    pub fn find(&self, provider: &str, model: &str) -> Option<&ModelProfile> {
        self.profiles
            .iter()
            .find(|p| p.provider == provider && p.model == model)
    }

    /// Price for a pair, or the fallback price when unknown
    pub fn price_for(&self, provider: &str, model: &str) -> TokenPrice {
        self.find(provider, model)
            .map_or(FALLBACK_PRICE, ModelProfile::effective_price)
    }

    /// Distinct provider names
    pub fn providers(&self) -> BTreeSet<&str> {
        self.profiles.iter().map(|p| p.provider.as_str()).collect()
    }

    /// Profiles sorted by estimated request cost (cheapest first)
    pub fn by_cost(&self, input_tokens: u32, output_tokens: u32) -> Vec<&ModelProfile> {
        let mut sorted: Vec<&ModelProfile> = self.profiles.iter().collect();
        sorted.sort_by(|a, b| {
            a.estimate_cost(input_tokens, output_tokens)
                .total_cmp(&b.estimate_cost(input_tokens, output_tokens))
                .then_with(|| a.id().cmp(&b.id()))
        });
        sorted
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_cost() {
        let registry = ModelRegistry::builtin();
        let profile = registry.find("openai", "gpt-4o-mini").unwrap();
        let cost = profile.estimate_cost(1_000_000, 500_000);
        // 1M * 0.15/1M + 0.5M * 0.60/1M = 0.15 + 0.30 = 0.45
        assert!((cost - 0.45).abs() < 1e-9);
    }

    #[test]
    fn sonnet_pitch_sized_request() {
        let registry = ModelRegistry::builtin();
        let cost = registry.price_for("anthropic", "claude-3-sonnet").estimate_cost(1000, 500);
        assert!((cost - 0.0105).abs() < 1e-12);
    }

    #[test]
    fn unknown_model_uses_fallback_price() {
        let registry = ModelRegistry::builtin();
        assert_eq!(registry.price_for("mistral", "large"), FALLBACK_PRICE);
    }

    #[test]
    fn fallback_never_enumerated() {
        let registry = ModelRegistry::builtin();
        assert!(registry.profiles().iter().all(|p| p.provider != "unknown"));
        assert_eq!(registry.providers().into_iter().collect::<Vec<_>>(), vec!["anthropic", "openai"]);
    }

    #[test]
    fn unpriced_config_entry_is_routable_at_fallback() {
        let registry = ModelRegistry::from_config(&[ModelPricingConfig {
            provider: "mistral".to_owned(),
            model: "large".to_owned(),
            input_per_mtok: None,
            output_per_mtok: None,
        }]);

        let profile = registry.find("mistral", "large").unwrap();
        assert_eq!(profile.price, None);
        assert_eq!(profile.effective_price(), FALLBACK_PRICE);
    }

    #[test]
    fn empty_config_uses_builtin() {
        assert_eq!(ModelRegistry::from_config(&[]).profiles().len(), 6);
    }

    #[test]
    fn by_cost_orders_cheapest_first() {
        let registry = ModelRegistry::builtin();
        let models: Vec<_> = registry.by_cost(1000, 500).iter().map(|p| p.model.as_str()).collect();
        assert_eq!(
            models,
            vec![
                "gpt-4o-mini",
                "claude-3-haiku",
                "gpt-3.5-turbo",
                "claude-3-sonnet",
                "gpt-4o",
                "claude-3-opus"
            ]
        );
    }
}

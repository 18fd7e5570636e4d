//! Programmatic configuration builder for integration tests

use switchboard_config::{Config, ModelPricingConfig};
use switchboard_routing::RoutingEngine;

/// Builder for constructing test configurations
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder with built-in defaults
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Make trial the default tier
    pub fn with_trial_default(mut self) -> Self {
        self.config.policy.default_trial_mode = true;
        self
    }

    /// Replace the default provider allow-list
    pub fn with_providers(mut self, providers: &[&str]) -> Self {
        self.config.policy.default_allowed_providers = providers.iter().map(|p| (*p).to_owned()).collect();
        self
    }

    /// Register a priced model, replacing the built-in table
    pub fn with_model(mut self, provider: &str, model: &str, input_per_mtok: f64, output_per_mtok: f64) -> Self {
        self.config.models.push(ModelPricingConfig {
            provider: provider.to_owned(),
            model: model.to_owned(),
            input_per_mtok: Some(input_per_mtok),
            output_per_mtok: Some(output_per_mtok),
        });
        self
    }

    /// Observations required before a circuit can open
    pub fn with_min_samples(mut self, min_samples: u64) -> Self {
        self.config.telemetry.min_samples = min_samples;
        self
    }

    /// Consume the builder and return the configuration
    pub fn build(self) -> Config {
        self.config
    }

    /// Build configuration and wire an engine over it
    pub fn engine(self) -> RoutingEngine {
        RoutingEngine::from_config(&self.build()).expect("engine builds from test config")
    }
}

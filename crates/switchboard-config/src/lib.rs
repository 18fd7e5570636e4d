#![allow(clippy::must_use_candidate)]

mod env;
mod loader;
pub mod log;
pub mod models;
pub mod policy;
pub mod telemetry;

use serde::Deserialize;

pub use log::*;
pub use models::*;
pub use policy::*;
pub use telemetry::*;

/// Top-level Switchboard configuration
///
/// Assembled once at process start and handed to the routing engine's
/// constructors; nothing in the engine reads the environment at call time.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Tier defaults for tenant policies
    #[serde(default)]
    pub policy: PolicyDefaultsConfig,
    /// Live performance tracking
    #[serde(default)]
    pub telemetry: TrackerConfig,
    /// Pricing table override (empty uses the built-in table)
    #[serde(default)]
    pub models: Vec<ModelPricingConfig>,
    /// Log output
    #[serde(default)]
    pub log: LogConfig,
}

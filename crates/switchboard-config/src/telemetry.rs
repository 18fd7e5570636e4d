use std::time::Duration;

use serde::Deserialize;

/// Live performance tracking configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrackerConfig {
    /// EWMA smoothing factor; higher reacts faster (0 < α ≤ 1)
    #[serde(default = "default_smoothing_factor")]
    pub smoothing_factor: f64,
    /// Age after which an entry is reset instead of blended (e.g. "24h")
    #[serde(default = "default_max_age")]
    pub max_age: String,
    /// Error rate above which a model is circuit-broken
    #[serde(default = "default_circuit_break_threshold")]
    pub circuit_break_threshold: f64,
    /// Observations required before a model can be circuit-broken
    #[serde(default = "default_min_samples")]
    pub min_samples: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            smoothing_factor: default_smoothing_factor(),
            max_age: default_max_age(),
            circuit_break_threshold: default_circuit_break_threshold(),
            min_samples: default_min_samples(),
        }
    }
}

impl TrackerConfig {
    /// Parse the `max_age` window
    ///
    /// # Errors
    ///
    /// Returns an error if `max_age` is not a valid duration string
    pub fn max_age_duration(&self) -> anyhow::Result<Duration> {
        duration_str::parse(&self.max_age)
            .map_err(|e| anyhow::anyhow!("invalid telemetry.max_age '{}': {e}", self.max_age))
    }
}

const fn default_smoothing_factor() -> f64 {
    0.3
}

fn default_max_age() -> String {
    "24h".to_owned()
}

const fn default_circuit_break_threshold() -> f64 {
    0.5
}

const fn default_min_samples() -> u64 {
    5
}

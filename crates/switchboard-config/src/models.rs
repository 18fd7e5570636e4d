use serde::Deserialize;

/// Pricing for one provider/model pair
///
/// Omitting both prices registers the model at the fallback price.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelPricingConfig {
    /// Provider name (e.g. "openai")
    pub provider: String,
    /// Model identifier (e.g. "gpt-4o")
    pub model: String,
    /// Cost per million input tokens (USD)
    #[serde(default)]
    pub input_per_mtok: Option<f64>,
    /// Cost per million output tokens (USD)
    #[serde(default)]
    pub output_per_mtok: Option<f64>,
}

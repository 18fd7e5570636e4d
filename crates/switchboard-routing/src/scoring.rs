//! Candidate scoring
//!
//! Lower is better. Cost dominates, latency breaks near-ties, reliability
//! nudges. Quality never enters the total; it only gates eligibility.

use serde::{Deserialize, Serialize};

use crate::telemetry::TelemetryMetrics;

/// Weight of the cost component
pub const COST_WEIGHT: f64 = 0.6;

/// Weight of the latency component
pub const LATENCY_WEIGHT: f64 = 0.35;

/// Weight of the reliability component
pub const ERROR_WEIGHT: f64 = 0.05;

/// Scale applied to USD cost before weighting
const COST_SCALE: f64 = 100.0;

/// Latency assumed for models without telemetry
pub const DEFAULT_LATENCY_MS: f64 = 1000.0;

/// Error rate assumed for models without telemetry
pub const DEFAULT_ERROR_RATE: f64 = 0.0;

/// Weighted components of a candidate's score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreFactors {
    /// Weighted cost component
    pub cost_score: f64,
    /// Weighted latency component
    pub latency_score: f64,
    /// Weighted error-rate component
    pub error_score: f64,
    /// Catalog quality for the task (informational)
    pub quality_score: f64,
    /// Sum of the weighted components
    pub total_score: f64,
}

impl ScoreFactors {
    /// Score a candidate from its estimated cost, observed performance and quality
    pub fn compute(estimated_cost_usd: f64, latency_ms: f64, error_rate: f64, quality: f64) -> Self {
        let cost_score = estimated_cost_usd * COST_SCALE * COST_WEIGHT;
        let latency_score = (latency_ms / 1000.0) * LATENCY_WEIGHT;
        let error_score = error_rate * ERROR_WEIGHT;

        Self {
            cost_score,
            latency_score,
            error_score,
            quality_score: quality,
            total_score: cost_score + latency_score + error_score,
        }
    }
}

/// Latency and error rate to score with, defaulting when unobserved
pub fn observed_performance(metrics: Option<&TelemetryMetrics>) -> (f64, f64) {
    metrics.map_or((DEFAULT_LATENCY_MS, DEFAULT_ERROR_RATE), |m| {
        (m.latency_ms, m.error_rate)
    })
}

#[cfg(test)]
mod tests {
    use jiff::Timestamp;

    use super::*;

    #[test]
    fn weights_sum_to_one() {
        assert!((COST_WEIGHT + LATENCY_WEIGHT + ERROR_WEIGHT - 1.0).abs() < 1e-12);
    }

    #[test]
    fn sonnet_pitch_score() {
        let (latency, error) = observed_performance(None);
        let factors = ScoreFactors::compute(0.0105, latency, error, 0.92);

        assert!((factors.cost_score - 0.63).abs() < 1e-9);
        assert!((factors.latency_score - 0.35).abs() < 1e-9);
        assert!(factors.error_score.abs() < f64::EPSILON);
        assert!((factors.total_score - 0.98).abs() < 1e-9);
    }

    #[test]
    fn quality_is_not_part_of_total() {
        let low = ScoreFactors::compute(0.01, 500.0, 0.1, 0.1);
        let high = ScoreFactors::compute(0.01, 500.0, 0.1, 0.99);
        assert!((low.total_score - high.total_score).abs() < f64::EPSILON);
    }

    #[test]
    fn observed_metrics_replace_defaults() {
        let metrics = TelemetryMetrics {
            provider: "openai".to_owned(),
            model: "gpt-4o".to_owned(),
            latency_ms: 2000.0,
            error_rate: 0.4,
            request_count: 8,
            last_updated: Timestamp::now(),
        };
        let factors = ScoreFactors::compute(0.0, 2000.0, 0.4, 0.9);

        assert_eq!(observed_performance(Some(&metrics)), (2000.0, 0.4));
        assert!((factors.total_score - 0.72).abs() < 1e-9);
    }
}

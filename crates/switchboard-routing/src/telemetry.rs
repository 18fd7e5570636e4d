//! Live performance tracking per provider/model
//!
//! Keeps an exponentially weighted estimate of latency and error rate for
//! every pair that has reported an outcome. Entries older than the max-age
//! window are reset rather than blended so stale data never biases fresh
//! decisions. In-memory only.

use std::fmt;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use jiff::{SignedDuration, Timestamp};
use serde::Serialize;
use switchboard_config::TrackerConfig;

use crate::error::RoutingError;

/// Default EWMA smoothing factor
pub const DEFAULT_SMOOTHING_FACTOR: f64 = 0.3;

/// Default error rate above which a model is circuit-broken
pub const DEFAULT_CIRCUIT_BREAK_THRESHOLD: f64 = 0.5;

/// Observations required before a model can be circuit-broken
pub const DEFAULT_MIN_SAMPLES: u64 = 5;

/// Default staleness window
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// Unique telemetry key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ModelKey {
    /// Provider name
    pub provider: String,
    /// Model identifier
    pub model: String,
}

impl ModelKey {
    /// Create a key from a provider/model pair
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
        }
    }
}

impl fmt::Display for ModelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider, self.model)
    }
}

/// Smoothed performance estimate for one provider/model pair
#[derive(Debug, Clone, PartialEq, Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryMetrics {
    /// Provider name
    pub provider: String,
    /// Model identifier
    pub model: String,
    /// EWMA latency in milliseconds
    pub latency_ms: f64,
    /// EWMA error rate (0.0 to 1.0)
    pub error_rate: f64,
    /// Observations since the entry was seeded
    pub request_count: u64,
    /// Time of the most recent observation
    pub last_updated: Timestamp,
}

impl TelemetryMetrics {
    fn seed(key: &ModelKey, latency_ms: f64, error_signal: f64, now: Timestamp) -> Self {
        Self {
            provider: key.provider.clone(),
            model: key.model.clone(),
            latency_ms,
            error_rate: error_signal,
            request_count: 1,
            last_updated: now,
        }
    }
}

/// Averages across all live entries
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetrySummary {
    /// Number of live entries
    pub tracked: usize,
    /// Mean of per-model EWMA latency
    pub average_latency_ms: f64,
    /// Mean of per-model EWMA error rate
    pub average_error_rate: f64,
}

/// Track live performance across all provider/model pairs
///
/// Updates to one key are serialized by the map's entry lock because the
/// EWMA blend is order-sensitive; updates to different keys run in parallel.
#[derive(Debug)]
pub struct TelemetryTracker {
    entries: DashMap<ModelKey, TelemetryMetrics>,
    smoothing_factor: f64,
    max_age: SignedDuration,
    circuit_break_threshold: f64,
    min_samples: u64,
}

impl TelemetryTracker {
    /// Create a tracker with default settings
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            smoothing_factor: DEFAULT_SMOOTHING_FACTOR,
            max_age: to_signed(DEFAULT_MAX_AGE),
            circuit_break_threshold: DEFAULT_CIRCUIT_BREAK_THRESHOLD,
            min_samples: DEFAULT_MIN_SAMPLES,
        }
    }

    /// Create a tracker from configuration
    pub fn from_config(config: &TrackerConfig) -> Result<Self, RoutingError> {
        let max_age = config
            .max_age_duration()
            .map_err(|e| RoutingError::InvalidConfig(e.to_string()))?;

        if !(config.smoothing_factor > 0.0 && config.smoothing_factor <= 1.0) {
            return Err(RoutingError::InvalidConfig(format!(
                "smoothing factor must be in (0, 1], got {}",
                config.smoothing_factor
            )));
        }

        Ok(Self {
            entries: DashMap::new(),
            smoothing_factor: config.smoothing_factor,
            max_age: to_signed(max_age),
            circuit_break_threshold: config.circuit_break_threshold,
            min_samples: config.min_samples.max(1),
        })
    }

    /// Record the outcome of a provider call
    ///
    /// The first observation for a pair seeds it directly. An entry older
    /// than the max-age window is reseeded. Otherwise latency and error
    /// signal are blended with `α·observed + (1-α)·previous`.
    pub fn record_request(&self, provider: &str, model: &str, latency_ms: f64, success: bool) -> TelemetryMetrics {
        self.record_request_at(provider, model, latency_ms, success, Timestamp::now())
    }

    fn record_request_at(
        &self,
        provider: &str,
        model: &str,
        latency_ms: f64,
        success: bool,
        now: Timestamp,
    ) -> TelemetryMetrics {
        let latency_ms = if latency_ms.is_finite() { latency_ms.max(0.0) } else { 0.0 };
        let error_signal = if success { 0.0 } else { 1.0 };
        let key = ModelKey::new(provider, model);

        let (updated, was_broken) = match self.entries.entry(key.clone()) {
            Entry::Vacant(slot) => {
                let seeded = TelemetryMetrics::seed(&key, latency_ms, error_signal, now);
                (slot.insert(seeded).value().clone(), false)
            }
            Entry::Occupied(mut slot) => {
                let metrics = slot.get_mut();
                let was_broken = !self.is_stale(metrics, now) && self.breaks(metrics, self.circuit_break_threshold);

                if self.is_stale(metrics, now) {
                    tracing::debug!(key = %key, "resetting stale telemetry");
                    *metrics = TelemetryMetrics::seed(&key, latency_ms, error_signal, now);
                } else {
                    let alpha = self.smoothing_factor;
                    metrics.latency_ms = alpha.mul_add(latency_ms - metrics.latency_ms, metrics.latency_ms);
                    metrics.error_rate = alpha
                        .mul_add(error_signal - metrics.error_rate, metrics.error_rate)
                        .clamp(0.0, 1.0);
                    metrics.request_count += 1;
                    metrics.last_updated = now;
                }

                (metrics.clone(), was_broken)
            }
        };

        if !was_broken && self.breaks(&updated, self.circuit_break_threshold) {
            tracing::warn!(
                key = %key,
                error_rate = updated.error_rate,
                requests = updated.request_count,
                "model circuit-broken"
            );
        }

        updated
    }

    /// Current metrics for a pair, or `None` if absent or stale
    ///
    /// Stale entries are purged on read.
    pub fn telemetry(&self, provider: &str, model: &str) -> Option<TelemetryMetrics> {
        let key = ModelKey::new(provider, model);
        let now = Timestamp::now();

        if self
            .entries
            .remove_if(&key, |_, metrics| self.is_stale(metrics, now))
            .is_some()
        {
            tracing::debug!(key = %key, "purged stale telemetry on read");
            return None;
        }

        self.entries.get(&key).map(|entry| entry.value().clone())
    }

    /// Whether a pair should be excluded at the given error-rate threshold
    ///
    /// Requires the minimum sample count so one early failure cannot
    /// blacklist a model.
    pub fn should_circuit_break(&self, provider: &str, model: &str, threshold: f64) -> bool {
        self.telemetry(provider, model)
            .is_some_and(|metrics| self.breaks(&metrics, threshold))
    }

    /// Whether a pair is excluded at the configured threshold
    pub fn is_circuit_broken(&self, provider: &str, model: &str) -> bool {
        self.should_circuit_break(provider, model, self.circuit_break_threshold)
    }

    /// Every live pair currently circuit-broken at the configured threshold
    pub fn circuit_broken(&self) -> Vec<ModelKey> {
        let now = Timestamp::now();
        let mut broken: Vec<ModelKey> = self
            .entries
            .iter()
            .filter(|entry| !self.is_stale(entry.value(), now) && self.breaks(entry.value(), self.circuit_break_threshold))
            .map(|entry| entry.key().clone())
            .collect();
        broken.sort();
        broken
    }

    /// Average latency and error rate across live entries
    pub fn summary(&self) -> TelemetrySummary {
        let live = self.recent_telemetry();

        if live.is_empty() {
            return TelemetrySummary {
                tracked: 0,
                average_latency_ms: 0.0,
                average_error_rate: 0.0,
            };
        }

        let count = live.len() as f64;
        TelemetrySummary {
            tracked: live.len(),
            average_latency_ms: live.iter().map(|m| m.latency_ms).sum::<f64>() / count,
            average_error_rate: live.iter().map(|m| m.error_rate).sum::<f64>() / count,
        }
    }

    /// Point-in-time copy of all live entries, most recently updated first
    pub fn recent_telemetry(&self) -> Vec<TelemetryMetrics> {
        let now = Timestamp::now();
        let mut live: Vec<TelemetryMetrics> = self
            .entries
            .iter()
            .filter(|entry| !self.is_stale(entry.value(), now))
            .map(|entry| entry.value().clone())
            .collect();
        live.sort_by(|a, b| b.last_updated.cmp(&a.last_updated));
        live
    }

    /// Remove stale entries, returning how many were dropped
    pub fn prune_stale(&self) -> usize {
        let now = Timestamp::now();
        let mut removed = 0;

        self.entries.retain(|_, metrics| {
            let keep = !self.is_stale(metrics, now);
            if !keep {
                removed += 1;
            }
            keep
        });

        if removed > 0 {
            tracing::debug!(removed, "pruned stale telemetry");
        }

        removed
    }

    fn is_stale(&self, metrics: &TelemetryMetrics, now: Timestamp) -> bool {
        now.duration_since(metrics.last_updated) > self.max_age
    }

    fn breaks(&self, metrics: &TelemetryMetrics, threshold: f64) -> bool {
        metrics.request_count >= self.min_samples && metrics.error_rate > threshold
    }
}

impl Default for TelemetryTracker {
    fn default() -> Self {
        Self::new()
    }
}

fn to_signed(duration: Duration) -> SignedDuration {
    SignedDuration::try_from(duration).unwrap_or(SignedDuration::MAX)
}

//! Decision audit trail
//!
//! Every selection made on behalf of an organization produces an immutable
//! [`DecisionLog`]. The store keeps the most recent logs per organization in
//! a bounded ring buffer and derives aggregate views from them.

use std::collections::VecDeque;

use dashmap::DashMap;
use indexmap::IndexMap;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::TaskCategory;
use crate::error::RoutingError;
use crate::scoring::ScoreFactors;
use crate::selector::{RejectionReason, SelectionReason};
use crate::telemetry::TelemetryMetrics;

/// Logs retained per organization; older entries are evicted
pub const MAX_DECISIONS_PER_ORG: usize = 100;

/// Sink for decision logs produced by the selector
pub trait DecisionRecorder: Send + Sync {
    /// Persist one decision
    fn record(&self, log: DecisionLog) -> Result<(), RoutingError>;
}

/// A candidate that lost, and why
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlternativeRecord {
    pub provider: String,
    pub model: String,
    pub quality: f64,
    pub estimated_cost_usd: f64,
    /// Total score; only eligible candidates are scored
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    pub rejection: RejectionReason,
}

/// Constraints in force when the decision was made
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintSnapshot {
    pub trial_mode: bool,
    pub allowed_providers: Vec<String>,
    /// Quality floor actually applied, after any relaxation
    pub min_performance: f64,
    pub max_request_cost_usd: f64,
    pub max_daily_cost_usd: f64,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub force_cheapest: bool,
}

/// Immutable record of one routing decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionLog {
    pub id: Uuid,
    pub timestamp: Timestamp,
    pub organization_id: String,
    pub task_category: TaskCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_type: Option<String>,
    pub selected_provider: String,
    pub selected_model: String,
    /// Estimated cost of the selected model (USD)
    pub estimated_cost: f64,
    pub factors: ScoreFactors,
    /// Outranked candidates first, then filtered ones
    pub alternatives: Vec<AlternativeRecord>,
    pub reason: SelectionReason,
    pub constraints: ConstraintSnapshot,
    /// Selected model's telemetry at decision time, if any was observed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telemetry: Option<TelemetryMetrics>,
}

impl DecisionLog {
    /// Selected model in "provider:model" format
    pub fn selected_id(&self) -> String {
        format!("{}:{}", self.selected_provider, self.selected_model)
    }
}

/// Query over an organization's decisions
///
/// Empty fields match everything. The date range is inclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecisionFilter {
    pub task_category: Option<TaskCategory>,
    pub provider: Option<String>,
    pub since: Option<Timestamp>,
    pub until: Option<Timestamp>,
    pub limit: Option<usize>,
}

impl DecisionFilter {
    #[must_use]
    pub const fn task_category(mut self, category: TaskCategory) -> Self {
        self.task_category = Some(category);
        self
    }

    #[must_use]
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    #[must_use]
    pub fn between(mut self, since: Timestamp, until: Timestamp) -> Self {
        self.since = Some(since);
        self.until = Some(until);
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn matches(&self, log: &DecisionLog) -> bool {
        self.task_category.is_none_or(|c| c == log.task_category)
            && self
                .provider
                .as_deref()
                .is_none_or(|p| p == log.selected_provider)
            && self.since.is_none_or(|since| log.timestamp >= since)
            && self.until.is_none_or(|until| log.timestamp <= until)
    }
}

/// Aggregate view over an organization's retained decisions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionStats {
    pub total: usize,
    /// Selections per "provider:model"
    pub by_model: IndexMap<String, usize>,
    pub by_task_category: IndexMap<TaskCategory, usize>,
    pub average_cost_usd: f64,
    pub forced_cheapest: usize,
    /// Relaxed or emergency selections
    pub degraded: usize,
}

/// How often and how well one model was chosen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderPerformance {
    pub provider: String,
    pub model: String,
    pub times_selected: usize,
    pub average_cost_usd: f64,
    pub average_score: f64,
}

/// Full audit snapshot for one organization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionExport {
    pub organization_id: String,
    pub exported_at: Timestamp,
    pub stats: DecisionStats,
    /// Most recent first
    pub logs: Vec<DecisionLog>,
}

/// Bounded, per-organization decision history
#[derive(Debug)]
pub struct DecisionStore {
    logs: DashMap<String, VecDeque<DecisionLog>>,
    capacity: usize,
}

impl DecisionStore {
    /// Store retaining [`MAX_DECISIONS_PER_ORG`] logs per organization
    pub fn new() -> Self {
        Self::with_capacity(MAX_DECISIONS_PER_ORG)
    }

    /// Store retaining `capacity` logs per organization (at least one)
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            logs: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Append a decision, evicting the oldest when full
    pub fn record_decision(&self, log: DecisionLog) {
        let organization_id = log.organization_id.clone();
        let mut history = self
            .logs
            .entry(organization_id)
            .or_insert_with(|| VecDeque::with_capacity(self.capacity));

        history.push_front(log);
        if history.len() > self.capacity
            && let Some(evicted) = history.pop_back()
        {
            tracing::trace!(
                organization_id = %evicted.organization_id,
                decision_id = %evicted.id,
                "evicted oldest decision"
            );
        }
    }

    /// Matching decisions, most recent first
    pub fn decision_logs(&self, organization_id: &str, filter: &DecisionFilter) -> Vec<DecisionLog> {
        let Some(history) = self.logs.get(organization_id) else {
            return Vec::new();
        };

        history
            .iter()
            .filter(|log| filter.matches(log))
            .take(filter.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }

    /// Most recent decision for an organization
    pub fn latest_decision(&self, organization_id: &str) -> Option<DecisionLog> {
        self.logs
            .get(organization_id)
            .and_then(|history| history.front().cloned())
    }

    /// Look up one retained decision by id
    pub fn find_decision(&self, organization_id: &str, id: Uuid) -> Option<DecisionLog> {
        self.logs
            .get(organization_id)
            .and_then(|history| history.iter().find(|log| log.id == id).cloned())
    }

    /// Aggregate counts and averages over retained decisions
    pub fn decision_stats(&self, organization_id: &str) -> DecisionStats {
        let Some(history) = self.logs.get(organization_id) else {
            return DecisionStats::default();
        };
        stats_for(history.iter())
    }

    /// Selection count, average cost and average score per model
    ///
    /// Ordered by times selected, most first.
    pub fn provider_performance(&self, organization_id: &str) -> Vec<ProviderPerformance> {
        let Some(history) = self.logs.get(organization_id) else {
            return Vec::new();
        };

        let mut totals: IndexMap<(String, String), (usize, f64, f64)> = IndexMap::new();
        for log in history.iter() {
            let entry = totals
                .entry((log.selected_provider.clone(), log.selected_model.clone()))
                .or_insert((0, 0.0, 0.0));
            entry.0 += 1;
            entry.1 += log.estimated_cost;
            entry.2 += log.factors.total_score;
        }

        let mut performance: Vec<ProviderPerformance> = totals
            .into_iter()
            .map(|((provider, model), (count, cost, score))| ProviderPerformance {
                provider,
                model,
                times_selected: count,
                average_cost_usd: cost / count as f64,
                average_score: score / count as f64,
            })
            .collect();
        performance.sort_by(|a, b| b.times_selected.cmp(&a.times_selected));
        performance
    }

    /// Snapshot of logs and stats for audit export
    pub fn export_decision_logs(&self, organization_id: &str) -> DecisionExport {
        let logs = self.decision_logs(organization_id, &DecisionFilter::default());
        let stats = stats_for(logs.iter());

        tracing::info!(organization_id, decisions = logs.len(), "decision logs exported");

        DecisionExport {
            organization_id: organization_id.to_owned(),
            exported_at: Timestamp::now(),
            stats,
            logs,
        }
    }

    /// Organizations with retained history, sorted
    pub fn organizations(&self) -> Vec<String> {
        let mut organizations: Vec<String> = self.logs.iter().map(|entry| entry.key().clone()).collect();
        organizations.sort();
        organizations
    }

    /// Drop an organization's history, returning how many logs were removed
    pub fn clear(&self, organization_id: &str) -> usize {
        self.logs
            .remove(organization_id)
            .map_or(0, |(_, history)| history.len())
    }
}

impl Default for DecisionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionRecorder for DecisionStore {
    fn record(&self, log: DecisionLog) -> Result<(), RoutingError> {
        if log.organization_id.is_empty() {
            return Err(RoutingError::DecisionLog("decision has no organization".to_owned()));
        }
        self.record_decision(log);
        Ok(())
    }
}

fn stats_for<'a>(logs: impl Iterator<Item = &'a DecisionLog>) -> DecisionStats {
    let mut stats = DecisionStats::default();
    let mut total_cost = 0.0;

    for log in logs {
        stats.total += 1;
        total_cost += log.estimated_cost;
        *stats.by_model.entry(log.selected_id()).or_default() += 1;
        *stats.by_task_category.entry(log.task_category).or_default() += 1;
        if log.constraints.force_cheapest {
            stats.forced_cheapest += 1;
        }
        if log.reason.is_degraded() {
            stats.degraded += 1;
        }
    }

    if stats.total > 0 {
        stats.average_cost_usd = total_cost / stats.total as f64;
    }
    stats
}

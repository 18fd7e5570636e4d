//! Model selection pipeline
//!
//! Filters the registry by provider policy, task quality and circuit state,
//! scores the survivors and ranks them. When nothing qualifies the quality
//! floor is relaxed once, then an emergency fallback picks the cheapest
//! allowed model so callers always get an answer.

use std::cmp::Ordering;
use std::sync::Arc;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::{TaskCatalog, TaskCategory};
use crate::decision::{AlternativeRecord, ConstraintSnapshot, DecisionLog, DecisionRecorder};
use crate::error::RoutingError;
use crate::policy::{PolicyConfig, check_range};
use crate::registry::{ModelProfile, ModelRegistry};
use crate::scoring::{ScoreFactors, observed_performance};
use crate::telemetry::{TelemetryMetrics, TelemetryTracker};

/// Factor applied to the quality floor on the single relaxation retry
pub const RELAXATION_FACTOR: f64 = 0.9;

/// Prompt tokens assumed when the caller gives none
pub const DEFAULT_INPUT_TOKENS: u32 = 1000;

/// Completion tokens assumed when the caller gives none
pub const DEFAULT_OUTPUT_TOKENS: u32 = 500;

/// Why the winning model was chosen
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
pub enum SelectionReason {
    /// Lowest score among fully qualified models
    #[serde(rename = "best score")]
    #[strum(serialize = "best score")]
    BestScore,
    /// Chosen by cost at the caller's request
    #[serde(rename = "forced cheapest")]
    #[strum(serialize = "forced cheapest")]
    ForcedCheapest,
    /// Qualified only after the quality floor was relaxed
    #[serde(rename = "relaxed quality threshold")]
    #[strum(serialize = "relaxed quality threshold")]
    RelaxedThreshold,
    /// Nothing qualified; cheapest allowed model
    #[serde(rename = "emergency fallback")]
    #[strum(serialize = "emergency fallback")]
    EmergencyFallback,
}

impl SelectionReason {
    /// Whether the selection fell short of the requested quality
    pub const fn is_degraded(self) -> bool {
        matches!(self, Self::RelaxedThreshold | Self::EmergencyFallback)
    }
}

/// Why a candidate was not selected
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum RejectionReason {
    /// Provider missing from the policy's allow-list
    ProviderNotAllowed,
    /// Quality under the task's floor
    BelowQuality,
    /// Error rate tripped the circuit breaker
    CircuitBroken,
    /// Eligible but ranked below the winner
    Outranked,
}

/// Inputs for one selection
#[derive(Debug, Clone)]
pub struct SelectionContext {
    /// Task being routed
    pub task_category: TaskCategory,
    /// Effective tenant policy
    pub policy: PolicyConfig,
    /// Expected prompt tokens
    pub input_tokens: u32,
    /// Expected completion tokens
    pub output_tokens: u32,
    /// Quality floor overriding policy and catalog
    pub min_performance: Option<f64>,
    /// Organization to attribute the decision to; no log without it
    pub organization_id: Option<String>,
    /// Free-text agent description
    pub agent_type: Option<String>,
    /// Rank by cost alone
    pub force_cheapest: bool,
}

impl SelectionContext {
    /// Context with default token counts and no overrides
    pub const fn new(task_category: TaskCategory, policy: PolicyConfig) -> Self {
        Self {
            task_category,
            policy,
            input_tokens: DEFAULT_INPUT_TOKENS,
            output_tokens: DEFAULT_OUTPUT_TOKENS,
            min_performance: None,
            organization_id: None,
            agent_type: None,
            force_cheapest: false,
        }
    }

    #[must_use]
    pub fn with_tokens(mut self, input_tokens: u32, output_tokens: u32) -> Self {
        self.input_tokens = input_tokens;
        self.output_tokens = output_tokens;
        self
    }

    #[must_use]
    pub fn with_min_performance(mut self, min_performance: f64) -> Self {
        self.min_performance = Some(min_performance);
        self
    }

    #[must_use]
    pub fn for_organization(mut self, organization_id: impl Into<String>) -> Self {
        self.organization_id = Some(organization_id.into());
        self
    }

    #[must_use]
    pub fn with_agent_type(mut self, agent_type: impl Into<String>) -> Self {
        self.agent_type = Some(agent_type.into());
        self
    }

    #[must_use]
    pub fn force_cheapest(mut self, force: bool) -> Self {
        self.force_cheapest = force;
        self
    }
}

/// A scored, selectable model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSpec {
    pub provider: String,
    pub model: String,
    /// Total score, lower is better
    pub score: f64,
    pub estimated_cost_usd: f64,
    pub quality: f64,
    pub latency_ms: f64,
    pub error_rate: f64,
    pub reason: SelectionReason,
}

impl ModelSpec {
    /// Canonical identifier in "provider:model" format
    pub fn id(&self) -> String {
        format!("{}:{}", self.provider, self.model)
    }
}

/// A candidate removed by a filter stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedCandidate {
    pub provider: String,
    pub model: String,
    pub quality: f64,
    pub reason: RejectionReason,
}

/// Candidates removed by each filter stage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilteredCandidates {
    pub by_provider: Vec<RejectedCandidate>,
    pub by_quality: Vec<RejectedCandidate>,
    pub by_circuit: Vec<RejectedCandidate>,
}

impl FilteredCandidates {
    /// All rejections in filter order
    pub fn rejections(&self) -> impl Iterator<Item = &RejectedCandidate> {
        self.by_provider
            .iter()
            .chain(&self.by_quality)
            .chain(&self.by_circuit)
    }

    /// Total number of rejected candidates
    pub fn len(&self) -> usize {
        self.by_provider.len() + self.by_quality.len() + self.by_circuit.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop rejections for models that made it into the final pool
    fn retain_outside(&mut self, pool: &[Candidate<'_>]) {
        let pooled = |r: &RejectedCandidate| {
            pool.iter()
                .any(|c| c.profile.provider == r.provider && c.profile.model == r.model)
        };
        self.by_provider.retain(|r| !pooled(r));
        self.by_quality.retain(|r| !pooled(r));
        self.by_circuit.retain(|r| !pooled(r));
    }
}

fn rejected(profile: &ModelProfile, quality: f64, reason: RejectionReason) -> RejectedCandidate {
    RejectedCandidate {
        provider: profile.provider.clone(),
        model: profile.model.clone(),
        quality,
        reason,
    }
}

/// Outcome of one selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionResult {
    /// Winning model
    pub selected: ModelSpec,
    /// Remaining eligible models, best first
    pub alternatives: Vec<ModelSpec>,
    /// Rejections from the filter pass that produced the final pool
    pub filtered: FilteredCandidates,
    /// Audit record, present when an organization was given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision_log: Option<DecisionLog>,
}

impl SelectionResult {
    /// Whether the selection fell short of the requested quality
    pub const fn is_degraded(&self) -> bool {
        self.selected.reason.is_degraded()
    }
}

/// Eligible model with everything needed to rank it
#[derive(Debug, Clone)]
struct Candidate<'a> {
    profile: &'a ModelProfile,
    quality: f64,
    estimated_cost_usd: f64,
    metrics: Option<TelemetryMetrics>,
    factors: ScoreFactors,
}

impl Candidate<'_> {
    fn spec(&self, reason: SelectionReason) -> ModelSpec {
        let (latency_ms, error_rate) = observed_performance(self.metrics.as_ref());
        ModelSpec {
            provider: self.profile.provider.clone(),
            model: self.profile.model.clone(),
            score: self.factors.total_score,
            estimated_cost_usd: self.estimated_cost_usd,
            quality: self.quality,
            latency_ms,
            error_rate,
            reason,
        }
    }
}

/// Select the cheapest model that meets a task's quality floor
pub struct ModelSelector {
    registry: Arc<ModelRegistry>,
    catalog: Arc<TaskCatalog>,
    telemetry: Arc<TelemetryTracker>,
    recorder: Option<Arc<dyn DecisionRecorder>>,
}

impl std::fmt::Debug for ModelSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelSelector")
            .field("models", &self.registry.profiles().len())
            .field("recorder", &self.recorder.is_some())
            .finish_non_exhaustive()
    }
}

impl ModelSelector {
    /// Create a selector over shared registry, catalog and telemetry
    pub const fn new(registry: Arc<ModelRegistry>, catalog: Arc<TaskCatalog>, telemetry: Arc<TelemetryTracker>) -> Self {
        Self {
            registry,
            catalog,
            telemetry,
            recorder: None,
        }
    }

    /// Hand every decision log to the given recorder
    #[must_use]
    pub fn with_recorder(mut self, recorder: Arc<dyn DecisionRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// Select a model for the given context
    ///
    /// Degraded selections are not errors; they are reported through the
    /// winner's reason. Fails only on an invalid policy or when no allowed
    /// provider has any registered model.
    pub fn select_model(&self, ctx: &SelectionContext) -> Result<SelectionResult, RoutingError> {
        let mut violations = ctx.policy.validate();
        if let Some(min_performance) = ctx.min_performance {
            check_range(&mut violations, "minPerformance", min_performance, 0.0, 1.0);
        }
        if !violations.is_empty() {
            return Err(RoutingError::Configuration { violations });
        }

        let threshold = self.threshold(ctx);
        let universe = self.universe(ctx);

        let (mut eligible, mut filtered) = self.filter(ctx, &universe, threshold);
        let mut applied_threshold = threshold;
        let mut reason = if ctx.force_cheapest {
            SelectionReason::ForcedCheapest
        } else {
            SelectionReason::BestScore
        };

        if eligible.is_empty() {
            applied_threshold = threshold * RELAXATION_FACTOR;
            tracing::warn!(
                task = %ctx.task_category,
                threshold,
                relaxed = applied_threshold,
                "no model met quality floor, relaxing"
            );
            (eligible, filtered) = self.filter(ctx, &universe, applied_threshold);
            reason = SelectionReason::RelaxedThreshold;
        }

        if eligible.is_empty() {
            eligible = self.emergency_pool(ctx, &universe)?;
            filtered.retain_outside(&eligible);
            reason = SelectionReason::EmergencyFallback;
            tracing::warn!(
                task = %ctx.task_category,
                pool = eligible.len(),
                "no model met relaxed quality floor, using emergency fallback"
            );
        }

        let by_cost = ctx.force_cheapest || reason == SelectionReason::EmergencyFallback;
        eligible.sort_by(|a, b| rank(a, b, by_cost));

        let mut ranked = eligible.into_iter();
        let Some(winner) = ranked.next() else {
            return Err(RoutingError::NoEligibleModel {
                task: ctx.task_category,
            });
        };
        let rest: Vec<Candidate<'_>> = ranked.collect();

        let selected = winner.spec(reason);
        let alternatives: Vec<ModelSpec> = rest.iter().map(|c| c.spec(reason)).collect();

        tracing::info!(
            task = %ctx.task_category,
            provider = %selected.provider,
            model = %selected.model,
            score = selected.score,
            estimated_cost_usd = selected.estimated_cost_usd,
            reason = %reason,
            alternatives = alternatives.len(),
            "model selected"
        );

        let decision_log = ctx.organization_id.as_deref().map(|organization_id| {
            self.decision_log(ctx, organization_id, &winner, &rest, &filtered, reason, applied_threshold)
        });

        if let (Some(log), Some(recorder)) = (&decision_log, &self.recorder)
            && let Err(e) = recorder.record(log.clone())
        {
            tracing::warn!(
                organization_id = %log.organization_id,
                decision_id = %log.id,
                error = %e,
                "failed to record decision"
            );
        }

        Ok(SelectionResult {
            selected,
            alternatives,
            filtered,
            decision_log,
        })
    }

    /// Quality floor: caller override, then policy override, then catalog
    fn threshold(&self, ctx: &SelectionContext) -> f64 {
        ctx.min_performance
            .or_else(|| {
                ctx.policy
                    .task_override(ctx.task_category)
                    .and_then(|o| o.min_perf)
            })
            .unwrap_or_else(|| self.catalog.min_performance(ctx.task_category))
    }

    /// Registry models, narrowed by the policy's preferred list when set
    fn universe(&self, ctx: &SelectionContext) -> Vec<&ModelProfile> {
        let preferred = ctx
            .policy
            .task_override(ctx.task_category)
            .and_then(|o| o.preferred_models.as_deref());

        match preferred {
            Some(models) => self
                .registry
                .profiles()
                .iter()
                .filter(|p| models.iter().any(|m| *m == p.model || *m == p.id()))
                .collect(),
            None => self.registry.profiles().iter().collect(),
        }
    }

    fn filter<'a>(
        &self,
        ctx: &SelectionContext,
        universe: &[&'a ModelProfile],
        threshold: f64,
    ) -> (Vec<Candidate<'a>>, FilteredCandidates) {
        let mut eligible = Vec::new();
        let mut filtered = FilteredCandidates::default();

        for profile in universe {
            let quality = self.catalog.quality_for(ctx.task_category, &profile.model);

            if !ctx.policy.allows(&profile.provider) {
                filtered
                    .by_provider
                    .push(rejected(profile, quality, RejectionReason::ProviderNotAllowed));
                continue;
            }
            if quality < threshold {
                filtered
                    .by_quality
                    .push(rejected(profile, quality, RejectionReason::BelowQuality));
                continue;
            }
            if self.telemetry.is_circuit_broken(&profile.provider, &profile.model) {
                filtered
                    .by_circuit
                    .push(rejected(profile, quality, RejectionReason::CircuitBroken));
                continue;
            }

            eligible.push(self.candidate(ctx, profile, quality));
        }

        tracing::debug!(
            task = %ctx.task_category,
            threshold,
            eligible = eligible.len(),
            by_provider = filtered.by_provider.len(),
            by_quality = filtered.by_quality.len(),
            by_circuit = filtered.by_circuit.len(),
            "candidates filtered"
        );

        (eligible, filtered)
    }

    /// Allowed models regardless of quality, preferring closed circuits
    ///
    /// Draws from the whole registry when the policy's preferred list holds
    /// no allowed model.
    fn emergency_pool<'a>(
        &'a self,
        ctx: &SelectionContext,
        universe: &[&'a ModelProfile],
    ) -> Result<Vec<Candidate<'a>>, RoutingError> {
        let mut allowed: Vec<&ModelProfile> = universe
            .iter()
            .copied()
            .filter(|p| ctx.policy.allows(&p.provider))
            .collect();
        if allowed.is_empty() {
            allowed = self
                .registry
                .profiles()
                .iter()
                .filter(|p| ctx.policy.allows(&p.provider))
                .collect();
        }
        if allowed.is_empty() {
            tracing::error!(
                task = %ctx.task_category,
                providers = ?ctx.policy.allowed_providers,
                "no registered model for any allowed provider"
            );
            return Err(RoutingError::NoEligibleModel {
                task: ctx.task_category,
            });
        }

        let healthy: Vec<&ModelProfile> = allowed
            .iter()
            .copied()
            .filter(|p| !self.telemetry.is_circuit_broken(&p.provider, &p.model))
            .collect();
        let pool = if healthy.is_empty() { allowed } else { healthy };

        Ok(pool
            .into_iter()
            .map(|profile| {
                let quality = self.catalog.quality_for(ctx.task_category, &profile.model);
                self.candidate(ctx, profile, quality)
            })
            .collect())
    }

    fn candidate<'a>(&self, ctx: &SelectionContext, profile: &'a ModelProfile, quality: f64) -> Candidate<'a> {
        let estimated_cost_usd = profile.estimate_cost(ctx.input_tokens, ctx.output_tokens);
        let metrics = self.telemetry.telemetry(&profile.provider, &profile.model);
        let (latency_ms, error_rate) = observed_performance(metrics.as_ref());

        Candidate {
            profile,
            quality,
            estimated_cost_usd,
            metrics,
            factors: ScoreFactors::compute(estimated_cost_usd, latency_ms, error_rate, quality),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn decision_log(
        &self,
        ctx: &SelectionContext,
        organization_id: &str,
        winner: &Candidate<'_>,
        rest: &[Candidate<'_>],
        filtered: &FilteredCandidates,
        reason: SelectionReason,
        threshold: f64,
    ) -> DecisionLog {
        let ranked = rest.iter().map(|c| AlternativeRecord {
            provider: c.profile.provider.clone(),
            model: c.profile.model.clone(),
            quality: c.quality,
            estimated_cost_usd: c.estimated_cost_usd,
            score: Some(c.factors.total_score),
            rejection: RejectionReason::Outranked,
        });
        let rejections = filtered.rejections().map(|r| AlternativeRecord {
            provider: r.provider.clone(),
            model: r.model.clone(),
            quality: r.quality,
            estimated_cost_usd: self
                .registry
                .price_for(&r.provider, &r.model)
                .estimate_cost(ctx.input_tokens, ctx.output_tokens),
            score: None,
            rejection: r.reason,
        });

        DecisionLog {
            id: Uuid::new_v4(),
            timestamp: Timestamp::now(),
            organization_id: organization_id.to_owned(),
            task_category: ctx.task_category,
            agent_type: ctx.agent_type.clone(),
            selected_provider: winner.profile.provider.clone(),
            selected_model: winner.profile.model.clone(),
            estimated_cost: winner.estimated_cost_usd,
            factors: winner.factors,
            alternatives: ranked.chain(rejections).collect(),
            reason,
            constraints: ConstraintSnapshot {
                trial_mode: ctx.policy.trial_mode,
                allowed_providers: ctx.policy.allowed_providers.clone(),
                min_performance: threshold,
                max_request_cost_usd: ctx.policy.max_request_cost_usd,
                max_daily_cost_usd: ctx.policy.max_daily_cost_usd,
                input_tokens: ctx.input_tokens,
                output_tokens: ctx.output_tokens,
                force_cheapest: ctx.force_cheapest,
            },
            telemetry: winner.metrics.clone(),
        }
    }
}

/// Ascending by score (or cost), then the other, then identifier
fn rank(a: &Candidate<'_>, b: &Candidate<'_>, by_cost: bool) -> Ordering {
    let by_score = a.factors.total_score.total_cmp(&b.factors.total_score);
    let by_price = a.estimated_cost_usd.total_cmp(&b.estimated_cost_usd);
    let primary = if by_cost {
        by_price.then(by_score)
    } else {
        by_score.then(by_price)
    };

    primary
        .then_with(|| a.profile.provider.cmp(&b.profile.provider))
        .then_with(|| a.profile.model.cmp(&b.profile.model))
}

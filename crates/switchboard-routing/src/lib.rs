//! Cost-aware model routing for Switchboard
//!
//! Picks the cheapest provider/model pair that meets a task's quality floor:
//! - **Policy**: tenant caps and provider allow-lists merged over tier defaults
//! - **Catalog**: per-task quality floors and a (task, model) quality matrix
//! - **Telemetry**: EWMA latency and error rate with circuit breaking
//! - **Decisions**: bounded per-organization audit trail with explanations

#![allow(
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::cast_precision_loss
)]

pub mod catalog;
pub mod decision;
pub mod error;
pub mod explain;
pub mod policy;
pub mod registry;
pub mod scoring;
pub mod selector;
pub mod telemetry;

use std::sync::Arc;

pub use catalog::{TaskCatalog, TaskCatalogEntry, TaskCategory, infer_task_category};
pub use decision::{DecisionExport, DecisionFilter, DecisionLog, DecisionRecorder, DecisionStats, DecisionStore};
pub use error::RoutingError;
pub use explain::{DecisionExplanation, explain_decision};
pub use policy::{PolicyConfig, PolicyResolver, PolicyViolation, StoredPolicy, TaskOverride};
pub use registry::{ModelProfile, ModelRegistry, TokenPrice};
pub use scoring::ScoreFactors;
pub use selector::{ModelSelector, ModelSpec, SelectionContext, SelectionReason, SelectionResult};
pub use telemetry::{TelemetryMetrics, TelemetryTracker};

use switchboard_config::Config;

/// Fully wired routing engine
///
/// Owns the shared telemetry and decision stores and hands them to the
/// selector, so every selection made through the engine is recorded.
#[derive(Debug)]
pub struct RoutingEngine {
    resolver: PolicyResolver,
    selector: ModelSelector,
    registry: Arc<ModelRegistry>,
    catalog: Arc<TaskCatalog>,
    telemetry: Arc<TelemetryTracker>,
    decisions: Arc<DecisionStore>,
}

impl RoutingEngine {
    /// Build an engine from loaded configuration
    pub fn from_config(config: &Config) -> Result<Self, RoutingError> {
        let registry = Arc::new(ModelRegistry::from_config(&config.models));
        let catalog = Arc::new(TaskCatalog::builtin());
        let telemetry = Arc::new(TelemetryTracker::from_config(&config.telemetry)?);
        let decisions = Arc::new(DecisionStore::new());

        let selector = ModelSelector::new(Arc::clone(&registry), Arc::clone(&catalog), Arc::clone(&telemetry))
            .with_recorder(Arc::clone(&decisions) as Arc<dyn DecisionRecorder>);

        tracing::debug!(
            models = registry.profiles().len(),
            providers = ?registry.providers(),
            "routing engine ready"
        );

        Ok(Self {
            resolver: PolicyResolver::new(config.policy.clone()),
            selector,
            registry,
            catalog,
            telemetry,
            decisions,
        })
    }

    /// Resolve the effective policy for an organization
    pub fn resolve_policy(&self, stored: Option<&StoredPolicy>, organization_id: &str) -> Result<PolicyConfig, RoutingError> {
        self.resolver.resolve(stored, organization_id)
    }

    /// Select a model, recording the decision when an organization is given
    pub fn select(&self, ctx: &SelectionContext) -> Result<SelectionResult, RoutingError> {
        self.selector.select_model(ctx)
    }

    /// Feed a provider outcome back into telemetry
    pub fn record_request(&self, provider: &str, model: &str, latency_ms: f64, success: bool) -> TelemetryMetrics {
        self.telemetry.record_request(provider, model, latency_ms, success)
    }

    /// Point-in-time copy of live telemetry, most recently updated first
    pub fn recent_telemetry(&self) -> Vec<TelemetryMetrics> {
        self.telemetry.recent_telemetry()
    }

    pub const fn resolver(&self) -> &PolicyResolver {
        &self.resolver
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn catalog(&self) -> &TaskCatalog {
        &self.catalog
    }

    pub fn telemetry(&self) -> &TelemetryTracker {
        &self.telemetry
    }

    pub fn decisions(&self) -> &DecisionStore {
        &self.decisions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_builds_engine() {
        let engine = RoutingEngine::from_config(&Config::default()).unwrap();
        assert_eq!(engine.registry().profiles().len(), 6);
        assert!(engine.decisions().organizations().is_empty());
    }

    #[test]
    fn selections_with_organization_are_recorded() {
        let engine = RoutingEngine::from_config(&Config::default()).unwrap();
        let policy = engine.resolve_policy(None, "org-1").unwrap();
        let ctx = SelectionContext::new(TaskCategory::PrPitch, policy).for_organization("org-1");

        let result = engine.select(&ctx).unwrap();
        let latest = engine.decisions().latest_decision("org-1").unwrap();

        assert_eq!(Some(latest), result.decision_log);
    }

    #[test]
    fn feedback_reaches_selection() {
        let engine = RoutingEngine::from_config(&Config::default()).unwrap();
        for _ in 0..5 {
            engine.record_request("anthropic", "claude-3-sonnet", 900.0, false);
        }
        let policy = engine.resolve_policy(None, "org-1").unwrap();

        let result = engine
            .select(&SelectionContext::new(TaskCategory::PrPitch, policy))
            .unwrap();

        assert_eq!(result.selected.model, "gpt-4o");
        assert_eq!(engine.recent_telemetry().len(), 1);
    }
}

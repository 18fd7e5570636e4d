//! Human-readable breakdown of a single decision

use std::fmt;

use jiff::Timestamp;
use serde::Serialize;
use uuid::Uuid;

use crate::catalog::TaskCategory;
use crate::decision::{AlternativeRecord, ConstraintSnapshot, DecisionLog};
use crate::scoring::ScoreFactors;
use crate::selector::{RejectionReason, SelectionReason};
use crate::telemetry::TelemetryMetrics;

/// Structured explanation of why a model was chosen
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionExplanation {
    pub decision_id: Uuid,
    pub timestamp: Timestamp,
    pub organization_id: String,
    pub task_category: TaskCategory,
    pub agent_type: Option<String>,
    /// Selected model in "provider:model" format
    pub selected: String,
    pub reason: SelectionReason,
    pub degraded: bool,
    pub estimated_cost_usd: f64,
    pub rationale: String,
    pub factors: ScoreFactors,
    pub constraints: ConstraintSnapshot,
    pub alternatives: Vec<AlternativeRecord>,
    pub telemetry: Option<TelemetryMetrics>,
}

/// Explain one logged decision
pub fn explain_decision(log: &DecisionLog) -> DecisionExplanation {
    DecisionExplanation {
        decision_id: log.id,
        timestamp: log.timestamp,
        organization_id: log.organization_id.clone(),
        task_category: log.task_category,
        agent_type: log.agent_type.clone(),
        selected: log.selected_id(),
        reason: log.reason,
        degraded: log.reason.is_degraded(),
        estimated_cost_usd: log.estimated_cost,
        rationale: rationale(log),
        factors: log.factors,
        constraints: log.constraints.clone(),
        alternatives: log.alternatives.clone(),
        telemetry: log.telemetry.clone(),
    }
}

fn rationale(log: &DecisionLog) -> String {
    let qualified = 1 + log
        .alternatives
        .iter()
        .filter(|a| a.rejection == RejectionReason::Outranked)
        .count();

    match log.reason {
        SelectionReason::BestScore => {
            format!("lowest weighted score among {qualified} qualified models")
        }
        SelectionReason::ForcedCheapest => {
            format!("cheapest of {qualified} qualified models, ranked by cost on request")
        }
        SelectionReason::RelaxedThreshold => format!(
            "no model met the quality floor; selected after relaxing it to {:.2}",
            log.constraints.min_performance
        ),
        SelectionReason::EmergencyFallback => {
            "no model met the relaxed quality floor; cheapest allowed model selected".to_owned()
        }
    }
}

const fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

impl fmt::Display for DecisionExplanation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Decision {} at {}", self.decision_id, self.timestamp)?;
        writeln!(f, "Organization: {}", self.organization_id)?;
        match &self.agent_type {
            Some(agent) => writeln!(f, "Task: {} (agent: {agent})", self.task_category)?,
            None => writeln!(f, "Task: {}", self.task_category)?,
        }
        writeln!(f, "Selected: {} ({})", self.selected, self.reason)?;
        if self.degraded {
            writeln!(f, "Warning: degraded selection")?;
        }
        writeln!(f, "Estimated cost: ${:.6}", self.estimated_cost_usd)?;
        writeln!(f, "Rationale: {}", self.rationale)?;

        writeln!(f)?;
        writeln!(f, "Factors:")?;
        writeln!(f, "  cost     {:.4}", self.factors.cost_score)?;
        writeln!(f, "  latency  {:.4}", self.factors.latency_score)?;
        writeln!(f, "  error    {:.4}", self.factors.error_score)?;
        writeln!(f, "  quality  {:.4}", self.factors.quality_score)?;
        writeln!(f, "  total    {:.4}", self.factors.total_score)?;

        let c = &self.constraints;
        writeln!(f)?;
        writeln!(f, "Constraints:")?;
        writeln!(f, "  trial mode: {}", yes_no(c.trial_mode))?;
        writeln!(f, "  providers: {}", c.allowed_providers.join(", "))?;
        writeln!(f, "  min performance: {:.2}", c.min_performance)?;
        writeln!(f, "  max request cost: ${:.2}", c.max_request_cost_usd)?;
        writeln!(f, "  max daily cost: ${:.2}", c.max_daily_cost_usd)?;
        writeln!(f, "  tokens: {} in / {} out", c.input_tokens, c.output_tokens)?;
        writeln!(f, "  force cheapest: {}", yes_no(c.force_cheapest))?;

        writeln!(f)?;
        if self.alternatives.is_empty() {
            writeln!(f, "Alternatives: none")?;
        } else {
            writeln!(f, "Alternatives:")?;
            for alt in &self.alternatives {
                match alt.score {
                    Some(score) => writeln!(
                        f,
                        "  {}:{} {} (score {score:.4}, cost ${:.6})",
                        alt.provider, alt.model, alt.rejection, alt.estimated_cost_usd
                    )?,
                    None => writeln!(
                        f,
                        "  {}:{} {} (quality {:.2}, cost ${:.6})",
                        alt.provider, alt.model, alt.rejection, alt.quality, alt.estimated_cost_usd
                    )?,
                }
            }
        }

        writeln!(f)?;
        match &self.telemetry {
            Some(m) => write!(
                f,
                "Telemetry: {:.0} ms latency, {:.1}% errors over {} requests",
                m.latency_ms,
                m.error_rate * 100.0,
                m.request_count
            ),
            None => write!(f, "Telemetry: none observed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::tests::sample_log;

    fn fixed_log() -> DecisionLog {
        let mut log = sample_log("org-1", "claude-3-sonnet", 0.0105);
        log.id = Uuid::nil();
        log.timestamp = "2026-01-15T12:00:00Z".parse().unwrap();
        log.agent_type = Some("pr-pitch-writer".to_owned());
        log.alternatives.push(AlternativeRecord {
            provider: "openai".to_owned(),
            model: "gpt-4o-mini".to_owned(),
            quality: 0.75,
            estimated_cost_usd: 0.00045,
            score: None,
            rejection: RejectionReason::BelowQuality,
        });
        log
    }

    #[test]
    fn renders_full_breakdown() {
        let explanation = explain_decision(&fixed_log());

        insta::assert_snapshot!(explanation.to_string(), @r"
        Decision 00000000-0000-0000-0000-000000000000 at 2026-01-15T12:00:00Z
        Organization: org-1
        Task: pr-pitch (agent: pr-pitch-writer)
        Selected: anthropic:claude-3-sonnet (best score)
        Estimated cost: $0.010500
        Rationale: lowest weighted score among 2 qualified models

        Factors:
          cost     0.6300
          latency  0.3500
          error    0.0000
          quality  0.9200
          total    0.9800

        Constraints:
          trial mode: no
          providers: openai, anthropic
          min performance: 0.80
          max request cost: $5.00
          max daily cost: $500.00
          tokens: 1000 in / 500 out
          force cheapest: no

        Alternatives:
          openai:gpt-4o outranked (score 1.1000, cost $0.012500)
          openai:gpt-4o-mini below-quality (quality 0.75, cost $0.000450)

        Telemetry: none observed
        ");
    }

    #[test]
    fn degraded_selection_is_flagged() {
        let mut log = fixed_log();
        log.reason = SelectionReason::RelaxedThreshold;
        log.constraints.min_performance = 0.72;

        let explanation = explain_decision(&log);
        let text = explanation.to_string();

        assert!(explanation.degraded);
        assert!(text.contains("Warning: degraded selection"));
        assert!(text.contains("relaxing it to 0.72"));
    }

    #[test]
    fn telemetry_line_uses_snapshot() {
        let mut log = fixed_log();
        log.alternatives.clear();
        log.telemetry = Some(TelemetryMetrics {
            provider: "anthropic".to_owned(),
            model: "claude-3-sonnet".to_owned(),
            latency_ms: 843.6,
            error_rate: 0.125,
            request_count: 12,
            last_updated: log.timestamp,
        });

        let text = explain_decision(&log).to_string();

        assert!(text.contains("Alternatives: none"));
        assert!(text.ends_with("Telemetry: 844 ms latency, 12.5% errors over 12 requests"));
    }
}

mod harness;

use harness::config::ConfigBuilder;
use jiff::{SignedDuration, Timestamp};
use switchboard_routing::decision::MAX_DECISIONS_PER_ORG;
use switchboard_routing::selector::RejectionReason;
use switchboard_routing::{
    DecisionExport, DecisionFilter, RoutingEngine, SelectionContext, TaskCategory, explain_decision,
};

fn select_for(engine: &RoutingEngine, organization_id: &str, category: TaskCategory, force_cheapest: bool) {
    let policy = engine.resolve_policy(None, organization_id).unwrap();
    let ctx = SelectionContext::new(category, policy)
        .for_organization(organization_id)
        .force_cheapest(force_cheapest);
    engine.select(&ctx).unwrap();
}

#[test]
fn selections_are_logged_per_organization() {
    let engine = ConfigBuilder::new().engine();
    select_for(&engine, "acme", TaskCategory::PrPitch, false);
    select_for(&engine, "acme", TaskCategory::Seo, false);
    select_for(&engine, "globex", TaskCategory::LongForm, false);

    assert_eq!(engine.decisions().organizations(), vec!["acme", "globex"]);

    let latest = engine.decisions().latest_decision("acme").unwrap();
    assert_eq!(latest.task_category, TaskCategory::Seo);

    let pitches = engine
        .decisions()
        .decision_logs("acme", &DecisionFilter::default().task_category(TaskCategory::PrPitch));
    assert_eq!(pitches.len(), 1);
    assert_eq!(pitches[0].selected_model, "claude-3-sonnet");
}

#[test]
fn anonymous_selections_are_not_logged() {
    let engine = ConfigBuilder::new().engine();
    let policy = engine.resolve_policy(None, "acme").unwrap();

    let result = engine
        .select(&SelectionContext::new(TaskCategory::PrPitch, policy))
        .unwrap();

    assert!(result.decision_log.is_none());
    assert!(engine.decisions().organizations().is_empty());
}

#[test]
fn history_is_capped() {
    let engine = ConfigBuilder::new().engine();
    for _ in 0..(MAX_DECISIONS_PER_ORG + 20) {
        select_for(&engine, "acme", TaskCategory::ShortForm, false);
    }

    let logs = engine.decisions().decision_logs("acme", &DecisionFilter::default());
    assert_eq!(logs.len(), MAX_DECISIONS_PER_ORG);
    assert!(logs.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
}

#[test]
fn stats_reflect_forced_and_degraded_decisions() {
    let engine = ConfigBuilder::new().engine();
    select_for(&engine, "acme", TaskCategory::PrPitch, false);
    select_for(&engine, "acme", TaskCategory::PrPitch, true);

    let policy = engine.resolve_policy(None, "acme").unwrap();
    let degraded = SelectionContext::new(TaskCategory::PrPitch, policy)
        .with_min_performance(1.0)
        .for_organization("acme");
    engine.select(&degraded).unwrap();

    let stats = engine.decisions().decision_stats("acme");
    assert_eq!(stats.total, 3);
    assert_eq!(stats.forced_cheapest, 1);
    assert_eq!(stats.degraded, 1);
    assert_eq!(stats.by_task_category[&TaskCategory::PrPitch], 3);

    // Sonnet wins all three: on score, on cost, and after relaxing to 0.9
    let performance = engine.decisions().provider_performance("acme");
    assert_eq!(performance.len(), 1);
    assert_eq!(performance[0].model, "claude-3-sonnet");
    assert_eq!(performance[0].times_selected, 3);
}

#[test]
fn date_range_filter_is_inclusive() {
    let engine = ConfigBuilder::new().engine();
    let before = Timestamp::now();
    select_for(&engine, "acme", TaskCategory::Seo, false);
    let after = Timestamp::now();

    let inside = engine
        .decisions()
        .decision_logs("acme", &DecisionFilter::default().between(before, after));
    assert_eq!(inside.len(), 1);

    let earlier = engine.decisions().decision_logs(
        "acme",
        &DecisionFilter::default().between(before - SignedDuration::from_hours(2), before - SignedDuration::from_hours(1)),
    );
    assert!(earlier.is_empty());
}

#[test]
fn decision_log_explains_rejections() {
    let engine = ConfigBuilder::new().engine();
    for _ in 0..5 {
        engine.record_request("openai", "gpt-4o", 700.0, false);
    }
    select_for(&engine, "acme", TaskCategory::PrPitch, false);

    let log = engine.decisions().latest_decision("acme").unwrap();
    let broken: Vec<_> = log
        .alternatives
        .iter()
        .filter(|a| a.rejection == RejectionReason::CircuitBroken)
        .collect();
    assert_eq!(broken.len(), 1);
    assert_eq!(broken[0].model, "gpt-4o");

    let text = explain_decision(&log).to_string();
    assert!(text.contains("Selected: anthropic:claude-3-sonnet (best score)"));
    assert!(text.contains("openai:gpt-4o circuit-broken"));
}

#[test]
fn export_round_trips() {
    let engine = ConfigBuilder::new().engine();
    select_for(&engine, "acme", TaskCategory::PrPitch, false);
    select_for(&engine, "acme", TaskCategory::StructuredJson, false);
    engine.record_request("anthropic", "claude-3-sonnet", 640.0, true);
    select_for(&engine, "acme", TaskCategory::LongForm, false);

    let export = engine.decisions().export_decision_logs("acme");
    let json = serde_json::to_string(&export).unwrap();
    let restored: DecisionExport = serde_json::from_str(&json).unwrap();

    assert_eq!(restored, export);
    assert_eq!(restored.logs.len(), 3);
    assert_eq!(restored.stats.total, 3);
    assert!(restored.logs[0].telemetry.is_some());
}

#[test]
fn clearing_an_organization_forgets_history() {
    let engine = ConfigBuilder::new().engine();
    select_for(&engine, "acme", TaskCategory::Seo, false);
    select_for(&engine, "globex", TaskCategory::Seo, false);

    assert_eq!(engine.decisions().clear("acme"), 1);
    assert!(engine.decisions().latest_decision("acme").is_none());
    assert_eq!(engine.decisions().organizations(), vec!["globex"]);
}

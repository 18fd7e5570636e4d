mod harness;

use harness::config::ConfigBuilder;
use switchboard_config::Config;
use switchboard_routing::{
    RoutingEngine, RoutingError, SelectionContext, SelectionReason, StoredPolicy, TaskCategory, infer_task_category,
};

fn stored(json: serde_json::Value) -> StoredPolicy {
    serde_json::from_value(json).unwrap()
}

#[test]
fn pr_pitch_picks_sonnet() {
    let engine = ConfigBuilder::new().engine();
    let policy = engine.resolve_policy(None, "acme").unwrap();
    let ctx = SelectionContext::new(TaskCategory::PrPitch, policy).with_tokens(1000, 500);

    let result = engine.select(&ctx).unwrap();

    assert_eq!(result.selected.provider, "anthropic");
    assert_eq!(result.selected.model, "claude-3-sonnet");
    assert!((result.selected.score - 0.98).abs() < 1e-9);

    let ranked: Vec<_> = result.alternatives.iter().map(|a| a.model.as_str()).collect();
    assert_eq!(ranked, vec!["gpt-4o", "claude-3-opus"]);
}

#[test]
fn agent_type_drives_task_inference() {
    let engine = ConfigBuilder::new().engine();
    let policy = engine.resolve_policy(None, "acme").unwrap();
    let task = infer_task_category("Weekly PR pitch writer");

    let result = engine
        .select(&SelectionContext::new(task, policy).with_agent_type("Weekly PR pitch writer"))
        .unwrap();

    assert_eq!(task, TaskCategory::PrPitch);
    assert_eq!(result.selected.model, "claude-3-sonnet");
}

#[test]
fn stored_policy_restricts_providers() {
    let engine = ConfigBuilder::new().engine();
    let policy = engine
        .resolve_policy(Some(&stored(serde_json::json!({ "allowedProviders": ["OpenAI"] }))), "acme")
        .unwrap();

    let result = engine
        .select(&SelectionContext::new(TaskCategory::PrPitch, policy))
        .unwrap();

    assert_eq!(result.selected.model, "gpt-4o");
    assert_eq!(result.filtered.by_provider.len(), 3);
}

#[test]
fn trial_tenant_is_clamped_but_still_routed() {
    let engine = ConfigBuilder::new().with_trial_default().engine();
    let policy = engine
        .resolve_policy(
            Some(&stored(serde_json::json!({ "maxDailyCostUsd": 2000, "maxConcurrentJobs": 500 }))),
            "trial-co",
        )
        .unwrap();

    assert!(policy.trial_mode);
    assert!(policy.max_daily_cost_usd <= engine.resolver().defaults().trial.max_daily_cost_usd);
    assert_eq!(policy.max_concurrent_jobs, engine.resolver().defaults().trial.max_concurrent_jobs);

    let result = engine
        .select(&SelectionContext::new(TaskCategory::ShortForm, policy))
        .unwrap();
    assert_eq!(result.selected.model, "gpt-4o-mini");
}

#[test]
fn invalid_stored_policy_is_rejected() {
    let engine = ConfigBuilder::new().engine();
    let err = engine
        .resolve_policy(
            Some(&stored(serde_json::json!({ "maxDailyCostUsd": 1, "maxRequestCostUsd": 3 }))),
            "acme",
        )
        .unwrap_err();

    let RoutingError::Configuration { violations } = err else {
        panic!("expected configuration error");
    };
    assert_eq!(violations.len(), 1);
}

#[test]
fn task_override_narrows_and_lowers_floor() {
    let engine = ConfigBuilder::new().engine();
    let policy = engine
        .resolve_policy(
            Some(&stored(serde_json::json!({
                "taskOverrides": {
                    "analysis": { "minPerf": 0.6, "preferredModels": ["gpt-4o-mini", "claude-3-haiku"] }
                }
            }))),
            "acme",
        )
        .unwrap();

    let result = engine
        .select(&SelectionContext::new(TaskCategory::Analysis, policy))
        .unwrap();

    // Analysis ratings: mini 0.70, haiku 0.65
    assert_eq!(result.selected.model, "gpt-4o-mini");
    assert_eq!(result.selected.reason, SelectionReason::BestScore);
    assert_eq!(result.alternatives.len(), 1);
}

#[test]
fn unreachable_quality_degrades_instead_of_failing() {
    let engine = ConfigBuilder::new()
        .with_providers(&["local"])
        .with_model("local", "tiny", 0.05, 0.10)
        .with_model("local", "small", 0.20, 0.40)
        .engine();
    let policy = engine.resolve_policy(None, "acme").unwrap();

    for category in [TaskCategory::PrPitch, TaskCategory::Analysis, TaskCategory::Seo] {
        let result = engine.select(&SelectionContext::new(category, policy.clone())).unwrap();

        assert_eq!(result.selected.model, "tiny");
        assert_eq!(result.selected.reason, SelectionReason::EmergencyFallback);
        assert!(result.is_degraded());
    }
}

#[test]
fn no_model_for_allowed_provider_is_fatal() {
    let engine = ConfigBuilder::new().with_providers(&["mistral"]).engine();
    let policy = engine.resolve_policy(None, "acme").unwrap();

    let err = engine
        .select(&SelectionContext::new(TaskCategory::LongForm, policy))
        .unwrap_err();

    assert!(matches!(err, RoutingError::NoEligibleModel { .. }));
}

#[test]
fn config_file_drives_pricing_and_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("switchboard.toml");
    std::fs::write(
        &path,
        r#"
[policy]
default_allowed_providers = ['{{ env.SWITCHBOARD_TEST_PROVIDER | default("openai") }}']

[telemetry]
min_samples = 3

[[models]]
provider = "openai"
model = "gpt-4o-mini"
input_per_mtok = 0.15
output_per_mtok = 0.60

[[models]]
provider = "anthropic"
model = "claude-3-haiku"
input_per_mtok = 0.25
output_per_mtok = 1.25
"#,
    )
    .unwrap();

    let config = temp_env::with_var("SWITCHBOARD_TEST_PROVIDER", Some("anthropic"), || Config::load(&path)).unwrap();
    let engine = RoutingEngine::from_config(&config).unwrap();
    let policy = engine.resolve_policy(None, "acme").unwrap();

    assert_eq!(policy.allowed_providers, vec!["anthropic"]);

    let result = engine
        .select(&SelectionContext::new(TaskCategory::Summarization, policy))
        .unwrap();
    assert_eq!(result.selected.model, "claude-3-haiku");
    assert_eq!(result.filtered.by_provider.len(), 1);
}

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

mod args;
mod logging;

use std::path::Path;

use args::{Args, Command, SelectArgs};
use clap::Parser;
use switchboard_config::Config;
use switchboard_routing::{RoutingEngine, SelectionContext, StoredPolicy, explain_decision, infer_task_category};

/// Organization used to resolve policy when none is given
const DEFAULT_ORGANIZATION: &str = "default";

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = Config::load_or_default(&args.config)?;

    logging::init(&config.log)?;

    tracing::debug!(config_path = %args.config.display(), "configuration loaded");

    let engine = RoutingEngine::from_config(&config)?;

    match args.command {
        Command::Select(select) => run_select(&engine, &select),
        Command::Catalog => print_catalog(&engine),
    }
}

fn run_select(engine: &RoutingEngine, args: &SelectArgs) -> anyhow::Result<()> {
    let task = match (args.task, args.agent_type.as_deref()) {
        (Some(task), _) => task,
        (None, Some(agent_type)) => infer_task_category(agent_type),
        (None, None) => anyhow::bail!("either --task or --agent-type is required"),
    };

    let stored = args.policy.as_deref().map(read_policy).transpose()?;
    let organization_id = args.org.as_deref().unwrap_or(DEFAULT_ORGANIZATION);
    let policy = engine.resolve_policy(stored.as_ref(), organization_id)?;

    let mut ctx = SelectionContext::new(task, policy)
        .with_tokens(args.input_tokens, args.output_tokens)
        .force_cheapest(args.force_cheapest);
    if let Some(min_performance) = args.min_performance {
        ctx = ctx.with_min_performance(min_performance);
    }
    if let Some(org) = &args.org {
        ctx = ctx.for_organization(org.clone());
    }
    if let Some(agent_type) = &args.agent_type {
        ctx = ctx.with_agent_type(agent_type.clone());
    }

    let result = engine.select(&ctx)?;

    println!("{}", serde_json::to_string_pretty(&result)?);

    if args.explain
        && let Some(log) = &result.decision_log
    {
        println!();
        println!("{}", explain_decision(log));
    }

    Ok(())
}

fn read_policy(path: &Path) -> anyhow::Result<StoredPolicy> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read policy file {}: {e}", path.display()))?;

    serde_json::from_str(&raw).map_err(|e| anyhow::anyhow!("failed to parse policy file {}: {e}", path.display()))
}

fn print_catalog(engine: &RoutingEngine) -> anyhow::Result<()> {
    let catalog = engine.catalog();

    let entries: Vec<serde_json::Value> = catalog
        .entries()
        .iter()
        .map(|entry| {
            let qualified: Vec<serde_json::Value> = catalog
                .qualified_models(entry.category, entry.min_perf)
                .into_iter()
                .map(|(model, quality)| serde_json::json!({ "model": model, "quality": quality }))
                .collect();

            serde_json::json!({
                "category": entry.category,
                "minPerf": entry.min_perf,
                "preferredModels": entry.preferred_models,
                "qualified": qualified,
            })
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&entries)?);
    Ok(())
}

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use switchboard_routing::TaskCategory;
use switchboard_routing::selector::{DEFAULT_INPUT_TOKENS, DEFAULT_OUTPUT_TOKENS};

/// Switchboard model router
#[derive(Debug, Parser)]
#[command(name = "switchboard", about = "Cost-aware LLM model selection")]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "switchboard.toml", env = "SWITCHBOARD_CONFIG", global = true)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Select a model for a task and print the result as JSON
    Select(SelectArgs),
    /// Print the task catalog with the models qualifying for each task
    Catalog,
}

#[derive(Debug, clap::Args)]
pub struct SelectArgs {
    /// Task category (e.g. `pr-pitch`)
    #[arg(long, value_parser = TaskCategory::from_name, required_unless_present = "agent_type")]
    pub task: Option<TaskCategory>,

    /// Free-text agent description; infers the task when `--task` is absent
    #[arg(long)]
    pub agent_type: Option<String>,

    /// Expected prompt tokens
    #[arg(long, default_value_t = DEFAULT_INPUT_TOKENS)]
    pub input_tokens: u32,

    /// Expected completion tokens
    #[arg(long, default_value_t = DEFAULT_OUTPUT_TOKENS)]
    pub output_tokens: u32,

    /// Organization to resolve policy for and record the decision under
    #[arg(long)]
    pub org: Option<String>,

    /// Stored tenant policy (JSON)
    #[arg(long)]
    pub policy: Option<PathBuf>,

    /// Rank by estimated cost alone
    #[arg(long)]
    pub force_cheapest: bool,

    /// Quality floor overriding policy and catalog
    #[arg(long)]
    pub min_performance: Option<f64>,

    /// Also print a human-readable explanation (requires `--org`)
    #[arg(long, requires = "org")]
    pub explain: bool,
}

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

mod apply;
mod lm;
mod render;
mod run;
mod schema;
mod util;
mod validate;
mod vcs;

use crate::lm::CommandInference;
use crate::run::{preview_plan, RunConfig, RunCoordinator};
use crate::vcs::{ForgeConfig, GitForge};

#[derive(Parser, Debug)]
#[command(name = "patchbot", version, about = "Comment-triggered edit-plan bot")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Request a plan, apply the admitted edits, and open a change request
    Run(RunArgs),
    /// Request and validate a plan without touching the working tree
    Plan(PlanArgs),
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Task text from the triggering comment
    #[arg(long)]
    task: String,

    /// Login of the user who asked for the change
    #[arg(long)]
    actor: String,

    /// Repository working tree root
    #[arg(long, default_value = ".")]
    repo: PathBuf,

    /// `owner/name` of the repository on the API host
    #[arg(long)]
    remote: Option<String>,

    /// Base branch for the change request
    #[arg(long, default_value = "main")]
    base: String,

    /// Issue or pull-request number for status comments
    #[arg(long)]
    conversation: Option<String>,

    /// API token for change-request and comment calls
    #[arg(long)]
    token: Option<String>,

    /// Override the forge API base URL
    #[arg(long, value_name = "URL")]
    api_base: Option<String>,
}

#[derive(Parser, Debug)]
struct PlanArgs {
    /// Task text from the triggering comment
    #[arg(long)]
    task: String,

    /// Repository working tree root
    #[arg(long, default_value = ".")]
    repo: PathBuf,
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Run(args) => run_command(args),
        Commands::Plan(args) => plan_command(args),
    };
    if let Err(err) = result {
        // Collaborator failures must not fail the enclosing CI automation;
        // log the full chain and exit cleanly.
        tracing::error!("run failed: {err:#}");
    }
    ExitCode::SUCCESS
}

fn run_command(args: RunArgs) -> Result<()> {
    let inference = CommandInference::new(lm::load_lm_command()?);
    let token = match args.token {
        Some(token) => token,
        None => std::env::var("PATCHBOT_TOKEN").unwrap_or_default(),
    };
    let forge = GitForge::new(
        args.repo.clone(),
        ForgeConfig {
            remote: args.remote,
            token,
            api_base: args.api_base,
        },
    );
    let config = RunConfig {
        task: args.task,
        actor: args.actor,
        base_branch: args.base,
        conversation: args.conversation,
    };
    let coordinator = RunCoordinator::new(config, args.repo, &inference, &forge);
    coordinator.execute()?;
    Ok(())
}

fn plan_command(args: PlanArgs) -> Result<()> {
    let inference = CommandInference::new(lm::load_lm_command()?);
    preview_plan(&args.repo, &args.task, &inference)
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_env("PATCHBOT_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

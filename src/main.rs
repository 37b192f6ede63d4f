mod cmd;
mod config;
mod context;
mod domain;
mod error;
mod infra;
mod services;
mod store;
mod workflow;

use std::io;

use clap::{ArgAction, Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::cmd::config::ConfigArgs;
use crate::cmd::plan::PlanArgs;
use crate::cmd::template::TemplateArgs;
use crate::cmd::ticket::TicketArgs;
use crate::error::AppResult;

#[derive(Parser)]
#[command(
    name = "tplan",
    author,
    version,
    about = "Generate QA test plans from Jira tickets"
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage CLI configuration.
    Config(ConfigArgs),
    /// Fetch tickets from Jira.
    Ticket(TicketArgs),
    /// Import and manage test plan templates.
    Template(TemplateArgs),
    /// Generate, review and export test plans.
    Plan(PlanArgs),
    /// List models available on the Ollama server.
    Models,
}

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> AppResult<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Config(args) => cmd::config::run(args.command).await,
        Commands::Ticket(args) => cmd::ticket::run(args.command).await,
        Commands::Template(args) => cmd::template::run(args.command).await,
        Commands::Plan(args) => cmd::plan::run(args.command).await,
        Commands::Models => cmd::models::run().await,
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .try_init()
        .ok();
}

//! MITO CLI - work your tasks from the terminal, online or off

mod auth;
mod cli;
mod commands;
mod error;

use clap::Parser;
use tracing_subscriber::filter::{Directive, LevelFilter};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::auth_cmd::run_auth;
use crate::commands::comments::run_comments;
use crate::commands::common::{AppContext, GlobalOptions};
use crate::commands::completions::run_completions;
use crate::commands::files::run_files;
use crate::commands::notifications::run_notifications;
use crate::commands::profile::run_profile;
use crate::commands::sync::{run_queue, run_sync};
use crate::commands::tasks::{run_departments, run_tasks};
use crate::commands::watch::run_watch;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {}", error.user_message());
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let default_directive = "mito=info"
        .parse::<Directive>()
        .unwrap_or_else(|_| LevelFilter::INFO.into());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(default_directive))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let options = GlobalOptions {
        data_dir: cli.data_dir,
        api_url: cli.api_url,
        offline: cli.offline,
    };

    if let Commands::Completions { shell, output } = &cli.command {
        return run_completions(*shell, output.as_deref());
    }

    let context = AppContext::open(&options)?;
    run_command(&context, cli.command).await
}

async fn run_command(context: &AppContext, command: Commands) -> Result<(), CliError> {
    match command {
        Commands::Auth { command } => run_auth(context, command).await,
        Commands::Profile { command } => run_profile(context, command).await,
        Commands::Departments { json } => run_departments(context, json).await,
        Commands::Tasks { command } => run_tasks(context, command).await,
        Commands::Comments { command } => run_comments(context, command).await,
        Commands::Notifications { command } => run_notifications(context, command).await,
        Commands::Files { command } => run_files(context, command).await,
        Commands::Queue { json } => run_queue(context, json),
        Commands::Sync { json } => run_sync(context, json).await,
        Commands::Watch { no_sync } => run_watch(context, no_sync).await,
        Commands::Completions { shell, output } => run_completions(shell, output.as_deref()),
    }
}

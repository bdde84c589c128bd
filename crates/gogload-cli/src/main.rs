//! CLI entry point - the composition root.
//!
//! Infrastructure is wired together only through [`bootstrap`]; command
//! dispatch routes to handlers which delegate to the download supervisor.

use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use gogload_cli::handlers::{self, fetch::FetchArgs};
use gogload_cli::{Cli, CliConfig, CliError, Commands, bootstrap};

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables before clap reads GOGLOAD_* defaults
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    // No command provided - show help
    let Some(command) = cli.command.as_ref() else {
        Cli::command().print_help()?;
        return Ok(());
    };

    // Bootstrap the CLI context (composition root)
    let config = CliConfig::from_cli(&cli)?;
    let ctx = bootstrap(config).await?;

    match command {
        Commands::Fetch {
            game,
            link,
            url,
            name,
            size,
        } => {
            let args = FetchArgs {
                game_id: game.clone(),
                link_id: link.clone(),
                url: url.clone(),
                file_name: name.clone(),
                size: *size,
            };
            handlers::fetch::execute(&ctx, &args).await
        }
        Commands::Batch { manifest } => handlers::batch::execute(&ctx, manifest).await,
        Commands::Resume { job } => handlers::control::resume(&ctx, job.as_ref()).await,
        Commands::Pause { job } => handlers::control::pause(&ctx, job).await,
        Commands::Cancel { job } => handlers::control::cancel(&ctx, job).await,
        Commands::Retry { job } => handlers::control::retry(&ctx, job).await,
        Commands::Status => handlers::status::execute(&ctx).await,
        Commands::Prune { days } => handlers::prune::execute(&ctx, *days).await,
    }
}

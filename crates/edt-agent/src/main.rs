use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use edt_agent::commands::run;
use edt_agent::sink::CliSink;
use edt_agent::{Cli, Commands, Config};

/// Load configuration for a subcommand.
fn load_config(cli: &Cli) -> Result<Config> {
    let config = Config::load_from(cli.config.as_deref()).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    match &cli.command {
        Some(Commands::Run) => {
            let config = load_config(&cli)?;
            run::run(&config).await?;
        }
        Some(Commands::Sync) => {
            let config = load_config(&cli)?;
            let sink = CliSink::new(config.cli_path.clone());
            sink.sync().await.context("sync failed")?;
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}

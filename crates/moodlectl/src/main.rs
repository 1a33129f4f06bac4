mod cli;
mod commands;
mod config;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use moodle_gateway::Gateway;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    moodle_gateway::init_logging();

    // Parse CLI args
    let cli = Cli::parse();

    // Commands that don't need a backend
    match &cli.command {
        Commands::Init { path } => return commands::init::run_init(path),
        Commands::Tools => return commands::tools::execute(),
        _ => {}
    }

    // Load config and bind to the active environment
    let config = config::load_config(cli.config.as_deref(), cli.env.as_deref())?;
    let gateway = Gateway::from_config(&config).context("Failed to start gateway")?;

    match cli.command {
        Commands::Init { .. } | Commands::Tools => {
            // Already handled above
        }
        Commands::Check { format } => {
            commands::check::execute(&gateway, format.into()).await?;
        }
        Commands::Call {
            function,
            params,
            mutating,
            scope_param,
            offset,
            limit,
            format,
            title,
        } => {
            let args = commands::call::CallArgs {
                function,
                params,
                mutating,
                scope_param,
                offset,
                limit,
                encoding: format.into(),
                title,
            };
            commands::call::execute(&gateway, args).await?;
        }
        Commands::Tool { name, input } => {
            commands::tool::execute(&gateway, &name, &input).await?;
        }
    }

    Ok(())
}

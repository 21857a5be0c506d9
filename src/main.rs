// src/main.rs

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing subscriber for logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Cook {
            recipe,
            features,
            kitchen,
        } => commands::cmd_cook(&recipe, &features, &kitchen),
        Commands::Plan {
            recipe,
            json,
            features,
            kitchen,
        } => commands::cmd_plan(&recipe, json, &features, &kitchen),
        Commands::Fetch { recipe, kitchen } => commands::cmd_fetch(&recipe, &kitchen),
        Commands::Validate { recipes } => commands::cmd_validate(&recipes),
        Commands::Batch { recipes, kitchen } => commands::cmd_batch(&recipes, &kitchen),
    }
}

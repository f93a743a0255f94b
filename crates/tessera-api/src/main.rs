//! Tessera command-line entry point.
//!
//! Binary name: `tessera`
//!
//! Parses CLI arguments, loads `tessera.toml`, wires the definition parser,
//! then dispatches to the command handler.

mod cli;
mod state;

use clap::Parser;

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tessera_observe::tracing_setup::verbosity_filter(cli.verbose, cli.quiet);
    if let Err(err) = tessera_observe::tracing_setup::init_tracing(filter, cli.log_json) {
        eprintln!("Warning: failed to initialize logging: {err}");
    }

    let state = AppState::init(&cli.config_dir, cli.allow_remote).await;

    match cli.command {
        Commands::Render {
            source,
            format,
            indent,
        } => {
            cli::definition::render(&state, &source, format, indent).await?;
        }

        Commands::Describe { source } => {
            cli::definition::describe(&state, &source, cli.json).await?;
        }

        Commands::Check { sources } => {
            cli::definition::check(&state, &sources, cli.json).await?;
        }

        Commands::Iterate {
            on,
            separator,
            start,
        } => {
            cli::iterate::iterate(&on, separator, start, cli.json)?;
        }

        Commands::Config => {
            cli::config::show(&state, cli.json)?;
        }
    }

    Ok(())
}

//! Effective configuration display.

use anyhow::Result;
use console::style;

use tessera_infra::config::CONFIG_FILE_NAME;

use crate::state::AppState;

/// Print the configuration the engine runs with.
pub fn show(state: &AppState, json: bool) -> Result<()> {
    let config = &state.config;
    if json {
        println!("{}", serde_json::to_string_pretty(config)?);
        return Ok(());
    }

    let path = state.config_dir.join(CONFIG_FILE_NAME);
    println!();
    println!("  {} {}", style("Configuration").bold(), style(path.display()).dim());
    println!();
    println!(
        "  Remote definitions:    {}",
        if config.remote_definitions_allowed {
            style("allowed").yellow()
        } else {
            style("refused").green()
        }
    );
    println!("  Event bus capacity:    {}", config.event_bus_capacity);
    println!("  Script max operations: {}", config.script_max_operations);
    println!();
    Ok(())
}

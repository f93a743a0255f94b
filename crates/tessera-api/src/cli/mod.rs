//! CLI command definitions for the `tessera` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod config;
pub mod definition;
pub mod iterate;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Parse, render and inspect process definitions.
#[derive(Parser)]
#[command(name = "tessera", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Only log errors. Command output is still printed.
    #[arg(long, short, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Write log events as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Directory holding `tessera.toml`.
    #[arg(long, global = true, env = "TESSERA_CONFIG_DIR", default_value = ".")]
    pub config_dir: PathBuf,

    /// Allow definitions to be fetched from remote URLs.
    #[arg(long, global = true)]
    pub allow_remote: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Parse a definition and print it in another syntax.
    Render {
        /// Path, URL, or `-` for stdin.
        source: String,

        /// Output syntax.
        #[arg(long, value_enum, default_value_t = OutputFormat::Script)]
        format: OutputFormat,

        /// Indentation: spaces per level for XML (negative for compact
        /// output), starting nesting level for script.
        #[arg(long, default_value_t = 2, allow_negative_numbers = true)]
        indent: i32,
    },

    /// Show the root, attributes and description of a definition.
    Describe {
        /// Path, URL, or `-` for stdin.
        source: String,
    },

    /// Check that definitions parse.
    Check {
        /// Paths or URLs.
        #[arg(required = true)]
        sources: Vec<String>,
    },

    /// Walk a delimited list the way an iterator expression would.
    Iterate {
        /// The list, e.g. "alice, bob, carol".
        on: String,

        /// Literal separator (default: comma plus following whitespace).
        #[arg(long)]
        separator: Option<String>,

        /// Position to start at.
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        start: i64,
    },

    /// Show the effective engine configuration.
    Config,
}

/// Target syntax for `tessera render`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Yaml,
    Script,
    Xml,
}

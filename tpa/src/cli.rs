//! CLI command definitions and subcommands

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// tpa - teleport request coordinator playground
#[derive(Parser)]
#[command(
    name = "tpa",
    about = "Teleport request coordinator with an interactive simulated world",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute; defaults to `repl`
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Interactive shell over a simulated world
    Repl,

    /// Execute a shell script, one command per line
    Run {
        /// Script file; `#` starts a comment line
        script: PathBuf,
    },

    /// Show the effective configuration
    Config {
        /// Write the effective configuration to the user config file
        #[arg(long)]
        init: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "yaml")]
        format: OutputFormat,
    },
}

/// Output format for `tpa config`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Yaml,
    Json,
}

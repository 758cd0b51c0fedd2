use clap::Parser;
use eyre::{Context, Result};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

use tpa::cli::{Cli, Command, OutputFormat};
use tpa::config::Config;
use tpa::coordinator::Coordinator;
use tpa::sim::{Shell, SimWorld, run_repl, run_script};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tpa")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Determine log level with priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(log_dir.join("tpa.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());

    // Setup logging with priority: CLI > config > INFO default
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    config.validate()?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Some(Command::Config { init, format }) => {
            debug!(init, ?format, "main: matched Config command");
            cmd_config(&config, init, format)
        }
        Some(Command::Run { script }) => {
            debug!(script = %script.display(), "main: matched Run command");
            cmd_shell(&config, Some(script)).await
        }
        Some(Command::Repl) | None => {
            debug!("main: matched Repl command");
            cmd_shell(&config, None).await
        }
    }
}

/// Spawn a coordinator over a fresh simulated world and drive it from a
/// script, or interactively when no script is given
async fn cmd_shell(config: &Config, script: Option<PathBuf>) -> Result<()> {
    let world = Arc::new(SimWorld::new());
    let (handle, task) = Coordinator::spawn(config.teleport.clone(), world.clone(), world.clone())?;
    let mut shell = Shell::new(world, handle.clone());

    let result = match script {
        Some(path) => run_script(&mut shell, &path).await,
        None => run_repl(&mut shell).await,
    };

    // Shutdown only fails if the task already stopped
    let _ = handle.shutdown().await;
    task.await.context("Coordinator task panicked")?;
    result
}

fn cmd_config(config: &Config, init: bool, format: OutputFormat) -> Result<()> {
    if init {
        let path = Config::default_user_path().ok_or_else(|| eyre::eyre!("No user config directory available"))?;
        if path.exists() {
            return Err(eyre::eyre!("Config already exists at {}", path.display()));
        }
        config.save(&path)?;
        println!("Wrote {}", path.display());
        return Ok(());
    }

    let rendered = match format {
        OutputFormat::Yaml => serde_yaml::to_string(config)?,
        OutputFormat::Json => serde_json::to_string_pretty(config)? + "\n",
    };
    print!("{}", rendered);
    Ok(())
}

//! Simulated world and the interactive front end over it
//!
//! `SimWorld` implements both `World` and `Notifier`, so a coordinator can be
//! driven end to end without a game server. `Shell` turns typed commands into
//! coordinator calls; `run_repl` and `run_script` feed it lines.

mod render;
mod shell;
mod world;

pub use render::{notice_text, progress_text, render_delivery};
pub use shell::{Action, Output, Shell, ShellCommand};
pub use world::{DEFAULT_WORLD, Delivery, SimActor, SimWorld, TeleportRecord};

use std::path::Path;

use colored::Colorize;
use eyre::{Context, Result};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::{debug, info};

fn print_output(output: &Output) {
    for line in &output.lines {
        println!("{}", line);
    }
}

/// Interactive loop until `quit` or Ctrl+D
pub async fn run_repl(shell: &mut Shell) -> Result<()> {
    println!();
    println!("{}", "tpa interactive shell".bright_cyan().bold());
    println!("Type {} for commands, {} to quit", "help".yellow(), "quit".yellow());
    println!("Timer notices appear after your next command; press Enter to refresh.");
    println!();

    let mut rl = DefaultEditor::new().map_err(|e| eyre::eyre!("Failed to initialize readline: {}", e))?;

    loop {
        let readline = rl.readline(&format!("{} ", ">".bright_green()));

        match readline {
            Ok(line) => {
                let input = line.trim();
                if !input.is_empty() {
                    let _ = rl.add_history_entry(input);
                }

                let output = shell.execute(input).await?;
                print_output(&output);
                if output.quit {
                    break;
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!();
                break;
            }
            Err(err) => {
                return Err(eyre::eyre!("Readline error: {}", err));
            }
        }
    }

    println!("Goodbye!");
    Ok(())
}

/// Execute a script file line by line, echoing each command
pub async fn run_script(shell: &mut Shell, path: &Path) -> Result<()> {
    debug!(path = %path.display(), "run_script: called");
    let content = std::fs::read_to_string(path).context(format!("Failed to read script {}", path.display()))?;

    for (number, line) in content.lines().enumerate() {
        let input = line.trim();
        if input.is_empty() || input.starts_with('#') {
            continue;
        }
        println!("{} {}", ">".bright_green(), input);
        let output = shell
            .execute(input)
            .await
            .context(format!("{}:{}", path.display(), number + 1))?;
        print_output(&output);
        if output.quit {
            break;
        }
    }

    info!(path = %path.display(), "Script finished");
    Ok(())
}

//! Command interpreter over a simulated world
//!
//! One line in, a batch of output lines out. Every command is followed by
//! whatever the coordinator delivered in the meantime, so timer-driven
//! notices show up after the next command (or after `wait`).

use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;
use eyre::Result;
use tracing::debug;

use crate::coordinator::{CoordinatorHandle, Setting, SuggestionKind, TpaError};
use crate::domain::{ActorId, Orientation, Position};
use crate::world::World;

use super::render::render_delivery;
use super::world::{DEFAULT_WORLD, SimWorld};

/// What an actor asks the coordinator to do
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Tpa(String),
    TpaHere(String),
    Accept(Option<String>),
    Deny(Option<String>),
    Cancel(Option<String>),
    Suggest { kind: SuggestionKind, prefix: String },
    Cooldown,
}

/// A parsed shell line
#[derive(Debug, Clone, PartialEq)]
pub enum ShellCommand {
    Join {
        name: String,
        world: Option<String>,
        position: Position,
    },
    Leave(String),
    Move {
        name: String,
        position: Position,
    },
    Face {
        name: String,
        orientation: Orientation,
    },
    Where(Option<String>),
    As {
        actor: String,
        action: Action,
    },
    List,
    Metrics,
    Config(Option<(String, String)>),
    Wait(Duration),
    Help,
    Quit,
}

fn parse_position(args: &[&str]) -> Result<Position, String> {
    let coords: Vec<f64> = args
        .iter()
        .map(|a| a.parse::<f64>().map_err(|_| format!("not a coordinate: {}", a)))
        .collect::<Result<_, _>>()?;
    match coords.as_slice() {
        [x, y, z] => Ok(Position::new(*x, *y, *z)),
        _ => Err("expected <x> <y> <z>".to_string()),
    }
}

fn optional_target(args: &[&str], usage: &str) -> Result<Option<String>, String> {
    match args {
        [] => Ok(None),
        [name] => Ok(Some(name.to_string())),
        _ => Err(format!("usage: {}", usage)),
    }
}

impl Action {
    fn parse(verb: &str, args: &[&str]) -> Result<Self, String> {
        match (verb.to_lowercase().as_str(), args) {
            ("tpa", [target]) => Ok(Self::Tpa(target.to_string())),
            ("tpahere", [target]) => Ok(Self::TpaHere(target.to_string())),
            ("tpa", _) => Err("usage: as <actor> tpa <target>".to_string()),
            ("tpahere", _) => Err("usage: as <actor> tpahere <target>".to_string()),
            ("tpaaccept", args) => optional_target(args, "as <actor> tpaaccept [<initiator>]").map(Self::Accept),
            ("tpadeny", args) => optional_target(args, "as <actor> tpadeny [<initiator>]").map(Self::Deny),
            ("tpacancel", args) => optional_target(args, "as <actor> tpacancel [<responder>]").map(Self::Cancel),
            ("suggest", [kind, rest @ ..]) if rest.len() <= 1 => Ok(Self::Suggest {
                kind: kind.parse()?,
                prefix: rest.first().map(|p| p.to_string()).unwrap_or_default(),
            }),
            ("suggest", _) => Err("usage: as <actor> suggest request|respond|cancel [<prefix>]".to_string()),
            ("cooldown", []) => Ok(Self::Cooldown),
            (other, _) => Err(format!("unknown action: {}", other)),
        }
    }
}

impl ShellCommand {
    /// Parse one line; `None` for blank lines and `#` comments
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }
        let words: Vec<&str> = line.split_whitespace().collect();
        let (command, args) = match words.split_first() {
            Some((command, args)) => (command.to_lowercase(), args),
            None => return Ok(None),
        };

        let parsed = match (command.as_str(), args) {
            ("join", [name]) => Self::Join {
                name: name.to_string(),
                world: None,
                position: Position::default(),
            },
            ("join", [name, x, y, z]) => Self::Join {
                name: name.to_string(),
                world: None,
                position: parse_position(&[*x, *y, *z])?,
            },
            ("join", [name, x, y, z, world]) => Self::Join {
                name: name.to_string(),
                world: Some(world.to_string()),
                position: parse_position(&[*x, *y, *z])?,
            },
            ("join", _) => return Err("usage: join <name> [<x> <y> <z> [<world>]]".to_string()),
            ("leave", [name]) => Self::Leave(name.to_string()),
            ("leave", _) => return Err("usage: leave <name>".to_string()),
            ("move", [name, coords @ ..]) => Self::Move {
                name: name.to_string(),
                position: parse_position(coords)?,
            },
            ("move", _) => return Err("usage: move <name> <x> <y> <z>".to_string()),
            ("face", [name, yaw, pitch]) => {
                let angle = |a: &str| a.parse::<f32>().map_err(|_| format!("not an angle: {}", a));
                Self::Face {
                    name: name.to_string(),
                    orientation: Orientation {
                        yaw: angle(*yaw)?,
                        pitch: angle(*pitch)?,
                    },
                }
            }
            ("face", _) => return Err("usage: face <name> <yaw> <pitch>".to_string()),
            ("where", args) => Self::Where(optional_target(args, "where [<name>]")?),
            ("as", [actor, verb, rest @ ..]) => Self::As {
                actor: actor.to_string(),
                action: Action::parse(verb, rest)?,
            },
            ("as", _) => return Err("usage: as <actor> <action> [<args>]".to_string()),
            ("list", []) => Self::List,
            ("metrics", []) => Self::Metrics,
            ("config", []) => Self::Config(None),
            ("config", [key, value]) => Self::Config(Some((key.to_string(), value.to_string()))),
            ("config", _) => return Err("usage: config [<key> <value>]".to_string()),
            ("wait", [secs]) => {
                let secs: f64 = secs.parse().map_err(|_| format!("not a number of seconds: {}", secs))?;
                let wait = Duration::try_from_secs_f64(secs).map_err(|_| format!("invalid wait: {}", secs))?;
                Self::Wait(wait)
            }
            ("wait", _) => return Err("usage: wait <seconds>".to_string()),
            ("help", _) => Self::Help,
            ("quit" | "exit", _) => Self::Quit,
            (other, _) => return Err(format!("unknown command: {} (try help)", other)),
        };
        Ok(Some(parsed))
    }
}

/// Result of running one line
#[derive(Debug, Default)]
pub struct Output {
    pub lines: Vec<String>,
    pub quit: bool,
}

impl Output {
    fn line(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    fn error(&mut self, message: impl std::fmt::Display) {
        self.lines.push(format!("{} {}", "error:".red().bold(), message));
    }
}

/// Drives a coordinator from typed commands
pub struct Shell {
    world: Arc<SimWorld>,
    coordinator: CoordinatorHandle,
}

impl Shell {
    pub fn new(world: Arc<SimWorld>, coordinator: CoordinatorHandle) -> Self {
        Self { world, coordinator }
    }

    /// Run one line and collect its output plus pending deliveries
    ///
    /// Only a dead coordinator is an `Err`; bad input and refused commands
    /// are reported as output lines.
    pub async fn execute(&mut self, line: &str) -> Result<Output> {
        debug!(%line, "Shell::execute: called");
        let mut out = Output::default();
        match ShellCommand::parse(line) {
            Ok(Some(command)) => self.dispatch(command, &mut out).await?,
            Ok(None) => {}
            Err(e) => out.error(e),
        }
        self.flush(&mut out);
        Ok(out)
    }

    /// Append everything delivered since the last flush
    pub fn flush(&self, out: &mut Output) {
        for delivery in self.world.drain_deliveries() {
            out.line(render_delivery(&self.world, &delivery));
        }
    }

    fn online(&self, name: &str) -> Result<ActorId, String> {
        let id = self.world.find(name).ok_or_else(|| format!("no such actor: {}", name))?;
        if self.world.display_name(id).is_none() {
            return Err(format!("{} is not online", self.world.name_of(id)));
        }
        Ok(id)
    }

    fn online_opt(&self, name: Option<&String>) -> Result<Option<ActorId>, String> {
        name.map(|n| self.online(n)).transpose()
    }

    async fn dispatch(&mut self, command: ShellCommand, out: &mut Output) -> Result<()> {
        match command {
            ShellCommand::Join { name, world, position } => {
                let world_name = world.as_deref().unwrap_or(DEFAULT_WORLD);
                self.world.join_world(&name, world_name, position);
                out.line(format!("{} joined {} at {}", name.bold(), world_name, position));
            }
            ShellCommand::Leave(name) => match self.online(&name) {
                Ok(id) => {
                    self.world.leave(id);
                    out.line(format!("{} left", self.world.name_of(id).bold()));
                }
                Err(e) => out.error(e),
            },
            ShellCommand::Move { name, position } => match self.online(&name) {
                Ok(id) => {
                    self.world.move_to(id, position);
                    out.line(format!("{} moved to {}", self.world.name_of(id).bold(), position));
                }
                Err(e) => out.error(e),
            },
            ShellCommand::Face { name, orientation } => match self.online(&name) {
                Ok(id) => {
                    self.world.set_orientation(id, orientation);
                    out.line(format!(
                        "{} now faces yaw {:.1} pitch {:.1}",
                        self.world.name_of(id).bold(),
                        orientation.yaw,
                        orientation.pitch
                    ));
                }
                Err(e) => out.error(e),
            },
            ShellCommand::Where(name) => self.show_placement(name.as_deref(), out),
            ShellCommand::As { actor, action } => match self.online(&actor) {
                Ok(id) => self.act(id, action, out).await?,
                Err(e) => out.error(e),
            },
            ShellCommand::List => {
                let pending = self.coordinator.pending_requests().await?;
                if pending.is_empty() {
                    out.line("No pending requests.".dimmed().to_string());
                }
                for request in pending {
                    let arrow = if request.move_requester_to_target { "<-" } else { "->" };
                    out.line(format!(
                        "#{} {} {} {} ({} moves to {})",
                        request.id,
                        self.world.name_of(request.initiator),
                        arrow,
                        self.world.name_of(request.responder),
                        self.world.name_of(request.mover),
                        self.world.name_of(request.anchor),
                    ));
                }
            }
            ShellCommand::Metrics => {
                let metrics = self.coordinator.metrics().await?;
                out.line(serde_json::to_string_pretty(&metrics)?);
            }
            ShellCommand::Config(None) => {
                let config = self.coordinator.config().await?;
                out.line(serde_yaml::to_string(&config)?.trim_end().to_string());
            }
            ShellCommand::Config(Some((key, value))) => match Setting::parse(&key, &value) {
                Ok(setting) => match self.coordinator.update_setting(setting).await {
                    Ok(_) => out.line(format!("{} set to {}", key, value)),
                    Err(TpaError::ChannelClosed) => return Err(TpaError::ChannelClosed.into()),
                    Err(e) => out.error(e),
                },
                Err(e) => out.error(e),
            },
            ShellCommand::Wait(duration) => {
                tokio::time::sleep(duration).await;
            }
            ShellCommand::Help => print_help(out),
            ShellCommand::Quit => out.quit = true,
        }
        Ok(())
    }

    fn show_placement(&self, name: Option<&str>, out: &mut Output) {
        let actors = match name {
            Some(name) => match self.world.find(name).and_then(|id| self.world.actor(id)) {
                Some(actor) => vec![actor],
                None => {
                    out.error(format!("no such actor: {}", name));
                    return;
                }
            },
            None => self.world.actors(),
        };
        for actor in actors {
            let status = if actor.online { "online".green() } else { "offline".dimmed() };
            out.line(format!(
                "{} [{}] {} {} facing {:.1}/{:.1}",
                actor.name.bold(),
                status,
                actor.location.world,
                actor.location.position,
                actor.location.orientation.yaw,
                actor.location.orientation.pitch
            ));
        }
    }

    async fn act(&mut self, actor: ActorId, action: Action, out: &mut Output) -> Result<()> {
        let now = self.world.now();
        let name = self.world.name_of(actor);
        let result: Result<Option<String>, TpaError> = match action {
            Action::Tpa(ref target) | Action::TpaHere(ref target) => {
                let here = matches!(action, Action::TpaHere(_));
                let target = match self.online(target) {
                    Ok(target) => target,
                    Err(e) => {
                        out.error(e);
                        return Ok(());
                    }
                };
                self.coordinator
                    .request_teleport(actor, target, here, now)
                    .await
                    .map(|_| None)
            }
            Action::Accept(ref who) | Action::Deny(ref who) | Action::Cancel(ref who) => {
                let who = match self.online_opt(who.as_ref()) {
                    Ok(who) => who,
                    Err(e) => {
                        out.error(e);
                        return Ok(());
                    }
                };
                match action {
                    Action::Accept(_) => self.coordinator.accept_request(actor, who, now).await.map(|_| None),
                    Action::Deny(_) => self.coordinator.deny_request(actor, who).await.map(|_| None),
                    _ => self.coordinator.cancel_request(actor, who).await.map(|_| None),
                }
            }
            Action::Suggest { kind, ref prefix } => self
                .coordinator
                .suggest(actor, kind, prefix)
                .await
                .map(|names| Some(if names.is_empty() { "(none)".to_string() } else { names.join(" ") })),
            Action::Cooldown => self
                .coordinator
                .cooldown_remaining(actor, now)
                .await
                .map(|secs| Some(format!("cooldown: {}s remaining", secs))),
        };

        match result {
            Ok(Some(line)) => out.line(format!("[{}] {}", name.bold(), line)),
            Ok(None) => {}
            Err(TpaError::ChannelClosed) => return Err(TpaError::ChannelClosed.into()),
            Err(e) => out.line(format!("[{}] {}", name.bold(), e.to_string().red())),
        }
        Ok(())
    }
}

fn print_help(out: &mut Output) {
    let commands = [
        ("join <name> [<x> <y> <z> [<world>]]", "Bring an actor online"),
        ("leave <name>", "Take an actor offline"),
        ("move <name> <x> <y> <z>", "Move an online actor"),
        ("face <name> <yaw> <pitch>", "Turn an online actor"),
        ("where [<name>]", "Show actor placement"),
        ("as <actor> tpa <target>", "Ask to teleport to target"),
        ("as <actor> tpahere <target>", "Ask target to teleport to you"),
        ("as <actor> tpaaccept [<who>]", "Accept a request"),
        ("as <actor> tpadeny [<who>]", "Deny a request"),
        ("as <actor> tpacancel [<who>]", "Cancel your request"),
        ("as <actor> suggest <kind> [<prefix>]", "Complete names (request, respond, cancel)"),
        ("as <actor> cooldown", "Show remaining cooldown"),
        ("list", "Show pending requests"),
        ("metrics", "Show coordinator counters"),
        ("config [<key> <value>]", "Show or change a setting"),
        ("wait <seconds>", "Let time pass"),
        ("quit", "Exit"),
    ];
    out.line("Commands:".bold().to_string());
    for (usage, about) in commands {
        out.line(format!("  {:40} {}", usage.yellow(), about));
    }
}

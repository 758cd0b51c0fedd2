//! Text rendering of coordinator notices for the shell

use colored::Colorize;

use crate::domain::ActorId;
use crate::world::{AbortReason, GateProgress, Notice, ProgressStyle, Side};

use super::world::{Delivery, SimWorld};

const BAR_WIDTH: usize = 20;

/// The message `notice` shows its recipient, uncoloured
pub fn notice_text(world: &SimWorld, notice: &Notice) -> String {
    let name = |actor: ActorId| world.name_of(actor);
    match notice {
        Notice::RequestSent {
            responder,
            here: false,
            timeout_secs,
        } => format!(
            "You have requested to teleport to {}. To cancel type tpacancel [<player>]. This request will timeout in {} seconds.",
            name(*responder),
            timeout_secs
        ),
        Notice::RequestSent {
            responder,
            here: true,
            timeout_secs,
        } => format!(
            "You have requested for {} to teleport to you. To cancel type tpacancel [<player>]. This request will timeout in {} seconds.",
            name(*responder),
            timeout_secs
        ),
        Notice::RequestReceived {
            initiator,
            here: false,
            timeout_secs,
        } => format!(
            "{} has requested to teleport to you. To accept type tpaaccept [<player>], to deny type tpadeny [<player>]. This request will timeout in {} seconds.",
            name(*initiator),
            timeout_secs
        ),
        Notice::RequestReceived {
            initiator,
            here: true,
            timeout_secs,
        } => format!(
            "{} has requested for you to teleport to them. To accept type tpaaccept [<player>], to deny type tpadeny [<player>]. This request will timeout in {} seconds.",
            name(*initiator),
            timeout_secs
        ),
        Notice::RequestTimedOut {
            counterpart,
            side: Side::Initiator,
            here,
        } => {
            if *here {
                format!("Your teleport request for {} to you has timed out.", name(*counterpart))
            } else {
                format!("Your teleport request to {} has timed out.", name(*counterpart))
            }
        }
        Notice::RequestTimedOut {
            counterpart,
            side: Side::Responder,
            here,
        } => {
            if *here {
                format!("Teleport request for you to {} has timed out.", name(*counterpart))
            } else {
                format!("Teleport request from {} has timed out.", name(*counterpart))
            }
        }
        Notice::RequestAccepted {
            side: Side::Responder, ..
        } => "You have accepted the teleport request.".to_string(),
        Notice::RequestAccepted {
            counterpart,
            side: Side::Initiator,
        } => format!("{} has accepted the teleport request.", name(*counterpart)),
        Notice::RequestDenied {
            side: Side::Responder, ..
        } => "You have denied the teleport request.".to_string(),
        Notice::RequestDenied {
            counterpart,
            side: Side::Initiator,
        } => format!("{} has denied the teleport request.", name(*counterpart)),
        Notice::RequestCancelled {
            side: Side::Initiator, ..
        } => "You have cancelled the teleport request.".to_string(),
        Notice::RequestCancelled {
            counterpart,
            side: Side::Responder,
        } => format!("{} has cancelled the teleport request.", name(*counterpart)),
        Notice::TeleportAborted { counterpart, reason } => match reason {
            AbortReason::MoverOffline => {
                format!("Teleport with {} aborted: the traveller went offline.", name(*counterpart))
            }
            AbortReason::AnchorOffline => {
                format!("Teleport with {} aborted: the destination went offline.", name(*counterpart))
            }
        },
    }
}

/// Confirmation-phase progress, as a bar or a plain line
pub fn progress_text(progress: &GateProgress) -> String {
    let status = if progress.reset {
        format!("You moved! Countdown restarted, {}s to go", progress.remaining_secs)
    } else {
        format!("Teleporting in {}s, stand still", progress.remaining_secs)
    };
    match progress.style {
        ProgressStyle::Plain => status,
        ProgressStyle::Rich => {
            let done = ((1.0 - progress.fraction) * BAR_WIDTH as f32).round() as usize;
            let done = done.min(BAR_WIDTH);
            format!("[{}{}] {}", "#".repeat(done), ".".repeat(BAR_WIDTH - done), status)
        }
    }
}

/// One shell line for a delivery, prefixed with the recipient's name
pub fn render_delivery(world: &SimWorld, delivery: &Delivery) -> String {
    match delivery {
        Delivery::Notice(actor, notice) => {
            let text = notice_text(world, notice);
            let text = match notice {
                Notice::RequestSent { .. } | Notice::RequestReceived { .. } => text.bright_magenta(),
                Notice::RequestAccepted { .. } => text.green(),
                _ => text.red(),
            };
            format!("[{}] {}", world.name_of(*actor).bold(), text)
        }
        Delivery::Progress(actor, progress) => {
            format!("[{}] {}", world.name_of(*actor).bold(), progress_text(progress).yellow())
        }
        Delivery::ClearProgress(actor) => {
            format!("[{}] {}", world.name_of(*actor).bold(), "(progress cleared)".dimmed())
        }
    }
}

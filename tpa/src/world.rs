//! Collaborator seams: the world the actors live in and the channel used to
//! tell them what happened
//!
//! The coordinator never formats text. It hands typed `Notice` and
//! `GateProgress` values to a `Notifier`, and it never moves anyone itself;
//! it asks the `World` to.

use serde::{Deserialize, Serialize};

use crate::domain::{ActorId, Location, Position};

/// World state the coordinator reads and the relocation primitive it calls
///
/// Implementations must not block: these are called from inside the
/// coordinator's mailbox loop.
pub trait World: Send + Sync + 'static {
    /// Current time in epoch seconds
    fn now(&self) -> i64;

    /// Presentation name, `None` if the actor is unknown or offline
    fn display_name(&self, actor: ActorId) -> Option<String>;

    /// Current position, `None` if the actor is offline
    fn position(&self, actor: ActorId) -> Option<Position>;

    /// Full placement (world, position, orientation), `None` if offline
    fn location(&self, actor: ActorId) -> Option<Location>;

    /// Move `actor` to `destination`; fire-and-forget
    fn teleport(&self, actor: ActorId, destination: &Location);

    /// Online actors other than `excluding`, as `(id, display name)`
    fn online_actors(&self, excluding: ActorId) -> Vec<(ActorId, String)>;
}

/// User-facing delivery of coordinator events
pub trait Notifier: Send + Sync + 'static {
    fn notify(&self, actor: ActorId, notice: Notice);

    /// Confirmation-phase progress for the moving actor
    fn progress(&self, actor: ActorId, progress: GateProgress);

    /// Remove any progress widget shown for `actor`
    fn clear_progress(&self, actor: ActorId);
}

/// Which side of a request a notice is addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Side {
    Initiator,
    Responder,
}

/// Why an accepted teleport did not happen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AbortReason {
    /// The moving actor went offline during confirmation
    MoverOffline,
    /// The destination actor went offline before the teleport fired
    AnchorOffline,
}

/// Something an actor should be told about
///
/// `here` mirrors `move_requester_to_target` so the renderer can phrase
/// "teleport to you" vs "teleport you to them".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Notice {
    RequestSent {
        responder: ActorId,
        here: bool,
        timeout_secs: u64,
    },
    RequestReceived {
        initiator: ActorId,
        here: bool,
        timeout_secs: u64,
    },
    RequestTimedOut {
        counterpart: ActorId,
        side: Side,
        here: bool,
    },
    RequestAccepted {
        counterpart: ActorId,
        side: Side,
    },
    RequestDenied {
        counterpart: ActorId,
        side: Side,
    },
    RequestCancelled {
        counterpart: ActorId,
        side: Side,
    },
    TeleportAborted {
        counterpart: ActorId,
        reason: AbortReason,
    },
}

impl Notice {
    /// Short machine-readable name, used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RequestSent { .. } => "request-sent",
            Self::RequestReceived { .. } => "request-received",
            Self::RequestTimedOut { .. } => "request-timed-out",
            Self::RequestAccepted { .. } => "request-accepted",
            Self::RequestDenied { .. } => "request-denied",
            Self::RequestCancelled { .. } => "request-cancelled",
            Self::TeleportAborted { .. } => "teleport-aborted",
        }
    }
}

/// How the collaborator should render confirmation progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ProgressStyle {
    /// A bar/title style widget
    #[default]
    Rich,
    /// A plain chat line
    Plain,
}

/// One confirmation-phase progress update
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GateProgress {
    /// Seconds until the teleport fires, rounded up
    pub remaining_secs: u64,
    /// Fraction of the stand-still window still to go, in `[0, 1]`
    pub fraction: f32,
    /// True on the tick where movement reset the countdown
    pub reset: bool,
    pub style: ProgressStyle,
}

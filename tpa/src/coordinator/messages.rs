//! Message types for the Coordinator

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::oneshot;

use crate::domain::{ActorId, PendingRequest};

use super::config::{CoordinatorConfig, Setting};

/// Caller-facing failures of a single teleport command
///
/// All of these are expected outcomes of user input except `ChannelClosed`,
/// which means the coordinator task is gone.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TpaError {
    #[error("You cannot send a teleport request to yourself")]
    SelfTarget,

    #[error("You cannot make a request for {remaining_secs} more seconds")]
    OnCooldown { remaining_secs: u64 },

    #[error("There is already an ongoing request like this")]
    DuplicateRequest,

    #[error("No ongoing teleport request")]
    NoActiveRequest,

    #[error("Multiple active teleport requests, specify one of: {}", .0.join(", "))]
    AmbiguousRequest(Vec<String>),

    #[error("Invalid setting: {0}")]
    InvalidSetting(String),

    #[error("Coordinator channel closed")]
    ChannelClosed,
}

/// Result type for coordinator operations
pub type TpaResult<T> = Result<T, TpaError>;

/// A request that was admitted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTicket {
    pub request: PendingRequest,
    pub timeout_secs: u64,
}

/// An accepted request now in its confirmation phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acceptance {
    pub request: PendingRequest,
    pub gate_id: u64,
    /// Seconds the request was pending before acceptance
    pub waited_secs: u64,
}

/// Which suggestion list to compute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SuggestionKind {
    /// Targets for a new request
    Request,
    /// Initiators the caller can accept or deny
    Respond,
    /// Responders the caller can cancel towards
    Cancel,
}

impl std::str::FromStr for SuggestionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "request" | "tpa" | "tpahere" => Ok(Self::Request),
            "respond" | "tpaaccept" | "tpadeny" | "accept" | "deny" => Ok(Self::Respond),
            "cancel" | "tpacancel" => Ok(Self::Cancel),
            _ => Err(format!("Unknown suggestion kind: {}", s)),
        }
    }
}

/// Internal requests to the Coordinator task
#[derive(Debug)]
pub enum CoordRequest {
    /// Create a request
    Request {
        initiator: ActorId,
        responder: ActorId,
        move_requester_to_target: bool,
        now: i64,
        reply: oneshot::Sender<TpaResult<RequestTicket>>,
    },

    /// Accept a request addressed to `responder`
    Accept {
        responder: ActorId,
        initiator: Option<ActorId>,
        now: i64,
        reply: oneshot::Sender<TpaResult<Acceptance>>,
    },

    /// Deny a request addressed to `responder`
    Deny {
        responder: ActorId,
        initiator: Option<ActorId>,
        reply: oneshot::Sender<TpaResult<PendingRequest>>,
    },

    /// Withdraw a request `initiator` sent
    Cancel {
        initiator: ActorId,
        responder: Option<ActorId>,
        reply: oneshot::Sender<TpaResult<PendingRequest>>,
    },

    /// Expiry timer fired (internal)
    RequestTimeout { request_id: u64 },

    /// Stand-still poll tick (internal)
    GateTick { gate_id: u64 },

    /// Completion names for the command layer
    Suggest {
        actor: ActorId,
        kind: SuggestionKind,
        prefix: String,
        reply: oneshot::Sender<Vec<String>>,
    },

    /// Snapshot of pending requests, oldest first
    ListPending {
        reply: oneshot::Sender<Vec<PendingRequest>>,
    },

    /// Cooldown seconds left for `actor` at `now`
    CooldownRemaining {
        actor: ActorId,
        now: i64,
        reply: oneshot::Sender<u64>,
    },

    /// Current live configuration
    GetConfig {
        reply: oneshot::Sender<CoordinatorConfig>,
    },

    /// Change one configuration value
    UpdateSetting {
        setting: Setting,
        reply: oneshot::Sender<TpaResult<CoordinatorConfig>>,
    },

    /// Get current metrics
    GetMetrics {
        reply: oneshot::Sender<CoordinatorMetrics>,
    },

    /// Shutdown the coordinator
    Shutdown,
}

/// Coordinator metrics for observability
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct CoordinatorMetrics {
    pub pending_requests: usize,
    pub active_gates: usize,
    pub requests_created: u64,
    pub requests_accepted: u64,
    pub requests_denied: u64,
    pub requests_cancelled: u64,
    pub requests_timed_out: u64,
    pub teleports_completed: u64,
    pub teleports_aborted: u64,
    /// Timer messages that arrived after their request/gate was gone
    pub stale_timer_messages: u64,
}

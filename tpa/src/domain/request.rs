//! Teleport request entity

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use super::actor::ActorId;

/// Registry key for a request
///
/// Directional keys keep `(mover, anchor)` order; pair keys sort the two
/// actors so that either direction collides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestKey {
    pub first: ActorId,
    pub second: ActorId,
}

impl RequestKey {
    /// Key on the ordered `(mover, anchor)` pair
    pub fn directional(mover: ActorId, anchor: ActorId) -> Self {
        Self {
            first: mover,
            second: anchor,
        }
    }

    /// Key on the unordered pair of participants
    pub fn pair(a: ActorId, b: ActorId) -> Self {
        if a <= b {
            Self { first: a, second: b }
        } else {
            Self { first: b, second: a }
        }
    }
}

/// A pending teleport request
///
/// Owned exclusively by the registry. The timeout handle is present while the
/// request is pending and is aborted when the request is resolved.
#[derive(Debug)]
pub struct TeleportRequest {
    /// Monotonic id, used to recognise timer messages for an older request
    /// that happened to share the same key
    pub id: u64,
    pub mover: ActorId,
    pub anchor: ActorId,
    pub initiator: ActorId,
    pub responder: ActorId,
    /// false = "teleport me to you", true = "teleport you to me"
    pub move_requester_to_target: bool,
    /// Epoch seconds
    pub created_at: i64,
    timeout: Option<JoinHandle<()>>,
}

impl TeleportRequest {
    /// Build a request from its social roles
    pub fn new(
        id: u64,
        initiator: ActorId,
        responder: ActorId,
        move_requester_to_target: bool,
        created_at: i64,
    ) -> Self {
        let (mover, anchor) = if move_requester_to_target {
            (responder, initiator)
        } else {
            (initiator, responder)
        };
        Self {
            id,
            mover,
            anchor,
            initiator,
            responder,
            move_requester_to_target,
            created_at,
            timeout: None,
        }
    }

    pub fn directional_key(&self) -> RequestKey {
        RequestKey::directional(self.mover, self.anchor)
    }

    pub fn pair_key(&self) -> RequestKey {
        RequestKey::pair(self.mover, self.anchor)
    }

    /// Attach the expiry timer
    pub fn arm_timeout(&mut self, handle: JoinHandle<()>) {
        if let Some(previous) = self.timeout.replace(handle) {
            previous.abort();
        }
    }

    /// Abort the expiry timer, returning whether one was armed
    pub fn disarm_timeout(&mut self) -> bool {
        match self.timeout.take() {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_timeout_armed(&self) -> bool {
        self.timeout.is_some()
    }

    pub fn involves(&self, actor: ActorId) -> bool {
        self.initiator == actor || self.responder == actor
    }

    /// Read-only copy for callers outside the coordinator
    pub fn view(&self) -> PendingRequest {
        PendingRequest {
            id: self.id,
            mover: self.mover,
            anchor: self.anchor,
            initiator: self.initiator,
            responder: self.responder,
            move_requester_to_target: self.move_requester_to_target,
            created_at: self.created_at,
        }
    }
}

/// Snapshot of a request, detached from the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PendingRequest {
    pub id: u64,
    pub mover: ActorId,
    pub anchor: ActorId,
    pub initiator: ActorId,
    pub responder: ActorId,
    pub move_requester_to_target: bool,
    pub created_at: i64,
}

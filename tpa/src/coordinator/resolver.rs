//! Counterpart resolution for accept/deny/cancel
//!
//! Read-only over the registry; the coordinator acts on the result.

use crate::domain::{ActorId, TeleportRequest};

use super::registry::RequestRegistry;

/// Which side of the request the caller is on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// accept / deny
    Responder,
    /// cancel
    Initiator,
}

impl Role {
    fn holds(&self, request: &TeleportRequest, caller: ActorId) -> bool {
        match self {
            Self::Responder => request.responder == caller,
            Self::Initiator => request.initiator == caller,
        }
    }

    fn counterpart(&self, request: &TeleportRequest) -> ActorId {
        match self {
            Self::Responder => request.initiator,
            Self::Initiator => request.responder,
        }
    }
}

/// Outcome of resolving a possibly-omitted counterpart
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    None,
    /// Request id to act on
    One(u64),
    /// Distinct counterparts, oldest request first
    Many(Vec<ActorId>),
}

/// Pick the request `caller` means
///
/// With an explicit counterpart the oldest matching request wins. Without
/// one, exactly one candidate resolves implicitly and anything more is
/// ambiguous, even if every candidate shares the same counterpart.
pub fn resolve(registry: &RequestRegistry, caller: ActorId, role: Role, counterpart: Option<ActorId>) -> Resolution {
    let mut candidates = registry.iter().filter(|r| role.holds(r, caller));

    if let Some(counterpart) = counterpart {
        return candidates
            .find(|r| role.counterpart(r) == counterpart)
            .map_or(Resolution::None, |r| Resolution::One(r.id));
    }

    let Some(first) = candidates.next() else {
        return Resolution::None;
    };
    let rest: Vec<&TeleportRequest> = candidates.collect();
    if rest.is_empty() {
        return Resolution::One(first.id);
    }

    let mut counterparts = vec![role.counterpart(first)];
    for request in rest {
        let other = role.counterpart(request);
        if !counterparts.contains(&other) {
            counterparts.push(other);
        }
    }
    Resolution::Many(counterparts)
}

//! Request registry
//!
//! The authoritative set of pending requests. Iteration is insertion order so
//! that candidate listings are reproducible.

use tracing::debug;

use crate::domain::{ActorId, RequestKey, TeleportRequest};

use super::config::RequestKeying;

/// Result of `try_add`
#[derive(Debug)]
pub enum Admission<'a> {
    /// Stored; the reference lets the caller arm the timeout
    Admitted(&'a mut TeleportRequest),
    /// A request with the same key already exists; the rejected one is
    /// handed back untouched
    Duplicate(TeleportRequest),
}

/// Pending teleport requests, keyed according to `RequestKeying`
#[derive(Debug, Default)]
pub struct RequestRegistry {
    keying: RequestKeying,
    requests: Vec<TeleportRequest>,
}

impl RequestRegistry {
    pub fn new(keying: RequestKeying) -> Self {
        debug!(?keying, "RequestRegistry::new: called");
        Self {
            keying,
            requests: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TeleportRequest> {
        self.requests.iter()
    }

    fn position_of_key(&self, key: RequestKey) -> Option<usize> {
        self.requests.iter().position(|r| self.keying.key_for(r) == key)
    }

    /// Admit `request` unless its key is already taken
    pub fn try_add(&mut self, request: TeleportRequest) -> Admission<'_> {
        let key = self.keying.key_for(&request);
        if self.position_of_key(key).is_some() {
            debug!(request_id = request.id, "RequestRegistry::try_add: duplicate");
            return Admission::Duplicate(request);
        }
        debug!(request_id = request.id, "RequestRegistry::try_add: admitted");
        self.requests.push(request);
        let last = self.requests.len() - 1;
        Admission::Admitted(&mut self.requests[last])
    }

    /// Request that would move `mover` to `anchor`
    pub fn find_by_pair(&self, mover: ActorId, anchor: ActorId) -> Option<&TeleportRequest> {
        let key = self.keying.key(mover, anchor);
        self.position_of_key(key).map(|i| &self.requests[i])
    }

    pub fn find_all_by_responder(&self, actor: ActorId) -> Vec<&TeleportRequest> {
        self.requests.iter().filter(|r| r.responder == actor).collect()
    }

    pub fn find_all_by_initiator(&self, actor: ActorId) -> Vec<&TeleportRequest> {
        self.requests.iter().filter(|r| r.initiator == actor).collect()
    }

    /// Whether `actor` takes part in any pending request
    pub fn is_participant(&self, actor: ActorId) -> bool {
        self.requests.iter().any(|r| r.involves(actor))
    }

    /// Remove by request id. Returns `None` if it is already gone.
    pub fn remove(&mut self, id: u64) -> Option<TeleportRequest> {
        let index = self.requests.iter().position(|r| r.id == id)?;
        debug!(request_id = id, "RequestRegistry::remove: removed");
        Some(self.requests.remove(index))
    }

    /// Take every request out, oldest first
    pub fn drain(&mut self) -> Vec<TeleportRequest> {
        std::mem::take(&mut self.requests)
    }
}

//! CoordinatorHandle - client interface for the command layer

use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::domain::{ActorId, PendingRequest};

use super::config::{CoordinatorConfig, Setting};
use super::messages::{
    Acceptance, CoordRequest, CoordinatorMetrics, RequestTicket, SuggestionKind, TpaError, TpaResult,
};

/// Handle for issuing teleport commands to the Coordinator
///
/// Cloneable; every clone talks to the same coordinator task. The task stops
/// once every handle is dropped.
#[derive(Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::Sender<CoordRequest>,
}

impl CoordinatorHandle {
    pub(crate) fn new(tx: mpsc::Sender<CoordRequest>) -> Self {
        Self { tx }
    }

    /// Send a request built around a fresh reply channel and wait for the answer
    async fn call<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> CoordRequest) -> TpaResult<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(build(reply_tx))
            .await
            .map_err(|_| TpaError::ChannelClosed)?;
        reply_rx.await.map_err(|_| TpaError::ChannelClosed)
    }

    /// Ask to teleport. `move_requester_to_target = false` moves the
    /// initiator to the responder ("tpa"), `true` moves the responder to the
    /// initiator ("tpahere").
    pub async fn request_teleport(
        &self,
        initiator: ActorId,
        responder: ActorId,
        move_requester_to_target: bool,
        now: i64,
    ) -> TpaResult<RequestTicket> {
        debug!(%initiator, %responder, move_requester_to_target, now, "CoordinatorHandle::request_teleport: called");
        self.call(|reply| CoordRequest::Request {
            initiator,
            responder,
            move_requester_to_target,
            now,
            reply,
        })
        .await?
    }

    /// Accept a request addressed to `responder`. With `initiator = None` the
    /// request is picked implicitly if there is only one candidate.
    pub async fn accept_request(
        &self,
        responder: ActorId,
        initiator: Option<ActorId>,
        now: i64,
    ) -> TpaResult<Acceptance> {
        debug!(%responder, ?initiator, now, "CoordinatorHandle::accept_request: called");
        self.call(|reply| CoordRequest::Accept {
            responder,
            initiator,
            now,
            reply,
        })
        .await?
    }

    /// Deny a request addressed to `responder`
    pub async fn deny_request(&self, responder: ActorId, initiator: Option<ActorId>) -> TpaResult<PendingRequest> {
        debug!(%responder, ?initiator, "CoordinatorHandle::deny_request: called");
        self.call(|reply| CoordRequest::Deny {
            responder,
            initiator,
            reply,
        })
        .await?
    }

    /// Withdraw a request `initiator` sent
    pub async fn cancel_request(&self, initiator: ActorId, responder: Option<ActorId>) -> TpaResult<PendingRequest> {
        debug!(%initiator, ?responder, "CoordinatorHandle::cancel_request: called");
        self.call(|reply| CoordRequest::Cancel {
            initiator,
            responder,
            reply,
        })
        .await?
    }

    /// Completion candidates for a command typed by `actor`
    pub async fn suggest(&self, actor: ActorId, kind: SuggestionKind, prefix: &str) -> TpaResult<Vec<String>> {
        debug!(%actor, ?kind, %prefix, "CoordinatorHandle::suggest: called");
        let prefix = prefix.to_string();
        self.call(|reply| CoordRequest::Suggest {
            actor,
            kind,
            prefix,
            reply,
        })
        .await
    }

    /// Pending requests, oldest first
    pub async fn pending_requests(&self) -> TpaResult<Vec<PendingRequest>> {
        debug!("CoordinatorHandle::pending_requests: called");
        self.call(|reply| CoordRequest::ListPending { reply }).await
    }

    /// Seconds `actor` must still wait before requesting again
    pub async fn cooldown_remaining(&self, actor: ActorId, now: i64) -> TpaResult<u64> {
        debug!(%actor, now, "CoordinatorHandle::cooldown_remaining: called");
        self.call(|reply| CoordRequest::CooldownRemaining { actor, now, reply })
            .await
    }

    pub async fn config(&self) -> TpaResult<CoordinatorConfig> {
        debug!("CoordinatorHandle::config: called");
        self.call(|reply| CoordRequest::GetConfig { reply }).await
    }

    /// Change one setting; applies to requests and gates created afterwards
    pub async fn update_setting(&self, setting: Setting) -> TpaResult<CoordinatorConfig> {
        debug!(?setting, "CoordinatorHandle::update_setting: called");
        self.call(|reply| CoordRequest::UpdateSetting { setting, reply })
            .await?
    }

    /// Get current coordinator metrics
    pub async fn metrics(&self) -> TpaResult<CoordinatorMetrics> {
        debug!("CoordinatorHandle::metrics: called");
        self.call(|reply| CoordRequest::GetMetrics { reply }).await
    }

    /// Request shutdown of the Coordinator
    pub async fn shutdown(&self) -> TpaResult<()> {
        debug!("CoordinatorHandle::shutdown: called");
        self.tx
            .send(CoordRequest::Shutdown)
            .await
            .map_err(|_| TpaError::ChannelClosed)
    }
}

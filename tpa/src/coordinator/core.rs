//! Main Coordinator task implementation
//!
//! Every mutation of the registry and the cooldown store happens inside
//! `run`, one mailbox message at a time. Timer tasks never touch state: they
//! post `RequestTimeout` / `GateTick` back into the mailbox, and messages for
//! requests or gates that no longer exist are dropped.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::domain::{ActorId, PendingRequest, TeleportRequest};
use crate::world::{AbortReason, Notice, Notifier, Side, World};

use super::config::{CoordinatorConfig, Setting};
use super::cooldown::CooldownTracker;
use super::gate::{GateStep, MovementGate};
use super::handle::CoordinatorHandle;
use super::messages::{
    Acceptance, CoordRequest, CoordinatorMetrics, RequestTicket, SuggestionKind, TpaError, TpaResult,
};
use super::registry::{Admission, RequestRegistry};
use super::resolver::{self, Resolution, Role};

/// The Coordinator owns all teleport request state
pub struct Coordinator {
    config: CoordinatorConfig,
    world: Arc<dyn World>,
    notifier: Arc<dyn Notifier>,
    tx: mpsc::Sender<CoordRequest>,
    rx: mpsc::Receiver<CoordRequest>,
}

impl Coordinator {
    /// Create a new Coordinator with the given configuration
    pub fn new(config: CoordinatorConfig, world: Arc<dyn World>, notifier: Arc<dyn Notifier>) -> eyre::Result<Self> {
        debug!(?config, "Coordinator::new: called");
        config.validate().map_err(|e| eyre::eyre!("Invalid coordinator config: {}", e))?;
        let (tx, rx) = mpsc::channel(config.channel_buffer);
        Ok(Self {
            config,
            world,
            notifier,
            tx,
            rx,
        })
    }

    /// Create a handle for callers
    pub fn handle(&self) -> CoordinatorHandle {
        CoordinatorHandle::new(self.tx.clone())
    }

    /// Create the Coordinator and spawn its task
    pub fn spawn(
        config: CoordinatorConfig,
        world: Arc<dyn World>,
        notifier: Arc<dyn Notifier>,
    ) -> eyre::Result<(CoordinatorHandle, JoinHandle<()>)> {
        let coordinator = Self::new(config, world, notifier)?;
        let handle = coordinator.handle();
        let task = tokio::spawn(coordinator.run());
        info!("Coordinator spawned");
        Ok((handle, task))
    }

    /// Run the Coordinator task
    ///
    /// This consumes the Coordinator and runs until shutdown is requested or
    /// every handle has been dropped.
    pub async fn run(self) {
        let Coordinator {
            config,
            world,
            notifier,
            tx,
            mut rx,
        } = self;

        // Timer tasks only hold weak senders so they never keep the mailbox open
        let mailbox = tx.downgrade();
        drop(tx);

        let mut state = CoordinatorState {
            registry: RequestRegistry::new(config.request_keying),
            cooldowns: CooldownTracker::new(),
            gates: HashMap::new(),
            next_id: 0,
            metrics: CoordinatorMetrics::default(),
            config,
            world,
            notifier,
            mailbox,
        };

        info!("Coordinator started");

        while let Some(req) = rx.recv().await {
            match req {
                CoordRequest::Request {
                    initiator,
                    responder,
                    move_requester_to_target,
                    now,
                    reply,
                } => {
                    let result = state.create_request(initiator, responder, move_requester_to_target, now);
                    let _ = reply.send(result);
                }

                CoordRequest::Accept {
                    responder,
                    initiator,
                    now,
                    reply,
                } => {
                    let result = state.accept(responder, initiator, now);
                    let _ = reply.send(result);
                }

                CoordRequest::Deny {
                    responder,
                    initiator,
                    reply,
                } => {
                    let result = state.deny(responder, initiator);
                    let _ = reply.send(result);
                }

                CoordRequest::Cancel {
                    initiator,
                    responder,
                    reply,
                } => {
                    let result = state.cancel(initiator, responder);
                    let _ = reply.send(result);
                }

                CoordRequest::RequestTimeout { request_id } => state.expire(request_id),

                CoordRequest::GateTick { gate_id } => state.gate_tick(gate_id),

                CoordRequest::Suggest {
                    actor,
                    kind,
                    prefix,
                    reply,
                } => {
                    let _ = reply.send(state.suggest(actor, kind, &prefix));
                }

                CoordRequest::ListPending { reply } => {
                    let _ = reply.send(state.registry.iter().map(TeleportRequest::view).collect());
                }

                CoordRequest::CooldownRemaining { actor, now, reply } => {
                    let status = state
                        .cooldowns
                        .is_on_cooldown(actor, now, state.config.cooldown_secs);
                    let _ = reply.send(status.remaining_secs);
                }

                CoordRequest::GetConfig { reply } => {
                    let _ = reply.send(state.config.clone());
                }

                CoordRequest::UpdateSetting { setting, reply } => {
                    let _ = reply.send(state.update_setting(setting));
                }

                CoordRequest::GetMetrics { reply } => {
                    let _ = reply.send(state.metrics());
                }

                CoordRequest::Shutdown => {
                    info!("Coordinator shutting down");
                    break;
                }
            }
        }

        state.stop_all();
        info!("Coordinator stopped");
    }
}

/// State owned by the running coordinator task
struct CoordinatorState {
    config: CoordinatorConfig,
    world: Arc<dyn World>,
    notifier: Arc<dyn Notifier>,
    mailbox: mpsc::WeakSender<CoordRequest>,
    registry: RequestRegistry,
    cooldowns: CooldownTracker,
    gates: HashMap<u64, MovementGate>,
    next_id: u64,
    metrics: CoordinatorMetrics,
}

impl CoordinatorState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn name_of(&self, actor: ActorId) -> String {
        self.world.display_name(actor).unwrap_or_else(|| actor.to_string())
    }

    fn create_request(
        &mut self,
        initiator: ActorId,
        responder: ActorId,
        move_requester_to_target: bool,
        now: i64,
    ) -> TpaResult<RequestTicket> {
        debug!(%initiator, %responder, move_requester_to_target, now, "create_request: called");
        if initiator == responder {
            return Err(TpaError::SelfTarget);
        }

        let status = self
            .cooldowns
            .is_on_cooldown(initiator, now, self.config.cooldown_secs);
        if status.active {
            debug!(%initiator, remaining_secs = status.remaining_secs, "create_request: on cooldown");
            return Err(TpaError::OnCooldown {
                remaining_secs: status.remaining_secs,
            });
        }

        let id = self.next_id();
        let timeout_secs = self.config.timeout_secs;
        let request = TeleportRequest::new(id, initiator, responder, move_requester_to_target, now);
        let view = match self.registry.try_add(request) {
            Admission::Duplicate(_) => return Err(TpaError::DuplicateRequest),
            Admission::Admitted(stored) => {
                stored.arm_timeout(spawn_timeout(self.mailbox.clone(), id, self.config.timeout()));
                stored.view()
            }
        };

        self.metrics.requests_created += 1;
        info!(request_id = id, mover = %view.mover, anchor = %view.anchor, "Teleport request admitted");

        self.notifier.notify(
            initiator,
            Notice::RequestSent {
                responder,
                here: move_requester_to_target,
                timeout_secs,
            },
        );
        self.notifier.notify(
            responder,
            Notice::RequestReceived {
                initiator,
                here: move_requester_to_target,
                timeout_secs,
            },
        );

        Ok(RequestTicket {
            request: view,
            timeout_secs,
        })
    }

    /// Turn a possibly-omitted counterpart into a request id
    fn resolve(&self, caller: ActorId, role: Role, counterpart: Option<ActorId>) -> TpaResult<u64> {
        match resolver::resolve(&self.registry, caller, role, counterpart) {
            Resolution::None => Err(TpaError::NoActiveRequest),
            Resolution::One(id) => Ok(id),
            Resolution::Many(actors) => Err(TpaError::AmbiguousRequest(
                actors.into_iter().map(|a| self.name_of(a)).collect(),
            )),
        }
    }

    /// Remove a resolved request and disarm its timer in one step
    fn take(&mut self, request_id: u64) -> TpaResult<PendingRequest> {
        let mut request = self.registry.remove(request_id).ok_or_else(|| {
            warn!(request_id, "Resolved request missing from registry");
            TpaError::NoActiveRequest
        })?;
        request.disarm_timeout();
        Ok(request.view())
    }

    fn accept(&mut self, responder: ActorId, initiator: Option<ActorId>, now: i64) -> TpaResult<Acceptance> {
        debug!(%responder, ?initiator, "accept: called");
        let request_id = self.resolve(responder, Role::Responder, initiator)?;
        let request = self.take(request_id)?;

        self.metrics.requests_accepted += 1;
        let waited_secs = now.saturating_sub(request.created_at).max(0) as u64;
        info!(request_id, waited_secs, "Teleport request accepted");

        self.notifier.notify(
            request.responder,
            Notice::RequestAccepted {
                counterpart: request.initiator,
                side: Side::Responder,
            },
        );
        self.notifier.notify(
            request.initiator,
            Notice::RequestAccepted {
                counterpart: request.responder,
                side: Side::Initiator,
            },
        );

        let gate_id = self.start_gate(request.clone());
        Ok(Acceptance {
            request,
            gate_id,
            waited_secs,
        })
    }

    fn deny(&mut self, responder: ActorId, initiator: Option<ActorId>) -> TpaResult<PendingRequest> {
        debug!(%responder, ?initiator, "deny: called");
        let request_id = self.resolve(responder, Role::Responder, initiator)?;
        let request = self.take(request_id)?;

        self.metrics.requests_denied += 1;
        info!(request_id, "Teleport request denied");

        self.notifier.notify(
            request.responder,
            Notice::RequestDenied {
                counterpart: request.initiator,
                side: Side::Responder,
            },
        );
        self.notifier.notify(
            request.initiator,
            Notice::RequestDenied {
                counterpart: request.responder,
                side: Side::Initiator,
            },
        );
        Ok(request)
    }

    fn cancel(&mut self, initiator: ActorId, responder: Option<ActorId>) -> TpaResult<PendingRequest> {
        debug!(%initiator, ?responder, "cancel: called");
        let request_id = self.resolve(initiator, Role::Initiator, responder)?;
        let request = self.take(request_id)?;

        self.metrics.requests_cancelled += 1;
        info!(request_id, "Teleport request cancelled");

        self.notifier.notify(
            request.initiator,
            Notice::RequestCancelled {
                counterpart: request.responder,
                side: Side::Initiator,
            },
        );
        self.notifier.notify(
            request.responder,
            Notice::RequestCancelled {
                counterpart: request.initiator,
                side: Side::Responder,
            },
        );
        Ok(request)
    }

    fn expire(&mut self, request_id: u64) {
        let Some(mut request) = self.registry.remove(request_id) else {
            debug!(request_id, "expire: request already resolved");
            self.metrics.stale_timer_messages += 1;
            return;
        };
        request.disarm_timeout();

        self.metrics.requests_timed_out += 1;
        info!(request_id, "Teleport request timed out");

        let here = request.move_requester_to_target;
        self.notifier.notify(
            request.initiator,
            Notice::RequestTimedOut {
                counterpart: request.responder,
                side: Side::Initiator,
                here,
            },
        );
        self.notifier.notify(
            request.responder,
            Notice::RequestTimedOut {
                counterpart: request.initiator,
                side: Side::Responder,
                here,
            },
        );
    }

    fn start_gate(&mut self, request: PendingRequest) -> u64 {
        let gate_id = self.next_id();
        let start = self.world.position(request.mover).unwrap_or_default();
        debug!(gate_id, mover = %request.mover, %start, "start_gate: called");

        let mut gate = MovementGate::new(
            gate_id,
            request,
            self.config.stand_still(),
            self.config.poll_interval(),
            start,
            self.config.progress_style(),
        );
        gate.attach_ticker(spawn_ticker(self.mailbox.clone(), gate_id, self.config.poll_interval()));
        self.gates.insert(gate_id, gate);
        gate_id
    }

    fn gate_tick(&mut self, gate_id: u64) {
        let Some(gate) = self.gates.get_mut(&gate_id) else {
            debug!(gate_id, "gate_tick: gate already finished");
            self.metrics.stale_timer_messages += 1;
            return;
        };

        let mover = gate.request.mover;
        let step = gate.tick(self.world.position(mover));
        if let GateStep::Waiting { reset, .. } = step {
            if reset {
                debug!(gate_id, %mover, "gate_tick: mover moved, countdown reset");
            }
            self.notifier.progress(mover, gate.progress(reset));
            return;
        }

        let Some(mut gate) = self.gates.remove(&gate_id) else {
            return;
        };
        gate.stop();
        self.notifier.clear_progress(mover);

        match step {
            GateStep::Finalize => self.complete_teleport(gate.request),
            GateStep::MoverGone => self.abort_teleport(gate.request, AbortReason::MoverOffline),
            GateStep::Waiting { .. } => {}
        }
    }

    fn complete_teleport(&mut self, request: PendingRequest) {
        if self.world.position(request.mover).is_none() {
            self.abort_teleport(request, AbortReason::MoverOffline);
            return;
        }
        let Some(destination) = self.world.location(request.anchor) else {
            self.abort_teleport(request, AbortReason::AnchorOffline);
            return;
        };

        self.world.teleport(request.mover, &destination);
        let now = self.world.now();
        self.cooldowns.apply(self.config.cooldown_mode, &request, now);

        self.metrics.teleports_completed += 1;
        info!(
            request_id = request.id,
            mover = %request.mover,
            world = %destination.world,
            position = %destination.position,
            "Teleport completed"
        );
    }

    fn abort_teleport(&mut self, request: PendingRequest, reason: AbortReason) {
        warn!(request_id = request.id, ?reason, "Teleport aborted, participant offline");
        self.metrics.teleports_aborted += 1;

        for (actor, counterpart) in [(request.mover, request.anchor), (request.anchor, request.mover)] {
            if self.world.position(actor).is_some() {
                self.notifier
                    .notify(actor, Notice::TeleportAborted { counterpart, reason });
            }
        }
    }

    fn suggest(&self, actor: ActorId, kind: SuggestionKind, prefix: &str) -> Vec<String> {
        debug!(%actor, ?kind, %prefix, "suggest: called");
        let names: Vec<String> = match kind {
            SuggestionKind::Request => self
                .world
                .online_actors(actor)
                .into_iter()
                .filter(|(id, _)| !self.registry.is_participant(*id))
                .map(|(_, name)| name)
                .collect(),
            SuggestionKind::Respond => self
                .registry
                .find_all_by_responder(actor)
                .iter()
                .map(|r| self.name_of(r.initiator))
                .collect(),
            SuggestionKind::Cancel => self
                .registry
                .find_all_by_initiator(actor)
                .iter()
                .map(|r| self.name_of(r.responder))
                .collect(),
        };

        let prefix = prefix.to_lowercase();
        let mut suggestions: Vec<String> = Vec::new();
        for name in names {
            if name.to_lowercase().starts_with(&prefix) && !suggestions.contains(&name) {
                suggestions.push(name);
            }
        }
        suggestions
    }

    fn update_setting(&mut self, setting: Setting) -> TpaResult<CoordinatorConfig> {
        let updated = self
            .config
            .with_setting(&setting)
            .map_err(TpaError::InvalidSetting)?;
        info!(key = setting.key(), ?setting, "Coordinator setting updated");
        self.config = updated;
        Ok(self.config.clone())
    }

    fn metrics(&self) -> CoordinatorMetrics {
        CoordinatorMetrics {
            pending_requests: self.registry.len(),
            active_gates: self.gates.len(),
            ..self.metrics.clone()
        }
    }

    /// Abort every outstanding timer; nothing survives the coordinator
    fn stop_all(&mut self) {
        for mut request in self.registry.drain() {
            request.disarm_timeout();
        }
        for (_, mut gate) in self.gates.drain() {
            gate.stop();
            self.notifier.clear_progress(gate.request.mover);
        }
    }
}

/// One-shot expiry timer for a pending request
fn spawn_timeout(mailbox: mpsc::WeakSender<CoordRequest>, request_id: u64, after: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(after).await;
        if let Some(tx) = mailbox.upgrade() {
            let _ = tx.send(CoordRequest::RequestTimeout { request_id }).await;
        }
    })
}

/// Periodic stand-still poll for a gate; the first tick is immediate
fn spawn_ticker(mailbox: mpsc::WeakSender<CoordRequest>, gate_id: u64, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let Some(tx) = mailbox.upgrade() else {
                break;
            };
            if tx.send(CoordRequest::GateTick { gate_id }).await.is_err() {
                break;
            }
        }
    })
}

//! In-memory world used by the command shell and the tests

use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use crate::domain::{ActorId, Location, Orientation, Position};
use crate::world::{GateProgress, Notice, Notifier, World};

/// Default world name for joined actors
pub const DEFAULT_WORLD: &str = "overworld";

/// An actor living in the simulation
#[derive(Debug, Clone, PartialEq)]
pub struct SimActor {
    pub id: ActorId,
    pub name: String,
    pub location: Location,
    pub online: bool,
}

/// Something the coordinator sent to an actor
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Notice(ActorId, Notice),
    Progress(ActorId, GateProgress),
    ClearProgress(ActorId),
}

/// A relocation the coordinator asked for
#[derive(Debug, Clone, PartialEq)]
pub struct TeleportRecord {
    pub actor: ActorId,
    pub from: Location,
    pub to: Location,
    pub at: i64,
}

#[derive(Debug, Default)]
struct SimState {
    actors: Vec<SimActor>,
    deliveries: Vec<Delivery>,
    history: Vec<Delivery>,
    teleports: Vec<TeleportRecord>,
}

/// A world of named actors at exact positions
///
/// The clock is `epoch_base` plus tokio time elapsed since creation, so tests
/// running with paused time control it through `tokio::time::advance`.
#[derive(Debug)]
pub struct SimWorld {
    state: Mutex<SimState>,
    epoch_base: i64,
    started: tokio::time::Instant,
}

impl Default for SimWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl SimWorld {
    /// World whose clock starts at the current wall-clock time
    pub fn new() -> Self {
        Self::with_epoch(chrono::Utc::now().timestamp())
    }

    /// World whose clock starts at `epoch_base`
    pub fn with_epoch(epoch_base: i64) -> Self {
        debug!(epoch_base, "SimWorld::with_epoch: called");
        Self {
            state: Mutex::new(SimState::default()),
            epoch_base,
            started: tokio::time::Instant::now(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Bring an actor online, creating it if the name is new
    pub fn join(&self, name: &str, position: Position) -> ActorId {
        self.join_world(name, DEFAULT_WORLD, position)
    }

    pub fn join_world(&self, name: &str, world: &str, position: Position) -> ActorId {
        debug!(%name, %world, %position, "SimWorld::join_world: called");
        let mut state = self.lock();
        let location = Location {
            world: world.to_string(),
            position,
            orientation: Orientation::default(),
        };
        if let Some(actor) = state.actors.iter_mut().find(|a| a.name.eq_ignore_ascii_case(name)) {
            actor.online = true;
            actor.location = location;
            return actor.id;
        }
        let id = ActorId::new();
        state.actors.push(SimActor {
            id,
            name: name.to_string(),
            location,
            online: true,
        });
        id
    }

    /// Take an actor offline; returns false if unknown
    pub fn leave(&self, actor: ActorId) -> bool {
        let mut state = self.lock();
        match state.actors.iter_mut().find(|a| a.id == actor) {
            Some(a) => {
                a.online = false;
                true
            }
            None => false,
        }
    }

    /// Move an online actor; returns false if unknown or offline
    pub fn move_to(&self, actor: ActorId, position: Position) -> bool {
        let mut state = self.lock();
        match state.actors.iter_mut().find(|a| a.id == actor && a.online) {
            Some(a) => {
                a.location.position = position;
                true
            }
            None => false,
        }
    }

    /// Turn an online actor; returns false if unknown or offline
    pub fn set_orientation(&self, actor: ActorId, orientation: Orientation) -> bool {
        let mut state = self.lock();
        match state.actors.iter_mut().find(|a| a.id == actor && a.online) {
            Some(a) => {
                a.location.orientation = orientation;
                true
            }
            None => false,
        }
    }

    /// Look an actor up by display name, case-insensitively
    pub fn find(&self, name: &str) -> Option<ActorId> {
        self.lock()
            .actors
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
            .map(|a| a.id)
    }

    pub fn actor(&self, actor: ActorId) -> Option<SimActor> {
        self.lock().actors.iter().find(|a| a.id == actor).cloned()
    }

    pub fn actors(&self) -> Vec<SimActor> {
        self.lock().actors.clone()
    }

    /// Name for display, falling back to the id for unknown actors
    pub fn name_of(&self, actor: ActorId) -> String {
        self.actor(actor).map(|a| a.name).unwrap_or_else(|| actor.to_string())
    }

    /// Deliveries since the last drain, oldest first
    pub fn drain_deliveries(&self) -> Vec<Delivery> {
        std::mem::take(&mut self.lock().deliveries)
    }

    /// Every notice `actor` has ever received, oldest first
    pub fn notices_for(&self, actor: ActorId) -> Vec<Notice> {
        self.lock()
            .history
            .iter()
            .filter_map(|d| match d {
                Delivery::Notice(to, notice) if *to == actor => Some(notice.clone()),
                _ => None,
            })
            .collect()
    }

    /// Every progress update `actor` has ever received, oldest first
    pub fn progress_for(&self, actor: ActorId) -> Vec<GateProgress> {
        self.lock()
            .history
            .iter()
            .filter_map(|d| match d {
                Delivery::Progress(to, progress) if *to == actor => Some(*progress),
                _ => None,
            })
            .collect()
    }

    pub fn teleports(&self) -> Vec<TeleportRecord> {
        self.lock().teleports.clone()
    }

    fn deliver(&self, delivery: Delivery) {
        let mut state = self.lock();
        state.history.push(delivery.clone());
        state.deliveries.push(delivery);
    }
}

impl World for SimWorld {
    fn now(&self) -> i64 {
        self.epoch_base + self.started.elapsed().as_secs() as i64
    }

    fn display_name(&self, actor: ActorId) -> Option<String> {
        self.actor(actor).filter(|a| a.online).map(|a| a.name)
    }

    fn position(&self, actor: ActorId) -> Option<Position> {
        self.location(actor).map(|l| l.position)
    }

    fn location(&self, actor: ActorId) -> Option<Location> {
        self.actor(actor).filter(|a| a.online).map(|a| a.location)
    }

    fn teleport(&self, actor: ActorId, destination: &Location) {
        let at = self.now();
        let mut state = self.lock();
        let Some(a) = state.actors.iter_mut().find(|a| a.id == actor) else {
            return;
        };
        let from = std::mem::replace(&mut a.location, destination.clone());
        debug!(%actor, to = %destination.position, "SimWorld::teleport: moved");
        state.teleports.push(TeleportRecord {
            actor,
            from,
            to: destination.clone(),
            at,
        });
    }

    fn online_actors(&self, excluding: ActorId) -> Vec<(ActorId, String)> {
        self.lock()
            .actors
            .iter()
            .filter(|a| a.online && a.id != excluding)
            .map(|a| (a.id, a.name.clone()))
            .collect()
    }
}

impl Notifier for SimWorld {
    fn notify(&self, actor: ActorId, notice: Notice) {
        debug!(%actor, kind = notice.kind(), "SimWorld::notify: called");
        self.deliver(Delivery::Notice(actor, notice));
    }

    fn progress(&self, actor: ActorId, progress: GateProgress) {
        self.deliver(Delivery::Progress(actor, progress));
    }

    fn clear_progress(&self, actor: ActorId) {
        self.deliver(Delivery::ClearProgress(actor));
    }
}

//! tpa - consensual teleport requests between actors
//!
//! An actor asks to be moved to another (`tpa`) or asks another to be moved
//! to them (`tpahere`). The counterpart accepts or denies, the initiator may
//! cancel, and unanswered requests expire. An accepted request teleports the
//! mover only after they have stood still for a configured period, and a
//! cooldown limits how often an actor may start new requests.
//!
//! The `coordinator` owns all of that state behind a single task. The host
//! environment plugs in through the `world::World` and `world::Notifier`
//! traits; `sim` provides an in-memory implementation of both.

pub mod cli;
pub mod config;
pub mod coordinator;
pub mod domain;
pub mod sim;
pub mod world;

pub use config::Config;
pub use coordinator::{
    Acceptance, Coordinator, CoordinatorConfig, CoordinatorHandle, CoordinatorMetrics, RequestKeying, RequestTicket,
    Setting, SuggestionKind, TpaError, TpaResult,
};
pub use domain::{ActorId, CooldownMode, Location, Orientation, PendingRequest, Position};
pub use world::{AbortReason, GateProgress, Notice, Notifier, ProgressStyle, Side, World};

//! Teleport request coordinator
//!
//! A single task owns every pending request, every cooldown stamp and every
//! confirmation gate. Callers talk to it through `CoordinatorHandle`:
//! - **Request:** `request_teleport` admits a request and arms its expiry
//! - **Respond:** `accept_request` / `deny_request` resolve it as the responder
//! - **Withdraw:** `cancel_request` resolves it as the initiator
//!
//! Accepted requests enter a stand-still confirmation phase before the world
//! is asked to move anyone.

mod config;
mod cooldown;
mod core;
mod gate;
mod handle;
mod messages;
mod registry;
mod resolver;

pub use config::{CoordinatorConfig, RequestKeying, Setting};
pub use cooldown::{CooldownStatus, CooldownTracker};
pub use core::Coordinator;
pub use gate::{GateStep, MovementGate};
pub use handle::CoordinatorHandle;
pub use messages::{
    Acceptance, CoordRequest, CoordinatorMetrics, RequestTicket, SuggestionKind, TpaError, TpaResult,
};
pub use registry::{Admission, RequestRegistry};
pub use resolver::{Resolution, Role, resolve};

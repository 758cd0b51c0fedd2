//! Domain types for the teleport request coordinator
//!
//! Actor identity and placement (`ActorId`, `Position`, `Location`) and the
//! request entity itself (`TeleportRequest`) plus its read-only view
//! (`PendingRequest`) handed out to callers.

mod actor;
mod cooldown_mode;
mod request;

pub use actor::{ActorId, Location, Orientation, Position};
pub use cooldown_mode::CooldownMode;
pub use request::{PendingRequest, RequestKey, TeleportRequest};

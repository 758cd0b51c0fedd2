//! Cooldown tracking

use std::collections::HashMap;

use tracing::debug;

use crate::domain::{ActorId, CooldownMode, PendingRequest};

/// Outcome of a cooldown check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownStatus {
    pub active: bool,
    /// Whole seconds left, zero when inactive
    pub remaining_secs: u64,
}

/// Epoch-seconds timestamp of each actor's last completed teleport
///
/// Entries are only ever overwritten; they age out by comparison with the
/// window.
#[derive(Debug, Default)]
pub struct CooldownTracker {
    last_teleport: HashMap<ActorId, i64>,
}

impl CooldownTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `actor` must still wait, and for how long
    pub fn is_on_cooldown(&self, actor: ActorId, now: i64, window_secs: u64) -> CooldownStatus {
        let Some(&last) = self.last_teleport.get(&actor) else {
            return CooldownStatus {
                active: false,
                remaining_secs: 0,
            };
        };
        let elapsed = now.saturating_sub(last).max(0) as u64;
        if elapsed < window_secs {
            CooldownStatus {
                active: true,
                remaining_secs: window_secs - elapsed,
            }
        } else {
            CooldownStatus {
                active: false,
                remaining_secs: 0,
            }
        }
    }

    pub fn record_completion(&mut self, actor: ActorId, now: i64) {
        debug!(%actor, now, "CooldownTracker::record_completion: called");
        self.last_teleport.insert(actor, now);
    }

    /// Stamp the participants `mode` selects for a completed teleport
    pub fn apply(&mut self, mode: CooldownMode, request: &PendingRequest, now: i64) {
        match mode {
            CooldownMode::MoverOnly => self.record_completion(request.mover, now),
            CooldownMode::InitiatorOnly => self.record_completion(request.initiator, now),
            CooldownMode::BothParticipants => {
                self.record_completion(request.mover, now);
                self.record_completion(request.anchor, now);
            }
        }
    }

    pub fn last_teleport(&self, actor: ActorId) -> Option<i64> {
        self.last_teleport.get(&actor).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TeleportRequest;
    use proptest::prelude::*;

    #[test]
    fn test_unknown_actor_not_on_cooldown() {
        let tracker = CooldownTracker::new();
        let status = tracker.is_on_cooldown(ActorId::new(), 1_000, 5);
        assert!(!status.active);
        assert_eq!(status.remaining_secs, 0);
    }

    #[test]
    fn test_cooldown_window_boundaries() {
        let mut tracker = CooldownTracker::new();
        let a = ActorId::new();
        tracker.record_completion(a, 0);

        assert_eq!(
            tracker.is_on_cooldown(a, 3, 5),
            CooldownStatus {
                active: true,
                remaining_secs: 2
            }
        );
        assert!(!tracker.is_on_cooldown(a, 5, 5).active);
        assert!(!tracker.is_on_cooldown(a, 3, 0).active);
    }

    #[test]
    fn test_clock_behind_stamp_counts_as_zero_elapsed() {
        let mut tracker = CooldownTracker::new();
        let a = ActorId::new();
        tracker.record_completion(a, 100);
        assert_eq!(tracker.is_on_cooldown(a, 90, 5).remaining_secs, 5);
    }

    #[test]
    fn test_apply_modes() {
        let initiator = ActorId::new();
        let responder = ActorId::new();
        // "teleport you to me": responder moves
        let request = TeleportRequest::new(1, initiator, responder, true, 0).view();

        let mut tracker = CooldownTracker::new();
        tracker.apply(CooldownMode::MoverOnly, &request, 10);
        assert_eq!(tracker.last_teleport(responder), Some(10));
        assert_eq!(tracker.last_teleport(initiator), None);

        let mut tracker = CooldownTracker::new();
        tracker.apply(CooldownMode::InitiatorOnly, &request, 10);
        assert_eq!(tracker.last_teleport(initiator), Some(10));
        assert_eq!(tracker.last_teleport(responder), None);

        let mut tracker = CooldownTracker::new();
        tracker.apply(CooldownMode::BothParticipants, &request, 10);
        assert_eq!(tracker.last_teleport(initiator), Some(10));
        assert_eq!(tracker.last_teleport(responder), Some(10));
    }

    proptest! {
        #[test]
        fn prop_remaining_never_exceeds_window(last in 0i64..10_000, offset in 0i64..10_000, window in 0u64..600) {
            let mut tracker = CooldownTracker::new();
            let a = ActorId::new();
            tracker.record_completion(a, last);
            let status = tracker.is_on_cooldown(a, last + offset, window);
            prop_assert!(status.remaining_secs <= window);
            prop_assert_eq!(status.active, (offset as u64) < window);
            if status.active {
                prop_assert_eq!(status.remaining_secs, window - offset as u64);
            }
        }
    }
}

//! Movement gate: the stand-still confirmation phase after acceptance
//!
//! The gate itself is a plain state machine. The coordinator owns the ticker
//! task and feeds each tick's position sample in through its mailbox.

use std::time::Duration;

use tokio::task::JoinHandle;

use crate::domain::{PendingRequest, Position};
use crate::world::{GateProgress, ProgressStyle};

/// What the coordinator should do after a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateStep {
    /// Stand-still satisfied: teleport now
    Finalize,
    /// Keep polling
    Waiting { remaining: Duration, reset: bool },
    /// The mover could not be sampled (offline)
    MoverGone,
}

/// Confirmation state for one accepted request
#[derive(Debug)]
pub struct MovementGate {
    pub id: u64,
    pub request: PendingRequest,
    stand_still: Duration,
    poll_interval: Duration,
    remaining: Duration,
    last_observed: Position,
    style: ProgressStyle,
    ticker: Option<JoinHandle<()>>,
}

impl MovementGate {
    pub fn new(
        id: u64,
        request: PendingRequest,
        stand_still: Duration,
        poll_interval: Duration,
        start: Position,
        style: ProgressStyle,
    ) -> Self {
        Self {
            id,
            request,
            stand_still,
            poll_interval,
            remaining: stand_still,
            last_observed: start,
            style,
            ticker: None,
        }
    }

    pub fn remaining(&self) -> Duration {
        self.remaining
    }

    /// Advance one poll period given the mover's sampled position
    pub fn tick(&mut self, sampled: Option<Position>) -> GateStep {
        if self.remaining.is_zero() {
            return GateStep::Finalize;
        }
        let Some(position) = sampled else {
            return GateStep::MoverGone;
        };
        let reset = position != self.last_observed;
        if reset {
            self.remaining = self.stand_still;
            self.last_observed = position;
        } else {
            self.remaining = self.remaining.saturating_sub(self.poll_interval);
        }
        GateStep::Waiting {
            remaining: self.remaining,
            reset,
        }
    }

    /// Progress update for the current state
    pub fn progress(&self, reset: bool) -> GateProgress {
        let millis = self.remaining.as_millis() as u64;
        let fraction = if self.stand_still.is_zero() {
            0.0
        } else {
            (self.remaining.as_secs_f32() / self.stand_still.as_secs_f32()).clamp(0.0, 1.0)
        };
        GateProgress {
            remaining_secs: millis.div_ceil(1000),
            fraction,
            reset,
            style: self.style,
        }
    }

    pub fn attach_ticker(&mut self, handle: JoinHandle<()>) {
        if let Some(previous) = self.ticker.replace(handle) {
            previous.abort();
        }
    }

    /// Stop the periodic poll
    pub fn stop(&mut self) {
        if let Some(handle) = self.ticker.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ActorId, TeleportRequest};
    use proptest::prelude::*;

    const POLL: Duration = Duration::from_millis(250);

    fn gate(stand_still: Duration) -> MovementGate {
        let request = TeleportRequest::new(1, ActorId::new(), ActorId::new(), false, 0).view();
        MovementGate::new(1, request, stand_still, POLL, Position::default(), ProgressStyle::Plain)
    }

    #[test]
    fn test_zero_stand_still_finalizes_on_first_tick() {
        let mut gate = gate(Duration::ZERO);
        assert_eq!(gate.tick(Some(Position::default())), GateStep::Finalize);
    }

    #[test]
    fn test_still_mover_finalizes_after_window() {
        let mut gate = gate(Duration::from_secs(1));
        let here = Position::default();
        for _ in 0..4 {
            assert!(matches!(gate.tick(Some(here)), GateStep::Waiting { reset: false, .. }));
        }
        assert_eq!(gate.remaining(), Duration::ZERO);
        assert_eq!(gate.tick(Some(here)), GateStep::Finalize);
    }

    #[test]
    fn test_movement_resets_countdown() {
        let mut gate = gate(Duration::from_secs(1));
        let here = Position::default();
        let there = Position::new(0.0, 0.0, 1.0);

        gate.tick(Some(here));
        assert_eq!(gate.remaining(), Duration::from_millis(750));

        // moved on tick 2 of 4
        assert_eq!(
            gate.tick(Some(there)),
            GateStep::Waiting {
                remaining: Duration::from_secs(1),
                reset: true
            }
        );

        // a full four still ticks are needed again
        for expected in [750, 500, 250, 0] {
            gate.tick(Some(there));
            assert_eq!(gate.remaining(), Duration::from_millis(expected));
        }
        assert_eq!(gate.tick(Some(there)), GateStep::Finalize);
    }

    #[test]
    fn test_offline_mover_reported() {
        let mut gate = gate(Duration::from_secs(1));
        assert_eq!(gate.tick(None), GateStep::MoverGone);
    }

    #[test]
    fn test_progress_rounds_up() {
        let mut gate = gate(Duration::from_secs(2));
        assert_eq!(gate.progress(false).remaining_secs, 2);
        gate.tick(Some(Position::default()));
        let progress = gate.progress(false);
        assert_eq!(progress.remaining_secs, 2);
        assert!((progress.fraction - 0.875).abs() < f32::EPSILON);
        assert_eq!(progress.style, ProgressStyle::Plain);
    }

    proptest! {
        #[test]
        fn prop_remaining_bounded_by_window(moves in proptest::collection::vec(any::<bool>(), 0..40)) {
            let mut gate = gate(Duration::from_secs(2));
            let mut z = 0.0;
            for moved in moves {
                if moved {
                    z += 1.0;
                }
                match gate.tick(Some(Position::new(0.0, 0.0, z))) {
                    GateStep::Finalize => break,
                    GateStep::Waiting { remaining, reset } => {
                        prop_assert!(remaining <= Duration::from_secs(2));
                        if reset {
                            prop_assert_eq!(remaining, Duration::from_secs(2));
                        }
                    }
                    GateStep::MoverGone => prop_assert!(false, "mover was always sampled"),
                }
            }
        }
    }
}

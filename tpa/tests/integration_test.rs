//! Integration tests for tpa
//!
//! These drive a real coordinator task against the in-memory world with
//! tokio's clock paused, so timeouts and stand-still windows run instantly.

use std::sync::Arc;
use std::time::Duration;

use tpa::coordinator::{
    Coordinator, CoordinatorConfig, CoordinatorHandle, RequestKeying, Setting, SuggestionKind, TpaError,
};
use tpa::domain::{ActorId, CooldownMode, Orientation, Position};
use tpa::sim::SimWorld;
use tpa::world::{AbortReason, Notice, Side, World};

const EPOCH: i64 = 1_000;

struct Fixture {
    world: Arc<SimWorld>,
    handle: CoordinatorHandle,
    alice: ActorId,
    bob: ActorId,
    carol: ActorId,
}

impl Fixture {
    fn new(config: CoordinatorConfig) -> Self {
        let world = Arc::new(SimWorld::with_epoch(EPOCH));
        let alice = world.join("Alice", Position::new(0.0, 64.0, 0.0));
        let bob = world.join_world("Bob", "nether", Position::new(100.0, 64.0, -50.0));
        let carol = world.join("Carol", Position::new(-20.0, 70.0, 5.0));
        let (handle, _task) = Coordinator::spawn(config, world.clone(), world.clone()).expect("spawn coordinator");
        Self {
            world,
            handle,
            alice,
            bob,
            carol,
        }
    }

    fn now(&self) -> i64 {
        self.world.now()
    }

    fn count(&self, actor: ActorId, pred: impl Fn(&Notice) -> bool) -> usize {
        self.world.notices_for(actor).iter().filter(|n| pred(n)).count()
    }
}

fn config() -> CoordinatorConfig {
    CoordinatorConfig::default()
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

// =============================================================================
// Request lifecycle
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_tpa_accept_teleports_after_stand_still() {
    let f = Fixture::new(config());

    let ticket = f.handle.request_teleport(f.alice, f.bob, false, f.now()).await.unwrap();
    assert_eq!(ticket.request.mover, f.alice);
    assert_eq!(ticket.request.anchor, f.bob);
    assert_eq!(ticket.timeout_secs, 60);

    let acceptance = f.handle.accept_request(f.bob, None, f.now()).await.unwrap();
    assert_eq!(acceptance.request.id, ticket.request.id);
    assert!(f.handle.pending_requests().await.unwrap().is_empty());

    tokio::time::sleep(Duration::from_millis(4_500)).await;
    assert!(f.world.teleports().is_empty(), "teleported before the stand-still window");
    assert!(!f.world.progress_for(f.alice).is_empty());

    tokio::time::sleep(Duration::from_millis(1_000)).await;
    let teleports = f.world.teleports();
    assert_eq!(teleports.len(), 1);
    assert_eq!(teleports[0].actor, f.alice);
    assert_eq!(teleports[0].to.world, "nether");
    assert_eq!(f.world.position(f.alice), Some(Position::new(100.0, 64.0, -50.0)));

    assert_eq!(
        f.count(f.alice, |n| matches!(n, Notice::RequestAccepted { side: Side::Initiator, .. })),
        1
    );
    let metrics = f.handle.metrics().await.unwrap();
    assert_eq!(metrics.teleports_completed, 1);
    assert_eq!(metrics.active_gates, 0);
}

#[tokio::test(start_paused = true)]
async fn test_tpahere_moves_the_responder() {
    let mut cfg = config();
    cfg.stand_still_secs = 0;
    let f = Fixture::new(cfg);

    let ticket = f.handle.request_teleport(f.alice, f.bob, true, f.now()).await.unwrap();
    assert_eq!(ticket.request.mover, f.bob);
    assert_eq!(ticket.request.anchor, f.alice);

    f.handle.accept_request(f.bob, Some(f.alice), f.now()).await.unwrap();
    settle().await;

    let teleports = f.world.teleports();
    assert_eq!(teleports.len(), 1);
    assert_eq!(teleports[0].actor, f.bob);
    assert_eq!(f.world.position(f.bob), Some(Position::new(0.0, 64.0, 0.0)));
}

#[tokio::test(start_paused = true)]
async fn test_mover_takes_the_anchor_orientation() {
    let mut cfg = config();
    cfg.stand_still_secs = 0;
    let f = Fixture::new(cfg);
    let facing = Orientation {
        yaw: 90.0,
        pitch: -10.0,
    };
    assert!(f.world.set_orientation(f.bob, facing));

    f.handle.request_teleport(f.alice, f.bob, false, f.now()).await.unwrap();
    f.handle.accept_request(f.bob, None, f.now()).await.unwrap();
    settle().await;

    let location = f.world.location(f.alice).unwrap();
    assert_eq!(location.orientation, facing);
    assert_eq!(location.world, "nether");
    assert_eq!(f.world.teleports()[0].to.orientation, facing);
}

#[tokio::test(start_paused = true)]
async fn test_request_notifies_both_sides() {
    let f = Fixture::new(config());
    f.handle.request_teleport(f.alice, f.bob, false, f.now()).await.unwrap();

    assert_eq!(
        f.world.notices_for(f.alice),
        vec![Notice::RequestSent {
            responder: f.bob,
            here: false,
            timeout_secs: 60,
        }]
    );
    assert_eq!(
        f.world.notices_for(f.bob),
        vec![Notice::RequestReceived {
            initiator: f.alice,
            here: false,
            timeout_secs: 60,
        }]
    );
}

#[tokio::test(start_paused = true)]
async fn test_self_target_is_rejected() {
    let f = Fixture::new(config());
    let err = f.handle.request_teleport(f.alice, f.alice, false, f.now()).await.unwrap_err();
    assert_eq!(err, TpaError::SelfTarget);
    assert!(f.world.notices_for(f.alice).is_empty());
    assert!(f.handle.pending_requests().await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_request_is_rejected() {
    let f = Fixture::new(config());
    f.handle.request_teleport(f.alice, f.bob, false, f.now()).await.unwrap();

    let err = f.handle.request_teleport(f.alice, f.bob, false, f.now()).await.unwrap_err();
    assert_eq!(err, TpaError::DuplicateRequest);
    assert_eq!(f.handle.pending_requests().await.unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_directional_keying_distinguishes_direction() {
    let f = Fixture::new(config());
    // Alice -> Bob
    f.handle.request_teleport(f.alice, f.bob, false, f.now()).await.unwrap();
    // Bob -> Alice is a different movement
    f.handle.request_teleport(f.alice, f.bob, true, f.now()).await.unwrap();
    // Bob asking to go to Alice is the same movement as the tpahere above
    let err = f.handle.request_teleport(f.bob, f.alice, false, f.now()).await.unwrap_err();
    assert_eq!(err, TpaError::DuplicateRequest);
    assert_eq!(f.handle.pending_requests().await.unwrap().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_pair_keying_allows_one_request_per_pair() {
    let mut cfg = config();
    cfg.request_keying = RequestKeying::Pair;
    let f = Fixture::new(cfg);

    f.handle.request_teleport(f.alice, f.bob, false, f.now()).await.unwrap();
    let err = f.handle.request_teleport(f.bob, f.alice, false, f.now()).await.unwrap_err();
    assert_eq!(err, TpaError::DuplicateRequest);
    let err = f.handle.request_teleport(f.alice, f.bob, true, f.now()).await.unwrap_err();
    assert_eq!(err, TpaError::DuplicateRequest);

    f.handle.request_teleport(f.alice, f.carol, false, f.now()).await.unwrap();
    assert_eq!(f.handle.pending_requests().await.unwrap().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_accept_then_deny_or_cancel_finds_nothing() {
    let f = Fixture::new(config());
    f.handle.request_teleport(f.alice, f.bob, false, f.now()).await.unwrap();
    f.handle.accept_request(f.bob, None, f.now()).await.unwrap();

    assert_eq!(
        f.handle.deny_request(f.bob, Some(f.alice)).await.unwrap_err(),
        TpaError::NoActiveRequest
    );
    assert_eq!(
        f.handle.cancel_request(f.alice, Some(f.bob)).await.unwrap_err(),
        TpaError::NoActiveRequest
    );
    assert_eq!(
        f.handle.accept_request(f.bob, None, f.now()).await.unwrap_err(),
        TpaError::NoActiveRequest
    );
}

#[tokio::test(start_paused = true)]
async fn test_deny_notifies_and_removes() {
    let f = Fixture::new(config());
    f.handle.request_teleport(f.alice, f.bob, false, f.now()).await.unwrap();

    let denied = f.handle.deny_request(f.bob, None).await.unwrap();
    assert_eq!(denied.initiator, f.alice);
    assert!(f.handle.pending_requests().await.unwrap().is_empty());
    assert_eq!(
        f.count(f.alice, |n| *n
            == Notice::RequestDenied {
                counterpart: f.bob,
                side: Side::Initiator,
            }),
        1
    );
    assert_eq!(f.handle.metrics().await.unwrap().requests_denied, 1);
}

#[tokio::test(start_paused = true)]
async fn test_double_cancel_is_idempotent() {
    let f = Fixture::new(config());
    f.handle.request_teleport(f.alice, f.bob, false, f.now()).await.unwrap();

    f.handle.cancel_request(f.alice, None).await.unwrap();
    let err = f.handle.cancel_request(f.alice, None).await.unwrap_err();
    assert_eq!(err, TpaError::NoActiveRequest);

    assert_eq!(
        f.count(f.bob, |n| matches!(n, Notice::RequestCancelled { side: Side::Responder, .. })),
        1
    );
    assert_eq!(f.handle.metrics().await.unwrap().requests_cancelled, 1);
}

// =============================================================================
// Disambiguation
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_implicit_accept_with_several_initiators_is_ambiguous() {
    let f = Fixture::new(config());
    f.handle.request_teleport(f.alice, f.bob, false, f.now()).await.unwrap();
    f.handle.request_teleport(f.carol, f.bob, false, f.now()).await.unwrap();

    let err = f.handle.accept_request(f.bob, None, f.now()).await.unwrap_err();
    assert_eq!(
        err,
        TpaError::AmbiguousRequest(vec!["Alice".to_string(), "Carol".to_string()])
    );
    assert_eq!(f.handle.pending_requests().await.unwrap().len(), 2);

    let accepted = f.handle.accept_request(f.bob, Some(f.carol), f.now()).await.unwrap();
    assert_eq!(accepted.request.initiator, f.carol);

    // Only Alice's request is left, so the implicit form works again
    let denied = f.handle.deny_request(f.bob, None).await.unwrap();
    assert_eq!(denied.initiator, f.alice);
}

#[tokio::test(start_paused = true)]
async fn test_same_counterpart_twice_needs_a_name() {
    let f = Fixture::new(config());
    let first = f.handle.request_teleport(f.alice, f.bob, false, f.now()).await.unwrap();
    f.handle.request_teleport(f.alice, f.bob, true, f.now()).await.unwrap();

    let err = f.handle.cancel_request(f.alice, None).await.unwrap_err();
    assert_eq!(err, TpaError::AmbiguousRequest(vec!["Bob".to_string()]));

    let cancelled = f.handle.cancel_request(f.alice, Some(f.bob)).await.unwrap();
    assert_eq!(cancelled.id, first.request.id);

    // One left, so the implicit form resolves
    f.handle.cancel_request(f.alice, None).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_explicit_counterpart_without_request() {
    let f = Fixture::new(config());
    f.handle.request_teleport(f.alice, f.bob, false, f.now()).await.unwrap();
    let err = f.handle.accept_request(f.bob, Some(f.carol), f.now()).await.unwrap_err();
    assert_eq!(err, TpaError::NoActiveRequest);
}

// =============================================================================
// Timeouts and cooldowns
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_request_times_out_once() {
    let f = Fixture::new(config());
    f.handle.request_teleport(f.alice, f.bob, false, f.now()).await.unwrap();

    tokio::time::sleep(Duration::from_millis(59_500)).await;
    assert_eq!(f.handle.pending_requests().await.unwrap().len(), 1);
    assert_eq!(f.count(f.alice, |n| matches!(n, Notice::RequestTimedOut { .. })), 0);

    tokio::time::sleep(Duration::from_millis(1_000)).await;
    assert!(f.handle.pending_requests().await.unwrap().is_empty());
    assert_eq!(
        f.count(f.alice, |n| *n
            == Notice::RequestTimedOut {
                counterpart: f.bob,
                side: Side::Initiator,
                here: false,
            }),
        1
    );
    assert_eq!(
        f.count(f.bob, |n| matches!(n, Notice::RequestTimedOut { side: Side::Responder, .. })),
        1
    );

    let err = f.handle.cancel_request(f.alice, None).await.unwrap_err();
    assert_eq!(err, TpaError::NoActiveRequest);

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(f.count(f.alice, |n| matches!(n, Notice::RequestTimedOut { .. })), 1);
    assert_eq!(f.handle.metrics().await.unwrap().requests_timed_out, 1);
}

#[tokio::test(start_paused = true)]
async fn test_resolved_request_never_times_out() {
    let f = Fixture::new(config());
    f.handle.request_teleport(f.alice, f.bob, false, f.now()).await.unwrap();
    f.handle.deny_request(f.bob, None).await.unwrap();

    tokio::time::sleep(Duration::from_secs(90)).await;
    assert_eq!(f.count(f.alice, |n| matches!(n, Notice::RequestTimedOut { .. })), 0);
    assert_eq!(f.handle.metrics().await.unwrap().requests_timed_out, 0);
}

#[tokio::test(start_paused = true)]
async fn test_cooldown_after_completed_teleport() {
    let mut cfg = config();
    cfg.stand_still_secs = 0;
    cfg.cooldown_secs = 5;
    let f = Fixture::new(cfg);

    f.handle.request_teleport(f.alice, f.bob, false, EPOCH).await.unwrap();
    f.handle.accept_request(f.bob, None, EPOCH).await.unwrap();
    settle().await;
    assert_eq!(f.world.teleports().len(), 1);

    let err = f.handle.request_teleport(f.alice, f.bob, false, EPOCH + 3).await.unwrap_err();
    assert_eq!(err, TpaError::OnCooldown { remaining_secs: 2 });
    assert_eq!(err.to_string(), "You cannot make a request for 2 more seconds");
    assert_eq!(f.handle.cooldown_remaining(f.alice, EPOCH + 3).await.unwrap(), 2);

    // The anchor is not stamped in mover-only mode
    f.handle.request_teleport(f.bob, f.carol, false, EPOCH + 1).await.unwrap();

    f.handle.request_teleport(f.alice, f.bob, false, EPOCH + 5).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_tpahere_cooldown_checks_the_initiator_not_the_mover() {
    let mut cfg = config();
    cfg.stand_still_secs = 0;
    cfg.cooldown_secs = 5;
    let f = Fixture::new(cfg);

    // Alice is moved and stamped
    f.handle.request_teleport(f.alice, f.bob, false, EPOCH).await.unwrap();
    f.handle.accept_request(f.bob, None, EPOCH).await.unwrap();
    settle().await;
    assert_eq!(f.handle.cooldown_remaining(f.alice, EPOCH + 1).await.unwrap(), 4);

    // Bob may still pull the cooling Alice to him
    let ticket = f.handle.request_teleport(f.bob, f.alice, true, EPOCH + 1).await.unwrap();
    assert_eq!(ticket.request.mover, f.alice);

    // Alice may not start a request, even one that moves Bob
    let err = f.handle.request_teleport(f.alice, f.bob, true, EPOCH + 1).await.unwrap_err();
    assert_eq!(err, TpaError::OnCooldown { remaining_secs: 4 });
}

#[tokio::test(start_paused = true)]
async fn test_cooldown_both_participants() {
    let mut cfg = config();
    cfg.stand_still_secs = 0;
    cfg.cooldown_mode = CooldownMode::BothParticipants;
    let f = Fixture::new(cfg);

    f.handle.request_teleport(f.alice, f.bob, false, EPOCH).await.unwrap();
    f.handle.accept_request(f.bob, None, EPOCH).await.unwrap();
    settle().await;

    let err = f.handle.request_teleport(f.bob, f.carol, false, EPOCH + 1).await.unwrap_err();
    assert_eq!(err, TpaError::OnCooldown { remaining_secs: 4 });
}

#[tokio::test(start_paused = true)]
async fn test_zero_cooldown_never_blocks() {
    let mut cfg = config();
    cfg.stand_still_secs = 0;
    cfg.cooldown_secs = 0;
    let f = Fixture::new(cfg);

    f.handle.request_teleport(f.alice, f.bob, false, EPOCH).await.unwrap();
    f.handle.accept_request(f.bob, None, EPOCH).await.unwrap();
    settle().await;

    f.handle.request_teleport(f.alice, f.carol, false, EPOCH).await.unwrap();
}

// =============================================================================
// Stand-still gate
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_movement_resets_the_countdown() {
    let mut cfg = config();
    cfg.stand_still_secs = 2;
    let f = Fixture::new(cfg);

    f.handle.request_teleport(f.alice, f.bob, false, f.now()).await.unwrap();
    f.handle.accept_request(f.bob, None, f.now()).await.unwrap();

    tokio::time::sleep(Duration::from_millis(1_100)).await;
    f.world.move_to(f.alice, Position::new(1.0, 64.0, 0.0));

    // Without the move this would have fired at 2s
    tokio::time::sleep(Duration::from_millis(1_500)).await;
    assert!(f.world.teleports().is_empty());
    assert!(f.world.progress_for(f.alice).iter().any(|p| p.reset));

    tokio::time::sleep(Duration::from_millis(1_200)).await;
    assert_eq!(f.world.teleports().len(), 1);
    assert_eq!(f.world.teleports()[0].from.position, Position::new(1.0, 64.0, 0.0));
}

#[tokio::test(start_paused = true)]
async fn test_mover_going_offline_aborts_the_teleport() {
    let f = Fixture::new(config());
    f.handle.request_teleport(f.alice, f.bob, false, f.now()).await.unwrap();
    f.handle.accept_request(f.bob, None, f.now()).await.unwrap();

    tokio::time::sleep(Duration::from_millis(1_100)).await;
    f.world.leave(f.alice);
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert!(f.world.teleports().is_empty());
    assert_eq!(
        f.count(f.bob, |n| *n
            == Notice::TeleportAborted {
                counterpart: f.alice,
                reason: AbortReason::MoverOffline,
            }),
        1
    );
    assert_eq!(f.count(f.alice, |n| matches!(n, Notice::TeleportAborted { .. })), 0);

    let metrics = f.handle.metrics().await.unwrap();
    assert_eq!(metrics.teleports_aborted, 1);
    assert_eq!(metrics.active_gates, 0);
}

#[tokio::test(start_paused = true)]
async fn test_anchor_going_offline_aborts_the_teleport() {
    let mut cfg = config();
    cfg.stand_still_secs = 1;
    let f = Fixture::new(cfg);
    f.handle.request_teleport(f.alice, f.bob, false, f.now()).await.unwrap();
    f.handle.accept_request(f.bob, None, f.now()).await.unwrap();

    tokio::time::sleep(Duration::from_millis(600)).await;
    f.world.leave(f.bob);
    tokio::time::sleep(Duration::from_secs(2)).await;

    assert!(f.world.teleports().is_empty());
    assert_eq!(
        f.count(f.alice, |n| *n
            == Notice::TeleportAborted {
                counterpart: f.bob,
                reason: AbortReason::AnchorOffline,
            }),
        1
    );
    // Aborted teleports do not start a cooldown
    assert_eq!(f.handle.cooldown_remaining(f.alice, f.now()).await.unwrap(), 0);
}

// =============================================================================
// Suggestions, settings, shutdown
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_suggestions() {
    let f = Fixture::new(config());
    f.world.join("Albert", Position::default());

    let targets = f.handle.suggest(f.carol, SuggestionKind::Request, "a").await.unwrap();
    assert_eq!(targets, vec!["Alice".to_string(), "Albert".to_string()]);

    f.handle.request_teleport(f.alice, f.bob, false, f.now()).await.unwrap();

    // Actors already in a pending request are not offered as new targets
    let targets = f.handle.suggest(f.carol, SuggestionKind::Request, "").await.unwrap();
    assert_eq!(targets, vec!["Albert".to_string()]);

    let respond = f.handle.suggest(f.bob, SuggestionKind::Respond, "AL").await.unwrap();
    assert_eq!(respond, vec!["Alice".to_string()]);

    let cancel = f.handle.suggest(f.alice, SuggestionKind::Cancel, "").await.unwrap();
    assert_eq!(cancel, vec!["Bob".to_string()]);

    let none = f.handle.suggest(f.alice, SuggestionKind::Cancel, "z").await.unwrap();
    assert!(none.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_runtime_setting_update() {
    let f = Fixture::new(config());

    let updated = f.handle.update_setting(Setting::Timeout(10)).await.unwrap();
    assert_eq!(updated.timeout_secs, 10);
    assert_eq!(f.handle.config().await.unwrap().timeout_secs, 10);

    let err = f.handle.update_setting(Setting::Timeout(0)).await.unwrap_err();
    assert!(matches!(err, TpaError::InvalidSetting(_)));
    assert_eq!(f.handle.config().await.unwrap().timeout_secs, 10);

    // New requests use the new timeout
    let ticket = f.handle.request_teleport(f.alice, f.bob, false, f.now()).await.unwrap();
    assert_eq!(ticket.timeout_secs, 10);
    tokio::time::sleep(Duration::from_secs(11)).await;
    assert!(f.handle.pending_requests().await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_pending_snapshot_is_oldest_first() {
    let f = Fixture::new(config());
    f.handle.request_teleport(f.carol, f.bob, false, f.now()).await.unwrap();
    f.handle.request_teleport(f.alice, f.bob, true, f.now()).await.unwrap();

    let pending = f.handle.pending_requests().await.unwrap();
    let initiators: Vec<ActorId> = pending.iter().map(|r| r.initiator).collect();
    assert_eq!(initiators, vec![f.carol, f.alice]);
    assert!(pending[1].move_requester_to_target);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_closes_the_handle() {
    let world = Arc::new(SimWorld::with_epoch(EPOCH));
    let alice = world.join("Alice", Position::default());
    let bob = world.join("Bob", Position::default());
    let (handle, task) = Coordinator::spawn(config(), world.clone(), world.clone()).unwrap();

    handle.request_teleport(alice, bob, false, EPOCH).await.unwrap();
    handle.shutdown().await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("coordinator should stop")
        .unwrap();

    let err = handle.metrics().await.unwrap_err();
    assert_eq!(err, TpaError::ChannelClosed);

    // Pending timers died with the coordinator
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert!(world.notices_for(alice).iter().all(|n| !matches!(n, Notice::RequestTimedOut { .. })));
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let world = Arc::new(SimWorld::with_epoch(EPOCH));
    let mut cfg = config();
    cfg.timeout_secs = 0;
    assert!(Coordinator::spawn(cfg, world.clone(), world).is_err());
}

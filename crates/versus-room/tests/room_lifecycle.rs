//! Integration tests for the room lifecycle: joining, rounds, votes,
//! host commands, and timer races.
//!
//! All tests run with paused time. Awaiting an event that depends on a
//! room timer auto-advances the clock to that timer.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use versus_protocol::{
    ConnectionId, Counts, HostCredential, Phase, Role, RoomId, ServerEvent, Winner, unix_millis,
};
use versus_room::{
    BroadcastGateway, ChannelGateway, HostCue, RoomConfig, RoomError, RoomHandle, RoomRegistry,
};

// =========================================================================
// Helpers
// =========================================================================

struct Client {
    conn: ConnectionId,
    rx: mpsc::UnboundedReceiver<ServerEvent>,
}

impl Client {
    /// Waits for the next event. Generous timeout: with paused time it
    /// only elapses if nothing at all is scheduled.
    async fn next(&mut self) -> ServerEvent {
        tokio::time::timeout(Duration::from_secs(60), self.rx.recv())
            .await
            .expect("event should arrive")
            .expect("outbox should be open")
    }

    /// Everything already delivered, without waiting.
    fn drain(&mut self) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }
}

struct Fixture {
    registry: RoomRegistry<ChannelGateway>,
    gateway: Arc<ChannelGateway>,
    next_conn: u64,
}

impl Fixture {
    fn new() -> Self {
        Self::with_config(test_config())
    }

    fn with_config(config: RoomConfig) -> Self {
        let gateway = Arc::new(ChannelGateway::new());
        Self {
            registry: RoomRegistry::new(Arc::clone(&gateway), config),
            gateway,
            next_conn: 1,
        }
    }

    fn connect(&mut self) -> Client {
        let conn = ConnectionId::new(self.next_conn);
        self.next_conn += 1;
        let (tx, rx) = mpsc::unbounded_channel();
        self.gateway.register(conn, tx);
        Client { conn, rx }
    }

    fn create(&mut self) -> (RoomHandle, HostCredential) {
        let (room_id, cred) = self.registry.create_room();
        let handle = self.registry.get_room(room_id.as_str()).expect("room exists");
        (handle, cred)
    }
}

fn test_config() -> RoomConfig {
    RoomConfig {
        voting_duration: Duration::from_millis(1_000),
        deadline_grace: Duration::from_millis(50),
        reveal_window: Duration::from_millis(900),
        ..RoomConfig::default()
    }
}

fn token(cred: &HostCredential) -> String {
    cred.expose().to_owned()
}

/// Joins as host and discards the join events.
async fn join_host(room: &RoomHandle, client: &mut Client, cred: &HostCredential) {
    let snap = room
        .join(client.conn, true, Some(token(cred)))
        .await
        .expect("join ok");
    assert_eq!(snap.role, Role::Host);
    client.drain();
}

async fn join_player(room: &RoomHandle, client: &mut Client) {
    room.join(client.conn, false, None).await.expect("join ok");
    client.drain();
}

// =========================================================================
// Registry
// =========================================================================

#[tokio::test]
async fn test_created_room_starts_idle_at_level_one() {
    let mut fx = Fixture::new();
    let (room, _cred) = fx.create();

    let snap = room.snapshot().await.expect("snapshot");
    assert_eq!(snap.phase, Phase::Idle);
    assert_eq!(snap.level, 1);
    assert_eq!(snap.round_deadline, None);
    assert_eq!(snap.counts, Counts::default());
    assert_eq!(snap.online, 0);
}

#[tokio::test]
async fn test_lookup_ignores_case() {
    let mut fx = Fixture::new();
    let (room_id, _) = fx.registry.create_room();

    let lower = room_id.as_str().to_ascii_lowercase();
    let handle = fx.registry.get_room(&lower).expect("lowercase lookup");
    assert_eq!(handle.room_id(), &room_id);
}

#[tokio::test]
async fn test_unknown_room_is_not_found() {
    let fx = Fixture::new();
    let err = fx.registry.get_room("ZZZZZZ").err().expect("should fail");
    assert!(matches!(err, RoomError::NotFound(id) if id == RoomId::new("ZZZZZZ")));
}

#[tokio::test]
async fn test_rooms_get_distinct_codes_and_credentials() {
    let mut fx = Fixture::new();
    let (id1, cred1) = fx.registry.create_room();
    let (id2, cred2) = fx.registry.create_room();

    assert_ne!(id1, id2);
    assert_ne!(cred1, cred2);
    assert_eq!(fx.registry.room_count(), 2);
    let ids = fx.registry.room_ids();
    assert!(ids.contains(&id1) && ids.contains(&id2));
}

#[tokio::test]
async fn test_remove_room_stops_actor() {
    let mut fx = Fixture::new();
    let (room, _) = fx.create();
    let code = room.room_id().as_str().to_owned();

    fx.registry.remove_room(&code).await.expect("remove ok");

    assert_eq!(fx.registry.room_count(), 0);
    assert!(matches!(fx.registry.get_room(&code), Err(RoomError::NotFound(_))));
    assert!(matches!(room.snapshot().await, Err(RoomError::Unavailable(_))));
    assert!(matches!(
        fx.registry.remove_room(&code).await,
        Err(RoomError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_remove_room_releases_members() {
    let mut fx = Fixture::new();
    let (room, cred) = fx.create();
    let mut host = fx.connect();
    let mut player = fx.connect();
    join_host(&room, &mut host, &cred).await;
    join_player(&room, &mut player).await;
    host.drain();
    let room_id = room.room_id().clone();

    fx.registry.remove_room(room_id.as_str()).await.expect("remove ok");

    let closed = ServerEvent::RoomClosed {
        room_id: room_id.clone(),
    };
    assert_eq!(host.drain(), vec![closed.clone()]);
    assert_eq!(player.drain(), vec![closed]);
    assert_eq!(fx.gateway.membership_count(&room_id), 0);
    assert_eq!(fx.gateway.connection_count(), 2, "connections stay registered");
}

// =========================================================================
// Joining and leaving
// =========================================================================

#[tokio::test]
async fn test_join_sends_snapshot_and_online_count() {
    let mut fx = Fixture::new();
    let (room, cred) = fx.create();
    let mut host = fx.connect();
    let mut player = fx.connect();

    let snap = room.join(host.conn, true, Some(token(&cred))).await.unwrap();
    assert_eq!(snap.role, Role::Host);
    assert_eq!(snap.online, 1);
    assert_eq!(host.next().await, ServerEvent::State(snap));
    assert_eq!(host.next().await, ServerEvent::Online { count: 1 });

    let snap = room.join(player.conn, false, None).await.unwrap();
    assert_eq!(snap.role, Role::Player);
    assert_eq!(snap.online, 2);
    assert_eq!(player.next().await, ServerEvent::State(snap));
    assert_eq!(player.next().await, ServerEvent::Online { count: 2 });
    assert_eq!(host.next().await, ServerEvent::Online { count: 2 });
}

#[tokio::test]
async fn test_host_join_with_wrong_token_becomes_player() {
    let mut fx = Fixture::new();
    let (room, _cred) = fx.create();
    let client = fx.connect();

    let snap = room
        .join(client.conn, true, Some("not-the-token".into()))
        .await
        .unwrap();
    assert_eq!(snap.role, Role::Player);

    let snap = room.join(client.conn, true, None).await.unwrap();
    assert_eq!(snap.role, Role::Player);
}

#[tokio::test]
async fn test_player_join_with_token_stays_player() {
    let mut fx = Fixture::new();
    let (room, cred) = fx.create();
    let client = fx.connect();

    let snap = room.join(client.conn, false, Some(token(&cred))).await.unwrap();
    assert_eq!(snap.role, Role::Player);
}

#[tokio::test]
async fn test_leave_broadcasts_online_count() {
    let mut fx = Fixture::new();
    let (room, cred) = fx.create();
    let mut host = fx.connect();
    let mut player = fx.connect();
    join_host(&room, &mut host, &cred).await;
    join_player(&room, &mut player).await;
    host.drain();

    assert!(room.leave(player.conn).await.unwrap());
    assert_eq!(host.next().await, ServerEvent::Online { count: 1 });
    assert!(player.drain().is_empty(), "the leaver gets nothing");

    assert!(!room.leave(player.conn).await.unwrap(), "second leave is a no-op");
    assert!(host.drain().is_empty());
}

// =========================================================================
// Full round
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_full_round_advances_level_and_clears_tally() {
    let mut fx = Fixture::new();
    let (room, cred) = fx.create();
    let mut host = fx.connect();
    join_host(&room, &mut host, &cred).await;

    let before = unix_millis();
    room.host_start(token(&cred)).await.expect("start ok");

    let ServerEvent::RoundStarted { level, round_deadline } = host.next().await else {
        panic!("expected round_started");
    };
    assert_eq!(level, 1);
    assert!(round_deadline >= before + 1_000);

    let snap = room.snapshot().await.unwrap();
    assert_eq!(snap.phase, Phase::Voting);
    assert_eq!(snap.round_deadline, Some(round_deadline));

    room.vote(Some("p1"), "A").await.unwrap();
    room.vote(Some("p2"), "A").await.unwrap();
    room.vote(Some("p3"), "A").await.unwrap();
    room.vote(Some("p4"), "B").await.unwrap();
    host.drain();

    assert_eq!(
        host.next().await,
        ServerEvent::RoundEnded {
            winner: Winner::A,
            counts: Counts { a: 3, b: 1 },
        }
    );
    let snap = room.snapshot().await.unwrap();
    assert_eq!(snap.phase, Phase::Reveal);
    assert_eq!(snap.round_deadline, None);
    assert_eq!(snap.counts, Counts { a: 3, b: 1 }, "counts stay visible during reveal");

    assert_eq!(host.next().await, ServerEvent::RoundReset { level: 2 });
    let snap = room.snapshot().await.unwrap();
    assert_eq!(snap.phase, Phase::Idle);
    assert_eq!(snap.level, 2);
    assert_eq!(snap.round_deadline, None);
    assert_eq!(snap.counts, Counts::default());
}

#[tokio::test(start_paused = true)]
async fn test_round_closes_only_after_grace() {
    let mut fx = Fixture::new();
    let (room, cred) = fx.create();
    let mut host = fx.connect();
    join_host(&room, &mut host, &cred).await;

    room.host_start(token(&cred)).await.unwrap();
    host.drain();

    // Past the advertised deadline but inside the grace window.
    tokio::time::sleep(Duration::from_millis(1_020)).await;
    room.vote(Some("late"), "B").await.expect("vote inside grace counts");

    assert_eq!(
        host.drain().last(),
        Some(&ServerEvent::Counts(Counts { a: 0, b: 1 }))
    );
    assert_eq!(
        host.next().await,
        ServerEvent::RoundEnded {
            winner: Winner::B,
            counts: Counts { a: 0, b: 1 },
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_empty_round_is_a_tie() {
    let mut fx = Fixture::new();
    let (room, cred) = fx.create();
    let mut host = fx.connect();
    join_host(&room, &mut host, &cred).await;

    room.host_start(token(&cred)).await.unwrap();
    host.drain();

    assert_eq!(
        host.next().await,
        ServerEvent::RoundEnded {
            winner: Winner::Tie,
            counts: Counts::default(),
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_even_split_is_a_tie() {
    let mut fx = Fixture::new();
    let (room, cred) = fx.create();
    let mut host = fx.connect();
    join_host(&room, &mut host, &cred).await;

    room.host_start(token(&cred)).await.unwrap();
    for (id, choice) in [("p1", "A"), ("p2", "B"), ("p3", "B"), ("p4", "A")] {
        room.vote(Some(id), choice).await.unwrap();
    }
    host.drain();

    let ServerEvent::RoundEnded { winner, counts } = host.next().await else {
        panic!("expected round_ended");
    };
    assert_eq!(winner, Winner::Tie);
    assert_eq!(counts, Counts { a: 2, b: 2 });
}

#[tokio::test(start_paused = true)]
async fn test_consecutive_rounds_increment_level_by_one() {
    let mut fx = Fixture::new();
    let (room, cred) = fx.create();
    let mut host = fx.connect();
    join_host(&room, &mut host, &cred).await;

    for expected_level in 1..=3u32 {
        room.host_start(token(&cred)).await.unwrap();
        assert!(matches!(
            host.next().await,
            ServerEvent::RoundStarted { level, .. } if level == expected_level
        ));
        assert!(matches!(host.next().await, ServerEvent::RoundEnded { .. }));
        assert_eq!(
            host.next().await,
            ServerEvent::RoundReset {
                level: expected_level + 1
            }
        );
    }
}

// =========================================================================
// Voting rules
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_accepted_vote_emits_spawn_then_counts() {
    let mut fx = Fixture::new();
    let (room, cred) = fx.create();
    let mut host = fx.connect();
    join_host(&room, &mut host, &cred).await;
    room.host_start(token(&cred)).await.unwrap();
    host.drain();

    room.vote(Some("p1"), "B").await.unwrap();

    let ServerEvent::Spawn {
        choice,
        x,
        y,
        color_index,
    } = host.next().await
    else {
        panic!("expected spawn");
    };
    assert_eq!(choice, versus_protocol::Choice::B);
    assert!((0.0..1.0).contains(&x));
    assert!((0.0..1.0).contains(&y));
    assert!(color_index < RoomConfig::default().palette_size);
    assert_eq!(host.next().await, ServerEvent::Counts(Counts { a: 0, b: 1 }));
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_vote_is_rejected_and_not_counted() {
    let mut fx = Fixture::new();
    let (room, cred) = fx.create();
    let mut host = fx.connect();
    join_host(&room, &mut host, &cred).await;
    room.host_start(token(&cred)).await.unwrap();
    host.drain();

    room.vote(Some("p1"), "A").await.unwrap();
    let err = room.vote(Some("p1"), "B").await.unwrap_err();
    assert!(matches!(err, RoomError::InvalidVote(_)));
    let err = room.vote(Some("p1"), "A").await.unwrap_err();
    assert!(matches!(err, RoomError::InvalidVote(_)));

    let events = host.drain();
    assert_eq!(events.len(), 2, "one spawn and one counts: {events:?}");
    assert_eq!(room.snapshot().await.unwrap().counts, Counts { a: 1, b: 0 });
}

#[tokio::test(start_paused = true)]
async fn test_malformed_vote_does_not_mark_participant() {
    let mut fx = Fixture::new();
    let (room, cred) = fx.create();
    let mut host = fx.connect();
    join_host(&room, &mut host, &cred).await;
    room.host_start(token(&cred)).await.unwrap();
    host.drain();

    for bad in ["C", "a", "", "AB"] {
        let err = room.vote(Some("p1"), bad).await.unwrap_err();
        assert!(matches!(err, RoomError::InvalidVote(_)), "choice {bad:?}");
    }
    assert!(host.drain().is_empty());

    room.vote(Some("p1"), "A").await.expect("first valid vote counts");
    assert_eq!(room.snapshot().await.unwrap().counts, Counts { a: 1, b: 0 });
}

#[tokio::test(start_paused = true)]
async fn test_vote_without_valid_player_id_is_rejected() {
    let mut fx = Fixture::new();
    let (room, cred) = fx.create();
    room.host_start(token(&cred)).await.unwrap();

    for id in [None, Some(""), Some("   ")] {
        let err = room.vote(id, "A").await.unwrap_err();
        assert!(matches!(err, RoomError::InvalidVote(_)), "player id {id:?}");
    }
    let long = "x".repeat(200);
    assert!(matches!(
        room.vote(Some(long.as_str()), "A").await,
        Err(RoomError::InvalidVote(_))
    ));
    assert_eq!(room.snapshot().await.unwrap().counts, Counts::default());
}

#[tokio::test]
async fn test_vote_while_idle_is_rejected() {
    let mut fx = Fixture::new();
    let (room, _cred) = fx.create();
    let mut player = fx.connect();
    join_player(&room, &mut player).await;

    let err = room.vote(Some("p1"), "A").await.unwrap_err();
    assert!(matches!(
        err,
        RoomError::InvalidPhase {
            phase: Phase::Idle,
            ..
        }
    ));
    assert!(player.drain().is_empty());
    assert_eq!(room.snapshot().await.unwrap().counts, Counts::default());
}

#[tokio::test(start_paused = true)]
async fn test_vote_during_reveal_is_rejected() {
    let mut fx = Fixture::new();
    let (room, cred) = fx.create();
    let mut host = fx.connect();
    join_host(&room, &mut host, &cred).await;
    room.host_start(token(&cred)).await.unwrap();
    room.vote(Some("p1"), "A").await.unwrap();
    host.drain();

    assert!(matches!(host.next().await, ServerEvent::RoundEnded { .. }));

    let err = room.vote(Some("p2"), "B").await.unwrap_err();
    assert!(matches!(
        err,
        RoomError::InvalidPhase {
            phase: Phase::Reveal,
            ..
        }
    ));
    assert_eq!(room.snapshot().await.unwrap().counts, Counts { a: 1, b: 0 });
}

#[tokio::test(start_paused = true)]
async fn test_voter_may_vote_again_next_round() {
    let mut fx = Fixture::new();
    let (room, cred) = fx.create();
    let mut host = fx.connect();
    join_host(&room, &mut host, &cred).await;

    room.host_start(token(&cred)).await.unwrap();
    room.vote(Some("p1"), "A").await.unwrap();
    host.drain();
    assert!(matches!(host.next().await, ServerEvent::RoundEnded { .. }));
    assert!(matches!(host.next().await, ServerEvent::RoundReset { .. }));

    room.host_start(token(&cred)).await.unwrap();
    room.vote(Some("p1"), "B").await.expect("new round, new vote");
    assert_eq!(room.snapshot().await.unwrap().counts, Counts { a: 0, b: 1 });
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_votes_are_counted_once_per_player() {
    const PLAYERS: u32 = 40;
    const ATTEMPTS: u32 = 3;

    let mut fx = Fixture::with_config(RoomConfig {
        voting_duration: Duration::from_secs(60),
        ..test_config()
    });
    let (room, cred) = fx.create();
    let mut host = fx.connect();
    join_host(&room, &mut host, &cred).await;
    room.host_start(token(&cred)).await.expect("start");
    host.drain();

    // Every player votes several times, each attempt from its own task.
    let mut tasks = Vec::new();
    for attempt in 0..ATTEMPTS {
        for player in 0..PLAYERS {
            let room = room.clone();
            let choice = if (player + attempt) % 2 == 0 { "A" } else { "B" };
            tasks.push(tokio::spawn(async move {
                let id = format!("player-{player}");
                room.vote(Some(id.as_str()), choice).await
            }));
        }
    }

    let mut accepted = 0;
    for task in tasks {
        match task.await.expect("vote task") {
            Ok(()) => accepted += 1,
            Err(RoomError::InvalidVote(_)) => {}
            Err(e) => panic!("unexpected rejection: {e}"),
        }
    }
    assert_eq!(accepted, PLAYERS);

    let snap = room.snapshot().await.expect("snapshot");
    assert_eq!(snap.phase, Phase::Voting);
    assert_eq!(snap.counts.total(), PLAYERS);

    let broadcast_counts: Vec<Counts> = host
        .drain()
        .into_iter()
        .filter_map(|event| match event {
            ServerEvent::Counts(counts) => Some(counts),
            _ => None,
        })
        .collect();
    assert_eq!(broadcast_counts.len(), PLAYERS as usize);
    for (i, counts) in broadcast_counts.iter().enumerate() {
        assert_eq!(counts.total(), i as u32 + 1, "counts grow by one per vote");
    }
    assert_eq!(broadcast_counts.last(), Some(&snap.counts));
}

// =========================================================================
// Host commands
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_start_while_voting_is_rejected_without_side_effects() {
    let mut fx = Fixture::new();
    let (room, cred) = fx.create();
    let mut host = fx.connect();
    join_host(&room, &mut host, &cred).await;

    room.host_start(token(&cred)).await.unwrap();
    room.vote(Some("p1"), "A").await.unwrap();
    let before = room.snapshot().await.unwrap();
    host.drain();

    let err = room.host_start(token(&cred)).await.unwrap_err();
    assert!(matches!(
        err,
        RoomError::InvalidPhase {
            phase: Phase::Voting,
            ..
        }
    ));
    assert!(host.drain().is_empty(), "no extra round_started");
    assert_eq!(room.snapshot().await.unwrap(), before);

    // The original deadline still closes the round exactly once.
    assert!(matches!(host.next().await, ServerEvent::RoundEnded { .. }));
    assert!(matches!(host.next().await, ServerEvent::RoundReset { level: 2 }));
}

#[tokio::test]
async fn test_host_commands_with_wrong_token_are_rejected() {
    let mut fx = Fixture::new();
    let (room, _cred) = fx.create();
    let mut player = fx.connect();
    join_player(&room, &mut player).await;

    let err = room.host_start("guess".into()).await.unwrap_err();
    assert!(matches!(err, RoomError::Unauthorized(_)));
    for cue in [HostCue::Secret, HostCue::Trollface, HostCue::Gameover] {
        let err = room.host_cue(cue, "guess".into()).await.unwrap_err();
        assert!(matches!(err, RoomError::Unauthorized(_)), "{cue:?}");
    }
    let err = room.host_start(String::new()).await.unwrap_err();
    assert!(matches!(err, RoomError::Unauthorized(_)));

    assert!(player.drain().is_empty(), "nothing broadcast");
    assert_eq!(room.snapshot().await.unwrap().phase, Phase::Idle);
}

#[tokio::test]
async fn test_host_cues_broadcast_fixed_payloads() {
    let mut fx = Fixture::new();
    let (room, cred) = fx.create();
    let mut player = fx.connect();
    join_player(&room, &mut player).await;

    room.host_cue(HostCue::Secret, token(&cred)).await.unwrap();
    room.host_cue(HostCue::Trollface, token(&cred)).await.unwrap();
    room.host_cue(HostCue::Gameover, token(&cred)).await.unwrap();

    assert_eq!(
        player.drain(),
        vec![
            ServerEvent::SecretScreen {
                text: "KONTROL SENDE MI SANIYORSUN ?".into()
            },
            ServerEvent::TrollfaceScreen { duration_ms: 1_800 },
            ServerEvent::GameoverScreen {
                duration_ms: 2_000,
                text: "OYUN BITTI".into()
            },
        ]
    );
    assert_eq!(room.snapshot().await.unwrap().phase, Phase::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_host_cue_during_voting_keeps_phase() {
    let mut fx = Fixture::new();
    let (room, cred) = fx.create();
    room.host_start(token(&cred)).await.unwrap();
    let before = room.snapshot().await.unwrap();

    room.host_cue(HostCue::Secret, token(&cred)).await.unwrap();
    assert_eq!(room.snapshot().await.unwrap(), before);
}

#[tokio::test]
async fn test_cue_payloads_come_from_config() {
    let mut fx = Fixture::with_config(RoomConfig {
        secret_text: "psst".into(),
        ..test_config()
    });
    let (room, cred) = fx.create();
    let mut player = fx.connect();
    join_player(&room, &mut player).await;

    room.host_cue(HostCue::Secret, token(&cred)).await.unwrap();
    assert_eq!(
        player.next().await,
        ServerEvent::SecretScreen { text: "psst".into() }
    );
}

// =========================================================================
// Snapshots mid-round
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_join_mid_voting_snapshot_matches_room() {
    let mut fx = Fixture::new();
    let (room, cred) = fx.create();
    let mut host = fx.connect();
    join_host(&room, &mut host, &cred).await;

    room.host_start(token(&cred)).await.unwrap();
    room.vote(Some("p1"), "A").await.unwrap();
    room.vote(Some("p2"), "B").await.unwrap();
    room.vote(Some("p3"), "B").await.unwrap();
    let ServerEvent::RoundStarted { round_deadline, .. } = host.next().await else {
        panic!("expected round_started");
    };

    let mut late = fx.connect();
    let snap = room.join(late.conn, false, None).await.unwrap();
    assert_eq!(snap.phase, Phase::Voting);
    assert_eq!(snap.round_deadline, Some(round_deadline));
    assert_eq!(snap.counts, Counts { a: 1, b: 2 });
    assert_eq!(snap.level, 1);
    assert_eq!(snap.online, 2);
    assert_eq!(late.next().await, ServerEvent::State(snap));

    // The late joiner sees the end of the round like everyone else.
    late.drain();
    assert!(matches!(late.next().await, ServerEvent::RoundEnded { .. }));
}

// =========================================================================
// Timer races
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_restart_from_reveal_cancels_pending_reset() {
    let mut fx = Fixture::new();
    let (room, cred) = fx.create();
    let mut host = fx.connect();
    join_host(&room, &mut host, &cred).await;

    room.host_start(token(&cred)).await.unwrap();
    host.drain();
    assert!(matches!(host.next().await, ServerEvent::RoundEnded { .. }));

    // Restart before the reveal window closes.
    room.host_start(token(&cred)).await.expect("restart from reveal");
    assert!(matches!(
        host.next().await,
        ServerEvent::RoundStarted { level: 1, .. }
    ));

    // Well past the old reveal window, but before the new deadline.
    tokio::time::sleep(Duration::from_millis(950)).await;
    assert!(host.drain().is_empty(), "stale reveal timer must not reset");
    let snap = room.snapshot().await.unwrap();
    assert_eq!(snap.phase, Phase::Voting);
    assert_eq!(snap.level, 1);

    assert!(matches!(host.next().await, ServerEvent::RoundEnded { .. }));
    assert_eq!(host.next().await, ServerEvent::RoundReset { level: 2 });
}

#[tokio::test(start_paused = true)]
async fn test_each_round_ends_exactly_once() {
    let mut fx = Fixture::new();
    let (room, cred) = fx.create();
    let mut host = fx.connect();
    join_host(&room, &mut host, &cred).await;

    room.host_start(token(&cred)).await.unwrap();
    // Rejected restarts while voting must not arm extra deadlines.
    for _ in 0..5 {
        assert!(room.host_start(token(&cred)).await.is_err());
    }
    host.drain();

    assert!(matches!(host.next().await, ServerEvent::RoundEnded { .. }));
    assert_eq!(host.next().await, ServerEvent::RoundReset { level: 2 });

    // Long after everything settled, nothing else arrives.
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(host.drain().is_empty());
    assert_eq!(room.snapshot().await.unwrap().phase, Phase::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_rooms_run_independently() {
    let mut fx = Fixture::new();
    let (room_a, cred_a) = fx.create();
    let (room_b, _cred_b) = fx.create();
    let mut watcher_b = fx.connect();
    join_player(&room_b, &mut watcher_b).await;

    room_a.host_start(token(&cred_a)).await.unwrap();
    room_a.vote(Some("p1"), "A").await.unwrap();

    assert!(watcher_b.drain().is_empty());
    assert_eq!(room_b.snapshot().await.unwrap().phase, Phase::Idle);
    assert!(matches!(
        room_b.host_start(token(&cred_a)).await,
        Err(RoomError::Unauthorized(_))
    ));
}

//! Room actor: one Tokio task per room, owning its phase, level, tally,
//! and timers.
//!
//! Client commands and timer expiries arrive on the same bounded queue and
//! are handled one at a time, so no two transitions ever interleave. Every
//! handler validates first and mutates only once all guards pass.
//!
//! ```text
//! IDLE ──host_start──→ VOTING ──deadline + grace──→ REVEAL ──reveal window──→ IDLE
//!   ↑                                                   │
//!   └──────────────── host_start (restart) ─────────────┘
//! ```

use std::sync::Arc;

use rand::Rng;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, trace};
use versus_protocol::{
    Choice, ConnectionId, HostCredential, ParticipantId, Phase, Role, RoomId, ServerEvent,
    Snapshot, unix_millis,
};
use versus_timer::{RoundTimer, TimerFired, TimerKind};

use crate::config::whole_millis;
use crate::{BroadcastGateway, RoomConfig, RoomError, VoteTally};

/// Host-only screens that every device shows on command. They carry fixed
/// payloads from [`RoomConfig`] and never change the room's phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostCue {
    /// The hidden message.
    Secret,
    Trollface,
    Gameover,
}

/// Commands sent to a room actor through its channel.
pub(crate) enum RoomCommand {
    Join {
        conn: ConnectionId,
        wants_host: bool,
        host_token: Option<String>,
        reply: oneshot::Sender<Snapshot>,
    },
    Leave {
        conn: ConnectionId,
        reply: oneshot::Sender<bool>,
    },
    HostStart {
        host_token: String,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    Vote {
        participant: ParticipantId,
        choice: Choice,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    HostCue {
        cue: HostCue,
        host_token: String,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    /// Posted by the room's own timers.
    TimerFired(TimerFired),
    Snapshot {
        reply: oneshot::Sender<Snapshot>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Handle to a running room actor.
///
/// Cheap to clone. The actor stops once every handle is gone or
/// [`shutdown`](Self::shutdown) is called.
#[derive(Clone)]
pub struct RoomHandle {
    room_id: RoomId,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    /// Adds `conn` to the room and returns the snapshot it was sent.
    ///
    /// The host role is granted only when `wants_host` is set and
    /// `host_token` matches. Anything else joins as a player.
    pub async fn join(
        &self,
        conn: ConnectionId,
        wants_host: bool,
        host_token: Option<String>,
    ) -> Result<Snapshot, RoomError> {
        self.request(|reply| RoomCommand::Join {
            conn,
            wants_host,
            host_token,
            reply,
        })
        .await
    }

    /// Removes `conn` from the room. Returns `false` if it was not a member.
    pub async fn leave(&self, conn: ConnectionId) -> Result<bool, RoomError> {
        self.request(|reply| RoomCommand::Leave { conn, reply }).await
    }

    /// Host: starts the next round.
    pub async fn host_start(&self, host_token: String) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::HostStart { host_token, reply })
            .await?
    }

    /// Casts a vote from raw client input.
    ///
    /// The choice and participant id are checked here, before the room
    /// sees the vote, so a malformed vote never marks anyone as voted.
    pub async fn vote(&self, player_id: Option<&str>, choice: &str) -> Result<(), RoomError> {
        let choice = Choice::parse(choice)
            .ok_or_else(|| RoomError::InvalidVote("choice must be \"A\" or \"B\"".to_owned()))?;
        let participant = player_id
            .and_then(ParticipantId::parse)
            .ok_or_else(|| RoomError::InvalidVote("missing or malformed player id".to_owned()))?;
        self.request(|reply| RoomCommand::Vote {
            participant,
            choice,
            reply,
        })
        .await?
    }

    /// Host: shows one of the side-channel screens on every device.
    pub async fn host_cue(&self, cue: HostCue, host_token: String) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::HostCue {
            cue,
            host_token,
            reply,
        })
        .await?
    }

    /// Current room state as a player would see it on join.
    pub async fn snapshot(&self) -> Result<Snapshot, RoomError> {
        self.request(|reply| RoomCommand::Snapshot { reply }).await
    }

    /// Stops the room. Members get `room_closed` and are dropped from the
    /// room before this returns. Pending timers are cancelled.
    pub async fn shutdown(&self) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Shutdown { reply }).await
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> RoomCommand,
    ) -> Result<T, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(command(reply_tx))
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id.clone()))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id.clone()))
    }
}

/// The internal room actor state. Runs inside a Tokio task.
struct RoomActor<G: BroadcastGateway> {
    room_id: RoomId,
    credential: HostCredential,
    config: Arc<RoomConfig>,
    gateway: Arc<G>,
    level: u32,
    phase: Phase,
    /// Unix epoch millis; `Some` only while voting.
    round_deadline: Option<u64>,
    tally: VoteTally,
    timers: RoundTimer<RoomCommand>,
    receiver: mpsc::Receiver<RoomCommand>,
}

impl<G: BroadcastGateway> RoomActor<G> {
    async fn run(mut self) {
        info!(room_id = %self.room_id, "room actor started");

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                RoomCommand::Join {
                    conn,
                    wants_host,
                    host_token,
                    reply,
                } => {
                    let snapshot = self.handle_join(conn, wants_host, host_token.as_deref());
                    let _ = reply.send(snapshot);
                }
                RoomCommand::Leave { conn, reply } => {
                    let _ = reply.send(self.handle_leave(conn));
                }
                RoomCommand::HostStart { host_token, reply } => {
                    let _ = reply.send(self.handle_host_start(&host_token));
                }
                RoomCommand::Vote {
                    participant,
                    choice,
                    reply,
                } => {
                    let _ = reply.send(self.handle_vote(participant, choice));
                }
                RoomCommand::HostCue {
                    cue,
                    host_token,
                    reply,
                } => {
                    let _ = reply.send(self.handle_cue(cue, &host_token));
                }
                RoomCommand::TimerFired(fired) => self.handle_timer(fired),
                RoomCommand::Snapshot { reply } => {
                    let _ = reply.send(self.snapshot(Role::Player));
                }
                RoomCommand::Shutdown { reply } => {
                    info!(room_id = %self.room_id, "room shutting down");
                    self.close();
                    let _ = reply.send(());
                    break;
                }
            }
        }

        self.close();
        info!(room_id = %self.room_id, "room actor stopped");
    }

    /// Cancels timers and releases every member. Safe to call twice.
    fn close(&mut self) {
        self.timers.cancel_all();
        if self.gateway.membership_count(&self.room_id) == 0 {
            return;
        }
        self.broadcast(ServerEvent::RoomClosed {
            room_id: self.room_id.clone(),
        });
        let released = self.gateway.close_room(&self.room_id);
        debug!(room_id = %self.room_id, released, "members released");
    }

    fn handle_join(
        &mut self,
        conn: ConnectionId,
        wants_host: bool,
        host_token: Option<&str>,
    ) -> Snapshot {
        let authorized = host_token.is_some_and(|t| self.credential.matches(t));
        let role = if wants_host && authorized {
            Role::Host
        } else {
            if wants_host {
                debug!(room_id = %self.room_id, %conn, "host join without valid credential, joining as player");
            }
            Role::Player
        };

        self.gateway.join(&self.room_id, conn);
        let snapshot = self.snapshot(role);
        self.gateway.send_to(conn, ServerEvent::State(snapshot.clone()));
        self.broadcast(ServerEvent::Online {
            count: snapshot.online,
        });

        info!(
            room_id = %self.room_id,
            %conn,
            ?role,
            online = snapshot.online,
            "connection joined"
        );
        snapshot
    }

    fn handle_leave(&mut self, conn: ConnectionId) -> bool {
        if !self.gateway.leave(&self.room_id, conn) {
            return false;
        }
        let count = self.gateway.membership_count(&self.room_id);
        self.broadcast(ServerEvent::Online { count });
        info!(room_id = %self.room_id, %conn, online = count, "connection left");
        true
    }

    fn handle_host_start(&mut self, host_token: &str) -> Result<(), RoomError> {
        self.authorize(host_token)?;
        if self.phase == Phase::Voting {
            return Err(RoomError::InvalidPhase {
                action: "start a round",
                phase: self.phase,
            });
        }

        // A restart from REVEAL abandons the pending reveal-to-idle step.
        self.timers.cancel_all();
        self.tally.reset();

        let deadline = unix_millis().saturating_add(self.config.voting_millis());
        self.phase = Phase::Voting;
        self.round_deadline = Some(deadline);
        self.broadcast(ServerEvent::RoundStarted {
            level: self.level,
            round_deadline: deadline,
        });

        self.timers.schedule_after(
            TimerKind::VotingDeadline,
            self.config.voting_duration + self.config.deadline_grace,
            RoomCommand::TimerFired,
        );

        info!(room_id = %self.room_id, level = self.level, deadline, "round started");
        Ok(())
    }

    fn handle_vote(&mut self, participant: ParticipantId, choice: Choice) -> Result<(), RoomError> {
        if self.phase != Phase::Voting {
            return Err(RoomError::InvalidPhase {
                action: "vote",
                phase: self.phase,
            });
        }
        if !self.tally.accept(participant, choice) {
            return Err(RoomError::InvalidVote(
                "already voted this round".to_owned(),
            ));
        }

        let spawn = {
            let mut rng = rand::rng();
            ServerEvent::Spawn {
                choice,
                x: rng.random(),
                y: rng.random(),
                color_index: rng.random_range(0..self.config.palette_size),
            }
        };
        self.broadcast(spawn);

        let counts = self.tally.counts();
        self.broadcast(ServerEvent::Counts(counts));

        trace!(room_id = %self.room_id, %choice, a = counts.a, b = counts.b, "vote accepted");
        Ok(())
    }

    fn handle_cue(&self, cue: HostCue, host_token: &str) -> Result<(), RoomError> {
        self.authorize(host_token)?;
        let event = match cue {
            HostCue::Secret => ServerEvent::SecretScreen {
                text: self.config.secret_text.clone(),
            },
            HostCue::Trollface => ServerEvent::TrollfaceScreen {
                duration_ms: whole_millis(self.config.trollface_duration),
            },
            HostCue::Gameover => ServerEvent::GameoverScreen {
                duration_ms: whole_millis(self.config.gameover_duration),
                text: self.config.gameover_text.clone(),
            },
        };
        self.broadcast(event);
        debug!(room_id = %self.room_id, ?cue, "host cue broadcast");
        Ok(())
    }

    fn handle_timer(&mut self, fired: TimerFired) {
        if !self.timers.fire(&fired) {
            return;
        }
        match fired.kind {
            TimerKind::VotingDeadline => self.end_voting(),
            TimerKind::RevealWindow => self.end_reveal(),
        }
    }

    fn end_voting(&mut self) {
        if self.phase != Phase::Voting {
            debug!(room_id = %self.room_id, phase = %self.phase, "voting deadline outside voting, ignoring");
            return;
        }

        let counts = self.tally.counts();
        let winner = self.tally.winner();
        self.phase = Phase::Reveal;
        self.round_deadline = None;
        self.broadcast(ServerEvent::RoundEnded { winner, counts });

        self.timers.schedule_after(
            TimerKind::RevealWindow,
            self.config.reveal_window,
            RoomCommand::TimerFired,
        );

        info!(
            room_id = %self.room_id,
            level = self.level,
            ?winner,
            a = counts.a,
            b = counts.b,
            "round ended"
        );
    }

    fn end_reveal(&mut self) {
        if self.phase != Phase::Reveal {
            debug!(room_id = %self.room_id, phase = %self.phase, "reveal expiry outside reveal, ignoring");
            return;
        }

        self.level = self.level.saturating_add(1);
        self.phase = Phase::Idle;
        self.round_deadline = None;
        self.tally.reset();
        self.broadcast(ServerEvent::RoundReset { level: self.level });

        info!(room_id = %self.room_id, level = self.level, "room reset for next level");
    }

    fn authorize(&self, host_token: &str) -> Result<(), RoomError> {
        if self.credential.matches(host_token) {
            Ok(())
        } else {
            debug!(room_id = %self.room_id, "host command with wrong credential");
            Err(RoomError::Unauthorized(self.room_id.clone()))
        }
    }

    fn broadcast(&self, event: ServerEvent) {
        self.gateway.broadcast(&self.room_id, &event);
    }

    fn snapshot(&self, role: Role) -> Snapshot {
        Snapshot {
            room_id: self.room_id.clone(),
            role,
            level: self.level,
            phase: self.phase,
            round_deadline: self.round_deadline,
            counts: self.tally.counts(),
            online: self.gateway.membership_count(&self.room_id),
        }
    }
}

/// Spawns a room actor in `IDLE` at level 1 and returns its handle.
pub(crate) fn spawn_room<G: BroadcastGateway>(
    room_id: RoomId,
    credential: HostCredential,
    config: Arc<RoomConfig>,
    gateway: Arc<G>,
) -> RoomHandle {
    let (tx, rx) = mpsc::channel(config.channel_size);

    let actor = RoomActor {
        room_id: room_id.clone(),
        credential,
        timers: RoundTimer::new(&tx),
        config,
        gateway,
        level: 1,
        phase: Phase::Idle,
        round_deadline: None,
        tally: VoteTally::new(),
        receiver: rx,
    };

    tokio::spawn(actor.run());

    RoomHandle {
        room_id,
        sender: tx,
    }
}

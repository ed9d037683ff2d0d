//! Per-connection handler: decode commands, route them to rooms, and relay
//! room events back to the socket.
//!
//! Each accepted connection gets its own Tokio task running this handler,
//! plus a writer task that drains the connection's gateway outbox. Direct
//! replies (`room_created`, `pong`, `rejected`) go through the same outbox
//! so they stay ordered with room broadcasts.
//!
//! The writer also pings the client on a fixed interval. Any inbound frame,
//! pongs included, restarts the read timeout, so devices that only watch
//! the room stay connected.
//!
//! A connection is a member of at most one room. Joining another room
//! leaves the previous one first.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use versus_protocol::{
    ClientCommand, Codec, ConnectionId, RejectCode, ServerEvent, unix_millis,
};
use versus_room::{BroadcastGateway, HostCue, RoomError, RoomHandle};
use versus_transport::{Connection, Inbound, WebSocketConnection};

use crate::VersusError;
use crate::server::ServerState;

/// One connection's view of the server: which room it joined, and how to
/// reach it.
///
/// Dropping the session leaves the room and unregisters the outbox, even
/// if the handler exits early. `Drop` is synchronous, so the async leave
/// runs in a fire-and-forget task.
struct Session<C: Codec> {
    conn_id: ConnectionId,
    state: Arc<ServerState<C>>,
    room: Option<RoomHandle>,
}

impl<C: Codec> Drop for Session<C> {
    fn drop(&mut self) {
        let conn_id = self.conn_id;
        let room = self.room.take();
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            if let Some(room) = room {
                let _ = room.leave(conn_id).await;
            }
            state.gateway.unregister(conn_id);
        });
    }
}

impl<C: Codec> Session<C> {
    /// Sends an event to this connection only.
    fn reply(&self, event: ServerEvent) {
        self.state.gateway.send_to(self.conn_id, event);
    }

    fn reject(&self, code: RejectCode, reason: String) {
        self.reply(ServerEvent::Rejected { code, reason });
    }

    /// Finds a room by the code the client sent. The registry lock is
    /// released before the caller talks to the room.
    async fn lookup(&self, code: &str) -> Result<RoomHandle, RoomError> {
        self.state.registry.lock().await.get_room(code)
    }

    async fn dispatch(&mut self, cmd: ClientCommand) -> Result<(), RoomError> {
        match cmd {
            ClientCommand::CreateRoom => {
                let (room_id, host_token) = self.state.registry.lock().await.create_room();
                tracing::info!(conn_id = %self.conn_id, %room_id, "room created on request");
                self.reply(ServerEvent::RoomCreated {
                    room_id,
                    host_token,
                });
            }

            ClientCommand::Join {
                room_id,
                role,
                host_token,
            } => {
                let room = self.lookup(&room_id).await?;
                if let Some(current) = &self.room {
                    if current.room_id() != room.room_id() {
                        let _ = current.leave(self.conn_id).await;
                        self.room = None;
                    }
                }
                let wants_host = role.as_deref() == Some("host");
                room.join(self.conn_id, wants_host, host_token).await?;
                self.room = Some(room);
            }

            ClientCommand::HostStart {
                room_id,
                host_token,
            } => {
                self.lookup(&room_id).await?.host_start(host_token).await?;
            }

            ClientCommand::Vote {
                room_id,
                player_id,
                choice,
            } => {
                self.lookup(&room_id)
                    .await?
                    .vote(player_id.as_deref(), &choice)
                    .await?;
            }

            ClientCommand::HostSecret {
                room_id,
                host_token,
            } => self.cue(&room_id, HostCue::Secret, host_token).await?,

            ClientCommand::HostTrollface {
                room_id,
                host_token,
            } => self.cue(&room_id, HostCue::Trollface, host_token).await?,

            ClientCommand::HostGameover {
                room_id,
                host_token,
            } => self.cue(&room_id, HostCue::Gameover, host_token).await?,

            ClientCommand::Ping { client_time } => {
                self.reply(ServerEvent::Pong {
                    client_time,
                    server_time: unix_millis(),
                });
            }
        }
        Ok(())
    }

    async fn cue(&self, code: &str, cue: HostCue, host_token: String) -> Result<(), RoomError> {
        self.lookup(code).await?.host_cue(cue, host_token).await
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Codec>(
    conn: WebSocketConnection,
    state: Arc<ServerState<C>>,
) -> Result<(), VersusError> {
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    tracing::info!(%conn_id, peer = ?conn.peer_addr(), "connection accepted");

    let (outbox, events) = mpsc::unbounded_channel();
    state.gateway.register(conn_id, outbox);
    tokio::spawn(write_events(Arc::clone(&conn), events, Arc::clone(&state)));

    let mut session = Session {
        conn_id,
        state: Arc::clone(&state),
        room: None,
    };

    let timed_out = loop {
        let text = match tokio::time::timeout(state.read_timeout, conn.recv()).await {
            Ok(Ok(Some(Inbound::Text(text)))) => text,
            Ok(Ok(Some(Inbound::Heartbeat))) => {
                tracing::trace!(%conn_id, "heartbeat");
                continue;
            }
            Ok(Ok(None)) => {
                tracing::info!(%conn_id, "connection closed cleanly");
                break false;
            }
            Ok(Err(e)) => {
                tracing::debug!(%conn_id, error = %e, "recv error");
                break false;
            }
            Err(_) => {
                tracing::info!(%conn_id, "connection timed out");
                break true;
            }
        };

        let cmd: ClientCommand = match state.codec.decode(&text) {
            Ok(cmd) => cmd,
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "failed to decode command");
                session.reject(RejectCode::ParseError, e.to_string());
                continue;
            }
        };

        if let Err(e) = session.dispatch(cmd).await {
            tracing::debug!(%conn_id, error = %e, "command rejected");
            session.reject(e.code(), e.to_string());
        }
    };

    // Leaves the room and closes the outbox, which ends the writer task.
    drop(session);

    if timed_out {
        conn.close().await?;
    }
    Ok(())
}

/// Drains one connection's outbox into its socket and pings the client
/// between events. Stops when the outbox is closed or a write fails.
async fn write_events<C: Codec>(
    conn: Arc<WebSocketConnection>,
    mut events: mpsc::UnboundedReceiver<ServerEvent>,
    state: Arc<ServerState<C>>,
) {
    let conn_id = conn.id();
    let period = state.heartbeat_interval;
    let mut heartbeat = tokio::time::interval_at(Instant::now() + period, period);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                let frame = match state.codec.encode(&event) {
                    Ok(frame) => frame,
                    Err(e) => {
                        tracing::warn!(%conn_id, error = %e, "failed to encode event");
                        continue;
                    }
                };
                if let Err(e) = conn.send(&frame).await {
                    tracing::debug!(%conn_id, error = %e, "send failed, stopping writer");
                    break;
                }
            }
            _ = heartbeat.tick() => {
                if let Err(e) = conn.ping().await {
                    tracing::debug!(%conn_id, error = %e, "ping failed, stopping writer");
                    break;
                }
            }
        }
    }
}

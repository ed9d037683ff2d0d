//! Broadcast gateway: who is in which room, and how events reach them.
//!
//! Room actors never touch sockets. They hand events to a
//! [`BroadcastGateway`], which fans them out to every connection joined to
//! the room. Delivery is best-effort: a connection whose outbox is gone
//! simply misses the event.

use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock};

use tokio::sync::mpsc;
use versus_protocol::{ConnectionId, RoomId, ServerEvent};

/// Delivers room events to connections and tracks room membership.
///
/// All methods are synchronous and non-blocking so room actors can call
/// them in the middle of a transition.
pub trait BroadcastGateway: Send + Sync + 'static {
    /// Where events for one connection are pushed.
    type Outbox: Send;

    /// Makes a connection reachable through `send_to` and `broadcast`.
    fn register(&self, conn: ConnectionId, outbox: Self::Outbox);

    /// Forgets a connection and drops it from every room.
    fn unregister(&self, conn: ConnectionId);

    /// Adds a connection to a room. Returns `false` if it was already in.
    fn join(&self, room: &RoomId, conn: ConnectionId) -> bool;

    /// Removes a connection from a room. Returns `false` if it was not in.
    fn leave(&self, room: &RoomId, conn: ConnectionId) -> bool;

    /// Sends `event` to every member of `room`. Returns how many outboxes
    /// accepted it.
    fn broadcast(&self, room: &RoomId, event: &ServerEvent) -> usize;

    /// Sends `event` to one connection. Returns `false` if it is gone.
    fn send_to(&self, conn: ConnectionId, event: ServerEvent) -> bool;

    /// Number of connections currently joined to `room`.
    fn membership_count(&self, room: &RoomId) -> usize;

    /// Drops every member of `room`. Returns how many were removed.
    fn close_room(&self, room: &RoomId) -> usize;
}

/// Outbound channel for one connection's events.
pub type EventSender = mpsc::UnboundedSender<ServerEvent>;

#[derive(Default)]
struct Registry {
    outboxes: HashMap<ConnectionId, EventSender>,
    rooms: HashMap<RoomId, HashSet<ConnectionId>>,
}

/// In-process [`BroadcastGateway`] backed by unbounded `mpsc` channels.
///
/// The session layer registers one [`EventSender`] per connection and
/// drains the receiving end into the socket.
#[derive(Default)]
pub struct ChannelGateway {
    inner: RwLock<Registry>,
}

impl ChannelGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered connections, joined to a room or not.
    pub fn connection_count(&self) -> usize {
        self.read(|r| r.outboxes.len())
    }

    fn read<T>(&self, f: impl FnOnce(&Registry) -> T) -> T {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    fn write<T>(&self, f: impl FnOnce(&mut Registry) -> T) -> T {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}

impl BroadcastGateway for ChannelGateway {
    type Outbox = EventSender;

    fn register(&self, conn: ConnectionId, outbox: EventSender) {
        self.write(|r| {
            r.outboxes.insert(conn, outbox);
        });
    }

    fn unregister(&self, conn: ConnectionId) {
        self.write(|r| {
            r.outboxes.remove(&conn);
            r.rooms.retain(|_, members| {
                members.remove(&conn);
                !members.is_empty()
            });
        });
    }

    fn join(&self, room: &RoomId, conn: ConnectionId) -> bool {
        self.write(|r| r.rooms.entry(room.clone()).or_default().insert(conn))
    }

    fn leave(&self, room: &RoomId, conn: ConnectionId) -> bool {
        self.write(|r| {
            let Some(members) = r.rooms.get_mut(room) else {
                return false;
            };
            let removed = members.remove(&conn);
            if members.is_empty() {
                r.rooms.remove(room);
            }
            removed
        })
    }

    fn broadcast(&self, room: &RoomId, event: &ServerEvent) -> usize {
        self.read(|r| {
            let Some(members) = r.rooms.get(room) else {
                return 0;
            };
            members
                .iter()
                .filter_map(|conn| r.outboxes.get(conn))
                .filter(|outbox| outbox.send(event.clone()).is_ok())
                .count()
        })
    }

    fn send_to(&self, conn: ConnectionId, event: ServerEvent) -> bool {
        self.read(|r| {
            r.outboxes
                .get(&conn)
                .is_some_and(|outbox| outbox.send(event).is_ok())
        })
    }

    fn membership_count(&self, room: &RoomId) -> usize {
        self.read(|r| r.rooms.get(room).map_or(0, HashSet::len))
    }

    fn close_room(&self, room: &RoomId) -> usize {
        self.write(|r| r.rooms.remove(room).map_or(0, |members| members.len()))
    }
}

//! Protocol types for Versus' wire format.
//!
//! Every inbound frame is a [`ClientCommand`] and every outbound frame is
//! a [`ServerEvent`]. Both are internally tagged JSON objects:
//!
//! ```text
//! {"type":"vote","roomId":"K7Q2MX","playerId":"a1b2","choice":"A"}
//! {"type":"round_ended","winner":"TIE","counts":{"A":2,"B":2}}
//! ```
//!
//! Field names are camelCase because the clients are browsers.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Current wall-clock time in milliseconds since the Unix epoch.
///
/// Round deadlines are absolute timestamps in this unit so that every
/// device can render the same countdown regardless of when it joined.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Short code identifying one room, e.g. `K7Q2MX`.
///
/// Players type this code on their phones, so it is normalised to
/// uppercase on construction and compared case-insensitively in effect.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    /// Wraps a room code, normalising surrounding whitespace and case.
    pub fn new(code: impl AsRef<str>) -> Self {
        Self(code.as_ref().trim().to_ascii_uppercase())
    }

    /// The code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Secret issued to the host when a room is created.
///
/// Whoever presents it may drive rounds and fire the side-channel screens.
/// `Debug` is redacted so the secret never ends up in logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HostCredential(String);

impl HostCredential {
    /// Wraps an issued secret.
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Exact comparison against a presented secret.
    ///
    /// Runs over the full length regardless of where the first mismatch
    /// is, so response timing does not leak a matching prefix.
    pub fn matches(&self, presented: &str) -> bool {
        let expected = self.0.as_bytes();
        let presented = presented.as_bytes();
        if expected.len() != presented.len() {
            return false;
        }
        expected
            .iter()
            .zip(presented)
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }

    /// The secret itself. Only the room creator should ever see this.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for HostCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HostCredential(***)")
    }
}

/// Caller-supplied identifier used only to deduplicate votes in a round.
///
/// Clients generate one per device and keep it in local storage. The
/// server never trusts it for anything beyond "one vote per id".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    /// Longest identifier accepted, in bytes.
    pub const MAX_LEN: usize = 128;

    /// Validates a raw identifier.
    ///
    /// Returns `None` for empty, whitespace-only, or oversized input.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.trim().is_empty() || raw.len() > Self::MAX_LEN {
            return None;
        }
        Some(Self(raw.to_owned()))
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Game vocabulary
// ---------------------------------------------------------------------------

/// One of the two options a player can vote for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Choice {
    A,
    B,
}

impl Choice {
    /// Parses the wire spelling. Only the exact strings `"A"` and `"B"`
    /// are valid; anything else is a malformed vote.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "A" => Some(Self::A),
            "B" => Some(Self::B),
            _ => None,
        }
    }
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A => f.write_str("A"),
            Self::B => f.write_str("B"),
        }
    }
}

/// Outcome of a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Winner {
    A,
    B,
    Tie,
}

/// Lifecycle phase of a room.
///
/// ```text
/// Idle ──host_start──→ Voting ──deadline──→ Reveal ──reveal window──→ Idle (level + 1)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    /// Between rounds; the host may start the next one.
    Idle,
    /// Accepting votes until the round deadline.
    Voting,
    /// Winner announced; brief pause before the room resets.
    Reveal,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("IDLE"),
            Self::Voting => f.write_str("VOTING"),
            Self::Reveal => f.write_str("REVEAL"),
        }
    }
}

/// Role a connection was granted when it joined a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Host,
    Player,
}

/// Live vote counts for the current round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counts {
    #[serde(rename = "A")]
    pub a: u32,
    #[serde(rename = "B")]
    pub b: u32,
}

impl Counts {
    /// Total accepted votes.
    pub fn total(&self) -> u32 {
        self.a + self.b
    }

    /// Count for one choice.
    pub fn get(&self, choice: Choice) -> u32 {
        match choice {
            Choice::A => self.a,
            Choice::B => self.b,
        }
    }

    /// Strictly more votes wins; equal counts (including 0–0) are a tie.
    pub fn winner(&self) -> Winner {
        match self.a.cmp(&self.b) {
            std::cmp::Ordering::Greater => Winner::A,
            std::cmp::Ordering::Less => Winner::B,
            std::cmp::Ordering::Equal => Winner::Tie,
        }
    }
}

/// Full room state sent to a connection when it joins.
///
/// A client that joins mid-round renders from this alone, without waiting
/// for the next broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub room_id: RoomId,
    pub role: Role,
    pub level: u32,
    pub phase: Phase,
    /// Unix epoch milliseconds; `None` outside of `Voting`.
    pub round_deadline: Option<u64>,
    pub counts: Counts,
    /// Connections currently joined to the room.
    pub online: usize,
}

/// Machine-readable reason attached to a rejection notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectCode {
    RoomNotFound,
    Unauthorized,
    InvalidPhase,
    InvalidVote,
    Unavailable,
    ParseError,
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Commands a client may send.
///
/// Host-only commands carry the host token; the room compares it with the
/// credential issued at creation. Fields that a sloppy client might omit
/// default to empty so the room, not the decoder, decides the outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    /// Create a new room. The reply goes to the caller only.
    CreateRoom,

    /// Join a room as a player, or as host when `role` is `"host"` and the
    /// token matches.
    #[serde(rename_all = "camelCase")]
    Join {
        room_id: String,
        #[serde(default)]
        role: Option<String>,
        #[serde(default)]
        host_token: Option<String>,
    },

    /// Host: start the next round.
    #[serde(rename_all = "camelCase")]
    HostStart {
        room_id: String,
        #[serde(default)]
        host_token: String,
    },

    /// Player: cast this round's single vote.
    #[serde(rename_all = "camelCase")]
    Vote {
        room_id: String,
        #[serde(default)]
        player_id: Option<String>,
        #[serde(default)]
        choice: String,
    },

    /// Host: show the hidden message on every screen.
    #[serde(rename_all = "camelCase")]
    HostSecret {
        room_id: String,
        #[serde(default)]
        host_token: String,
    },

    /// Host: flash the trollface screen.
    #[serde(rename_all = "camelCase")]
    HostTrollface {
        room_id: String,
        #[serde(default)]
        host_token: String,
    },

    /// Host: flash the game-over screen.
    #[serde(rename_all = "camelCase")]
    HostGameover {
        room_id: String,
        #[serde(default)]
        host_token: String,
    },

    /// Keep-alive and clock sync. Answered with [`ServerEvent::Pong`].
    #[serde(rename_all = "camelCase")]
    Ping { client_time: u64 },
}

/// Events the server sends, either to one connection or to a whole room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// To the creator only: the new room's code and host secret.
    #[serde(rename_all = "camelCase")]
    RoomCreated {
        room_id: RoomId,
        host_token: HostCredential,
    },

    /// To the joining connection only.
    State(Snapshot),

    #[serde(rename_all = "camelCase")]
    RoundStarted { level: u32, round_deadline: u64 },

    RoundEnded { winner: Winner, counts: Counts },

    RoundReset { level: u32 },

    /// Live counts after every accepted vote.
    Counts(Counts),

    /// Visual cue for one accepted vote: where to spawn the particle and
    /// which palette colour to use. `x` and `y` are in `[0, 1)`.
    #[serde(rename_all = "camelCase")]
    Spawn {
        choice: Choice,
        x: f64,
        y: f64,
        color_index: u8,
    },

    /// Membership count, broadcast on join and leave.
    Online { count: usize },

    SecretScreen { text: String },

    #[serde(rename_all = "camelCase")]
    TrollfaceScreen { duration_ms: u64 },

    #[serde(rename_all = "camelCase")]
    GameoverScreen { duration_ms: u64, text: String },

    #[serde(rename_all = "camelCase")]
    Pong { client_time: u64, server_time: u64 },

    /// The room was shut down. Members are no longer joined to it.
    #[serde(rename_all = "camelCase")]
    RoomClosed { room_id: RoomId },

    /// To the offending connection only. Never broadcast.
    Rejected { code: RejectCode, reason: String },
}

// =========================================================================
// Tests
// =========================================================================

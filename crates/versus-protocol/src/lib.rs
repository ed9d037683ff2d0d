//! Wire protocol for Versus.
//!
//! This crate defines what clients and the server say to each other:
//!
//! - **Identity types** ([`RoomId`], [`HostCredential`], [`ParticipantId`])
//! - **Game vocabulary** ([`Choice`], [`Winner`], [`Phase`], [`Counts`],
//!   [`Snapshot`])
//! - **Messages** ([`ClientCommand`] inbound, [`ServerEvent`] outbound)
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) turning messages into text
//!   frames and back
//!
//! # Architecture
//!
//! ```text
//! Transport (text frames) → Protocol (ClientCommand) → Room (state machine)
//! Room (ServerEvent) → Gateway → Protocol (encode) → Transport
//! ```
//!
//! The protocol layer knows nothing about rooms or timers; it only knows
//! the shape of every message.

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    Choice, ClientCommand, Counts, HostCredential, ParticipantId, Phase, RejectCode,
    Role, RoomId, ServerEvent, Snapshot, Winner, unix_millis,
};
pub use versus_transport::ConnectionId;

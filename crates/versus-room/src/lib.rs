//! Room lifecycle engine for Versus.
//!
//! Each room runs as an isolated Tokio task (actor model) that owns its
//! phase, level, vote tally, and round timers. Client commands and timer
//! expiries share the room's command queue, so transitions never race.
//!
//! # Key types
//!
//! - [`RoomRegistry`]: creates rooms and looks them up by code
//! - [`RoomHandle`]: send commands to a running room actor
//! - [`BroadcastGateway`]: how room events reach connections
//! - [`VoteTally`]: one round's counts and voter set
//! - [`RoomConfig`]: durations and side-channel payloads

mod config;
mod error;
mod gateway;
mod registry;
mod room;
mod tally;

pub use config::RoomConfig;
pub use error::RoomError;
pub use gateway::{BroadcastGateway, ChannelGateway, EventSender};
pub use registry::RoomRegistry;
pub use room::{HostCue, RoomHandle};
pub use tally::VoteTally;

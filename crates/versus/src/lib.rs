//! # Versus
//!
//! Real-time server for a "vote A or B" party game. One host device drives
//! rounds, every other device votes once per round, and all of them watch
//! the same countdown, live counts, and level.
//!
//! Clients speak JSON over WebSocket. See [`versus_protocol`] for the
//! command and event shapes and [`versus_room`] for the round lifecycle.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use versus::prelude::*;
//!
//! # async fn start() -> Result<(), VersusError> {
//! let server = VersusServer::builder().bind("0.0.0.0:3000").build().await?;
//! server.run().await
//! # }
//! ```

mod error;
mod handler;
mod server;

pub use error::VersusError;
pub use server::{
    DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_READ_TIMEOUT, VersusServer, VersusServerBuilder,
};

/// Convenience re-exports for embedding the server.
pub mod prelude {
    pub use crate::{VersusError, VersusServer, VersusServerBuilder};
    pub use versus_protocol::{
        ClientCommand, Counts, Phase, RejectCode, Role, RoomId, ServerEvent, Winner,
    };
    pub use versus_room::RoomConfig;
}

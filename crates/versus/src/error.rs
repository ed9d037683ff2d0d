//! Unified error type for the Versus server.

use versus_protocol::ProtocolError;
use versus_room::RoomError;
use versus_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// `#[from]` on each variant lets `?` lift sub-crate errors.
#[derive(Debug, thiserror::Error)]
pub enum VersusError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A room-level error (not found, unauthorized, wrong phase).
    #[error(transparent)]
    Room(#[from] RoomError),
}

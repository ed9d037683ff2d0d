//! Error types for the protocol layer.
//!
//! A `ProtocolError` always means a frame could not be turned into a
//! message or back. It never describes game rules: a well-formed vote for
//! a closed round decodes fine and is rejected later by the room.

/// Errors that can occur while encoding or decoding frames.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serializing an outbound event failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// An inbound frame is not valid JSON or does not match any command.
    ///
    /// Typical causes: unknown `"type"` tag, missing `roomId`, a number
    /// where a string was expected.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),
}

//! Codec trait and implementations for text frames.
//!
//! The session gateway does not care how a [`ServerEvent`](crate::ServerEvent)
//! becomes a frame; it holds something that implements [`Codec`]. Browsers
//! speak JSON, so [`JsonCodec`] is the only implementation today.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Converts messages to text frames and back.
///
/// `Send + Sync + 'static` because one codec instance is shared by every
/// connection task for the lifetime of the server.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into one text frame.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if the value cannot be represented.
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError>;

    /// Parses one text frame into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the text is malformed or does
    /// not match the expected type.
    fn decode<T: DeserializeOwned>(&self, text: &str) -> Result<T, ProtocolError>;
}

/// A [`Codec`] backed by `serde_json`.
///
/// ```rust
/// use versus_protocol::{Codec, Counts, JsonCodec, ServerEvent};
///
/// let codec = JsonCodec;
/// let frame = codec.encode(&ServerEvent::Counts(Counts { a: 2, b: 1 })).unwrap();
/// assert_eq!(frame, r#"{"type":"counts","A":2,"B":1}"#);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError> {
        serde_json::to_string(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, text: &str) -> Result<T, ProtocolError> {
        serde_json::from_str(text).map_err(ProtocolError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::{ClientCommand, ServerEvent};

    #[test]
    fn test_decode_rejects_unknown_command_tag() {
        let result: Result<ClientCommand, _> = JsonCodec.decode(r#"{"type":"host_end_round"}"#);
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_decode_rejects_non_json() {
        let result: Result<ClientCommand, _> = JsonCodec.decode("vote A please");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_encode_online_event() {
        let frame = JsonCodec.encode(&ServerEvent::Online { count: 4 }).unwrap();
        assert_eq!(frame, r#"{"type":"online","count":4}"#);
    }

    #[test]
    fn test_decode_error_message_prefix() {
        let err: Result<ClientCommand, _> = JsonCodec.decode("{");
        let msg = err.unwrap_err().to_string();
        assert!(msg.starts_with("decode failed"), "got: {msg}");
    }
}

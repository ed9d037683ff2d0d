//! Error types for the room layer.

use versus_protocol::{Phase, RejectCode, RoomId};

/// Why a room refused a command.
///
/// Every variant leaves the room untouched. The session layer turns the
/// error into a `rejected` notice for the requesting connection only.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The room does not exist.
    #[error("room {0} not found")]
    NotFound(RoomId),

    /// The presented host token does not match the room's credential.
    #[error("host credential rejected for room {0}")]
    Unauthorized(RoomId),

    /// The command is not allowed in the room's current phase.
    #[error("cannot {action} while room is {phase}")]
    InvalidPhase { action: &'static str, phase: Phase },

    /// Malformed choice or participant id, or a second vote this round.
    #[error("vote refused: {0}")]
    InvalidVote(String),

    /// The room's command channel is full or closed.
    #[error("room {0} is unavailable")]
    Unavailable(RoomId),
}

impl RoomError {
    /// The wire code reported to clients for this error.
    pub fn code(&self) -> RejectCode {
        match self {
            Self::NotFound(_) => RejectCode::RoomNotFound,
            Self::Unauthorized(_) => RejectCode::Unauthorized,
            Self::InvalidPhase { .. } => RejectCode::InvalidPhase,
            Self::InvalidVote(_) => RejectCode::InvalidVote,
            Self::Unavailable(_) => RejectCode::Unavailable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_match_variants() {
        let room = RoomId::new("ABCDEF");
        assert_eq!(RoomError::NotFound(room.clone()).code(), RejectCode::RoomNotFound);
        assert_eq!(RoomError::Unauthorized(room.clone()).code(), RejectCode::Unauthorized);
        assert_eq!(
            RoomError::InvalidPhase { action: "vote", phase: Phase::Idle }.code(),
            RejectCode::InvalidPhase
        );
        assert_eq!(RoomError::InvalidVote("dup".into()).code(), RejectCode::InvalidVote);
        assert_eq!(RoomError::Unavailable(room).code(), RejectCode::Unavailable);
    }

    #[test]
    fn test_invalid_phase_message() {
        let err = RoomError::InvalidPhase {
            action: "start a round",
            phase: Phase::Voting,
        };
        assert_eq!(err.to_string(), "cannot start a round while room is VOTING");
    }
}

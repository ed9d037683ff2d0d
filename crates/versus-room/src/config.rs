//! Room configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

// ---------------------------------------------------------------------------
// RoomConfig
// ---------------------------------------------------------------------------

/// Timing and presentation settings shared by every room of a registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomConfig {
    /// How long players may vote. The advertised deadline is
    /// `start + voting_duration`.
    pub voting_duration: Duration,

    /// Extra time the server waits after the advertised deadline before
    /// closing the round, so votes sent in the last frame still count.
    pub deadline_grace: Duration,

    /// How long the winner stays on screen before the room goes back to
    /// idle at the next level.
    pub reveal_window: Duration,

    /// Number of colours clients cycle through for vote particles.
    /// `spawn` events carry a `colorIndex` in `0..palette_size`.
    pub palette_size: u8,

    /// Capacity of each room's command queue.
    pub channel_size: usize,

    /// Text shown by the hidden-message screen.
    pub secret_text: String,

    /// How long the trollface screen stays up.
    pub trollface_duration: Duration,

    /// How long the game-over screen stays up.
    pub gameover_duration: Duration,

    /// Text shown by the game-over screen.
    pub gameover_text: String,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            voting_duration: Duration::from_millis(10_000),
            deadline_grace: Duration::from_millis(50),
            reveal_window: Duration::from_millis(900),
            palette_size: 3,
            channel_size: 64,
            secret_text: "KONTROL SENDE MI SANIYORSUN ?".to_owned(),
            trollface_duration: Duration::from_millis(1_800),
            gameover_duration: Duration::from_millis(2_000),
            gameover_text: "OYUN BITTI".to_owned(),
        }
    }
}

impl RoomConfig {
    /// Shortest voting phase accepted.
    pub const MIN_VOTING_DURATION: Duration = Duration::from_millis(100);

    /// Clamp and fix any out-of-range values so the config is safe to use.
    ///
    /// Called by the registry before spawning rooms. Rules:
    /// - `voting_duration` raised to at least [`Self::MIN_VOTING_DURATION`].
    /// - `palette_size` and `channel_size` raised to at least 1.
    pub fn validated(mut self) -> Self {
        if self.voting_duration < Self::MIN_VOTING_DURATION {
            warn!(
                voting_ms = self.voting_duration.as_millis() as u64,
                min_ms = Self::MIN_VOTING_DURATION.as_millis() as u64,
                "voting_duration below minimum, clamping"
            );
            self.voting_duration = Self::MIN_VOTING_DURATION;
        }
        if self.palette_size == 0 {
            warn!("palette_size of 0 is unusable, using 1");
            self.palette_size = 1;
        }
        if self.channel_size == 0 {
            warn!("channel_size of 0 is unusable, using 1");
            self.channel_size = 1;
        }
        self
    }

    /// Milliseconds between the start of voting and the advertised deadline.
    pub(crate) fn voting_millis(&self) -> u64 {
        whole_millis(self.voting_duration)
    }
}

/// Duration in whole milliseconds, saturating at `u64::MAX`.
pub(crate) fn whole_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_config_default() {
        let config = RoomConfig::default();
        assert_eq!(config.voting_duration, Duration::from_secs(10));
        assert_eq!(config.deadline_grace, Duration::from_millis(50));
        assert_eq!(config.reveal_window, Duration::from_millis(900));
        assert_eq!(config.palette_size, 3);
        assert_eq!(config.gameover_text, "OYUN BITTI");
    }

    #[test]
    fn test_validated_keeps_sane_config() {
        let config = RoomConfig::default();
        assert_eq!(config.clone().validated(), config);
    }

    #[test]
    fn test_validated_clamps_zero_values() {
        let config = RoomConfig {
            voting_duration: Duration::ZERO,
            palette_size: 0,
            channel_size: 0,
            ..RoomConfig::default()
        }
        .validated();
        assert_eq!(config.voting_duration, RoomConfig::MIN_VOTING_DURATION);
        assert_eq!(config.palette_size, 1);
        assert_eq!(config.channel_size, 1);
    }

    #[test]
    fn test_voting_millis() {
        let config = RoomConfig {
            voting_duration: Duration::from_millis(2_500),
            ..RoomConfig::default()
        };
        assert_eq!(config.voting_millis(), 2_500);
    }
}

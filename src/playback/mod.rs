pub mod engine;
mod schedule;

pub use engine::Player;

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Default distance covered by rewind/forward, in milliseconds
pub const DEFAULT_SKIP_MS: u64 = 5000;

/// Default interval between position ticks, in milliseconds
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1000;

/// Playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackState {
    Stopped,
    Playing,
    Paused,
}

/// Lifecycle event published on every transport transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlaybackEvent {
    Play,
    Pause,
    Stop,
    Rewind,
    Forward,
    JumpTo,
}

impl PlaybackEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackEvent::Play => "PLAY",
            PlaybackEvent::Pause => "PAUSE",
            PlaybackEvent::Stop => "STOP",
            PlaybackEvent::Rewind => "REWIND",
            PlaybackEvent::Forward => "FORWARD",
            PlaybackEvent::JumpTo => "JUMP_TO",
        }
    }
}

impl fmt::Display for PlaybackEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Playback configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub skip_ms: u64,          // rewind()/forward() distance
    pub tick_interval_ms: u64, // position channel period
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            skip_ms: DEFAULT_SKIP_MS,
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
        }
    }
}

/// Errors from constructing a player
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("player must be created inside a Tokio runtime: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),
}

/// Errors inside the cue-scheduling task; these end playback, they are never returned
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("cue at {at_ms}ms cannot be scheduled from the current anchor")]
    DeadlineOverflow { at_ms: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names() {
        assert_eq!(PlaybackEvent::JumpTo.to_string(), "JUMP_TO");
        assert_eq!(
            serde_json::to_string(&PlaybackEvent::Forward).unwrap(),
            "\"FORWARD\""
        );
        let parsed: PlaybackEvent = serde_json::from_str("\"REWIND\"").unwrap();
        assert_eq!(parsed, PlaybackEvent::Rewind);
    }

    #[test]
    fn test_config_defaults_fill_missing_fields() {
        let cfg: PlayerConfig = serde_json::from_str(r#"{"skip_ms": 2000}"#).unwrap();
        assert_eq!(cfg.skip_ms, 2000);
        assert_eq!(cfg.tick_interval_ms, DEFAULT_TICK_INTERVAL_MS);
    }
}

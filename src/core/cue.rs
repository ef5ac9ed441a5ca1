use serde::{Deserialize, Serialize};
use std::fmt;

/// A single timestamped display instruction
///
/// Each subtitle block contributes two cues: one showing its text at the
/// start time and one with empty text at the end time to clear the display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cue {
    /// Offset from the start of the track in milliseconds
    pub at_ms: u64,

    /// Text to display; empty clears the display
    pub text: String,
}

impl Cue {
    /// Create a new cue
    pub fn new(at_ms: u64, text: impl Into<String>) -> Self {
        Self {
            at_ms,
            text: text.into(),
        }
    }

    /// Create a cue that clears the display
    pub fn clear(at_ms: u64) -> Self {
        Self::new(at_ms, String::new())
    }

    /// Check if this cue clears the display
    pub fn is_clear(&self) -> bool {
        self.text.is_empty()
    }
}

impl fmt::Display for Cue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:?}", format_timecode(self.at_ms), self.text)
    }
}

/// Format milliseconds as `HH:MM:SS,mmm`
pub fn format_timecode(ms: u64) -> String {
    let hours = ms / 3_600_000;
    let minutes = (ms / 60_000) % 60;
    let seconds = (ms / 1000) % 60;
    let millis = ms % 1000;
    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, seconds, millis)
}

/// Timestamp of the last cue, or 0 for an empty list.
///
/// The list is trusted to be sorted ascending; no scan is done.
pub fn end_time(cues: &[Cue]) -> u64 {
    cues.last().map(|c| c.at_ms).unwrap_or(0)
}

/// Text visible at `position_ms`: the last cue at or before the position
pub fn content_at(cues: &[Cue], position_ms: u64) -> &str {
    let idx = cues.partition_point(|c| c.at_ms <= position_ms);
    match idx {
        0 => "",
        n => &cues[n - 1].text,
    }
}

use crate::core::Cue;
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

/// `start --> end` timecode line, `HH:MM:SS,mmm` (a `.` separator is accepted too)
static TIMECODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(\d+):(\d{1,2}):(\d{1,2})[,.](\d{1,3})\s+-->\s+(\d+):(\d{1,2}):(\d{1,2})[,.](\d{1,3})",
    )
    .expect("timecode pattern is valid")
});

/// Source of cue lists
///
/// Implementations turn raw subtitle text into an ordered cue list. They are
/// pure: empty or unparseable input yields an empty list, never an error.
pub trait CueSource: Send + Sync {
    /// Parse raw subtitle text into cues sorted by timestamp
    fn parse(&self, raw: &str) -> Vec<Cue>;

    /// Short name of the format, for logging
    fn name(&self) -> &str {
        "unknown"
    }
}

/// Parser for the common numbered-block subtitle format
///
/// ```text
/// 1
/// 00:00:01,000 --> 00:00:02,500
/// First line
/// Second line
///
/// 2
/// ...
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct SrtSource;

impl SrtSource {
    pub fn new() -> Self {
        Self
    }
}

impl CueSource for SrtSource {
    fn parse(&self, raw: &str) -> Vec<Cue> {
        parse_srt(raw)
    }

    fn name(&self) -> &str {
        "srt"
    }
}

/// Parse numbered subtitle blocks into (start, text) / (end, "") cue pairs
pub fn parse_srt(raw: &str) -> Vec<Cue> {
    let normalized = raw.trim_start_matches('\u{feff}').replace("\r\n", "\n");
    let mut cues = Vec::new();
    let mut skipped = 0usize;

    for block in split_blocks(&normalized) {
        match parse_block(&block) {
            Some((start, end, text)) => {
                cues.push(Cue::new(start, text));
                cues.push(Cue::clear(end));
            }
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        debug!("Skipped {} malformed subtitle blocks", skipped);
    }
    cues
}

/// Split text into groups of lines separated by blank lines
fn split_blocks(text: &str) -> Vec<Vec<&str>> {
    let mut blocks = Vec::new();
    let mut current = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        blocks.push(current);
    }
    blocks
}

fn parse_block(lines: &[&str]) -> Option<(u64, u64, String)> {
    let (index, rest) = lines.split_first()?;
    if !index.trim().chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let (timing, text) = rest.split_first()?;
    let caps = TIMECODE.captures(timing.trim())?;
    let field = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u64>().ok());

    let start = to_millis(field(1)?, field(2)?, field(3)?, field(4)?)?;
    let end = to_millis(field(5)?, field(6)?, field(7)?, field(8)?)?;

    Some((start, end, text.join("\n")))
}

/// `h*3600000 + m*60000 + s*1000 + ms`, or `None` if it does not fit in a `u64`
pub fn to_millis(hours: u64, minutes: u64, seconds: u64, millis: u64) -> Option<u64> {
    hours
        .checked_mul(3_600_000)?
        .checked_add(minutes.checked_mul(60_000)?)?
        .checked_add(seconds.checked_mul(1000)?)?
        .checked_add(millis)
}

pub mod cue;

pub use cue::{content_at, end_time, format_timecode, Cue};

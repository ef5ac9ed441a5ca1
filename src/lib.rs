//! Timed playback of cue-based subtitle tracks.
//!
//! A [`Player`] loads a track through a [`CueSource`], then publishes the text
//! to display, periodic positions and lifecycle events on three broadcast
//! channels while the transport is driven with play/pause/stop/seek.

pub mod config;
pub mod core;
pub mod input;
pub mod playback;

pub use crate::core::Cue;
pub use config::Settings;
pub use input::{CueSource, SrtSource};
pub use playback::{PlaybackEvent, PlaybackState, Player, PlayerConfig, PlayerError};

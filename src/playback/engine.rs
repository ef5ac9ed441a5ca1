use crate::core::{self, Cue};
use crate::input::{CueSource, SrtSource};
use crate::playback::schedule::Schedule;
use crate::playback::{PlaybackEvent, PlaybackState, PlayerConfig, PlayerError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info};

/// Capacity of each output channel before slow subscribers start lagging
const CHANNEL_CAPACITY: usize = 256;

/// Where the timeline stands
///
/// The playing position is never accumulated: it is always derived from the
/// instant playback (re)started plus the position it started from.
#[derive(Debug, Clone, Copy)]
pub(super) enum Transport {
    Stopped { offset_ms: u64 },
    Paused { offset_ms: u64 },
    Playing { resumed_at: Instant, base_ms: u64 },
}

impl Transport {
    /// Not playing: a non-zero offset is `Paused`, zero is `Stopped`
    fn idle(offset_ms: u64) -> Self {
        if offset_ms > 0 {
            Transport::Paused { offset_ms }
        } else {
            Transport::Stopped { offset_ms }
        }
    }

    fn state(&self) -> PlaybackState {
        match self {
            Transport::Stopped { .. } => PlaybackState::Stopped,
            Transport::Paused { .. } => PlaybackState::Paused,
            Transport::Playing { .. } => PlaybackState::Playing,
        }
    }

    fn is_playing(&self) -> bool {
        matches!(self, Transport::Playing { .. })
    }
}

/// Output channels; every subscriber sees every item
pub(super) struct Channels {
    content: broadcast::Sender<String>,
    position: broadcast::Sender<u64>,
    events: broadcast::Sender<PlaybackEvent>,
}

impl Channels {
    fn new() -> Self {
        Self {
            content: broadcast::channel(CHANNEL_CAPACITY).0,
            position: broadcast::channel(CHANNEL_CAPACITY).0,
            events: broadcast::channel(CHANNEL_CAPACITY).0,
        }
    }
}

/// Engine state shared with the scheduling tasks
pub(super) struct Shared {
    pub(super) me: Weak<Mutex<Shared>>,
    runtime: Handle,
    tick_interval: Duration,
    cues: Arc<[Cue]>,
    end_ms: u64,
    transport: Transport,
    /// Bumped on every cancel; tasks from an older generation publish nothing
    generation: u64,
    schedule: Option<Schedule>,
    current_text: String,
    channels: Channels,
}

pub(super) fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    pub(super) fn generation(&self) -> u64 {
        self.generation
    }

    pub(super) fn position_ms(&self) -> u64 {
        match self.transport {
            Transport::Stopped { offset_ms } | Transport::Paused { offset_ms } => offset_ms,
            Transport::Playing { resumed_at, base_ms } => {
                let elapsed = Instant::now().saturating_duration_since(resumed_at);
                base_ms.saturating_add(u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
            }
        }
    }

    pub(super) fn publish_content(&mut self, text: &str) {
        self.current_text.clear();
        self.current_text.push_str(text);
        // No subscribers is not an error
        let _ = self.channels.content.send(text.to_string());
    }

    pub(super) fn publish_position(&self, position_ms: u64) {
        let _ = self.channels.position.send(position_ms);
    }

    fn emit(&self, event: PlaybackEvent) {
        debug!("Playback event {}", event);
        let _ = self.channels.events.send(event);
    }

    /// Clamp a written offset into `[0, end]`
    fn clamp_offset(&self, target_ms: i64) -> u64 {
        u64::try_from(target_ms).unwrap_or(0).min(self.end_ms)
    }

    /// Publish the text active at the current position and the position itself
    fn republish(&mut self) {
        let position = self.position_ms();
        let text = core::content_at(&self.cues, position).to_string();
        self.publish_content(&text);
        self.publish_position(position);
    }

    fn cancel_schedule(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        if self.schedule.take().is_some() {
            debug!("Cancelled cue schedule");
        }
    }

    fn load(&mut self, cues: Vec<Cue>) {
        if self.transport.is_playing() {
            self.stop();
        } else {
            self.cancel_schedule();
        }
        self.end_ms = core::end_time(&cues);
        self.cues = cues.into();
        self.transport = match self.transport {
            Transport::Stopped { offset_ms } => Transport::Stopped {
                offset_ms: offset_ms.min(self.end_ms),
            },
            Transport::Paused { offset_ms } => Transport::idle(offset_ms.min(self.end_ms)),
            playing => playing,
        };
        info!("Loaded {} cues, end time {}ms", self.cues.len(), self.end_ms);
        self.republish();
    }

    pub(super) fn play(&mut self) {
        if self.transport.is_playing() {
            debug!("Play ignored: already playing");
            return;
        }

        let position = self.position_ms();
        if position >= self.end_ms {
            debug!("Play ignored: position {}ms is at the end ({}ms)", position, self.end_ms);
            return;
        }

        self.cancel_schedule();
        let resumed_at = Instant::now();
        self.transport = Transport::Playing {
            resumed_at,
            base_ms: position,
        };
        self.republish();

        let pending: Vec<Cue> = self
            .cues
            .iter()
            .filter(|cue| cue.at_ms > position)
            .cloned()
            .collect();
        debug!("Scheduling {} cues from {}ms", pending.len(), position);

        self.schedule = Some(Schedule::start(
            &self.runtime,
            self.me.clone(),
            self.generation,
            resumed_at,
            position,
            pending,
            self.tick_interval,
        ));
        self.emit(PlaybackEvent::Play);
    }

    fn pause(&mut self) {
        let offset_ms = self.position_ms().min(self.end_ms);
        self.transport = Transport::idle(offset_ms);
        self.cancel_schedule();
        self.emit(PlaybackEvent::Pause);
    }

    pub(super) fn stop(&mut self) {
        self.cancel_schedule();
        let offset_ms = match self.transport {
            Transport::Stopped { offset_ms } | Transport::Paused { offset_ms } => offset_ms,
            // The stored offset was consumed when playback started
            Transport::Playing { .. } => 0,
        };
        // Explicitly stopped, even when parked at the end
        self.transport = Transport::Stopped { offset_ms };
        self.republish();
        self.emit(PlaybackEvent::Stop);
    }

    fn seek(&mut self, target_ms: i64, event: PlaybackEvent) {
        // A zero target means "no target"; it does not rewind to the start
        if target_ms == 0 {
            debug!("Seek to 0 ignored");
            return;
        }

        let was_playing = self.transport.is_playing();
        let offset_ms = self.clamp_offset(target_ms);
        self.transport = Transport::idle(offset_ms);
        self.cancel_schedule();
        self.emit(event);

        if was_playing && offset_ms < self.end_ms {
            self.play();
        } else if was_playing {
            self.stop();
        } else {
            self.republish();
        }
    }
}

/// Playback engine for a cue-based subtitle track
///
/// Transport calls are synchronous; cue emission and position ticks run as
/// Tokio tasks on the runtime the player was created in. Callers serialize
/// transport calls, typically from a single UI loop.
pub struct Player {
    pub(super) shared: Arc<Mutex<Shared>>,
    source: Box<dyn CueSource>,
    config: PlayerConfig,
}

impl Player {
    /// Create a player that parses numbered subtitle blocks
    pub fn new(config: PlayerConfig) -> Result<Self, PlayerError> {
        Self::with_source(config, Box::new(SrtSource::new()))
    }

    /// Create a player with a custom cue source
    pub fn with_source(
        config: PlayerConfig,
        source: Box<dyn CueSource>,
    ) -> Result<Self, PlayerError> {
        let runtime = Handle::try_current()?;
        let tick_interval = Duration::from_millis(config.tick_interval_ms.max(1));

        let shared = Arc::new_cyclic(|me| {
            Mutex::new(Shared {
                me: me.clone(),
                runtime,
                tick_interval,
                cues: Arc::from(Vec::new()),
                end_ms: 0,
                transport: Transport::Stopped { offset_ms: 0 },
                generation: 0,
                schedule: None,
                current_text: String::new(),
                channels: Channels::new(),
            })
        });

        Ok(Self {
            shared,
            source,
            config,
        })
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        lock(&self.shared)
    }

    /// Get the player configuration
    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    /// Subscribe to displayed text; an empty string clears the display
    pub fn subscribe_content(&self) -> broadcast::Receiver<String> {
        self.lock().channels.content.subscribe()
    }

    /// Subscribe to position updates in milliseconds
    pub fn subscribe_position(&self) -> broadcast::Receiver<u64> {
        self.lock().channels.position.subscribe()
    }

    /// Subscribe to lifecycle events
    pub fn subscribe_events(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.lock().channels.events.subscribe()
    }

    /// Parse raw subtitle text and make it the current track
    pub fn load(&self, raw: &str) {
        let cues = self.source.parse(raw);
        debug!("{} source produced {} cues", self.source.name(), cues.len());
        self.load_cues(cues);
    }

    /// Make an already-parsed cue list the current track
    ///
    /// The list must be sorted by timestamp. A playing track is stopped first.
    pub fn load_cues(&self, cues: Vec<Cue>) {
        self.lock().load(cues);
    }

    /// Start or resume playback; does nothing at the end of the track
    pub fn play(&self) {
        self.lock().play();
    }

    /// Pause playback, freezing the position
    pub fn pause(&self) {
        self.lock().pause();
    }

    /// Stop playback
    pub fn stop(&self) {
        self.lock().stop();
    }

    /// Jump to `target_ms`, emitting `JUMP_TO`
    pub fn seek(&self, target_ms: i64) {
        self.seek_with(target_ms, PlaybackEvent::JumpTo);
    }

    /// Jump to `target_ms`, emitting `event`
    ///
    /// The target is clamped to `[0, end]`. A target of exactly 0 is ignored.
    /// Playback resumes from the new position if it was running, and stops
    /// if the new position is the end of the track.
    pub fn seek_with(&self, target_ms: i64, event: PlaybackEvent) {
        self.lock().seek(target_ms, event);
    }

    /// Jump back by the configured skip distance
    pub fn rewind(&self) {
        self.rewind_by(self.config.skip_ms);
    }

    /// Jump forward by the configured skip distance
    pub fn forward(&self) {
        self.forward_by(self.config.skip_ms);
    }

    /// Jump back by `delta_ms`
    pub fn rewind_by(&self, delta_ms: u64) {
        let mut shared = self.lock();
        let target = to_signed(shared.position_ms()).saturating_sub(to_signed(delta_ms));
        shared.seek(target, PlaybackEvent::Rewind);
    }

    /// Jump forward by `delta_ms`
    pub fn forward_by(&self, delta_ms: u64) {
        let mut shared = self.lock();
        let target = to_signed(shared.position_ms()).saturating_add(to_signed(delta_ms));
        shared.seek(target, PlaybackEvent::Forward);
    }

    /// Get current playback state
    pub fn state(&self) -> PlaybackState {
        self.lock().transport.state()
    }

    /// Check if currently playing
    pub fn is_playing(&self) -> bool {
        self.state() == PlaybackState::Playing
    }

    /// Check if currently paused
    pub fn is_paused(&self) -> bool {
        self.state() == PlaybackState::Paused
    }

    /// Check if the position has reached the end of the track
    pub fn is_at_end(&self) -> bool {
        let shared = self.lock();
        shared.position_ms() >= shared.end_ms
    }

    /// Get current playback position in milliseconds
    pub fn position_ms(&self) -> u64 {
        self.lock().position_ms()
    }

    /// Get the frozen offset; 0 while playing
    pub fn paused_offset_ms(&self) -> u64 {
        match self.lock().transport {
            Transport::Stopped { offset_ms } | Transport::Paused { offset_ms } => offset_ms,
            Transport::Playing { .. } => 0,
        }
    }

    /// Get end time of the track
    pub fn end_time_ms(&self) -> u64 {
        self.lock().end_ms
    }

    /// Get the loaded cues
    pub fn cues(&self) -> Arc<[Cue]> {
        self.lock().cues.clone()
    }

    /// Get the most recently published text
    pub fn current_text(&self) -> String {
        self.lock().current_text.clone()
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.lock().cancel_schedule();
    }
}

fn to_signed(ms: u64) -> i64 {
    i64::try_from(ms).unwrap_or(i64::MAX)
}

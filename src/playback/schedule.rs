use crate::core::Cue;
use crate::playback::engine::{lock, Shared};
use crate::playback::ScheduleError;
use std::sync::{Mutex, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, warn};

/// Running cue emission and position ticking for one play session
///
/// Dropping the schedule aborts both tasks. The engine also bumps its
/// generation before dropping, so a task that already woke up cannot publish.
pub(super) struct Schedule {
    cues: JoinHandle<()>,
    ticks: JoinHandle<()>,
}

impl Schedule {
    pub(super) fn start(
        runtime: &Handle,
        shared: Weak<Mutex<Shared>>,
        generation: u64,
        resumed_at: Instant,
        base_ms: u64,
        pending: Vec<Cue>,
        tick_interval: Duration,
    ) -> Self {
        let cue_shared = shared.clone();
        let cues = runtime.spawn(async move {
            let result = run_cues(&cue_shared, generation, resumed_at, base_ms, pending).await;
            finish(&cue_shared, generation, result);
        });

        let ticks = runtime.spawn(run_ticks(shared, generation, tick_interval));

        Self { cues, ticks }
    }
}

impl Drop for Schedule {
    fn drop(&mut self) {
        self.cues.abort();
        self.ticks.abort();
    }
}

/// Wait for each cue in turn and publish its text
///
/// Every delay is taken from the live clock against the play anchor, so
/// lateness on one cue never pushes back the ones after it.
async fn run_cues(
    shared: &Weak<Mutex<Shared>>,
    generation: u64,
    resumed_at: Instant,
    base_ms: u64,
    pending: Vec<Cue>,
) -> Result<(), ScheduleError> {
    for cue in pending {
        let due = cue_deadline(resumed_at, base_ms, cue.at_ms)?;
        let delay = due.saturating_duration_since(Instant::now());
        time::sleep(delay).await;

        if !publish_cue(shared, generation, &cue.text) {
            return Ok(());
        }
    }
    Ok(())
}

/// Instant at which a cue is due for a session anchored at `resumed_at`
pub(super) fn cue_deadline(
    resumed_at: Instant,
    base_ms: u64,
    at_ms: u64,
) -> Result<Instant, ScheduleError> {
    resumed_at
        .checked_add(Duration::from_millis(at_ms.saturating_sub(base_ms)))
        .ok_or(ScheduleError::DeadlineOverflow { at_ms })
}

/// Returns false once the session is gone or superseded
fn publish_cue(shared: &Weak<Mutex<Shared>>, generation: u64, text: &str) -> bool {
    let Some(shared) = shared.upgrade() else {
        return false;
    };
    let mut state = lock(&shared);
    if state.generation() != generation {
        return false;
    }
    state.publish_content(text);
    true
}

/// End of the cue stream, normal or not, stops playback
pub(super) fn finish(
    shared: &Weak<Mutex<Shared>>,
    generation: u64,
    result: Result<(), ScheduleError>,
) {
    let Some(shared) = shared.upgrade() else {
        return;
    };
    let mut state = lock(&shared);
    if state.generation() != generation {
        return;
    }
    match result {
        Ok(()) => debug!("Cue schedule complete"),
        Err(e) => warn!("Cue schedule failed, stopping: {}", e),
    }
    state.stop();
}

async fn run_ticks(shared: Weak<Mutex<Shared>>, generation: u64, period: Duration) {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if !publish_tick(&shared, generation) {
            break;
        }
    }
}

fn publish_tick(shared: &Weak<Mutex<Shared>>, generation: u64) -> bool {
    let Some(shared) = shared.upgrade() else {
        return false;
    };
    let state = lock(&shared);
    if state.generation() != generation {
        return false;
    }
    state.publish_position(state.position_ms());
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::{PlaybackEvent, PlaybackState, Player, PlayerConfig};

    #[tokio::test(start_paused = true)]
    async fn test_deadline_is_relative_to_base() {
        let now = Instant::now();
        assert_eq!(
            cue_deadline(now, 1500, 3000).unwrap(),
            now + Duration::from_millis(1500)
        );
        // Cues behind the base are due immediately
        assert_eq!(cue_deadline(now, 1500, 1000).unwrap(), now);
    }

    fn assert_elapsed(start: Instant, expected_ms: u64) {
        let elapsed = start.elapsed();
        let expected = Duration::from_millis(expected_ms);
        assert!(
            elapsed >= expected && elapsed < expected + Duration::from_millis(5),
            "expected ~{:?}, got {:?}",
            expected,
            elapsed
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_cue_does_not_delay_the_next() {
        let player = Player::new(PlayerConfig::default()).unwrap();
        player.load_cues(vec![
            Cue::new(1000, "A"),
            Cue::new(2000, "B"),
            Cue::clear(3000),
        ]);
        let mut content = player.subscribe_content();
        let start = Instant::now();

        player.play();
        assert_eq!(content.recv().await.unwrap(), "");

        // The runtime stalls past "A"; it fires 500ms late
        time::advance(Duration::from_millis(1500)).await;
        assert_eq!(content.recv().await.unwrap(), "A");
        assert_elapsed(start, 1500);

        // "B" keeps its anchored time instead of inheriting the 500ms
        assert_eq!(content.recv().await.unwrap(), "B");
        assert_elapsed(start, 2000);

        assert_eq!(content.recv().await.unwrap(), "");
        assert_elapsed(start, 3000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_follow_clock() {
        let player = Player::new(PlayerConfig::default()).unwrap();
        player.load_cues(vec![Cue::new(500, "A"), Cue::clear(10_000)]);
        let mut position = player.subscribe_position();

        player.play();
        assert_eq!(position.recv().await.unwrap(), 0);
        assert_eq!(position.recv().await.unwrap(), 1000);
        assert_eq!(position.recv().await.unwrap(), 2000);
        assert_eq!(position.recv().await.unwrap(), 3000);

        player.pause();
        time::sleep(Duration::from_millis(5000)).await;
        assert!(position.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_schedule_stops_playback() {
        let player = Player::new(PlayerConfig::default()).unwrap();
        player.load_cues(vec![Cue::new(1000, "A"), Cue::clear(60_000)]);
        player.play();
        let mut events = player.subscribe_events();

        let (weak, generation) = {
            let state = lock(&player.shared);
            (state.me.clone(), state.generation())
        };
        finish(&weak, generation, Err(ScheduleError::DeadlineOverflow { at_ms: 1000 }));

        assert_eq!(player.state(), PlaybackState::Stopped);
        assert_eq!(events.try_recv().unwrap(), PlaybackEvent::Stop);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_generation_is_ignored() {
        let player = Player::new(PlayerConfig::default()).unwrap();
        player.load_cues(vec![Cue::new(1000, "A"), Cue::clear(60_000)]);
        player.play();

        let (weak, generation) = {
            let state = lock(&player.shared);
            (state.me.clone(), state.generation())
        };
        assert!(!publish_cue(&weak, generation.wrapping_sub(1), "stale"));
        finish(&weak, generation.wrapping_sub(1), Ok(()));
        assert_eq!(player.state(), PlaybackState::Playing);
    }
}

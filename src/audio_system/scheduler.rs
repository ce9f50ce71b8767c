/// Scheduling primitives for the per-tick driver
///
/// Delays are timers counted down by the tick, never sleeps. When the host
/// stops ticking (paused or preview contexts) a wall-clock ticker converts
/// real elapsed time into fixed-size simulated ticks.
use std::time::{Duration, Instant};

use super::source::EventKey;

/// Interval of simulated ticks
pub const SIMULATED_TICK: Duration = Duration::from_millis(16);

/// Most simulated ticks run by one pump; older backlog is dropped
pub const MAX_CATCH_UP_TICKS: u32 = 8;

/// Where requests are coming from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackContext {
    /// Active gameplay: repeating the active music event is ignored
    #[default]
    Gameplay,

    /// Authoring preview: every music request restarts playback
    Preview,
}

/// An effect dispatch waiting for its delay to elapse
#[derive(Debug, Clone)]
pub struct DelayedDispatch {
    key: EventKey,
    remaining: Duration,
}

impl DelayedDispatch {
    pub fn new(key: EventKey, delay: Duration) -> Self {
        Self {
            key,
            remaining: delay,
        }
    }

    pub fn key(&self) -> &EventKey {
        &self.key
    }

    pub fn remaining(&self) -> Duration {
        self.remaining
    }

    /// Count down by `elapsed`, returning whether the dispatch is due
    pub fn tick(&mut self, elapsed: Duration) -> bool {
        self.remaining = self.remaining.saturating_sub(elapsed);
        self.remaining.is_zero()
    }
}

/// Converts wall-clock time into a whole number of fixed ticks
#[derive(Debug, Clone)]
pub struct WallClockTicker {
    interval: Duration,
    last: Option<Instant>,
    accumulated: Duration,
}

impl Default for WallClockTicker {
    fn default() -> Self {
        Self::new(SIMULATED_TICK)
    }
}

impl WallClockTicker {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.max(Duration::from_millis(1)),
            last: None,
            accumulated: Duration::ZERO,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Number of ticks due at `now`. The first call only starts the clock.
    pub fn due_ticks(&mut self, now: Instant) -> u32 {
        let Some(last) = self.last.replace(now) else {
            return 0;
        };

        self.accumulated += now.saturating_duration_since(last);
        let due = (self.accumulated.as_nanos() / self.interval.as_nanos()) as u64;

        if due > u64::from(MAX_CATCH_UP_TICKS) {
            tracing::debug!("Dropping {} simulated ticks of backlog", due - u64::from(MAX_CATCH_UP_TICKS));
            self.accumulated = Duration::ZERO;
            return MAX_CATCH_UP_TICKS;
        }

        let due = due as u32;
        self.accumulated -= self.interval * due;
        due
    }

    /// Forget the last timestamp, e.g. after the host resumes ticking
    pub fn reset(&mut self) {
        self.last = None;
        self.accumulated = Duration::ZERO;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delayed_dispatch_counts_down() {
        let mut delayed = DelayedDispatch::new(EventKey::from("thud"), Duration::from_millis(50));
        assert!(!delayed.tick(Duration::from_millis(30)));
        assert_eq!(delayed.remaining(), Duration::from_millis(20));
        assert!(delayed.tick(Duration::from_millis(30)));
    }

    #[test]
    fn test_ticker_accumulates_partial_ticks() {
        let start = Instant::now();
        let mut ticker = WallClockTicker::new(Duration::from_millis(16));

        assert_eq!(ticker.due_ticks(start), 0);
        assert_eq!(ticker.due_ticks(start + Duration::from_millis(10)), 0);
        assert_eq!(ticker.due_ticks(start + Duration::from_millis(20)), 1);
        assert_eq!(ticker.due_ticks(start + Duration::from_millis(52)), 2);
    }

    #[test]
    fn test_ticker_caps_backlog() {
        let start = Instant::now();
        let mut ticker = WallClockTicker::default();

        ticker.due_ticks(start);
        assert_eq!(ticker.due_ticks(start + Duration::from_secs(10)), MAX_CATCH_UP_TICKS);
        assert_eq!(ticker.due_ticks(start + Duration::from_secs(10)), 0);
    }

    #[test]
    fn test_default_context_is_gameplay() {
        assert_eq!(PlaybackContext::default(), PlaybackContext::Gameplay);
    }
}

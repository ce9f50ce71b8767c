/// Fade timers
///
/// Per-channel linear volume ramps, advanced by the scheduler tick. At most
/// one fade is in flight per channel; starting another supersedes it.
use std::collections::HashMap;
use std::time::Duration;

use super::channel::ChannelId;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FadeKind {
    /// Ramp from silence up to `target`
    In { target: f32 },

    /// Ramp from `start` down to silence, then stop the channel
    Out { start: f32 },
}

#[derive(Debug, Clone)]
struct FadeTimer {
    kind: FadeKind,
    duration: Duration,
    elapsed: Duration,
}

impl FadeTimer {
    fn progress(&self) -> f32 {
        if self.duration.is_zero() {
            return 1.0;
        }
        (self.elapsed.as_secs_f32() / self.duration.as_secs_f32()).min(1.0)
    }

    fn volume(&self) -> f32 {
        let progress = self.progress();
        match self.kind {
            FadeKind::In { target } if progress >= 1.0 => target,
            FadeKind::In { target } => target * progress,
            FadeKind::Out { .. } if progress >= 1.0 => 0.0,
            FadeKind::Out { start } => start * (1.0 - progress),
        }
    }

    fn is_done(&self) -> bool {
        self.elapsed >= self.duration
    }
}

/// Result of advancing one fade by a tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FadeUpdate {
    pub channel: ChannelId,
    pub volume: f32,
    /// The fade reached its end this tick
    pub finished: bool,
    /// The channel must be stopped (completed fade-out)
    pub stop: bool,
}

#[derive(Debug, Default)]
pub struct FadeTimers {
    timers: HashMap<ChannelId, FadeTimer>,
}

impl FadeTimers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a fade-in; the channel is expected to be at volume 0
    pub fn fade_in(&mut self, channel: ChannelId, target: f32, duration: Duration) {
        self.start(channel, FadeKind::In { target }, duration);
    }

    /// Start a fade-out from the channel's current volume
    pub fn fade_out(&mut self, channel: ChannelId, start: f32, duration: Duration) {
        self.start(channel, FadeKind::Out { start }, duration);
    }

    /// The previous timer is dropped, so its remaining ticks never apply
    fn start(&mut self, channel: ChannelId, kind: FadeKind, duration: Duration) {
        let timer = FadeTimer {
            kind,
            duration,
            elapsed: Duration::ZERO,
        };
        if let Some(previous) = self.timers.insert(channel, timer) {
            tracing::trace!(%channel, superseded = ?previous.kind, "Superseded in-flight fade");
        }
    }

    /// Cancel any fade on the channel, returning whether one was running
    pub fn cancel(&mut self, channel: ChannelId) -> bool {
        self.timers.remove(&channel).is_some()
    }

    pub fn is_fading(&self, channel: ChannelId) -> bool {
        self.timers.contains_key(&channel)
    }

    pub fn kind(&self, channel: ChannelId) -> Option<FadeKind> {
        self.timers.get(&channel).map(|timer| timer.kind)
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    pub fn clear(&mut self) {
        self.timers.clear();
    }

    /// Advance every fade by `elapsed`. Finished fades are removed.
    pub fn advance(&mut self, elapsed: Duration) -> Vec<FadeUpdate> {
        let mut updates = Vec::with_capacity(self.timers.len());

        for (&channel, timer) in self.timers.iter_mut() {
            timer.elapsed = timer.elapsed.saturating_add(elapsed);
            let finished = timer.is_done();
            updates.push(FadeUpdate {
                channel,
                volume: timer.volume(),
                finished,
                stop: finished && matches!(timer.kind, FadeKind::Out { .. }),
            });
        }

        self.timers.retain(|_, timer| !timer.is_done());
        updates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ch(id: u32) -> ChannelId {
        ChannelId::new(id)
    }

    fn only(updates: Vec<FadeUpdate>) -> FadeUpdate {
        assert_eq!(updates.len(), 1);
        updates[0]
    }

    #[test]
    fn test_fade_in_midpoint_and_end() {
        let mut fades = FadeTimers::new();
        fades.fade_in(ch(0), 0.8, Duration::from_secs(2));

        let mid = only(fades.advance(Duration::from_secs(1)));
        assert!(mid.volume >= 0.4 * 0.8 && mid.volume <= 0.6 * 0.8);
        assert!(!mid.finished);

        let end = only(fades.advance(Duration::from_millis(1500)));
        assert_eq!(end.volume, 0.8);
        assert!(end.finished);
        assert!(!end.stop);
        assert!(fades.is_empty());
    }

    #[test]
    fn test_fade_out_stops_channel() {
        let mut fades = FadeTimers::new();
        fades.fade_out(ch(1), 0.5, Duration::from_millis(100));

        let mid = only(fades.advance(Duration::from_millis(50)));
        assert!((mid.volume - 0.25).abs() < 1e-4);
        assert!(!mid.stop);

        let end = only(fades.advance(Duration::from_millis(50)));
        assert_eq!(end.volume, 0.0);
        assert!(end.stop);
    }

    #[test]
    fn test_zero_duration_completes_immediately() {
        let mut fades = FadeTimers::new();
        fades.fade_in(ch(2), 1.0, Duration::ZERO);

        let update = only(fades.advance(Duration::ZERO));
        assert_eq!(update.volume, 1.0);
        assert!(update.finished);
    }

    #[test]
    fn test_new_fade_supersedes_previous() {
        let mut fades = FadeTimers::new();
        fades.fade_in(ch(3), 1.0, Duration::from_secs(1));
        fades.advance(Duration::from_millis(500));
        fades.fade_out(ch(3), 0.3, Duration::from_secs(1));

        assert_eq!(fades.len(), 1);
        assert_eq!(fades.kind(ch(3)), Some(FadeKind::Out { start: 0.3 }));

        // The replacement starts from zero elapsed time
        let update = only(fades.advance(Duration::from_millis(500)));
        assert!((update.volume - 0.15).abs() < 1e-4);
        assert!(!update.finished);
    }

    #[test]
    fn test_cancel() {
        let mut fades = FadeTimers::new();
        fades.fade_in(ch(4), 1.0, Duration::from_secs(1));

        assert!(fades.cancel(ch(4)));
        assert!(!fades.cancel(ch(4)));
        assert!(!fades.is_fading(ch(4)));
        assert!(fades.advance(Duration::from_secs(1)).is_empty());
    }
}

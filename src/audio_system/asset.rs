/// Sound assets
///
/// Immutable per-clip playback parameters shared by every selection group
/// that references the clip.
use std::fmt;
use std::sync::Arc;

use rand::Rng;

use super::source::Category;

/// Lowest and highest pitch a clip may be played at
pub const PITCH_RANGE: (f32, f32) = (-3.0, 3.0);

/// Opaque reference to a clip understood by the channel backend
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClipHandle(Arc<str>);

impl ClipHandle {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClipHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Pitch of a clip, either fixed or rolled once per playback start
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Pitch {
    Fixed(f32),
    Random { lo: f32, hi: f32 },
}

impl Pitch {
    /// Create a fixed pitch, clamped to the playable range
    pub fn fixed(value: f32) -> Self {
        Pitch::Fixed(clamp_pitch(value))
    }

    /// Create a randomized pitch range, clamped and ordered
    pub fn random(lo: f32, hi: f32) -> Self {
        let (lo, hi) = (clamp_pitch(lo), clamp_pitch(hi));
        if lo <= hi {
            Pitch::Random { lo, hi }
        } else {
            Pitch::Random { lo: hi, hi: lo }
        }
    }

    /// Pick the pitch for one playback
    pub fn roll<R: Rng + ?Sized>(&self, rng: &mut R) -> f32 {
        match *self {
            Pitch::Fixed(value) => value,
            Pitch::Random { lo, hi } if lo < hi => rng.gen_range(lo..=hi),
            Pitch::Random { lo, .. } => lo,
        }
    }
}

impl Default for Pitch {
    fn default() -> Self {
        Pitch::Fixed(1.0)
    }
}

fn clamp_pitch(value: f32) -> f32 {
    value.clamp(PITCH_RANGE.0, PITCH_RANGE.1)
}

/// Playback parameters for a single clip
#[derive(Debug, Clone, PartialEq)]
pub struct SoundAsset {
    /// Backend clip reference
    pub clip: ClipHandle,

    /// Category this asset was authored for
    pub category: Category,

    pub pitch: Pitch,

    /// Target volume (0.0-1.0)
    pub volume: f32,

    pub looping: bool,

    /// Wait in the pending queue when the pool is exhausted
    pub queue_on_exhaustion: bool,

    /// Evict the oldest channel of the same event when the pool is exhausted
    pub force_play_on_exhaustion: bool,

    /// Fire-and-forget through the one-shot pool
    pub one_shot: bool,
}

impl SoundAsset {
    /// Create an asset with default parameters
    pub fn new(clip: ClipHandle, category: Category) -> Self {
        Self {
            clip,
            category,
            pitch: Pitch::default(),
            volume: 1.0,
            looping: false,
            queue_on_exhaustion: false,
            force_play_on_exhaustion: false,
            one_shot: false,
        }
    }

    pub fn with_pitch(mut self, pitch: Pitch) -> Self {
        self.pitch = pitch;
        self
    }

    /// Set volume
    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = volume.clamp(0.0, 1.0);
        self
    }

    pub fn with_looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn with_queue_on_exhaustion(mut self, queue: bool) -> Self {
        self.queue_on_exhaustion = queue;
        self
    }

    pub fn with_force_play_on_exhaustion(mut self, force: bool) -> Self {
        self.force_play_on_exhaustion = force;
        self
    }

    /// Mark as one-shot. Ignored for music assets.
    pub fn with_one_shot(mut self, one_shot: bool) -> Self {
        self.one_shot = one_shot && self.category.allows_one_shot();
        self
    }

    /// Whether this asset bypasses the tracked pools
    pub fn is_one_shot(&self) -> bool {
        self.one_shot && self.category.allows_one_shot()
    }
}

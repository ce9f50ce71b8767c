/// Channel backends
///
/// The engine decides *what* plays on which channel; a backend makes it
/// audible. `RodioBackend` renders to the default output device, while
/// `SimulatedBackend` keeps headless state for tests and preview hosts.
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::asset::ClipHandle;
use super::channel::{ChannelId, PlaybackParams};
use crate::error::AudioError;

/// Clip decode/render collaborator, one voice per channel
pub trait ChannelBackend {
    /// Start `clip` on `channel`, replacing whatever it was playing
    fn start(
        &mut self,
        channel: ChannelId,
        clip: &ClipHandle,
        params: &PlaybackParams,
    ) -> Result<(), AudioError>;

    /// Stop the channel. Stopping a silent channel does nothing.
    fn stop(&mut self, channel: ChannelId);

    /// Set the channel volume (0.0-1.0, before bus gain)
    fn set_volume(&mut self, channel: ChannelId, volume: f32);

    /// Whether the channel is still producing sound
    fn is_sounding(&self, channel: ChannelId) -> bool;

    /// Called once per engine tick before finished channels are reclaimed
    fn update(&mut self, _elapsed: Duration) {}
}

#[derive(Debug, Clone)]
struct Voice {
    clip: ClipHandle,
    volume: f32,
    pitch: f32,
    looping: bool,
    /// Time left before a non-looping clip ends; `None` plays until stopped
    remaining: Option<Duration>,
}

#[derive(Debug, Default)]
struct SimState {
    voices: HashMap<ChannelId, Voice>,
    lengths: HashMap<ClipHandle, Duration>,
    failing: HashSet<ClipHandle>,
    started: Vec<(ChannelId, ClipHandle)>,
}

/// Headless backend.
///
/// Clones share state, so a test keeps one clone to inspect and drive
/// playback while the engine owns another.
#[derive(Debug, Clone, Default)]
pub struct SimulatedBackend {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Give a clip a playing length. Clips without one play until stopped
    /// or finished explicitly.
    pub fn set_clip_length(&self, clip: impl AsRef<str>, length: Duration) {
        self.state.lock().lengths.insert(ClipHandle::new(clip), length);
    }

    /// Make every start of `clip` fail
    pub fn fail_clip(&self, clip: impl AsRef<str>) {
        self.state.lock().failing.insert(ClipHandle::new(clip));
    }

    /// End playback on a channel as if its clip ran out
    pub fn finish(&self, channel: ChannelId) {
        self.state.lock().voices.remove(&channel);
    }

    pub fn is_playing(&self, channel: ChannelId) -> bool {
        self.state.lock().voices.contains_key(&channel)
    }

    pub fn volume(&self, channel: ChannelId) -> Option<f32> {
        self.state.lock().voices.get(&channel).map(|v| v.volume)
    }

    pub fn pitch(&self, channel: ChannelId) -> Option<f32> {
        self.state.lock().voices.get(&channel).map(|v| v.pitch)
    }

    pub fn clip(&self, channel: ChannelId) -> Option<ClipHandle> {
        self.state.lock().voices.get(&channel).map(|v| v.clip.clone())
    }

    pub fn is_looping(&self, channel: ChannelId) -> bool {
        self.state
            .lock()
            .voices
            .get(&channel)
            .map(|v| v.looping)
            .unwrap_or(false)
    }

    /// Channels currently producing sound, in id order
    pub fn playing_channels(&self) -> Vec<ChannelId> {
        let mut channels: Vec<ChannelId> = self.state.lock().voices.keys().copied().collect();
        channels.sort();
        channels
    }

    /// Every successful start so far, oldest first
    pub fn started(&self) -> Vec<(ChannelId, ClipHandle)> {
        self.state.lock().started.clone()
    }
}

impl ChannelBackend for SimulatedBackend {
    fn start(
        &mut self,
        channel: ChannelId,
        clip: &ClipHandle,
        params: &PlaybackParams,
    ) -> Result<(), AudioError> {
        let mut state = self.state.lock();
        if state.failing.contains(clip) {
            state.voices.remove(&channel);
            return Err(AudioError::Backend {
                channel,
                message: format!("cannot play {}", clip),
            });
        }

        let remaining = state.lengths.get(clip).copied();
        state.voices.insert(
            channel,
            Voice {
                clip: clip.clone(),
                volume: params.volume,
                pitch: params.pitch,
                looping: params.looping,
                remaining,
            },
        );
        state.started.push((channel, clip.clone()));
        Ok(())
    }

    fn stop(&mut self, channel: ChannelId) {
        self.state.lock().voices.remove(&channel);
    }

    fn set_volume(&mut self, channel: ChannelId, volume: f32) {
        if let Some(voice) = self.state.lock().voices.get_mut(&channel) {
            voice.volume = volume.clamp(0.0, 1.0);
        }
    }

    fn is_sounding(&self, channel: ChannelId) -> bool {
        self.is_playing(channel)
    }

    fn update(&mut self, elapsed: Duration) {
        self.state.lock().voices.retain(|_, voice| {
            if voice.looping {
                return true;
            }
            match voice.remaining.as_mut() {
                Some(remaining) => {
                    *remaining = remaining.saturating_sub(elapsed);
                    !remaining.is_zero()
                }
                None => true,
            }
        });
    }
}

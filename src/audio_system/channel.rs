/// Playback channels
///
/// A channel is one voice able to play a single clip at a time. Channels are
/// allocated once at engine startup and addressed by id everywhere else.
use std::fmt;

use super::asset::ClipHandle;
use super::volume::Bus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(u32);

impl ChannelId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelState {
    #[default]
    Free,
    Active,
}

/// Parameters applied when a clip starts on a channel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackParams {
    pub bus: Bus,
    pub volume: f32,
    /// Rolled once at start, never re-rolled mid-playback
    pub pitch: f32,
    pub looping: bool,
}

#[derive(Debug, Clone)]
pub struct Channel {
    id: ChannelId,
    state: ChannelState,
    clip: Option<ClipHandle>,
    bus: Bus,
    volume: f32,
    pitch: f32,
    looping: bool,
}

impl Channel {
    pub fn new(id: ChannelId, bus: Bus) -> Self {
        Self {
            id,
            state: ChannelState::Free,
            clip: None,
            bus,
            volume: 0.0,
            pitch: 1.0,
            looping: false,
        }
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn clip(&self) -> Option<&ClipHandle> {
        self.clip.as_ref()
    }

    pub fn bus(&self) -> Bus {
        self.bus
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    /// Bind a clip to this channel
    pub fn assign(&mut self, clip: ClipHandle, params: &PlaybackParams) {
        self.state = ChannelState::Active;
        self.clip = Some(clip);
        self.bus = params.bus;
        self.volume = params.volume;
        self.pitch = params.pitch;
        self.looping = params.looping;
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    /// Unbind the clip. The bus is kept.
    pub fn reset(&mut self) {
        self.state = ChannelState::Free;
        self.clip = None;
        self.volume = 0.0;
        self.pitch = 1.0;
        self.looping = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assign_and_reset() {
        let mut channel = Channel::new(ChannelId::new(3), Bus::Effect);
        assert_eq!(channel.state(), ChannelState::Free);

        let params = PlaybackParams {
            bus: Bus::Ambience,
            volume: 0.7,
            pitch: 1.2,
            looping: true,
        };
        channel.assign(ClipHandle::new("wind.ogg"), &params);
        assert_eq!(channel.state(), ChannelState::Active);
        assert_eq!(channel.bus(), Bus::Ambience);
        assert_eq!(channel.pitch(), 1.2);
        assert!(channel.is_looping());

        channel.reset();
        assert_eq!(channel.state(), ChannelState::Free);
        assert!(channel.clip().is_none());
        assert_eq!(channel.bus(), Bus::Ambience);
    }

    #[test]
    fn test_channel_id_display() {
        assert_eq!(ChannelId::new(7).to_string(), "#7");
        assert_eq!(ChannelId::new(7).index(), 7);
    }
}

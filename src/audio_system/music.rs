/// Music slot
///
/// Two permanently owned channels used alternately, so a new track can fade
/// in on one while the previous track fades out on the other without taking
/// capacity from any shared pool.
use std::sync::Arc;

use super::asset::SoundAsset;
use super::channel::ChannelId;
use super::registry::GroupId;
use super::source::EventKey;

/// Music playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MusicState {
    /// No music event is active
    Stopped,

    /// An event owns the active channel
    Playing,
}

#[derive(Debug)]
pub struct MusicSlot {
    channels: [ChannelId; 2],
    /// Index of the channel most recently bound to a track
    last: usize,
    active: Option<usize>,
    active_event: Option<EventKey>,
    active_asset: Option<Arc<SoundAsset>>,
    active_group: Option<GroupId>,
}

impl MusicSlot {
    pub fn new(first: ChannelId, second: ChannelId) -> Self {
        Self {
            channels: [first, second],
            // So the first track lands on `first`
            last: 1,
            active: None,
            active_event: None,
            active_asset: None,
            active_group: None,
        }
    }

    pub fn state(&self) -> MusicState {
        if self.active.is_some() {
            MusicState::Playing
        } else {
            MusicState::Stopped
        }
    }

    pub fn channels(&self) -> [ChannelId; 2] {
        self.channels
    }

    pub fn active_channel(&self) -> Option<ChannelId> {
        self.active.map(|index| self.channels[index])
    }

    /// The channel the next transition will start on
    pub fn idle_channel(&self) -> ChannelId {
        self.channels[(self.last + 1) % 2]
    }

    pub fn active_event(&self) -> Option<&EventKey> {
        self.active_event.as_ref()
    }

    pub fn active_asset(&self) -> Option<&Arc<SoundAsset>> {
        self.active_asset.as_ref()
    }

    pub fn active_group(&self) -> Option<GroupId> {
        self.active_group
    }

    /// Make `channel` the active one for `event`
    pub fn activate(
        &mut self,
        channel: ChannelId,
        event: EventKey,
        asset: Arc<SoundAsset>,
        group: GroupId,
    ) {
        let index = if self.channels[0] == channel { 0 } else { 1 };
        self.last = index;
        self.active = Some(index);
        self.active_event = Some(event);
        self.active_asset = Some(asset);
        self.active_group = Some(group);
    }

    /// Record the next playlist entry on the active channel
    pub fn advance(&mut self, asset: Arc<SoundAsset>) {
        self.active_asset = Some(asset);
    }

    /// Forget the active event; both channels become idle
    pub fn clear(&mut self) {
        self.active = None;
        self.active_event = None;
        self.active_asset = None;
        self.active_group = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_system::{Category, ClipHandle, EventRegistry, SelectionGroup, SelectionPolicy};

    fn asset(name: &str) -> Arc<SoundAsset> {
        Arc::new(SoundAsset::new(ClipHandle::new(name), Category::Music))
    }

    fn group_id() -> GroupId {
        let mut registry = EventRegistry::new();
        registry.add_group(
            SelectionGroup::new("g", vec![asset("a")], SelectionPolicy::Sequential).unwrap(),
        )
    }

    #[test]
    fn test_slot_alternates_channels() {
        let a = ChannelId::new(10);
        let b = ChannelId::new(11);
        let mut slot = MusicSlot::new(a, b);
        let group = group_id();

        assert_eq!(slot.state(), MusicState::Stopped);
        assert_eq!(slot.idle_channel(), a);

        slot.activate(a, EventKey::from("menu"), asset("menu.ogg"), group);
        assert_eq!(slot.active_channel(), Some(a));
        assert_eq!(slot.idle_channel(), b);

        slot.activate(b, EventKey::from("battle"), asset("battle.ogg"), group);
        assert_eq!(slot.active_channel(), Some(b));
        assert_eq!(slot.idle_channel(), a);
        assert_eq!(slot.active_event(), Some(&EventKey::from("battle")));
    }

    #[test]
    fn test_clear_keeps_alternation() {
        let a = ChannelId::new(0);
        let b = ChannelId::new(1);
        let mut slot = MusicSlot::new(a, b);
        let group = group_id();

        slot.activate(a, EventKey::from("menu"), asset("menu.ogg"), group);
        slot.clear();
        assert_eq!(slot.state(), MusicState::Stopped);
        assert!(slot.active_event().is_none());
        assert_eq!(slot.idle_channel(), b);
    }
}

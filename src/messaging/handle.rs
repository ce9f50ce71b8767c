/// Cloneable, thread-safe handle to a running engine
///
/// Play/stop requests are queued as commands and applied on the engine's
/// thread at its next tick. Volume operations go straight to the shared
/// volume controller and take effect immediately.
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use crossbeam_channel::Sender;
use parking_lot::Mutex;

use super::bus::EventBus;
use super::commands::EngineCommand;
use super::events::{AudioEvent, EventKind};
use crate::audio_system::{Bus, EventKey, PlaybackContext, VolumeController};

static GLOBAL: OnceLock<AudioHandle> = OnceLock::new();

#[derive(Clone)]
pub struct AudioHandle {
    commands: Sender<EngineCommand>,
    volume: Arc<Mutex<VolumeController>>,
    events: EventBus,
}

impl AudioHandle {
    pub(crate) fn new(
        commands: Sender<EngineCommand>,
        volume: Arc<Mutex<VolumeController>>,
        events: EventBus,
    ) -> Self {
        Self {
            commands,
            volume,
            events,
        }
    }

    /// Install this handle as the process-wide default.
    ///
    /// Returns `false` if a default was already installed.
    pub fn install_global(self) -> bool {
        GLOBAL.set(self).is_ok()
    }

    /// The process-wide default handle, if one was installed
    pub fn global() -> Option<&'static AudioHandle> {
        GLOBAL.get()
    }

    fn send(&self, command: EngineCommand) {
        tracing::trace!("Queueing command: {}", command.description());
        if self.commands.send(command).is_err() {
            tracing::debug!("Audio engine is gone, dropping command");
        }
    }

    pub fn play_effect(&self, key: impl Into<EventKey>, delay: Option<Duration>) {
        self.send(EngineCommand::PlayEffect {
            key: key.into(),
            delay,
        });
    }

    pub fn play_ambience(&self, key: impl Into<EventKey>, fade_in: bool, duration: Duration) {
        self.send(EngineCommand::PlayAmbience {
            key: key.into(),
            fade_in,
            duration,
        });
    }

    pub fn play_music(&self, key: impl Into<EventKey>) {
        self.send(EngineCommand::PlayMusic { key: key.into() });
    }

    pub fn stop_effect(&self, key: impl Into<EventKey>) {
        self.send(EngineCommand::StopEffect { key: key.into() });
    }

    pub fn stop_ambience(&self, key: Option<EventKey>, fade_out: bool, duration: Duration) {
        self.send(EngineCommand::StopAmbience {
            key,
            fade_out,
            duration,
        });
    }

    pub fn stop_music(&self, fade_out: bool) {
        self.send(EngineCommand::StopMusic { fade_out });
    }

    pub fn skip_music(&self, fade_out: bool) {
        self.send(EngineCommand::SkipMusic { fade_out });
    }

    pub fn stop_all(&self) {
        self.send(EngineCommand::StopAll);
    }

    pub fn set_context(&self, context: PlaybackContext) {
        self.send(EngineCommand::SetContext(context));
    }

    pub fn volume(&self, bus: Bus) -> f32 {
        self.volume.lock().volume(bus)
    }

    pub fn set_volume(&self, bus: Bus, db: f32) {
        self.volume.lock().set_volume(bus, db);
    }

    pub fn extra_gain(&self) -> f32 {
        self.volume.lock().extra_gain()
    }

    pub fn set_extra_gain(&self, db: f32) {
        self.volume.lock().set_extra_gain(db);
    }

    pub fn mute(&self) {
        self.volume.lock().mute();
    }

    pub fn unmute(&self) {
        self.volume.lock().unmute();
    }

    pub fn toggle_mute(&self) {
        self.volume.lock().toggle();
    }

    pub fn is_muted(&self) -> bool {
        self.volume.lock().is_muted()
    }

    /// Subscribe to every engine event. Drop the receiver to unsubscribe.
    pub fn subscribe(&self) -> crossbeam_channel::Receiver<AudioEvent> {
        self.events.subscribe()
    }

    pub fn subscribe_to(&self, kinds: &[EventKind]) -> crossbeam_channel::Receiver<AudioEvent> {
        self.events.subscribe_to(kinds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_system::BusGains;
    use crate::config::VolumeDefaults;
    use crate::persistence::MemoryStore;
    use crossbeam_channel::unbounded;

    fn handle() -> (AudioHandle, crossbeam_channel::Receiver<EngineCommand>, BusGains) {
        let (tx, rx) = unbounded();
        let gains = BusGains::new();
        let events = EventBus::new();
        let volume = VolumeController::load(
            &VolumeDefaults::default(),
            Box::new(gains.clone()),
            Box::new(MemoryStore::new()),
            events.clone(),
        );
        (AudioHandle::new(tx, Arc::new(Mutex::new(volume)), events), rx, gains)
    }

    #[test]
    fn test_requests_become_commands() {
        let (handle, rx, _) = handle();
        handle.play_effect("hit", None);
        handle.stop_music(true);

        assert_eq!(
            rx.try_recv().unwrap(),
            EngineCommand::PlayEffect {
                key: EventKey::from("hit"),
                delay: None
            }
        );
        assert_eq!(rx.try_recv().unwrap(), EngineCommand::StopMusic { fade_out: true });
    }

    #[test]
    fn test_handle_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AudioHandle>();
    }

    #[test]
    fn test_volume_applies_immediately() {
        let (handle, _rx, gains) = handle();
        let worker = handle.clone();

        std::thread::spawn(move || worker.set_volume(Bus::Music, -12.0))
            .join()
            .unwrap();

        assert_eq!(handle.volume(Bus::Music), -12.0);
        assert_eq!(gains.gain(Bus::Music), -12.0);

        handle.toggle_mute();
        assert!(handle.is_muted());
    }

    #[test]
    fn test_mute_reaches_volume_subscribers() {
        let (handle, _rx, _) = handle();
        let volume_events = handle.subscribe_to(&[EventKind::Volume]);
        let music_events = handle.subscribe_to(&[EventKind::Music]);

        handle.mute();
        handle.unmute();

        assert_eq!(volume_events.try_recv().unwrap(), AudioEvent::Muted);
        assert_eq!(volume_events.try_recv().unwrap(), AudioEvent::Unmuted);
        assert!(music_events.try_recv().is_err());
    }

    #[test]
    fn test_send_after_engine_dropped_is_harmless() {
        let (handle, rx, _) = handle();
        drop(rx);
        handle.play_music("title");
    }
}

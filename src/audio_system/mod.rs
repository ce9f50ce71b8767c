/// Audio system module
///
/// Turns "play this sound event" requests into bounded channel playback:
/// - Event keys resolved through a registry of selection groups
/// - Fixed-capacity channel pools with queue / force-play / drop policies
/// - A two-channel music slot for crossfades and sequenced playlists
/// - Per-channel fade timers advanced by the engine tick
/// - Persisted per-bus volume and mute state
///
/// ## Architecture
///
/// ```text
/// AudioEngine
///   ├── EventRegistry ── SelectionGroup ── SoundAsset
///   ├── ChannelPool (effect, FIFO)     ─┐
///   ├── ChannelPool (ambience, LIFO)   ─┤ Channels allocated
///   ├── ChannelPool (one-shot, FIFO)   ─┤ once at startup
///   ├── MusicSlot (2 channels)         ─┘
///   ├── FadeTimers
///   ├── VolumeController ── MixerBus + KeyValueStore
///   └── ChannelBackend (rodio or simulated)
/// ```
///
/// ## Usage
///
/// ```rust,ignore
/// use pooled_audio::audio_system::{AudioEngine, BusGains, RodioBackend};
///
/// let gains = BusGains::new();
/// let backend = RodioBackend::try_new("assets", gains.clone())?;
/// let mut engine = AudioEngine::new(&config, Box::new(backend), Box::new(gains), Box::new(store));
///
/// engine.play_music("title");
/// engine.play_effect("click", None);
///
/// loop {
///     engine.update(frame_time);
/// }
/// ```
pub mod asset;
pub mod backend;
pub mod channel;
pub mod engine;
pub mod fade;
pub mod music;
pub mod pool;
pub mod registry;
pub mod rodio_backend;
pub mod scheduler;
pub mod selection;
pub mod source;
pub mod volume;

// Re-export commonly used types
pub use asset::{ClipHandle, Pitch, SoundAsset, PITCH_RANGE};
pub use backend::{ChannelBackend, SimulatedBackend};
pub use channel::{Channel, ChannelId, ChannelState, PlaybackParams};
pub use engine::AudioEngine;
pub use fade::{FadeKind, FadeTimers, FadeUpdate};
pub use music::{MusicSlot, MusicState};
pub use pool::{ChannelPool, FreeOrder, OneShotExhaustion, PendingRequest, PoolKind};
pub use registry::{EventRegistry, GroupId, MusicBinding, MusicTransition};
pub use rodio_backend::RodioBackend;
pub use scheduler::{DelayedDispatch, PlaybackContext, WallClockTicker, SIMULATED_TICK};
pub use selection::{SelectionGroup, SelectionPolicy};
pub use source::{Category, EventKey};
pub use volume::{db_to_linear, Bus, BusGains, MixerBus, VolumeController, VolumeState};

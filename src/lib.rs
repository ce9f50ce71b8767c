//! Pooled audio playback engine.
//!
//! Event keys in, bounded channel playback out: selection groups, channel
//! pools with queueing and force-play, a crossfading music slot, fade
//! timers and persisted volume state.

pub mod audio_system;
pub mod config;
pub mod error;
pub mod messaging;
pub mod persistence;

pub use audio_system::{AudioEngine, Bus, BusGains, EventKey, PlaybackContext, PoolKind};
pub use config::EngineConfig;
pub use error::{AppResult, AudioError, ConfigError, PersistenceError};
pub use messaging::{AudioEvent, AudioHandle, EventKind};
pub use persistence::{JsonFileStore, KeyValueStore, MemoryStore};

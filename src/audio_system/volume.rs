/// Volume control
///
/// Persisted per-bus gain (dB) and mute state. Every change is applied to the
/// mixer immediately and written to the key-value store; a failing store
/// never blocks the in-memory change.
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::VolumeDefaults;
use crate::messaging::{AudioEvent, EventBus};
use crate::persistence::KeyValueStore;

/// Quietest bus gain; the master bus sits here while muted
pub const FLOOR_DB: f32 = -80.0;
/// Loudest bus gain
pub const CEILING_DB: f32 = 0.0;
/// Range of the extra gain added on top of the master volume
pub const EXTRA_GAIN_RANGE: (f32, f32) = (0.0, 20.0);

/// Persisted keys
pub mod keys {
    pub const MASTER: &str = "MasterVolume";
    pub const CACHED_MASTER: &str = "CachedMasterVolume";
    pub const MUTED: &str = "IsMuted";
    pub const EXTRA_GAIN: &str = "ExtraGain";
    pub const EFFECT: &str = "EffectVolume";
    pub const AMBIENCE: &str = "AmbienceVolume";
    pub const MUSIC: &str = "MusicVolume";
}

/// Mixer buses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bus {
    Master,
    Effect,
    Ambience,
    Music,
}

impl Bus {
    pub const ALL: [Bus; 4] = [Bus::Master, Bus::Effect, Bus::Ambience, Bus::Music];

    fn key(&self) -> &'static str {
        match self {
            Bus::Master => keys::MASTER,
            Bus::Effect => keys::EFFECT,
            Bus::Ambience => keys::AMBIENCE,
            Bus::Music => keys::MUSIC,
        }
    }
}

impl fmt::Display for Bus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bus::Master => write!(f, "master"),
            Bus::Effect => write!(f, "effect"),
            Bus::Ambience => write!(f, "ambience"),
            Bus::Music => write!(f, "music"),
        }
    }
}

/// Convert a bus gain to a linear amplitude factor. The floor is silence.
pub fn db_to_linear(db: f32) -> f32 {
    if db <= FLOOR_DB {
        0.0
    } else {
        10f32.powf(db / 20.0)
    }
}

/// Mixer-bus gain primitive
pub trait MixerBus: Send {
    fn set_gain(&mut self, bus: Bus, db: f32);
}

/// Shared table of applied bus gains.
///
/// Clones share state, so one clone can be handed to the volume controller
/// while another is read by the playback backend or a test.
#[derive(Debug, Clone, Default)]
pub struct BusGains {
    gains: Arc<RwLock<HashMap<Bus, f32>>>,
}

impl BusGains {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last gain applied to `bus` (0 dB if never set)
    pub fn gain(&self, bus: Bus) -> f32 {
        self.gains.read().get(&bus).copied().unwrap_or(CEILING_DB)
    }

    /// Linear factor for a channel on `bus`, including the master bus
    pub fn channel_factor(&self, bus: Bus) -> f32 {
        let gains = self.gains.read();
        let master = gains.get(&Bus::Master).copied().unwrap_or(CEILING_DB);
        let own = match bus {
            Bus::Master => CEILING_DB,
            other => gains.get(&other).copied().unwrap_or(CEILING_DB),
        };
        db_to_linear(master) * db_to_linear(own)
    }
}

impl MixerBus for BusGains {
    fn set_gain(&mut self, bus: Bus, db: f32) {
        self.gains.write().insert(bus, db);
    }
}

/// Current volume scalars
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeState {
    pub master: f32,
    pub effect: f32,
    pub ambience: f32,
    pub music: f32,
    pub extra_gain: f32,
    pub muted: bool,
    /// Master volume to restore on unmute
    pub cached_master: f32,
}

impl VolumeState {
    fn from_defaults(defaults: &VolumeDefaults) -> Self {
        let master = clamp_bus(defaults.master);
        Self {
            master,
            effect: clamp_bus(defaults.effect),
            ambience: clamp_bus(defaults.ambience),
            music: clamp_bus(defaults.music),
            extra_gain: clamp_extra(defaults.extra_gain),
            muted: false,
            cached_master: master,
        }
    }

    fn get(&self, bus: Bus) -> f32 {
        match bus {
            Bus::Master => self.master,
            Bus::Effect => self.effect,
            Bus::Ambience => self.ambience,
            Bus::Music => self.music,
        }
    }

    fn slot(&mut self, bus: Bus) -> &mut f32 {
        match bus {
            Bus::Master => &mut self.master,
            Bus::Effect => &mut self.effect,
            Bus::Ambience => &mut self.ambience,
            Bus::Music => &mut self.music,
        }
    }
}

fn clamp_bus(db: f32) -> f32 {
    db.clamp(FLOOR_DB, CEILING_DB)
}

fn clamp_extra(db: f32) -> f32 {
    db.clamp(EXTRA_GAIN_RANGE.0, EXTRA_GAIN_RANGE.1)
}

pub struct VolumeController {
    state: VolumeState,
    mixer: Box<dyn MixerBus>,
    store: Box<dyn KeyValueStore>,
    events: EventBus,
    save_failure_logged: bool,
}

impl VolumeController {
    /// Load persisted state (falling back to `defaults`) and apply every bus
    pub fn load(
        defaults: &VolumeDefaults,
        mixer: Box<dyn MixerBus>,
        store: Box<dyn KeyValueStore>,
        events: EventBus,
    ) -> Self {
        let mut state = VolumeState::from_defaults(defaults);

        for bus in Bus::ALL {
            if let Some(db) = store.get_f32(bus.key()) {
                *state.slot(bus) = clamp_bus(db);
            }
        }
        state.cached_master = store
            .get_f32(keys::CACHED_MASTER)
            .map(clamp_bus)
            .unwrap_or(state.master);
        if let Some(extra) = store.get_f32(keys::EXTRA_GAIN) {
            state.extra_gain = clamp_extra(extra);
        }
        state.muted = store.get_i32(keys::MUTED).unwrap_or(0) != 0;

        tracing::debug!(?state, "Loaded volume state");

        let mut controller = Self {
            state,
            mixer,
            store,
            events,
            save_failure_logged: false,
        };
        controller.apply_all();
        controller
    }

    pub fn state(&self) -> VolumeState {
        self.state
    }

    pub fn store(&self) -> &dyn KeyValueStore {
        self.store.as_ref()
    }

    /// Stored volume of a bus in dB
    pub fn volume(&self, bus: Bus) -> f32 {
        self.state.get(bus)
    }

    /// Set a bus volume, clamped to [-80, 0] dB
    pub fn set_volume(&mut self, bus: Bus, db: f32) {
        let db = clamp_bus(db);
        *self.state.slot(bus) = db;
        self.store.set_f32(bus.key(), db);

        if bus == Bus::Master {
            self.state.cached_master = db;
            self.store.set_f32(keys::CACHED_MASTER, db);
            self.apply_master();
        } else {
            self.mixer.set_gain(bus, db);
        }
        self.persist();
    }

    pub fn extra_gain(&self) -> f32 {
        self.state.extra_gain
    }

    /// Set the extra gain added to the master bus, clamped to [0, 20] dB
    pub fn set_extra_gain(&mut self, db: f32) {
        self.state.extra_gain = clamp_extra(db);
        self.store.set_f32(keys::EXTRA_GAIN, self.state.extra_gain);
        self.apply_master();
        self.persist();
    }

    pub fn is_muted(&self) -> bool {
        self.state.muted
    }

    /// Force the master bus to the floor. Only the flag is persisted.
    pub fn mute(&mut self) {
        let changed = !self.state.muted;
        self.state.muted = true;
        self.mixer.set_gain(Bus::Master, FLOOR_DB);
        self.store.set_i32(keys::MUTED, 1);
        self.persist();

        if changed {
            tracing::info!("Audio muted");
            self.events.publish(AudioEvent::Muted);
        }
    }

    /// Restore the master bus from the cached master volume plus extra gain
    pub fn unmute(&mut self) {
        let changed = self.state.muted;
        self.state.muted = false;
        self.apply_master();
        self.store.set_i32(keys::MUTED, 0);
        self.persist();

        if changed {
            tracing::info!("Audio unmuted");
            self.events.publish(AudioEvent::Unmuted);
        }
    }

    pub fn toggle(&mut self) {
        if self.state.muted {
            self.unmute();
        } else {
            self.mute();
        }
    }

    /// Write every scalar to the store and flush it
    pub fn persist_all(&mut self) {
        for bus in Bus::ALL {
            self.store.set_f32(bus.key(), self.state.get(bus));
        }
        self.store.set_f32(keys::CACHED_MASTER, self.state.cached_master);
        self.store.set_f32(keys::EXTRA_GAIN, self.state.extra_gain);
        self.store.set_i32(keys::MUTED, i32::from(self.state.muted));
        self.persist();
    }

    fn apply_all(&mut self) {
        for bus in [Bus::Effect, Bus::Ambience, Bus::Music] {
            self.mixer.set_gain(bus, self.state.get(bus));
        }
        self.apply_master();
    }

    fn apply_master(&mut self) {
        let db = if self.state.muted {
            FLOOR_DB
        } else {
            self.state.cached_master + self.state.extra_gain
        };
        self.mixer.set_gain(Bus::Master, db);
    }

    fn persist(&mut self) {
        if let Err(e) = self.store.save() {
            if self.save_failure_logged {
                tracing::debug!("Volume settings still not persisted: {}", e);
            } else {
                tracing::warn!("Failed to persist volume settings, keeping them in memory: {}", e);
                self.save_failure_logged = true;
            }
        }
    }
}

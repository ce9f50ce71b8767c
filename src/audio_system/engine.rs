/// Audio engine
///
/// Owns every channel, pool and timer, and is driven by the host once per
/// tick through [`AudioEngine::update`]. All pool mutation happens on the
/// thread that owns the engine; other threads go through an [`AudioHandle`].
///
/// ## Tick order
///
/// ```text
/// update(elapsed)
///   ├── drain queued commands
///   ├── backend.update
///   ├── reclaim channels that stopped sounding
///   ├── service pending queues (effect, ambience)
///   ├── continue the music playlist
///   ├── advance fades
///   └── fire due delayed dispatches
/// ```
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::asset::SoundAsset;
use super::backend::ChannelBackend;
use super::channel::{Channel, ChannelId, PlaybackParams};
use super::fade::FadeTimers;
use super::music::{MusicSlot, MusicState};
use super::pool::{ChannelPool, OneShotExhaustion, PendingRequest, PoolKind};
use super::registry::{EventRegistry, GroupId, MusicTransition};
use super::scheduler::{DelayedDispatch, PlaybackContext, WallClockTicker};
use super::source::{Category, EventKey};
use super::volume::{Bus, MixerBus, VolumeController};
use crate::config::EngineConfig;
use crate::error::AudioError;
use crate::messaging::{AudioEvent, AudioHandle, EngineCommand, EventBus};
use crate::persistence::KeyValueStore;

/// Which structure a channel permanently belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChannelOwner {
    Pool(PoolKind),
    Music,
}

#[derive(Debug, Clone, Copy)]
struct EngineSettings {
    one_shot_exhaustion: OneShotExhaustion,
    individual_file_looping: bool,
    force_play_fade: Duration,
}

pub struct AudioEngine {
    registry: EventRegistry,
    channels: Vec<Channel>,
    owners: Vec<ChannelOwner>,
    effect_pool: ChannelPool,
    ambience_pool: ChannelPool,
    one_shot_pool: ChannelPool,
    music: MusicSlot,
    fades: FadeTimers,
    delayed: Vec<DelayedDispatch>,
    backend: Box<dyn ChannelBackend>,
    volume: Arc<Mutex<VolumeController>>,
    events: EventBus,
    command_tx: Sender<EngineCommand>,
    command_rx: Receiver<EngineCommand>,
    context: PlaybackContext,
    settings: EngineSettings,
    ticker: WallClockTicker,
    rng: StdRng,
}

impl AudioEngine {
    /// Build the engine and allocate every channel it will ever use
    pub fn new(
        config: &EngineConfig,
        backend: Box<dyn ChannelBackend>,
        mixer: Box<dyn MixerBus>,
        store: Box<dyn KeyValueStore>,
    ) -> Self {
        Self::with_rng(config, backend, mixer, store, StdRng::from_entropy())
    }

    /// Like [`AudioEngine::new`] with reproducible selection and pitch rolls
    pub fn with_seed(
        config: &EngineConfig,
        backend: Box<dyn ChannelBackend>,
        mixer: Box<dyn MixerBus>,
        store: Box<dyn KeyValueStore>,
        seed: u64,
    ) -> Self {
        Self::with_rng(config, backend, mixer, store, StdRng::seed_from_u64(seed))
    }

    fn with_rng(
        config: &EngineConfig,
        backend: Box<dyn ChannelBackend>,
        mixer: Box<dyn MixerBus>,
        store: Box<dyn KeyValueStore>,
        rng: StdRng,
    ) -> Self {
        for warning in config.validate() {
            tracing::warn!("Audio config: {}", warning);
        }

        let mut channels = Vec::new();
        let mut owners = Vec::new();
        let mut allocate = |count: usize, bus: Bus, owner: ChannelOwner| -> Vec<ChannelId> {
            (0..count.max(1))
                .map(|_| {
                    let id = ChannelId::new(channels.len() as u32);
                    channels.push(Channel::new(id, bus));
                    owners.push(owner);
                    id
                })
                .collect()
        };

        let effect = allocate(config.pools.effect, Bus::Effect, ChannelOwner::Pool(PoolKind::Effect));
        let ambience = allocate(
            config.pools.ambience,
            Bus::Ambience,
            ChannelOwner::Pool(PoolKind::Ambience),
        );
        let one_shot = allocate(
            config.pools.one_shot,
            Bus::Effect,
            ChannelOwner::Pool(PoolKind::OneShot),
        );
        let music = allocate(2, Bus::Music, ChannelOwner::Music);

        let events = EventBus::new();
        let volume = VolumeController::load(&config.volumes, mixer, store, events.clone());
        let (command_tx, command_rx) = unbounded();

        let registry = EventRegistry::from_config(config);

        tracing::info!(
            effect = effect.len(),
            ambience = ambience.len(),
            one_shot = one_shot.len(),
            groups = registry.group_count(),
            "Audio engine initialized"
        );

        Self {
            registry,
            channels,
            owners,
            effect_pool: ChannelPool::new(PoolKind::Effect, effect),
            ambience_pool: ChannelPool::new(PoolKind::Ambience, ambience),
            one_shot_pool: ChannelPool::new(PoolKind::OneShot, one_shot),
            music: MusicSlot::new(music[0], music[1]),
            fades: FadeTimers::new(),
            delayed: Vec::new(),
            backend,
            volume: Arc::new(Mutex::new(volume)),
            events,
            command_tx,
            command_rx,
            context: PlaybackContext::default(),
            settings: EngineSettings {
                one_shot_exhaustion: config.one_shot_exhaustion,
                individual_file_looping: config.individual_file_looping,
                force_play_fade: Duration::try_from_secs_f32(config.force_play_fade_secs.max(0.0))
                    .unwrap_or_default(),
            },
            ticker: WallClockTicker::default(),
            rng,
        }
    }

    /// Cloneable handle for other threads
    pub fn handle(&self) -> AudioHandle {
        AudioHandle::new(
            self.command_tx.clone(),
            Arc::clone(&self.volume),
            self.events.clone(),
        )
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn registry(&self) -> &EventRegistry {
        &self.registry
    }

    pub fn context(&self) -> PlaybackContext {
        self.context
    }

    pub fn set_context(&mut self, context: PlaybackContext) {
        if self.context != context {
            tracing::debug!(?context, "Playback context changed");
            self.context = context;
        }
    }

    // ---------------------------------------------------------------------
    // Play / stop
    // ---------------------------------------------------------------------

    /// Play every group bound to an effect event. A non-zero delay defers
    /// the whole dispatch by that many ticks' worth of time.
    pub fn play_effect(&mut self, key: impl Into<EventKey>, delay: Option<Duration>) {
        let key = key.into();
        match delay {
            Some(delay) if !delay.is_zero() => {
                tracing::debug!(event = %key, ?delay, "Deferring effect");
                self.delayed.push(DelayedDispatch::new(key, delay));
            }
            _ => self.dispatch(Category::Effect, &key, None),
        }
    }

    /// Play an ambience event, optionally ramping up from silence
    pub fn play_ambience(&mut self, key: impl Into<EventKey>, fade_in: bool, duration: Duration) {
        let key = key.into();
        self.dispatch(Category::Ambience, &key, fade_in.then_some(duration));
    }

    /// Switch the music slot to `key`
    pub fn play_music(&mut self, key: impl Into<EventKey>) {
        let key = key.into();
        if let Err(e) = self.try_play_music(&key) {
            tracing::warn!(event = %key, "Music request dropped: {}", e);
        }
    }

    /// Stop every effect channel bound to `key`
    pub fn stop_effect(&mut self, key: impl Into<EventKey>) {
        let key = key.into();
        let channels = self.effect_pool.channels_for(&key).to_vec();
        if channels.is_empty() {
            return;
        }

        tracing::debug!(event = %key, count = channels.len(), "Stopping effect");
        for channel in channels {
            self.release_channel(PoolKind::Effect, channel);
        }
    }

    /// Stop one ambience event, or all ambience when `key` is `None`
    pub fn stop_ambience(&mut self, key: Option<EventKey>, fade_out: bool, duration: Duration) {
        let channels = match &key {
            Some(key) => self.ambience_pool.channels_for(key).to_vec(),
            None => self.ambience_pool.active_channels(),
        };

        for channel in channels {
            if fade_out && !duration.is_zero() {
                let start = self.channels[channel.index()].volume();
                self.fades.fade_out(channel, start, duration);
            } else {
                self.release_channel(PoolKind::Ambience, channel);
            }
        }
    }

    /// Stop the active music track
    pub fn stop_music(&mut self, fade_out: bool) {
        let Some(channel) = self.music.active_channel() else {
            return;
        };
        let transition = self.active_transition();

        tracing::debug!(event = ?self.music.active_event(), "Stopping music");
        self.music.clear();
        self.fade_or_silence(channel, fade_out.then_some(transition.fade_out_duration));
    }

    /// Move the active music event to the next entry of its playlist
    pub fn skip_music(&mut self, fade_out: bool) {
        let (Some(current), Some(event), Some(group)) = (
            self.music.active_channel(),
            self.music.active_event().cloned(),
            self.music.active_group(),
        ) else {
            return;
        };
        let transition = self.active_transition();

        let asset = match self.registry.select(group, &mut self.rng) {
            Ok(asset) => asset,
            Err(e) => {
                tracing::warn!(event = %event, "Cannot skip music: {}", e);
                return;
            }
        };

        let next = self.music.idle_channel();
        self.silence(next);
        let fade_in = transition.fade_in.then_some(transition.fade_in_duration);
        let looping = self.music_loops(&asset);
        if let Err(e) = self.start_voice(next, &asset, fade_in, looping) {
            tracing::warn!(event = %event, "Cannot skip music: {}", e);
            return;
        }

        self.fade_or_silence(current, fade_out.then_some(transition.fade_out_duration));
        self.music.activate(next, event, asset, group);
    }

    /// Stop every channel and discard pending and delayed requests
    pub fn stop_all(&mut self) {
        for kind in [PoolKind::Effect, PoolKind::Ambience, PoolKind::OneShot] {
            let dropped = self.pool_mut(kind).flush_pending();
            if dropped > 0 {
                tracing::debug!(pool = %kind, dropped, "Flushed pending requests");
            }
            for channel in self.pool_mut(kind).reset() {
                self.silence(channel);
            }
        }

        self.music.clear();
        for channel in self.music.channels() {
            self.silence(channel);
        }

        self.delayed.clear();
        self.fades.clear();
        tracing::info!("Stopped all audio");
    }

    /// Stop everything and persist volume state
    pub fn shutdown(&mut self) {
        self.stop_all();
        self.volume.lock().persist_all();
        tracing::info!("Audio engine shut down");
    }

    // ---------------------------------------------------------------------
    // Volume
    // ---------------------------------------------------------------------

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

    // ---------------------------------------------------------------------
    // Tick
    // ---------------------------------------------------------------------

    /// Advance the engine by one host tick
    pub fn update(&mut self, elapsed: Duration) {
        self.drain_commands();
        self.backend.update(elapsed);
        self.reclaim();
        self.service_pending();
        self.continue_music();
        self.advance_fades(elapsed);
        self.fire_delayed(elapsed);
    }

    /// Run the fixed-interval ticks due at `now`, for hosts that are not
    /// ticking. Returns the number of ticks run.
    pub fn pump(&mut self, now: Instant) -> u32 {
        let due = self.ticker.due_ticks(now);
        let interval = self.ticker.interval();
        for _ in 0..due {
            self.update(interval);
        }
        due
    }

    /// Forget the wall-clock reference used by [`AudioEngine::pump`]
    pub fn reset_pump(&mut self) {
        self.ticker.reset();
    }

    fn drain_commands(&mut self) {
        while let Ok(command) = self.command_rx.try_recv() {
            tracing::trace!("Applying command: {}", command.description());
            self.apply(command);
        }
    }

    fn apply(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::PlayEffect { key, delay } => self.play_effect(key, delay),
            EngineCommand::PlayAmbience {
                key,
                fade_in,
                duration,
            } => self.play_ambience(key, fade_in, duration),
            EngineCommand::PlayMusic { key } => self.play_music(key),
            EngineCommand::StopEffect { key } => self.stop_effect(key),
            EngineCommand::StopAmbience {
                key,
                fade_out,
                duration,
            } => self.stop_ambience(key, fade_out, duration),
            EngineCommand::StopMusic { fade_out } => self.stop_music(fade_out),
            EngineCommand::SkipMusic { fade_out } => self.skip_music(fade_out),
            EngineCommand::StopAll => self.stop_all(),
            EngineCommand::SetContext(context) => self.set_context(context),
        }
    }

    fn reclaim(&mut self) {
        for kind in [PoolKind::Effect, PoolKind::Ambience, PoolKind::OneShot] {
            let finished: Vec<ChannelId> = self
                .pool(kind)
                .active_channels()
                .into_iter()
                .filter(|&channel| !self.backend.is_sounding(channel))
                .collect();

            for channel in finished {
                tracing::trace!(%channel, pool = %kind, "Reclaiming finished channel");
                self.release_channel(kind, channel);
            }
        }
    }

    fn service_pending(&mut self) {
        for kind in [PoolKind::Effect, PoolKind::Ambience] {
            while self.pool(kind).free_count() > 0 {
                let Some(request) = self.pool_mut(kind).dequeue() else {
                    break;
                };
                let Some(channel) = self.pool_mut(kind).acquire(&request.key) else {
                    break;
                };

                tracing::debug!(event = %request.key, %channel, "Starting queued request");
                if let Err(e) = self.start_channel(kind, channel, &request.asset, None) {
                    tracing::warn!(event = %request.key, "Queued request failed: {}", e);
                }
            }
        }
    }

    fn continue_music(&mut self) {
        let Some(channel) = self.music.active_channel() else {
            return;
        };
        if self.backend.is_sounding(channel) {
            return;
        }
        let (Some(group), Some(event)) = (self.music.active_group(), self.music.active_event().cloned())
        else {
            return;
        };

        let next = self
            .registry
            .select(group, &mut self.rng)
            .and_then(|asset| {
                let looping = self.music_loops(&asset);
                self.start_voice(channel, &asset, None, looping)?;
                Ok(asset)
            });

        match next {
            Ok(asset) => {
                tracing::debug!(event = %event, clip = %asset.clip, "Continuing music playlist");
                self.music.advance(asset);
            }
            Err(e) => {
                tracing::warn!(event = %event, "Music playlist stopped: {}", e);
                self.music.clear();
                self.silence(channel);
            }
        }
    }

    fn advance_fades(&mut self, elapsed: Duration) {
        for update in self.fades.advance(elapsed) {
            self.backend.set_volume(update.channel, update.volume);
            self.channels[update.channel.index()].set_volume(update.volume);

            if update.stop {
                match self.owners[update.channel.index()] {
                    ChannelOwner::Music => self.silence(update.channel),
                    ChannelOwner::Pool(kind) => self.release_channel(kind, update.channel),
                }
            }
        }
    }

    fn fire_delayed(&mut self, elapsed: Duration) {
        if self.delayed.is_empty() {
            return;
        }

        let mut due = Vec::new();
        self.delayed.retain_mut(|dispatch| {
            if dispatch.tick(elapsed) {
                due.push(dispatch.key().clone());
                false
            } else {
                true
            }
        });

        for key in due {
            self.dispatch(Category::Effect, &key, None);
        }
    }

    // ---------------------------------------------------------------------
    // Dispatch
    // ---------------------------------------------------------------------

    fn dispatch(&mut self, category: Category, key: &EventKey, fade_in: Option<Duration>) {
        let Some(groups) = self.registry.groups_for(category, key).map(<[GroupId]>::to_vec) else {
            let error = AudioError::MissingBinding {
                category,
                key: key.clone(),
            };
            tracing::warn!(event = %key, "{}", error);
            return;
        };

        let event = match category {
            Category::Ambience => AudioEvent::AmbienceInvoked { key: key.clone() },
            _ => AudioEvent::EffectInvoked { key: key.clone() },
        };
        let observers = self.events.publish(event);
        tracing::trace!(event = %key, observers, "Dispatching {} event", category);

        // One group's failure never blocks the others
        for group in groups {
            let asset = match self.registry.select(group, &mut self.rng) {
                Ok(asset) => asset,
                Err(e) => {
                    tracing::warn!(event = %key, "Skipping group: {}", e);
                    continue;
                }
            };

            match self.play_asset(category, key, asset, fade_in) {
                Ok(()) => {}
                Err(e @ AudioError::ResourceExhausted(_)) => {
                    tracing::debug!(event = %key, "Dropped request: {}", e);
                }
                Err(e) => tracing::warn!(event = %key, "Playback failed: {}", e),
            }
        }
    }

    /// Start `asset` for `key` on its category's pool, applying the asset's
    /// exhaustion policy when no channel is free.
    ///
    /// Force-play stops the oldest channel bound to the same event at once
    /// and restarts on it with a short fade-in (`force_play_fade_secs`),
    /// rather than fading the evicted clip out first. A channel holds a
    /// single voice, so it cannot fade one clip out while starting another.
    fn play_asset(
        &mut self,
        category: Category,
        key: &EventKey,
        asset: Arc<SoundAsset>,
        fade_in: Option<Duration>,
    ) -> Result<(), AudioError> {
        if asset.is_one_shot() {
            return self.play_one_shot(key, &asset, fade_in);
        }

        let kind = PoolKind::try_from(category)?;
        if let Some(channel) = self.pool_mut(kind).acquire(key) {
            return self.start_channel(kind, channel, &asset, fade_in);
        }

        if asset.queue_on_exhaustion {
            tracing::debug!(event = %key, pool = %kind, "Pool exhausted, queueing request");
            self.pool_mut(kind).enqueue(PendingRequest {
                asset,
                key: key.clone(),
            });
            return Ok(());
        }

        if asset.force_play_on_exhaustion {
            if let Some(victim) = self.pool(kind).oldest_for(key) {
                tracing::debug!(event = %key, channel = %victim, "Force-play evicting oldest channel");
                self.release_channel(kind, victim);

                if let Some(channel) = self.pool_mut(kind).acquire(key) {
                    let fade = fade_in.or(Some(self.settings.force_play_fade));
                    return self.start_channel(kind, channel, &asset, fade);
                }
            }
        }

        Err(AudioError::ResourceExhausted(category))
    }

    fn play_one_shot(
        &mut self,
        key: &EventKey,
        asset: &SoundAsset,
        fade_in: Option<Duration>,
    ) -> Result<(), AudioError> {
        let channel = match self.one_shot_pool.acquire(key) {
            Some(channel) => channel,
            None => self.recover_one_shot(key, asset.category)?,
        };
        self.start_channel(PoolKind::OneShot, channel, asset, fade_in)
    }

    fn recover_one_shot(
        &mut self,
        key: &EventKey,
        category: Category,
    ) -> Result<ChannelId, AudioError> {
        let exhausted = AudioError::ResourceExhausted(category);

        match self.settings.one_shot_exhaustion {
            OneShotExhaustion::Reinitialize => {
                tracing::warn!(
                    capacity = self.one_shot_pool.capacity(),
                    "One-shot pool exhausted, reinitializing"
                );
                for channel in self.one_shot_pool.reset() {
                    self.silence(channel);
                }
            }
            OneShotExhaustion::Grow => {
                let id = ChannelId::new(self.channels.len() as u32);
                self.channels.push(Channel::new(id, Bus::Effect));
                self.owners.push(ChannelOwner::Pool(PoolKind::OneShot));
                self.one_shot_pool.grow(id);
                tracing::warn!(
                    capacity = self.one_shot_pool.capacity(),
                    "One-shot pool exhausted, grew by one channel"
                );
            }
            OneShotExhaustion::Drop => {
                tracing::warn!(event = %key, "One-shot pool exhausted, dropping request");
                return Err(exhausted);
            }
        }

        self.one_shot_pool.acquire(key).ok_or(exhausted)
    }

    /// Start an asset on a pooled channel the caller just acquired. On
    /// failure the channel goes straight back to its pool.
    fn start_channel(
        &mut self,
        kind: PoolKind,
        channel: ChannelId,
        asset: &SoundAsset,
        fade_in: Option<Duration>,
    ) -> Result<(), AudioError> {
        if let Err(e) = self.start_voice(channel, asset, fade_in, asset.looping) {
            self.release_channel(kind, channel);
            return Err(e);
        }
        Ok(())
    }

    fn start_voice(
        &mut self,
        channel: ChannelId,
        asset: &SoundAsset,
        fade_in: Option<Duration>,
        looping: bool,
    ) -> Result<(), AudioError> {
        let fade_in = fade_in.filter(|duration| !duration.is_zero());
        let params = PlaybackParams {
            bus: asset.category.bus(),
            volume: if fade_in.is_some() { 0.0 } else { asset.volume },
            pitch: asset.pitch.roll(&mut self.rng),
            looping,
        };

        self.fades.cancel(channel);
        self.backend.start(channel, &asset.clip, &params)?;
        self.channels[channel.index()].assign(asset.clip.clone(), &params);

        if let Some(duration) = fade_in {
            self.fades.fade_in(channel, asset.volume, duration);
        }
        Ok(())
    }

    fn try_play_music(&mut self, key: &EventKey) -> Result<(), AudioError> {
        let binding = *self.registry.music(key).ok_or_else(|| AudioError::MissingBinding {
            category: Category::Music,
            key: key.clone(),
        })?;

        if self.context == PlaybackContext::Gameplay && self.music.active_event() == Some(key) {
            tracing::debug!(event = %key, "Music event already active");
            return Ok(());
        }

        let asset = self.registry.select(binding.group, &mut self.rng)?;
        let looping = self.music_loops(&asset);
        if looping && self.registry.group(binding.group).map_or(0, |g| g.len()) > 1 {
            tracing::warn!(
                event = %key,
                "Individual file looping on a multi-track playlist stops playlist advancement"
            );
        }

        let transition = binding.transition;
        let previous = self.music.active_channel();
        let next = self.music.idle_channel();

        // The idle channel may still be fading out an older track
        self.silence(next);
        self.start_voice(
            next,
            &asset,
            transition.fade_in.then_some(transition.fade_in_duration),
            looping,
        )?;

        if let Some(previous) = previous {
            self.fade_or_silence(previous, transition.fade_out.then_some(transition.fade_out_duration));
        }

        tracing::info!(event = %key, clip = %asset.clip, channel = %next, "Music started");
        self.music.activate(next, key.clone(), asset, binding.group);
        let observers = self.events.publish(AudioEvent::MusicInvoked { key: key.clone() });
        tracing::trace!(event = %key, observers, "Notified music observers");
        Ok(())
    }

    fn music_loops(&self, asset: &SoundAsset) -> bool {
        self.settings.individual_file_looping && asset.looping
    }

    fn active_transition(&self) -> MusicTransition {
        self.music
            .active_event()
            .and_then(|event| self.registry.music(event))
            .map(|binding| binding.transition)
            .unwrap_or_default()
    }

    // ---------------------------------------------------------------------
    // Channel bookkeeping
    // ---------------------------------------------------------------------

    fn pool(&self, kind: PoolKind) -> &ChannelPool {
        match kind {
            PoolKind::Effect => &self.effect_pool,
            PoolKind::Ambience => &self.ambience_pool,
            PoolKind::OneShot => &self.one_shot_pool,
        }
    }

    fn pool_mut(&mut self, kind: PoolKind) -> &mut ChannelPool {
        match kind {
            PoolKind::Effect => &mut self.effect_pool,
            PoolKind::Ambience => &mut self.ambience_pool,
            PoolKind::OneShot => &mut self.one_shot_pool,
        }
    }

    /// Cancel any fade, stop the voice and clear the channel
    fn silence(&mut self, channel: ChannelId) {
        self.fades.cancel(channel);
        self.backend.stop(channel);
        self.channels[channel.index()].reset();
    }

    fn release_channel(&mut self, kind: PoolKind, channel: ChannelId) {
        self.silence(channel);
        if let Err(e) = self.pool_mut(kind).release(channel) {
            tracing::warn!(pool = %kind, "Ignoring release: {}", e);
        }
    }

    fn fade_or_silence(&mut self, channel: ChannelId, fade_out: Option<Duration>) {
        match fade_out.filter(|duration| !duration.is_zero()) {
            Some(duration) => {
                let start = self.channels[channel.index()].volume();
                self.fades.fade_out(channel, start, duration);
            }
            None => self.silence(channel),
        }
    }

    // ---------------------------------------------------------------------
    // Introspection
    // ---------------------------------------------------------------------

    pub fn free_count(&self, kind: PoolKind) -> usize {
        self.pool(kind).free_count()
    }

    pub fn active_count(&self, kind: PoolKind) -> usize {
        self.pool(kind).active_count()
    }

    pub fn pending_len(&self, kind: PoolKind) -> usize {
        self.pool(kind).pending_len()
    }

    pub fn capacity(&self, kind: PoolKind) -> usize {
        self.pool(kind).capacity()
    }

    /// `free + active == capacity` for every pool
    pub fn pools_consistent(&self) -> bool {
        [PoolKind::Effect, PoolKind::Ambience, PoolKind::OneShot]
            .into_iter()
            .all(|kind| self.pool(kind).is_consistent())
    }

    /// Channels bound to `key` in a pool, oldest first
    pub fn channels_for(&self, kind: PoolKind, key: &EventKey) -> Vec<ChannelId> {
        self.pool(kind).channels_for(key).to_vec()
    }

    pub fn channel(&self, channel: ChannelId) -> Option<&Channel> {
        self.channels.get(channel.index())
    }

    /// Current channel volume (0.0-1.0, before bus gain)
    pub fn channel_volume(&self, channel: ChannelId) -> Option<f32> {
        self.channel(channel).map(Channel::volume)
    }

    pub fn is_fading(&self, channel: ChannelId) -> bool {
        self.fades.is_fading(channel)
    }

    pub fn delayed_len(&self) -> usize {
        self.delayed.len()
    }

    pub fn music_state(&self) -> MusicState {
        self.music.state()
    }

    pub fn music_event(&self) -> Option<&EventKey> {
        self.music.active_event()
    }

    pub fn music_asset(&self) -> Option<&Arc<SoundAsset>> {
        self.music.active_asset()
    }

    pub fn music_channel(&self) -> Option<ChannelId> {
        self.music.active_channel()
    }

    pub fn music_channels(&self) -> [ChannelId; 2] {
        self.music.channels()
    }

    /// Whether nothing is playing, queued or scheduled
    pub fn is_idle(&self) -> bool {
        self.music.state() == MusicState::Stopped
            && self.delayed.is_empty()
            && self.fades.is_empty()
            && [PoolKind::Effect, PoolKind::Ambience, PoolKind::OneShot]
                .into_iter()
                .all(|kind| self.pool(kind).active_count() == 0 && self.pool(kind).pending_len() == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_system::{BusGains, SimulatedBackend};
    use crate::config::EngineConfig;
    use crate::persistence::MemoryStore;

    const CONFIG: &str = r#"{
        "pools": { "effect": 2, "ambience": 2, "one_shot": 1 },
        "assets": {
            "step": { "clip": "step.wav" },
            "coin": { "clip": "coin.wav", "one_shot": true },
            "wind": { "clip": "wind.ogg", "category": "ambience", "looping": true, "volume": 0.8 },
            "theme": { "clip": "theme.ogg", "category": "music" },
            "battle": { "clip": "battle.ogg", "category": "music" }
        },
        "groups": {
            "steps": { "assets": ["step"] },
            "coins": { "assets": ["coin"] },
            "winds": { "assets": ["wind"] },
            "themes": { "assets": ["theme"] },
            "battles": { "assets": ["battle"] }
        },
        "effects": [
            { "key": "step", "groups": ["steps"] },
            { "key": "coin", "groups": ["coins"] }
        ],
        "ambience": [{ "key": "wind", "groups": ["winds"] }],
        "music": [
            { "key": "theme", "group": "themes", "fade_out": true, "fade_out_secs": 0.5 },
            {
                "key": "battle", "group": "battles",
                "fade_in": true, "fade_in_secs": 1.0,
                "fade_out": true, "fade_out_secs": 0.5
            }
        ]
    }"#;

    fn engine() -> (AudioEngine, SimulatedBackend) {
        let config = EngineConfig::from_json(CONFIG).unwrap();
        let backend = SimulatedBackend::new();
        let engine = AudioEngine::with_seed(
            &config,
            Box::new(backend.clone()),
            Box::new(BusGains::new()),
            Box::new(MemoryStore::new()),
            7,
        );
        (engine, backend)
    }

    const TICK: Duration = Duration::from_millis(16);

    #[test]
    fn test_channels_allocated_per_pool() {
        let (engine, _) = engine();
        assert_eq!(engine.capacity(PoolKind::Effect), 2);
        assert_eq!(engine.capacity(PoolKind::Ambience), 2);
        assert_eq!(engine.capacity(PoolKind::OneShot), 1);
        assert_ne!(engine.music_channels()[0], engine.music_channels()[1]);
        assert!(engine.is_idle());
    }

    #[test]
    fn test_unbound_effect_is_noop() {
        let (mut engine, backend) = engine();
        engine.play_effect("nothing", None);
        assert!(backend.started().is_empty());
        assert!(engine.pools_consistent());
    }

    #[test]
    fn test_reclaim_after_clip_finishes() {
        let (mut engine, backend) = engine();
        engine.play_effect("step", None);
        let channel = engine.channels_for(PoolKind::Effect, &EventKey::from("step"))[0];
        assert_eq!(engine.active_count(PoolKind::Effect), 1);

        backend.finish(channel);
        engine.update(TICK);
        assert_eq!(engine.active_count(PoolKind::Effect), 0);
        assert_eq!(engine.free_count(PoolKind::Effect), 2);
    }

    #[test]
    fn test_ambience_fade_out_releases_channel() {
        let (mut engine, backend) = engine();
        engine.play_ambience("wind", false, Duration::ZERO);
        let channel = engine.channels_for(PoolKind::Ambience, &EventKey::from("wind"))[0];
        assert_eq!(backend.volume(channel), Some(0.8));

        engine.stop_ambience(None, true, Duration::from_millis(100));
        engine.update(Duration::from_millis(50));
        assert!(engine.is_fading(channel));
        assert_eq!(engine.active_count(PoolKind::Ambience), 1);

        engine.update(Duration::from_millis(60));
        assert!(!backend.is_playing(channel));
        assert_eq!(engine.active_count(PoolKind::Ambience), 0);
        assert!(engine.pools_consistent());
    }

    #[test]
    fn test_music_crossfade_alternates_channels() {
        let (mut engine, backend) = engine();
        let [first, second] = engine.music_channels();

        engine.play_music("theme");
        assert_eq!(engine.music_channel(), Some(first));

        engine.play_music("battle");
        assert_eq!(engine.music_channel(), Some(second));
        assert_eq!(backend.volume(second), Some(0.0));
        assert!(engine.is_fading(first));

        engine.update(Duration::from_millis(600));
        assert!(!backend.is_playing(first));
        assert!(backend.is_playing(second));
    }

    #[test]
    fn test_stop_music_is_idempotent() {
        let (mut engine, backend) = engine();
        engine.stop_music(false);

        engine.play_music("theme");
        let channel = engine.music_channel().unwrap();
        engine.stop_music(false);
        engine.stop_music(false);
        assert!(!backend.is_playing(channel));
        assert_eq!(engine.music_state(), MusicState::Stopped);
    }

    #[test]
    fn test_music_playlist_continues() {
        let (mut engine, backend) = engine();
        engine.play_music("theme");
        let channel = engine.music_channel().unwrap();

        backend.finish(channel);
        engine.update(TICK);
        assert!(backend.is_playing(channel));
        assert_eq!(backend.started().len(), 2);
        assert_eq!(engine.music_event(), Some(&EventKey::from("theme")));
    }

    #[test]
    fn test_stop_all_flushes_everything() {
        let (mut engine, backend) = engine();
        engine.play_effect("step", None);
        engine.play_effect("step", Some(Duration::from_secs(1)));
        engine.play_ambience("wind", true, Duration::from_secs(1));
        engine.play_music("theme");

        engine.stop_all();
        assert!(engine.is_idle());
        assert!(backend.playing_channels().is_empty());
        assert!(engine.pools_consistent());
    }

    #[test]
    fn test_failed_start_returns_channel() {
        let (mut engine, backend) = engine();
        backend.fail_clip("step.wav");
        engine.play_effect("step", None);
        assert_eq!(engine.free_count(PoolKind::Effect), 2);
        assert!(engine.pools_consistent());
    }

    #[test]
    fn test_commands_applied_on_tick() {
        let (mut engine, backend) = engine();
        let handle = engine.handle();
        handle.play_effect("step", None);
        assert!(backend.started().is_empty());

        engine.update(TICK);
        assert_eq!(backend.started().len(), 1);
    }
}

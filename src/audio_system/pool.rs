/// Channel pools
///
/// Fixed-capacity sets of playback channels. Each pool tracks its free
/// channels, the channels bound to each event key, and a FIFO queue of
/// requests waiting for a channel. `free + active == capacity` holds after
/// every public operation.
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::asset::SoundAsset;
use super::channel::ChannelId;
use super::source::{Category, EventKey};
use crate::error::AudioError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolKind {
    Effect,
    Ambience,
    /// Always-fire pool shared by one-shot effects and ambience
    OneShot,
}

impl PoolKind {
    /// Order in which free channels are reused
    pub fn free_order(&self) -> FreeOrder {
        match self {
            PoolKind::Effect => FreeOrder::Fifo,
            PoolKind::Ambience => FreeOrder::Lifo,
            PoolKind::OneShot => FreeOrder::Fifo,
        }
    }
}

impl TryFrom<Category> for PoolKind {
    type Error = AudioError;

    /// Music owns the two music slot channels and has no shared pool
    fn try_from(category: Category) -> Result<Self, Self::Error> {
        match category {
            Category::Effect => Ok(PoolKind::Effect),
            Category::Ambience => Ok(PoolKind::Ambience),
            Category::Music => Err(AudioError::Configuration(
                "music requests cannot use a shared channel pool".to_string(),
            )),
        }
    }
}

impl fmt::Display for PoolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolKind::Effect => write!(f, "effect"),
            PoolKind::Ambience => write!(f, "ambience"),
            PoolKind::OneShot => write!(f, "one-shot"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreeOrder {
    /// Oldest released channel is reused first
    Fifo,
    /// Most recently released channel is reused first
    Lifo,
}

/// What the one-shot pool does when no channel is free
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OneShotExhaustion {
    /// Stop every one-shot channel, rebuild the pool and retry once
    #[default]
    Reinitialize,

    /// Allocate one more channel
    Grow,

    /// Drop the request with a warning
    Drop,
}

/// Request waiting for a free channel
#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub asset: Arc<SoundAsset>,
    pub key: EventKey,
}

#[derive(Debug)]
pub struct ChannelPool {
    kind: PoolKind,
    order: FreeOrder,
    capacity: usize,
    free: VecDeque<ChannelId>,
    active: HashMap<EventKey, Vec<ChannelId>>,
    pending: VecDeque<PendingRequest>,
}

impl ChannelPool {
    /// Create a pool owning `channels`, all initially free
    pub fn new(kind: PoolKind, channels: Vec<ChannelId>) -> Self {
        Self {
            kind,
            order: kind.free_order(),
            capacity: channels.len(),
            free: channels.into_iter().collect(),
            active: HashMap::new(),
            pending: VecDeque::new(),
        }
    }

    pub fn kind(&self) -> PoolKind {
        self.kind
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    pub fn active_count(&self) -> usize {
        self.active.values().map(Vec::len).sum()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Take a free channel and bind it to `key`. Returns `None` when empty.
    pub fn acquire(&mut self, key: &EventKey) -> Option<ChannelId> {
        let channel = match self.order {
            FreeOrder::Fifo => self.free.pop_front(),
            FreeOrder::Lifo => self.free.pop_back(),
        }?;
        self.active.entry(key.clone()).or_default().push(channel);
        Some(channel)
    }

    /// Unbind a channel and return it to the free collection.
    ///
    /// Releasing a channel that is already free changes nothing and reports
    /// `DoubleRelease`.
    pub fn release(&mut self, channel: ChannelId) -> Result<(), AudioError> {
        let owner = self
            .active
            .iter()
            .find(|(_, channels)| channels.contains(&channel))
            .map(|(key, _)| key.clone());

        match owner {
            Some(key) => {
                if let Some(channels) = self.active.get_mut(&key) {
                    channels.retain(|&c| c != channel);
                    if channels.is_empty() {
                        self.active.remove(&key);
                    }
                }
                self.free.push_back(channel);
                Ok(())
            }
            None if self.free.contains(&channel) => Err(AudioError::DoubleRelease(channel)),
            None => Err(AudioError::Configuration(format!(
                "channel {channel} does not belong to the {} pool",
                self.kind
            ))),
        }
    }

    /// Add a newly allocated channel, growing capacity by one
    pub fn grow(&mut self, channel: ChannelId) {
        self.capacity += 1;
        self.free.push_back(channel);
    }

    /// Return every channel to the free collection in id order.
    ///
    /// Yields the channels that were active so the caller can stop them.
    pub fn reset(&mut self) -> Vec<ChannelId> {
        let mut was_active: Vec<ChannelId> = self.active.drain().flat_map(|(_, c)| c).collect();
        was_active.sort();

        let mut all: Vec<ChannelId> = self.free.drain(..).chain(was_active.iter().copied()).collect();
        all.sort();
        self.free = all.into_iter().collect();
        was_active
    }

    /// Channels bound to `key`, oldest first
    pub fn channels_for(&self, key: &EventKey) -> &[ChannelId] {
        self.active.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Oldest channel bound to `key`
    pub fn oldest_for(&self, key: &EventKey) -> Option<ChannelId> {
        self.channels_for(key).first().copied()
    }

    pub fn active_channels(&self) -> Vec<ChannelId> {
        let mut channels: Vec<ChannelId> = self.active.values().flatten().copied().collect();
        channels.sort();
        channels
    }

    pub fn enqueue(&mut self, request: PendingRequest) {
        self.pending.push_back(request);
    }

    pub fn dequeue(&mut self) -> Option<PendingRequest> {
        self.pending.pop_front()
    }

    /// Discard every pending request, returning how many were dropped
    pub fn flush_pending(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        dropped
    }

    /// `free + active == capacity`
    pub fn is_consistent(&self) -> bool {
        self.free_count() + self.active_count() == self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_system::ClipHandle;

    fn pool(kind: PoolKind, size: u32) -> ChannelPool {
        ChannelPool::new(kind, (0..size).map(ChannelId::new).collect())
    }

    fn key(name: &str) -> EventKey {
        EventKey::from(name)
    }

    #[test]
    fn test_pool_creation() {
        let pool = pool(PoolKind::Effect, 4);
        assert_eq!(pool.capacity(), 4);
        assert_eq!(pool.free_count(), 4);
        assert_eq!(pool.active_count(), 0);
        assert!(pool.is_consistent());
    }

    #[test]
    fn test_acquire_until_exhausted() {
        let mut pool = pool(PoolKind::Effect, 2);
        assert!(pool.acquire(&key("a")).is_some());
        assert!(pool.acquire(&key("b")).is_some());
        assert!(pool.acquire(&key("c")).is_none());
        assert_eq!(pool.active_count(), 2);
        assert!(pool.is_consistent());
    }

    #[test]
    fn test_fifo_reuses_oldest_release() {
        let mut pool = pool(PoolKind::Effect, 3);
        let a = pool.acquire(&key("x")).unwrap();
        let b = pool.acquire(&key("x")).unwrap();
        let c = pool.acquire(&key("x")).unwrap();

        pool.release(b).unwrap();
        pool.release(a).unwrap();
        assert_eq!(pool.acquire(&key("y")), Some(b));
        pool.release(c).unwrap();
        assert_eq!(pool.acquire(&key("y")), Some(a));
    }

    #[test]
    fn test_lifo_reuses_latest_release() {
        let mut pool = pool(PoolKind::Ambience, 3);
        let a = pool.acquire(&key("x")).unwrap();
        let b = pool.acquire(&key("x")).unwrap();

        pool.release(a).unwrap();
        pool.release(b).unwrap();
        assert_eq!(pool.acquire(&key("y")), Some(b));
        assert_eq!(pool.acquire(&key("y")), Some(a));
    }

    #[test]
    fn test_music_has_no_shared_pool() {
        assert_eq!(PoolKind::try_from(Category::Effect).unwrap(), PoolKind::Effect);
        assert_eq!(PoolKind::try_from(Category::Ambience).unwrap(), PoolKind::Ambience);
        assert!(matches!(
            PoolKind::try_from(Category::Music),
            Err(AudioError::Configuration(_))
        ));
    }

    #[test]
    fn test_double_release_is_noop() {
        let mut pool = pool(PoolKind::Effect, 2);
        let ch = pool.acquire(&key("x")).unwrap();
        pool.release(ch).unwrap();

        let result = pool.release(ch);
        assert!(matches!(result, Err(AudioError::DoubleRelease(c)) if c == ch));
        assert_eq!(pool.free_count(), 2);
        assert!(pool.is_consistent());
    }

    #[test]
    fn test_foreign_channel_rejected() {
        let mut pool = pool(PoolKind::Effect, 2);
        assert!(pool.release(ChannelId::new(99)).is_err());
        assert!(pool.is_consistent());
    }

    #[test]
    fn test_invariant_over_mixed_operations() {
        let mut pool = pool(PoolKind::OneShot, 5);
        let keys = [key("a"), key("b"), key("c")];
        let mut held = Vec::new();

        for step in 0..200usize {
            if step % 3 == 2 && !held.is_empty() {
                let ch = held.remove(step % held.len());
                pool.release(ch).unwrap();
            } else if let Some(ch) = pool.acquire(&keys[step % keys.len()]) {
                held.push(ch);
            }
            assert!(pool.is_consistent(), "invariant broken at step {step}");
        }
    }

    #[test]
    fn test_oldest_for_key() {
        let mut pool = pool(PoolKind::Effect, 3);
        let first = pool.acquire(&key("x")).unwrap();
        pool.acquire(&key("y")).unwrap();
        pool.acquire(&key("x")).unwrap();

        assert_eq!(pool.oldest_for(&key("x")), Some(first));
        assert_eq!(pool.channels_for(&key("x")).len(), 2);
        assert!(pool.oldest_for(&key("z")).is_none());
    }

    #[test]
    fn test_reset_and_grow() {
        let mut pool = pool(PoolKind::OneShot, 2);
        pool.acquire(&key("x")).unwrap();
        pool.acquire(&key("x")).unwrap();

        let stopped = pool.reset();
        assert_eq!(stopped.len(), 2);
        assert_eq!(pool.free_count(), 2);

        pool.grow(ChannelId::new(2));
        assert_eq!(pool.capacity(), 3);
        assert!(pool.is_consistent());
    }

    #[test]
    fn test_pending_queue_fifo() {
        let mut pool = pool(PoolKind::Effect, 1);
        let asset = Arc::new(SoundAsset::new(ClipHandle::new("a.wav"), Category::Effect));
        pool.enqueue(PendingRequest { asset: Arc::clone(&asset), key: key("first") });
        pool.enqueue(PendingRequest { asset, key: key("second") });

        assert_eq!(pool.pending_len(), 2);
        assert_eq!(pool.dequeue().unwrap().key, key("first"));
        assert_eq!(pool.flush_pending(), 1);
        assert!(pool.dequeue().is_none());
    }
}

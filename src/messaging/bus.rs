/// Observer fan-out
///
/// Collaborators subscribe to every engine event or to a few event kinds.
/// Publishing never blocks the engine tick: each subscriber owns an
/// unbounded channel, and subscribers whose receiver was dropped are
/// forgotten on the next event they would have received.
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::RwLock;
use std::sync::Arc;

use super::events::{AudioEvent, EventKind};

struct Subscriber {
    /// `None` receives every kind
    kinds: Option<Vec<EventKind>>,
    sender: Sender<AudioEvent>,
}

impl Subscriber {
    fn wants(&self, kind: EventKind) -> bool {
        self.kinds.as_ref().map_or(true, |kinds| kinds.contains(&kind))
    }
}

/// Shared by the engine, the volume controller and every handle.
/// Clones publish to the same subscribers.
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<RwLock<Vec<Subscriber>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive every event. Drop the receiver to unsubscribe.
    pub fn subscribe(&self) -> Receiver<AudioEvent> {
        self.add(None)
    }

    /// Receive only events of the given kinds
    pub fn subscribe_to(&self, kinds: &[EventKind]) -> Receiver<AudioEvent> {
        self.add(Some(kinds.to_vec()))
    }

    fn add(&self, kinds: Option<Vec<EventKind>>) -> Receiver<AudioEvent> {
        let (sender, receiver) = unbounded();
        self.subscribers.write().push(Subscriber { kinds, sender });
        receiver
    }

    /// Deliver `event` to interested subscribers, returning how many got it
    pub fn publish(&self, event: AudioEvent) -> usize {
        let kind = event.kind();
        let mut delivered = 0;

        self.subscribers.write().retain(|subscriber| {
            if !subscriber.wants(kind) {
                return true;
            }
            // Unbounded sends only fail once the receiver is gone
            let sent = subscriber.sender.try_send(event.clone()).is_ok();
            delivered += usize::from(sent);
            sent
        });

        delivered
    }
}

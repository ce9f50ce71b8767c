/// Observer events published by the engine
///
/// Events represent things that have happened (past tense).
/// They are broadcast to all subscribers.
use crate::audio_system::EventKey;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioEvent {
    /// An effect event with a registered binding was dispatched
    EffectInvoked { key: EventKey },

    /// An ambience event with a registered binding was dispatched
    AmbienceInvoked { key: EventKey },

    /// A music event took over the music slot
    MusicInvoked { key: EventKey },

    /// The master bus was muted
    Muted,

    /// The master bus was restored
    Unmuted,
}

/// Coarse event families observers can subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Effect,
    Ambience,
    Music,
    /// Mute and unmute
    Volume,
}

impl AudioEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            AudioEvent::EffectInvoked { .. } => EventKind::Effect,
            AudioEvent::AmbienceInvoked { .. } => EventKind::Ambience,
            AudioEvent::MusicInvoked { .. } => EventKind::Music,
            AudioEvent::Muted | AudioEvent::Unmuted => EventKind::Volume,
        }
    }

    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            AudioEvent::EffectInvoked { key } => format!("Effect invoked: {}", key),
            AudioEvent::AmbienceInvoked { key } => format!("Ambience invoked: {}", key),
            AudioEvent::MusicInvoked { key } => format!("Music invoked: {}", key),
            AudioEvent::Muted => "Muted".to_string(),
            AudioEvent::Unmuted => "Unmuted".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_description() {
        let event = AudioEvent::EffectInvoked {
            key: EventKey::from("jump"),
        };
        assert_eq!(event.description(), "Effect invoked: jump");
        assert_eq!(AudioEvent::Muted.description(), "Muted");
    }

    #[test]
    fn test_event_kind() {
        let event = AudioEvent::MusicInvoked {
            key: EventKey::from("title"),
        };
        assert_eq!(event.kind(), EventKind::Music);
        assert_eq!(AudioEvent::Unmuted.kind(), EventKind::Volume);
    }
}

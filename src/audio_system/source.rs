/// Audio source categories and event keys
///
/// Every playback request names an event key within one category. The
/// category decides which channel pool serves the request and which mixer
/// bus its channels route through.
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::volume::Bus;

/// Audio source categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Short sound effects (UI clicks, impacts, pickups)
    Effect,

    /// Environmental loops and beds
    Ambience,

    /// Background music playlists
    Music,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Effect => write!(f, "effect"),
            Category::Ambience => write!(f, "ambience"),
            Category::Music => write!(f, "music"),
        }
    }
}

impl Category {
    /// Mixer bus that channels of this category route through
    pub fn bus(&self) -> Bus {
        match self {
            Category::Effect => Bus::Effect,
            Category::Ambience => Bus::Ambience,
            Category::Music => Bus::Music,
        }
    }

    /// Whether assets of this category may be fired as one-shots
    pub fn allows_one_shot(&self) -> bool {
        match self {
            Category::Effect => true,
            Category::Ambience => true,
            Category::Music => false,
        }
    }
}

/// Identifier of a playable event, resolved once at configuration load
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventKey(Arc<str>);

impl EventKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EventKey {
    fn from(key: &str) -> Self {
        Self(Arc::from(key))
    }
}

impl From<String> for EventKey {
    fn from(key: String) -> Self {
        Self(Arc::from(key))
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_display() {
        assert_eq!(Category::Effect.to_string(), "effect");
        assert_eq!(Category::Ambience.to_string(), "ambience");
        assert_eq!(Category::Music.to_string(), "music");
    }

    #[test]
    fn test_category_one_shot() {
        assert!(Category::Effect.allows_one_shot());
        assert!(Category::Ambience.allows_one_shot());
        assert!(!Category::Music.allows_one_shot());
    }

    #[test]
    fn test_event_key_equality() {
        let a = EventKey::from("door_open");
        let b = EventKey::from(String::from("door_open"));
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "door_open");
    }
}

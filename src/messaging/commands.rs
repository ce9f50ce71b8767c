/// Engine commands
///
/// Commands represent requests to perform actions (imperative). Any thread
/// may send them; the engine drains them on its own thread at the start of
/// each tick, so every pool mutation happens in one place.
use std::time::Duration;

use crate::audio_system::{EventKey, PlaybackContext};

#[derive(Debug, Clone, PartialEq)]
pub enum EngineCommand {
    PlayEffect {
        key: EventKey,
        delay: Option<Duration>,
    },

    PlayAmbience {
        key: EventKey,
        fade_in: bool,
        duration: Duration,
    },

    PlayMusic { key: EventKey },

    StopEffect { key: EventKey },

    /// Stop one ambience event, or every ambience channel when `key` is `None`
    StopAmbience {
        key: Option<EventKey>,
        fade_out: bool,
        duration: Duration,
    },

    StopMusic { fade_out: bool },

    SkipMusic { fade_out: bool },

    /// Stop everything and discard pending requests
    StopAll,

    SetContext(PlaybackContext),
}

impl EngineCommand {
    /// Get a human-readable description of the command
    pub fn description(&self) -> String {
        match self {
            EngineCommand::PlayEffect { key, delay: Some(delay) } => {
                format!("Play effect: {} after {:?}", key, delay)
            }
            EngineCommand::PlayEffect { key, delay: None } => format!("Play effect: {}", key),
            EngineCommand::PlayAmbience { key, .. } => format!("Play ambience: {}", key),
            EngineCommand::PlayMusic { key } => format!("Play music: {}", key),
            EngineCommand::StopEffect { key } => format!("Stop effect: {}", key),
            EngineCommand::StopAmbience { key: Some(key), .. } => {
                format!("Stop ambience: {}", key)
            }
            EngineCommand::StopAmbience { key: None, .. } => "Stop all ambience".to_string(),
            EngineCommand::StopMusic { .. } => "Stop music".to_string(),
            EngineCommand::SkipMusic { .. } => "Skip music".to_string(),
            EngineCommand::StopAll => "Stop all audio".to_string(),
            EngineCommand::SetContext(context) => format!("Set context: {:?}", context),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_description() {
        let cmd = EngineCommand::StopAll;
        assert_eq!(cmd.description(), "Stop all audio");

        let cmd = EngineCommand::PlayMusic {
            key: EventKey::from("boss"),
        };
        assert_eq!(cmd.description(), "Play music: boss");

        let cmd = EngineCommand::StopAmbience {
            key: None,
            fade_out: true,
            duration: Duration::from_secs(1),
        };
        assert_eq!(cmd.description(), "Stop all ambience");
    }
}

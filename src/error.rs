use thiserror::Error;

use crate::audio_system::{Category, ChannelId, EventKey};

/// Engine-level errors using thiserror for structured error handling.
///
/// None of these escape the public play/stop surface: the facade recovers
/// each one locally and logs a warning. They exist so internal steps can be
/// composed with `?` and so tests can assert on the failure kind.

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Invalid audio configuration: {0}")]
    Configuration(String),

    #[error("No binding registered for {category} event '{key}'")]
    MissingBinding { category: Category, key: EventKey },

    #[error("No free {0} channel available")]
    ResourceExhausted(Category),

    #[error("Selection group '{0}' has no assets")]
    EmptyGroup(String),

    #[error("Selection returned no asset for event '{0}'")]
    InvalidSelection(EventKey),

    #[error("Channel {0} released while already free")]
    DoubleRelease(ChannelId),

    #[error("Audio backend failure on channel {channel}: {message}")]
    Backend { channel: ChannelId, message: String },

    #[error("Failed to load audio clip: {path}")]
    ClipLoad {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Failed to initialize audio output stream")]
    StreamInit(#[source] Box<dyn std::error::Error + Send + Sync>),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration from {path}")]
    LoadFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Failed to save configuration to {path}")]
    SaveFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to create config directory: {path}")]
    DirectoryCreationFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Failed to read persisted settings from {path}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write persisted settings to {path}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Persisted settings at {path} are corrupt")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("No platform config directory available")]
    NoConfigDir,

    #[error("Persistence backend rejected the write: {0}")]
    Rejected(String),
}

/// Type alias for application Results using anyhow for context chaining
pub type AppResult<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_error_display() {
        let err = AudioError::ResourceExhausted(Category::Effect);
        assert_eq!(err.to_string(), "No free effect channel available");

        let err = AudioError::MissingBinding {
            category: Category::Music,
            key: EventKey::from("title"),
        };
        assert_eq!(
            err.to_string(),
            "No binding registered for music event 'title'"
        );
    }

    #[test]
    fn test_error_source_chain() {
        use std::io;

        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let config_err = ConfigError::LoadFailed {
            path: "/test/audio.json".to_string(),
            source: Box::new(io_err),
        };

        assert!(config_err.source().is_some());
        assert_eq!(
            config_err.to_string(),
            "Failed to load configuration from /test/audio.json"
        );
    }
}

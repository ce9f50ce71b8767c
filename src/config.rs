use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::audio_system::{
    Category, ClipHandle, OneShotExhaustion, Pitch, SelectionPolicy, SoundAsset,
};
use crate::error::ConfigError;

/// Channel counts per pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSizes {
    pub effect: usize,
    pub ambience: usize,
    pub one_shot: usize,
}

impl Default for PoolSizes {
    fn default() -> Self {
        Self {
            effect: 16,
            ambience: 8,
            one_shot: 16,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PitchEntry {
    Fixed(f32),
    Random { lo: f32, hi: f32 },
}

impl Default for PitchEntry {
    fn default() -> Self {
        PitchEntry::Fixed(1.0)
    }
}

fn default_volume() -> f32 {
    1.0
}

fn default_category() -> Category {
    Category::Effect
}

/// One row of the asset table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetEntry {
    /// Clip path, relative to the asset root
    pub clip: String,

    #[serde(default = "default_category")]
    pub category: Category,

    #[serde(default)]
    pub pitch: PitchEntry,

    #[serde(default = "default_volume")]
    pub volume: f32,

    #[serde(default)]
    pub looping: bool,

    #[serde(default)]
    pub queue_on_exhaustion: bool,

    #[serde(default)]
    pub force_play_on_exhaustion: bool,

    #[serde(default)]
    pub one_shot: bool,
}

impl AssetEntry {
    /// Build the runtime asset, clamping out-of-range values
    pub fn to_asset(&self) -> SoundAsset {
        let pitch = match self.pitch {
            PitchEntry::Fixed(value) => Pitch::fixed(value),
            PitchEntry::Random { lo, hi } => Pitch::random(lo, hi),
        };
        SoundAsset::new(ClipHandle::new(&self.clip), self.category)
            .with_pitch(pitch)
            .with_volume(self.volume)
            .with_looping(self.looping)
            .with_queue_on_exhaustion(self.queue_on_exhaustion)
            .with_force_play_on_exhaustion(self.force_play_on_exhaustion)
            .with_one_shot(self.one_shot)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupEntry {
    #[serde(default)]
    pub policy: SelectionPolicy,

    /// Asset ids, in authored order
    pub assets: Vec<String>,
}

/// Effect or ambience binding: every listed group plays per invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEntry {
    pub key: String,
    pub groups: Vec<String>,
}

/// Music binding with its transition settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MusicEntry {
    pub key: String,
    pub group: String,

    #[serde(default)]
    pub fade_in: bool,

    #[serde(default = "default_music_fade_secs")]
    pub fade_in_secs: f32,

    #[serde(default)]
    pub fade_out: bool,

    #[serde(default = "default_music_fade_secs")]
    pub fade_out_secs: f32,
}

fn default_music_fade_secs() -> f32 {
    1.0
}

/// Volumes used when nothing has been persisted yet (dB)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeDefaults {
    pub master: f32,
    pub effect: f32,
    pub ambience: f32,
    pub music: f32,
    pub extra_gain: f32,
}

impl Default for VolumeDefaults {
    fn default() -> Self {
        Self {
            master: 0.0,
            effect: 0.0,
            ambience: 0.0,
            music: 0.0,
            extra_gain: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub pools: PoolSizes,

    /// What the one-shot pool does when every channel is busy
    pub one_shot_exhaustion: OneShotExhaustion,

    /// Honour per-asset looping for music. Halts playlist advancement.
    pub individual_file_looping: bool,

    /// Fade-in applied to a force-played channel to mask the eviction cut
    pub force_play_fade_secs: f32,

    pub assets: BTreeMap<String, AssetEntry>,
    pub groups: BTreeMap<String, GroupEntry>,

    pub effects: Vec<EventEntry>,
    pub ambience: Vec<EventEntry>,
    pub music: Vec<MusicEntry>,

    pub volumes: VolumeDefaults,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pools: PoolSizes::default(),
            one_shot_exhaustion: OneShotExhaustion::default(),
            individual_file_looping: false,
            force_play_fade_secs: 0.05,
            assets: BTreeMap::new(),
            groups: BTreeMap::new(),
            effects: Vec::new(),
            ambience: Vec::new(),
            music: Vec::new(),
            volumes: VolumeDefaults::default(),
        }
    }
}

impl EngineConfig {
    /// Parse a configuration document
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            path: path.display().to_string(),
            source: Box::new(e),
        })?;
        let config: EngineConfig =
            serde_json::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.display().to_string(),
                source: Box::new(e),
            })?;

        tracing::info!("Loaded audio config from: {}", path.display());
        Ok(config)
    }

    /// Save configuration to disk
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::DirectoryCreationFailed {
                path: parent.display().to_string(),
                source: e,
            })?;
        }

        let json = serde_json::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.display().to_string(),
            source: Box::new(e),
        })?;
        fs::write(path, json).map_err(|e| ConfigError::SaveFailed {
            path: path.display().to_string(),
            source: Box::new(e),
        })?;

        Ok(())
    }

    /// Default config file location in the user config folder
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("PooledAudio").join("audio.json"))
    }

    /// Report values that will be clamped or ignored at engine startup
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        for (name, size) in [
            ("effect", self.pools.effect),
            ("ambience", self.pools.ambience),
            ("one_shot", self.pools.one_shot),
        ] {
            if size == 0 {
                warnings.push(format!("pool '{name}' has capacity 0, using 1"));
            }
        }

        for (id, asset) in &self.assets {
            if !(0.0..=1.0).contains(&asset.volume) {
                warnings.push(format!("asset '{id}' volume {} clamped to [0, 1]", asset.volume));
            }
            if asset.one_shot && !asset.category.allows_one_shot() {
                warnings.push(format!("asset '{id}' is music and cannot be one-shot"));
            }
        }

        for (id, group) in &self.groups {
            if group.assets.is_empty() {
                warnings.push(format!("group '{id}' has no assets"));
            }
            for asset in &group.assets {
                if !self.assets.contains_key(asset) {
                    warnings.push(format!("group '{id}' references unknown asset '{asset}'"));
                }
            }
        }

        let bindings = self
            .effects
            .iter()
            .chain(self.ambience.iter())
            .flat_map(|entry| entry.groups.iter().map(move |g| (&entry.key, g)))
            .chain(self.music.iter().map(|entry| (&entry.key, &entry.group)));
        for (key, group) in bindings {
            if !self.groups.contains_key(group) {
                warnings.push(format!("event '{key}' references unknown group '{group}'"));
            }
        }

        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "pools": { "effect": 4, "ambience": 2 },
        "assets": {
            "click": { "clip": "ui/click.wav", "volume": 0.5, "one_shot": true },
            "rain": { "clip": "amb/rain.ogg", "category": "ambience", "looping": true },
            "theme": { "clip": "music/theme.mp3", "category": "music",
                       "pitch": { "random": { "lo": 0.9, "hi": 1.1 } } }
        },
        "groups": {
            "clicks": { "assets": ["click"] },
            "rain": { "policy": "fixed_first", "assets": ["rain"] },
            "themes": { "policy": "random_no_repeat", "assets": ["theme", "missing"] }
        },
        "effects": [ { "key": "ui_click", "groups": ["clicks"] } ],
        "ambience": [ { "key": "storm", "groups": ["rain"] } ],
        "music": [ { "key": "title", "group": "themes", "fade_in": true, "fade_in_secs": 2.0 } ]
    }"#;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.pools.effect, 16);
        assert_eq!(config.pools.ambience, 8);
        assert_eq!(config.pools.one_shot, 16);
        assert!(!config.individual_file_looping);
        assert_eq!(config.one_shot_exhaustion, OneShotExhaustion::Reinitialize);
    }

    #[test]
    fn test_parse_sample() {
        let config = EngineConfig::from_json(SAMPLE).unwrap();
        assert_eq!(config.pools.effect, 4);
        assert_eq!(config.pools.one_shot, 16);
        assert_eq!(config.assets.len(), 3);
        assert_eq!(config.groups["rain"].policy, SelectionPolicy::FixedFirst);
        assert_eq!(config.music[0].fade_in_secs, 2.0);
        assert_eq!(config.music[0].fade_out_secs, 1.0);

        let theme = config.assets["theme"].to_asset();
        assert_eq!(theme.category, Category::Music);
        assert_eq!(theme.pitch, Pitch::Random { lo: 0.9, hi: 1.1 });
    }

    #[test]
    fn test_validate_reports_dangling_references() {
        let config = EngineConfig::from_json(SAMPLE).unwrap();
        let warnings = config.validate();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("unknown asset 'missing'"));
    }

    #[test]
    fn test_invalid_json_rejected() {
        let result = EngineConfig::from_json("{ not json");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("audio.json");

        let config = EngineConfig::from_json(SAMPLE).unwrap();
        config.save(&path).unwrap();

        let loaded = EngineConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }
}

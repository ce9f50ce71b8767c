/// Event registry
///
/// Maps event keys to the selection groups they play, partitioned by
/// category. Built once from configuration; only the groups' selection
/// cursors change afterwards.
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use super::asset::SoundAsset;
use super::selection::SelectionGroup;
use super::source::{Category, EventKey};
use crate::config::EngineConfig;
use crate::error::AudioError;

/// Index of a selection group inside the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupId(usize);

/// Fade settings applied when a music event takes over the slot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MusicTransition {
    pub fade_in: bool,
    pub fade_in_duration: Duration,
    pub fade_out: bool,
    pub fade_out_duration: Duration,
}

impl Default for MusicTransition {
    fn default() -> Self {
        Self {
            fade_in: false,
            fade_in_duration: Duration::from_secs(1),
            fade_out: false,
            fade_out_duration: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MusicBinding {
    pub group: GroupId,
    pub transition: MusicTransition,
}

#[derive(Debug, Default)]
pub struct EventRegistry {
    groups: Vec<SelectionGroup>,
    effects: HashMap<EventKey, Vec<GroupId>>,
    ambience: HashMap<EventKey, Vec<GroupId>>,
    music: HashMap<EventKey, MusicBinding>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry from configuration.
    ///
    /// Dangling references and duplicate keys are configuration errors: each
    /// is logged and the offending entry skipped, keeping the first binding.
    pub fn from_config(config: &EngineConfig) -> Self {
        let mut registry = Self::new();

        let mut assets: HashMap<&str, Arc<SoundAsset>> = HashMap::new();
        for (id, entry) in &config.assets {
            assets.insert(id.as_str(), Arc::new(entry.to_asset()));
        }

        let mut group_ids: HashMap<&str, GroupId> = HashMap::new();
        for (name, entry) in &config.groups {
            let members: Vec<Arc<SoundAsset>> = entry
                .assets
                .iter()
                .filter_map(|asset_id| match assets.get(asset_id.as_str()) {
                    Some(asset) => Some(Arc::clone(asset)),
                    None => {
                        tracing::warn!(group = %name, asset = %asset_id, "Unknown asset in selection group, skipping");
                        None
                    }
                })
                .collect();

            match SelectionGroup::new(name.as_str(), members, entry.policy) {
                Ok(group) => {
                    group_ids.insert(name.as_str(), registry.add_group(group));
                }
                Err(e) => tracing::warn!("Skipping selection group: {}", e),
            }
        }

        let resolve = |key: &str, names: &[String]| -> Vec<GroupId> {
            names
                .iter()
                .filter_map(|name| {
                    let id = group_ids.get(name.as_str()).copied();
                    if id.is_none() {
                        tracing::warn!(event = %key, group = %name, "Unknown group in event binding, skipping");
                    }
                    id
                })
                .collect()
        };

        for (category, entries) in [
            (Category::Effect, &config.effects),
            (Category::Ambience, &config.ambience),
        ] {
            for entry in entries {
                let groups = resolve(&entry.key, &entry.groups);
                if let Err(e) = registry.bind(category, EventKey::from(entry.key.as_str()), groups) {
                    tracing::warn!("{}", e);
                }
            }
        }

        for entry in &config.music {
            let Some(group) = resolve(&entry.key, std::slice::from_ref(&entry.group))
                .first()
                .copied()
            else {
                tracing::warn!(event = %entry.key, "Music event has no usable group, skipping");
                continue;
            };
            let transition = MusicTransition {
                fade_in: entry.fade_in,
                fade_in_duration: secs(entry.fade_in_secs),
                fade_out: entry.fade_out,
                fade_out_duration: secs(entry.fade_out_secs),
            };
            if let Err(e) =
                registry.bind_music(EventKey::from(entry.key.as_str()), group, transition)
            {
                tracing::warn!("{}", e);
            }
        }

        tracing::debug!(
            groups = registry.groups.len(),
            effects = registry.effects.len(),
            ambience = registry.ambience.len(),
            music = registry.music.len(),
            "Event registry built"
        );
        registry
    }

    /// Add a selection group, returning its id
    pub fn add_group(&mut self, group: SelectionGroup) -> GroupId {
        self.groups.push(group);
        GroupId(self.groups.len() - 1)
    }

    /// Bind an effect or ambience event to one or more groups
    pub fn bind(
        &mut self,
        category: Category,
        key: EventKey,
        groups: Vec<GroupId>,
    ) -> Result<(), AudioError> {
        if groups.is_empty() {
            return Err(AudioError::Configuration(format!(
                "{category} event '{key}' has no usable groups"
            )));
        }
        let table = match category {
            Category::Effect => &mut self.effects,
            Category::Ambience => &mut self.ambience,
            Category::Music => {
                return Err(AudioError::Configuration(format!(
                    "music event '{key}' must be bound with bind_music"
                )))
            }
        };
        if table.contains_key(&key) {
            return Err(AudioError::Configuration(format!(
                "duplicate {category} binding for '{key}', keeping the first"
            )));
        }
        table.insert(key, groups);
        Ok(())
    }

    /// Bind a music event to exactly one group
    pub fn bind_music(
        &mut self,
        key: EventKey,
        group: GroupId,
        transition: MusicTransition,
    ) -> Result<(), AudioError> {
        if self.music.contains_key(&key) {
            return Err(AudioError::Configuration(format!(
                "duplicate music binding for '{key}', keeping the first"
            )));
        }
        self.music.insert(key, MusicBinding { group, transition });
        Ok(())
    }

    /// Groups bound to an effect or ambience event
    pub fn groups_for(&self, category: Category, key: &EventKey) -> Option<&[GroupId]> {
        let table = match category {
            Category::Effect => &self.effects,
            Category::Ambience => &self.ambience,
            Category::Music => return None,
        };
        table.get(key).map(Vec::as_slice)
    }

    pub fn music(&self, key: &EventKey) -> Option<&MusicBinding> {
        self.music.get(key)
    }

    pub fn group(&self, id: GroupId) -> Option<&SelectionGroup> {
        self.groups.get(id.0)
    }

    /// Select the next asset from a group
    pub fn select<R: Rng + ?Sized>(
        &mut self,
        id: GroupId,
        rng: &mut R,
    ) -> Result<Arc<SoundAsset>, AudioError> {
        let group = self
            .groups
            .get_mut(id.0)
            .ok_or_else(|| AudioError::Configuration(format!("unknown group id {}", id.0)))?;
        group.select_next(rng)
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }
}

fn secs(value: f32) -> Duration {
    Duration::try_from_secs_f32(value.max(0.0)).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_system::{ClipHandle, SelectionPolicy};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn group(name: &str) -> SelectionGroup {
        let asset = Arc::new(SoundAsset::new(ClipHandle::new(name), Category::Effect));
        SelectionGroup::new(name, vec![asset], SelectionPolicy::Sequential).unwrap()
    }

    #[test]
    fn test_duplicate_binding_keeps_first() {
        let mut registry = EventRegistry::new();
        let first = registry.add_group(group("first"));
        let second = registry.add_group(group("second"));
        let key = EventKey::from("hit");

        registry.bind(Category::Effect, key.clone(), vec![first]).unwrap();
        let result = registry.bind(Category::Effect, key.clone(), vec![second]);
        assert!(matches!(result, Err(AudioError::Configuration(_))));
        assert_eq!(registry.groups_for(Category::Effect, &key), Some(&[first][..]));
    }

    #[test]
    fn test_categories_are_partitioned() {
        let mut registry = EventRegistry::new();
        let id = registry.add_group(group("wind"));
        let key = EventKey::from("wind");

        registry.bind(Category::Ambience, key.clone(), vec![id]).unwrap();
        assert!(registry.groups_for(Category::Effect, &key).is_none());
        assert!(registry.groups_for(Category::Ambience, &key).is_some());
    }

    #[test]
    fn test_from_config_skips_bad_entries() {
        let config = EngineConfig::from_json(
            r#"{
                "assets": {
                    "a": { "clip": "a.wav" },
                    "m": { "clip": "m.ogg", "category": "music" }
                },
                "groups": {
                    "g": { "assets": ["a"] },
                    "empty": { "assets": ["nope"] },
                    "tracks": { "assets": ["m"] }
                },
                "effects": [
                    { "key": "one", "groups": ["g", "unknown"] },
                    { "key": "one", "groups": ["g"] },
                    { "key": "two", "groups": ["empty"] }
                ],
                "music": [
                    { "key": "theme", "group": "tracks", "fade_out": true, "fade_out_secs": 3.0 },
                    { "key": "broken", "group": "unknown" }
                ]
            }"#,
        )
        .unwrap();

        let mut registry = EventRegistry::from_config(&config);
        assert_eq!(registry.group_count(), 2);

        let one = EventKey::from("one");
        assert_eq!(registry.groups_for(Category::Effect, &one).map(|g| g.len()), Some(1));
        assert!(registry.groups_for(Category::Effect, &EventKey::from("two")).is_none());
        assert!(registry.music(&EventKey::from("broken")).is_none());

        let theme = *registry.music(&EventKey::from("theme")).unwrap();
        assert!(theme.transition.fade_out);
        assert_eq!(theme.transition.fade_out_duration, Duration::from_secs(3));

        let mut rng = StdRng::seed_from_u64(0);
        let asset = registry.select(theme.group, &mut rng).unwrap();
        assert_eq!(asset.clip.as_str(), "m.ogg");
    }
}

/// Selection groups
///
/// An authored, ordered list of interchangeable assets plus the policy used
/// to pick one of them per request.
use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::asset::SoundAsset;
use crate::error::AudioError;

/// How a group picks its next asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// Walk the list in order, wrapping at the end
    #[default]
    Sequential,

    /// Uniform pick that never repeats the previous index
    RandomNoRepeat,

    /// Always the first entry
    FixedFirst,
}

#[derive(Debug, Clone)]
pub struct SelectionGroup {
    name: String,
    assets: Vec<Arc<SoundAsset>>,
    policy: SelectionPolicy,
    /// Next index for sequential selection
    cursor: usize,
    /// Index returned by the previous random selection
    last_random: Option<usize>,
}

impl SelectionGroup {
    /// Create a group. Fails with `EmptyGroup` when `assets` is empty.
    pub fn new(
        name: impl Into<String>,
        assets: Vec<Arc<SoundAsset>>,
        policy: SelectionPolicy,
    ) -> Result<Self, AudioError> {
        let name = name.into();
        if assets.is_empty() {
            return Err(AudioError::EmptyGroup(name));
        }
        Ok(Self {
            name,
            assets,
            policy,
            cursor: 0,
            last_random: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn policy(&self) -> SelectionPolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn assets(&self) -> &[Arc<SoundAsset>] {
        &self.assets
    }

    /// Current sequential cursor
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Select the next asset according to the group's policy
    pub fn select_next<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
    ) -> Result<Arc<SoundAsset>, AudioError> {
        let index = self.next_index(rng)?;
        Ok(Arc::clone(&self.assets[index]))
    }

    fn next_index<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<usize, AudioError> {
        let len = self.assets.len();
        if len == 0 {
            return Err(AudioError::EmptyGroup(self.name.clone()));
        }

        let index = match self.policy {
            SelectionPolicy::Sequential => {
                let index = self.cursor % len;
                self.cursor = (index + 1) % len;
                index
            }
            SelectionPolicy::RandomNoRepeat => {
                if len == 1 {
                    0
                } else {
                    let mut index = rng.gen_range(0..len);
                    while Some(index) == self.last_random {
                        index = rng.gen_range(0..len);
                    }
                    index
                }
            }
            SelectionPolicy::FixedFirst => 0,
        };

        self.last_random = Some(index);
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_system::{Category, ClipHandle};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn group(size: usize, policy: SelectionPolicy) -> SelectionGroup {
        let assets = (0..size)
            .map(|i| {
                Arc::new(SoundAsset::new(
                    ClipHandle::new(format!("clip_{i}")),
                    Category::Effect,
                ))
            })
            .collect();
        SelectionGroup::new("test", assets, policy).unwrap()
    }

    fn clip_index(asset: &SoundAsset) -> usize {
        asset.clip.as_str()["clip_".len()..].parse().unwrap()
    }

    #[test]
    fn test_empty_group_rejected() {
        let result = SelectionGroup::new("empty", Vec::new(), SelectionPolicy::Sequential);
        assert!(matches!(result, Err(AudioError::EmptyGroup(name)) if name == "empty"));
    }

    #[test]
    fn test_sequential_visits_each_once_per_cycle() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut group = group(5, SelectionPolicy::Sequential);

        for _cycle in 0..3 {
            let picked: Vec<usize> = (0..5)
                .map(|_| clip_index(&group.select_next(&mut rng).unwrap()))
                .collect();
            assert_eq!(picked, vec![0, 1, 2, 3, 4]);
            assert!(group.cursor() < group.len());
        }
    }

    #[test]
    fn test_random_no_repeat_over_many_trials() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut group = group(3, SelectionPolicy::RandomNoRepeat);

        let mut previous = clip_index(&group.select_next(&mut rng).unwrap());
        for _ in 0..10_000 {
            let current = clip_index(&group.select_next(&mut rng).unwrap());
            assert_ne!(current, previous);
            previous = current;
        }
    }

    #[test]
    fn test_random_no_repeat_two_entries_alternates() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut group = group(2, SelectionPolicy::RandomNoRepeat);

        let first = clip_index(&group.select_next(&mut rng).unwrap());
        let second = clip_index(&group.select_next(&mut rng).unwrap());
        let third = clip_index(&group.select_next(&mut rng).unwrap());
        assert_ne!(first, second);
        assert_eq!(first, third);
    }

    #[test]
    fn test_random_single_entry() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut group = group(1, SelectionPolicy::RandomNoRepeat);
        for _ in 0..10 {
            assert_eq!(clip_index(&group.select_next(&mut rng).unwrap()), 0);
        }
    }

    #[test]
    fn test_fixed_first() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut group = group(4, SelectionPolicy::FixedFirst);
        for _ in 0..10 {
            assert_eq!(clip_index(&group.select_next(&mut rng).unwrap()), 0);
        }
    }
}

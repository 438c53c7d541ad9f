//! Difficulty ranges per scene type.

use super::types::SceneType;
use std::collections::HashMap;
use std::ops::RangeInclusive;

/// Lowest difficulty any scene may have.
pub const MIN_DIFFICULTY: u8 = 1;

/// Highest difficulty any scene may have.
pub const MAX_DIFFICULTY: u8 = 10;

/// Inclusive difficulty range allowed for each scene type.
#[derive(Debug, Clone, PartialEq)]
pub struct DifficultyTable {
    ranges: HashMap<SceneType, (u8, u8)>,
}

impl Default for DifficultyTable {
    fn default() -> Self {
        let ranges = HashMap::from([
            (SceneType::Story, (1, 5)),
            (SceneType::Exploration, (2, 7)),
            (SceneType::Social, (1, 6)),
            (SceneType::Combat, (3, 9)),
            (SceneType::Puzzle, (2, 8)),
            (SceneType::Climax, (7, 10)),
        ]);
        Self { ranges }
    }
}

impl DifficultyTable {
    /// Override the range for one scene type. Bounds are clamped to 1-10
    /// and swapped if given in the wrong order.
    pub fn with_range(mut self, scene_type: SceneType, low: u8, high: u8) -> Self {
        let low = low.clamp(MIN_DIFFICULTY, MAX_DIFFICULTY);
        let high = high.clamp(MIN_DIFFICULTY, MAX_DIFFICULTY);
        self.ranges
            .insert(scene_type, (low.min(high), low.max(high)));
        self
    }

    pub fn range(&self, scene_type: SceneType) -> RangeInclusive<u8> {
        let (low, high) = self
            .ranges
            .get(&scene_type)
            .copied()
            .unwrap_or((MIN_DIFFICULTY, MAX_DIFFICULTY));
        low..=high
    }

    pub fn clamp(&self, scene_type: SceneType, difficulty: u8) -> u8 {
        let range = self.range(scene_type);
        difficulty.clamp(*range.start(), *range.end())
    }

    pub fn contains(&self, scene_type: SceneType, difficulty: u8) -> bool {
        self.range(scene_type).contains(&difficulty)
    }
}

//! Configurable random integer generator.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Sum of independent uniform draws plus a fixed offset.
///
/// `Dice::new(5, &[6, 6, 8])` reads as "2d6 + 1d8 + 5", except each die
/// yields `0..sides` rather than `1..=sides`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dice {
    #[serde(default)]
    pub add: i32,
    #[serde(default)]
    pub rolls: Vec<i32>,
}

impl Dice {
    /// Ranges that are not positive are dropped.
    pub fn new(add: i32, rolls: &[i32]) -> Self {
        Self {
            add,
            rolls: rolls.iter().copied().filter(|r| *r > 0).collect(),
        }
    }

    /// A dice that always returns `value`.
    pub fn fixed(value: i32) -> Self {
        Self::new(value, &[])
    }

    pub fn roll<R: Rng + ?Sized>(&self, rng: &mut R) -> i32 {
        self.add
            + self
                .rolls
                .iter()
                .filter(|r| **r > 0)
                .map(|r| rng.gen_range(0..*r))
                .sum::<i32>()
    }

    /// Smallest value `roll` can return.
    pub fn min(&self) -> i32 {
        self.add
    }

    /// One past the largest value `roll` can return.
    pub fn max_exclusive(&self) -> i32 {
        self.add + self.rolls.iter().filter(|r| **r > 0).map(|r| r - 1).sum::<i32>() + 1
    }
}

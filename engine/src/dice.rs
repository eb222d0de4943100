//! Die roller over an injectable randomness source.

use std::fmt;

use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::formula::Die;

/// One die as it landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DieOutcome {
    pub die: Die,
    pub result: u32,
    /// A d20 showing 20.
    pub natural_max: bool,
    /// A d20 showing 1.
    pub natural_min: bool,
    /// Whether the die counts toward the total; dropped dice stay in the
    /// record for display.
    pub kept: bool,
}

impl DieOutcome {
    pub fn new(die: Die, result: u32) -> Self {
        let d20 = die == Die::D20;
        Self {
            die,
            result,
            natural_max: d20 && result == 20,
            natural_min: d20 && result == 1,
            kept: true,
        }
    }

    pub fn with_kept(mut self, kept: bool) -> Self {
        self.kept = kept;
        self
    }
}

enum Source {
    Rng(Box<dyn RngCore + Send>),
    Scripted { faces: Vec<u32>, next: usize },
}

/// Source of die faces. Every draw is independent and uniform over
/// `1..=sides` unless the dice are scripted.
pub struct Dice {
    source: Source,
}

impl Dice {
    pub fn from_seed(seed: u64) -> Self {
        Self::from_rng(ChaCha8Rng::seed_from_u64(seed))
    }

    pub fn from_entropy() -> Self {
        Self::from_rng(ChaCha8Rng::from_entropy())
    }

    pub fn from_rng<R: RngCore + Send + 'static>(rng: R) -> Self {
        Self {
            source: Source::Rng(Box::new(rng)),
        }
    }

    /// Replays `faces` in order, cycling when exhausted. Faces are clamped
    /// into the range of the die being rolled; an empty script always shows 1.
    pub fn from_scripted(faces: Vec<u32>) -> Self {
        Self {
            source: Source::Scripted { faces, next: 0 },
        }
    }

    pub fn roll_one(&mut self, die: Die) -> DieOutcome {
        DieOutcome::new(die, self.face(die.sides()))
    }

    pub fn roll_many(&mut self, die: Die, count: u32) -> Vec<DieOutcome> {
        (0..count).map(|_| self.roll_one(die)).collect()
    }

    pub fn d20(&mut self) -> u32 {
        self.roll_one(Die::D20).result
    }

    fn face(&mut self, sides: u32) -> u32 {
        match &mut self.source {
            Source::Rng(rng) => rng.gen_range(1..=sides),
            Source::Scripted { faces, next } => {
                if faces.is_empty() {
                    return 1;
                }
                let face = faces[*next % faces.len()];
                *next += 1;
                face.clamp(1, sides)
            }
        }
    }
}

impl fmt::Debug for Dice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Source::Rng(_) => f.write_str("Dice(rng)"),
            Source::Scripted { faces, next } => f
                .debug_struct("Dice")
                .field("faces", faces)
                .field("next", next)
                .finish(),
        }
    }
}

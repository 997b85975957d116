// lootgate/src/engine/drawer.rs
//
// Weighted tier draw.
//
// Cumulative boundaries (fixed policy):
//   common      [0.0000, 0.7992)   79.92%
//   rare        [0.7992, 0.9590)   15.98%
//   ultra_rare  [0.9590, 0.9910)    3.20%
//   epic        [0.9910, 0.9974)    0.64%
//   legendary   [0.9974, 1.0000]    0.26%
//
// The random value is always supplied from outside, so a given value maps to
// the same tier every time.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::events::RewardTier;

/// Upper boundary of each tier, ascending. The last boundary must be 1.0.
pub const TIER_BOUNDARIES: [(RewardTier, f64); 5] = [
    (RewardTier::Common,    0.7992),
    (RewardTier::Rare,      0.9590),
    (RewardTier::UltraRare, 0.9910),
    (RewardTier::Epic,      0.9974),
    (RewardTier::Legendary, 1.0),
];

/// Uniform source over [0, 1).
pub trait RandomSource: Send {
    fn next_unit(&mut self) -> f64;
}

pub struct StdRandom {
    rng: StdRng,
}

impl StdRandom {
    pub fn from_entropy() -> Self {
        Self { rng: StdRng::from_entropy() }
    }

    /// Reproducible stream, for replays.
    pub fn seeded(seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed) }
    }
}

impl RandomSource for StdRandom {
    fn next_unit(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RewardDrawer;

impl RewardDrawer {
    pub fn new() -> Self {
        Self
    }

    /// Map `r` to its tier. Out-of-range values are clamped into [0, 1];
    /// NaN counts as 0.
    pub fn draw(&self, r: f64) -> (RewardTier, u64) {
        let r = if r.is_nan() { 0.0 } else { r.clamp(0.0, 1.0) };
        let tier = TIER_BOUNDARIES.iter()
            .find(|(_, upper)| r < *upper)
            .map(|(tier, _)| *tier)
            .unwrap_or(RewardTier::Legendary);
        (tier, tier.points())
    }

    pub fn draw_from(&self, source: &mut dyn RandomSource) -> (f64, RewardTier, u64) {
        let r = source.next_unit();
        let (tier, points) = self.draw(r);
        (r, tier, points)
    }
}

/// Replays a fixed list of values, then repeats the last one.
#[cfg(test)]
pub struct ScriptedRandom {
    values: std::collections::VecDeque<f64>,
    last:   f64,
}

#[cfg(test)]
impl ScriptedRandom {
    pub fn new(values: &[f64]) -> Self {
        Self { values: values.iter().copied().collect(), last: 0.0 }
    }
}

#[cfg(test)]
impl RandomSource for ScriptedRandom {
    fn next_unit(&mut self) -> f64 {
        if let Some(v) = self.values.pop_front() {
            self.last = v;
        }
        self.last
    }
}

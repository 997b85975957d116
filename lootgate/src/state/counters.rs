// lootgate/src/state/counters.rs
//
// Aggregate draw tallies. Never reset, and independent of the ledger.
// Field aliases accept legacy Spanish-keyed counters files.

use serde::{Deserialize, Serialize};

use crate::events::RewardTier;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    #[serde(default, alias = "total_atracos")]
    pub total_draws: u64,
    #[serde(default, alias = "comun")]
    pub common:      u64,
    #[serde(default, alias = "raro")]
    pub rare:        u64,
    #[serde(default, alias = "ultrararo")]
    pub ultra_rare:  u64,
    #[serde(default, alias = "epico")]
    pub epic:        u64,
    #[serde(default, alias = "legendario")]
    pub legendary:   u64,
}

impl Counters {
    pub fn record(&mut self, tier: RewardTier) {
        self.total_draws += 1;
        *self.slot_mut(tier) += 1;
    }

    #[cfg(test)]
    pub fn count(&self, tier: RewardTier) -> u64 {
        match tier {
            RewardTier::Common    => self.common,
            RewardTier::Rare      => self.rare,
            RewardTier::UltraRare => self.ultra_rare,
            RewardTier::Epic      => self.epic,
            RewardTier::Legendary => self.legendary,
        }
    }

    fn slot_mut(&mut self, tier: RewardTier) -> &mut u64 {
        match tier {
            RewardTier::Common    => &mut self.common,
            RewardTier::Rare      => &mut self.rare,
            RewardTier::UltraRare => &mut self.ultra_rare,
            RewardTier::Epic      => &mut self.epic,
            RewardTier::Legendary => &mut self.legendary,
        }
    }
}

// lootgate/src/engine/gate.rs
//
// Cooldown gate.
//
//   Action  — 28s, per user   (throttles one identity's draws)
//   Ranking — 15s, global     (throttles the leaderboard broadcast for everyone)
//
// A timestamp is committed only when the attempt is allowed, so probing
// during the cooldown never pushes the window further out.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::events::UserId;

pub const ACTION_COOLDOWN_SECS:  i64 = 28;
pub const RANKING_COOLDOWN_SECS: i64 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GateKind {
    Action,
    Ranking,
}

impl GateKind {
    pub fn cooldown_secs(self) -> i64 {
        match self {
            Self::Action  => ACTION_COOLDOWN_SECS,
            Self::Ranking => RANKING_COOLDOWN_SECS,
        }
    }

    fn is_global(self) -> bool {
        matches!(self, Self::Ranking)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateDecision {
    pub allowed:        bool,
    pub remaining_secs: i64,
}

#[derive(Debug, Default)]
pub struct RateGate {
    per_user: HashMap<(GateKind, UserId), DateTime<Utc>>,
    global:   HashMap<GateKind, DateTime<Utc>>,
}

impl RateGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check_and_record(&mut self, kind: GateKind, user: &UserId, now: DateTime<Utc>) -> GateDecision {
        let last = if kind.is_global() {
            self.global.get(&kind).copied()
        } else {
            self.per_user.get(&(kind, user.clone())).copied()
        };

        let cooldown_ms = kind.cooldown_secs() * 1000;
        if let Some(last) = last {
            // now < last (clock skew) counts as zero elapsed.
            let elapsed_ms = (now - last).num_milliseconds().max(0);
            if elapsed_ms < cooldown_ms {
                let remaining_secs = (cooldown_ms - elapsed_ms + 999) / 1000;
                debug!(?kind, user = %user, remaining_secs, "cooldown active");
                return GateDecision { allowed: false, remaining_secs };
            }
        }

        if kind.is_global() {
            self.global.insert(kind, now);
        } else {
            self.per_user.insert((kind, user.clone()), now);
        }
        GateDecision { allowed: true, remaining_secs: 0 }
    }

    #[cfg(test)]
    pub fn last_seen(&self, kind: GateKind, user: &UserId) -> Option<DateTime<Utc>> {
        if kind.is_global() {
            self.global.get(&kind).copied()
        } else {
            self.per_user.get(&(kind, user.clone())).copied()
        }
    }
}

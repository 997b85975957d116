// lootgate/src/state/ledger.rs
//
// Per-user cumulative score + leaderboard.
//
// Each entry remembers the order in which its user first scored (`seq`).
// The sequence is persisted with the snapshot, so leaderboard ties resolve
// the same way after a restart.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::events::UserId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub user_id: UserId,
    pub points:  u64,
    pub seq:     u64,
}

/// Immutable copy of the ledger taken right before a reset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerArchive {
    pub archived_at: DateTime<Utc>,
    pub scores:      Vec<LedgerEntry>, // insertion order
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(from = "LedgerSnapshot", into = "LedgerSnapshot")]
pub struct ScoreLedger {
    entries:  HashMap<UserId, LedgerEntry>,
    next_seq: u64,
}

/// On-disk shape: entries in insertion order.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct LedgerSnapshot {
    entries:  Vec<LedgerEntry>,
    next_seq: u64,
}

impl From<LedgerSnapshot> for ScoreLedger {
    fn from(snap: LedgerSnapshot) -> Self {
        let mut next_seq = snap.next_seq;
        let mut entries = HashMap::with_capacity(snap.entries.len());
        for e in snap.entries {
            next_seq = next_seq.max(e.seq.saturating_add(1));
            entries.insert(e.user_id.clone(), e);
        }
        Self { entries, next_seq }
    }
}

impl From<ScoreLedger> for LedgerSnapshot {
    fn from(ledger: ScoreLedger) -> Self {
        Self { entries: ledger.in_insertion_order(), next_seq: ledger.next_seq }
    }
}

impl ScoreLedger {
    #[cfg(test)]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add points and return the user's new total.
    pub fn credit(&mut self, user: &UserId, points: u64) -> u64 {
        let next_seq = &mut self.next_seq;
        let entry = self.entries.entry(user.clone()).or_insert_with(|| {
            let seq = *next_seq;
            *next_seq = next_seq.saturating_add(1);
            LedgerEntry { user_id: user.clone(), points: 0, seq }
        });
        entry.points = entry.points.saturating_add(points);
        entry.points
    }

    #[cfg(test)]
    pub fn total(&self, user: &UserId) -> u64 {
        self.entries.get(user).map(|e| e.points).unwrap_or(0)
    }

    /// Highest scores first; equal scores keep first-insertion order.
    pub fn top_n(&self, n: usize) -> Vec<LedgerEntry> {
        let mut ranked = self.in_insertion_order();
        ranked.sort_by(|a, b| b.points.cmp(&a.points));
        ranked.truncate(n);
        ranked
    }

    /// Snapshot the current scores, then clear them.
    pub fn reset(&mut self, now: DateTime<Utc>) -> LedgerArchive {
        let archive = LedgerArchive { archived_at: now, scores: self.in_insertion_order() };
        self.entries.clear();
        self.next_seq = 0;
        archive
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn in_insertion_order(&self) -> Vec<LedgerEntry> {
        let mut all: Vec<LedgerEntry> = self.entries.values().cloned().collect();
        all.sort_by_key(|e| e.seq);
        all
    }
}

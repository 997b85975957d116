// lootgate/src/state/intervals.rs
//
// Per-user rolling history of inter-action gaps.
//
// Design:
//   - previous accepted action time per user
//   - bounded gap ring (VecDeque, capacity HISTORY_CAP, oldest evicted first)
//   - gaps kept in whole nanoseconds (chrono's resolution), so threshold
//     comparisons see the full gap
//
// Only called for actions the rate gate already approved, so `previous`
// always holds the last *accepted* action time.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::events::UserId;

pub const HISTORY_CAP: usize = 10;
pub const RECENT_WINDOW: usize = 3;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserIntervals {
    pub previous: Option<DateTime<Utc>>,
    pub gaps_ns:  VecDeque<i64>,
}

impl UserIntervals {
    fn push_gap(&mut self, gap_ns: i64) {
        if self.gaps_ns.len() >= HISTORY_CAP {
            self.gaps_ns.pop_front();
        }
        self.gaps_ns.push_back(gap_ns);
    }

    /// Last RECENT_WINDOW gaps, oldest first.
    pub fn recent(&self) -> Vec<i64> {
        let skip = self.gaps_ns.len().saturating_sub(RECENT_WINDOW);
        self.gaps_ns.iter().skip(skip).copied().collect()
    }
}

/// Gap observed for one accepted action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GapInfo {
    pub gap_ns:    i64,
    pub recent_ns: Vec<i64>, // includes gap_ns as its last element
}

pub fn ns_to_secs(ns: i64) -> f64 {
    ns as f64 / 1e9
}

impl GapInfo {
    pub fn gap_secs(&self) -> f64 {
        ns_to_secs(self.gap_ns)
    }

    pub fn recent_secs(&self) -> Vec<f64> {
        self.recent_ns.iter().map(|&g| ns_to_secs(g)).collect()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IntervalTracker {
    users: HashMap<UserId, UserIntervals>,
}

impl IntervalTracker {
    #[cfg(test)]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an accepted action. First-ever action for a user yields None
    /// and appends nothing. A gap that is not positive (clock skew) is
    /// dropped and `previous` is left where it was.
    pub fn record(&mut self, user: &UserId, now: DateTime<Utc>) -> Option<GapInfo> {
        let slot = self.users.entry(user.clone()).or_default();

        let previous = match slot.previous {
            Some(p) => p,
            None => {
                slot.previous = Some(now);
                return None;
            }
        };

        // Only overflows past ~292 years; such a gap is never suspicious.
        let gap_ns = (now - previous).num_nanoseconds().unwrap_or(i64::MAX);
        if gap_ns <= 0 {
            debug!(user = %user, gap_ns, "non-positive gap ignored");
            return None;
        }

        slot.previous = Some(now);
        slot.push_gap(gap_ns);
        Some(GapInfo { gap_ns, recent_ns: slot.recent() })
    }

    #[cfg(test)]
    pub fn history(&self, user: &UserId) -> Vec<i64> {
        self.users.get(user).map(|u| u.gaps_ns.iter().copied().collect()).unwrap_or_default()
    }

    pub fn n_users(&self) -> usize {
        self.users.len()
    }
}

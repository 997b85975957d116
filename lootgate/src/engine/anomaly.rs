// lootgate/src/engine/anomaly.rs
//
// Scripted-timing detector.
//
// The action cooldown is 28s. A human who retries after the cooldown lands
// somewhere past it with reaction-time slack; a script fires the moment the
// gate reopens. Any accepted gap at or under SUSPICION_THRESHOLD_NS (30.1s)
// is flagged. The comparison runs on the full nanosecond gap, so 30.1009s
// is not suspicious.
//
// The detector only records. No penalty is applied; the anomaly log is for
// moderators to review.

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::engine::gate::ACTION_COOLDOWN_SECS;
use crate::events::{AnomalyRecord, UserId};
use crate::state::intervals::{ns_to_secs, GapInfo};

/// Inclusive. Cooldown floor + 2.1s.
pub const SUSPICION_THRESHOLD_NS: i64 = (ACTION_COOLDOWN_SECS * 1000 + 2_100) * 1_000_000;

#[derive(Debug, Default, Clone, Copy)]
pub struct AnomalyDetector;

impl AnomalyDetector {
    pub fn new() -> Self {
        Self
    }

    pub fn is_suspicious(&self, gap_ns: i64) -> bool {
        gap_ns <= SUSPICION_THRESHOLD_NS
    }

    pub fn evaluate(&self, user: &UserId, gap: &GapInfo, now: DateTime<Utc>) -> Option<AnomalyRecord> {
        if !self.is_suspicious(gap.gap_ns) {
            return None;
        }

        let record = AnomalyRecord {
            user_id:          user.clone(),
            gap_secs:         gap.gap_secs(),
            recent_gaps_secs: gap.recent_secs(),
            timestamp:        now,
        };
        warn!(
            user = %user,
            gap_secs = record.gap_secs,
            recent = ?record.recent_gaps_secs,
            threshold_secs = ns_to_secs(SUSPICION_THRESHOLD_NS),
            "scripted timing suspected"
        );
        Some(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const MS: i64 = 1_000_000;

    fn gap(ns: i64) -> GapInfo {
        GapInfo { gap_ns: ns, recent_ns: vec![28_050 * MS, 28_020 * MS, ns] }
    }

    #[test]
    fn test_threshold_constant() {
        assert_eq!(SUSPICION_THRESHOLD_NS, 30_100 * MS);
    }

    #[test]
    fn test_boundary_is_inclusive() {
        let det = AnomalyDetector::new();
        assert!(det.is_suspicious(28_000 * MS));
        assert!(det.is_suspicious(30_100 * MS));
        assert!(!det.is_suspicious(30_100 * MS + 1));
        assert!(!det.is_suspicious(30_101 * MS));
        assert!(!det.is_suspicious(45_000 * MS));
    }

    #[test]
    fn test_sub_millisecond_excess_not_flagged() {
        let t = Utc.with_ymd_and_hms(2024, 7, 7, 22, 15, 0).unwrap();
        let det = AnomalyDetector::new();
        assert!(det.evaluate(&UserId::new("ana"), &gap(30_100_900_000), t).is_none());
    }

    #[test]
    fn test_record_contents() {
        let t = Utc.with_ymd_and_hms(2024, 7, 7, 22, 15, 0).unwrap();
        let det = AnomalyDetector::new();
        let user = UserId::new("Bot42");

        let rec = det.evaluate(&user, &gap(30_100 * MS), t).unwrap();
        assert_eq!(rec.user_id.as_str(), "bot42");
        assert_eq!(rec.gap_secs, 30.1);
        assert_eq!(rec.recent_gaps_secs, vec![28.05, 28.02, 30.1]);
        assert_eq!(rec.timestamp, t);

        assert!(det.evaluate(&user, &gap(30_101 * MS), t).is_none());
    }
}

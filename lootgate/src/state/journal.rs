// lootgate/src/state/journal.rs
//
// Append-only record logs: anomaly flags and legendary drops.
// Entries are never edited, merged or deduplicated.

use serde::{Deserialize, Serialize};

use crate::events::{AnomalyRecord, LegendaryDrop, UserId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Journal<T> {
    entries: Vec<T>,
}

impl<T> Default for Journal<T> {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}

impl<T> Journal<T> {
    pub fn append(&mut self, entry: T) {
        self.entries.push(entry);
    }

    #[cfg(test)]
    pub fn entries(&self) -> &[T] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub type AnomalyLog = Journal<AnomalyRecord>;
pub type LegendaryLog = Journal<LegendaryDrop>;

#[cfg(test)]
impl AnomalyLog {
    pub fn for_user<'a>(&'a self, user: &'a UserId) -> impl Iterator<Item = &'a AnomalyRecord> + 'a {
        self.entries.iter().filter(move |r| &r.user_id == user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_append_keeps_duplicates_in_order() {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let rec = AnomalyRecord {
            user_id: UserId::new("bot"),
            gap_secs: 28.2,
            recent_gaps_secs: vec![28.1, 28.2],
            timestamp: t,
        };
        let mut log = AnomalyLog::default();
        log.append(rec.clone());
        log.append(rec.clone());
        assert_eq!(log.len(), 2);
        assert_eq!(log.for_user(&UserId::new("BOT")).count(), 2);
        assert_eq!(log.for_user(&UserId::new("ana")).count(), 0);

        let json = serde_json::to_string(&log).unwrap();
        assert!(json.starts_with('['));
        let back: AnomalyLog = serde_json::from_str(&json).unwrap();
        assert_eq!(back, log);
    }

    #[test]
    fn test_legendary_log_normalizes_user() {
        let raw = r#"[{"user_id": "Ana", "timestamp": "2024-01-01T00:00:00Z"}]"#;
        let log: LegendaryLog = serde_json::from_str(raw).unwrap();
        assert_eq!(log.entries()[0].user_id.as_str(), "ana");
    }
}

// lootgate/src/engine/session.rs
//
// Session controller — the only entry point into the core.
//
// States: Disabled (startup) ⇄ Enabled, flipped by privileged start/stop.
//
// `handle` runs one inbound event to completion. For the heist action the
// order is fixed:
//
//   1. toggle check     — Disabled → silent ignore
//   2. rate gate        — rejected → wait message, nothing else touched
//   3. interval record  — first-ever action yields no gap
//   4. anomaly check    — gap ≤ 30.1s → append to anomaly log
//   5. reward draw
//   6. ledger credit + counters + legendary log
//   7. snapshot of every store touched above
//
// The controller owns every piece of mutable state; there are no globals.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::engine::anomaly::AnomalyDetector;
use crate::engine::drawer::{RandomSource, RewardDrawer};
use crate::engine::gate::{GateKind, RateGate};
use crate::events::{
    Command, DrawSummary, InboundEvent, LegendaryDrop, Outcome, RewardTier, SideEffects, UserId,
};
use crate::render;
use crate::state::counters::Counters;
use crate::state::intervals::IntervalTracker;
use crate::state::journal::{AnomalyLog, LegendaryLog};
use crate::state::ledger::ScoreLedger;
use crate::store::{self, SnapshotStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemState {
    Disabled,
    Enabled,
}

/// Stores touched while handling one event.
#[derive(Debug, Default, Clone, Copy)]
struct Dirty {
    ledger:    bool,
    anomalies: bool,
    counters:  bool,
    intervals: bool,
    legendary: bool,
}

impl Dirty {
    fn any(&self) -> bool {
        self.ledger || self.anomalies || self.counters || self.intervals || self.legendary
    }
}

pub struct SessionController {
    state:     SystemState,
    gate:      RateGate,
    intervals: IntervalTracker,
    detector:  AnomalyDetector,
    drawer:    RewardDrawer,
    ledger:    ScoreLedger,
    counters:  Counters,
    anomalies: AnomalyLog,
    legendary: LegendaryLog,
    store:     Box<dyn SnapshotStore>,
    random:    Box<dyn RandomSource>,
}

impl SessionController {
    /// Load every store (missing or corrupt → empty) and start Disabled.
    pub fn open(store: Box<dyn SnapshotStore>, random: Box<dyn RandomSource>) -> Self {
        let s = store.as_ref();
        let ledger:    ScoreLedger     = store::load_or_default(s, store::LEDGER);
        let anomalies: AnomalyLog      = store::load_or_default(s, store::ANOMALIES);
        let counters:  Counters        = store::load_or_default(s, store::COUNTERS);
        let intervals: IntervalTracker = store::load_or_default(s, store::INTERVALS);
        let legendary: LegendaryLog    = store::load_or_default(s, store::LEGENDARY);

        info!(
            users = ledger.len(),
            draws = counters.total_draws,
            anomalies = anomalies.len(),
            legendary = legendary.len(),
            "session state restored"
        );

        Self {
            state: SystemState::Disabled,
            gate: RateGate::new(),
            intervals,
            detector: AnomalyDetector::new(),
            drawer: RewardDrawer::new(),
            ledger,
            counters,
            anomalies,
            legendary,
            store,
            random,
        }
    }

    pub fn handle(&mut self, event: &InboundEvent) -> Outcome {
        if event.command.requires_privilege() && !event.is_privileged {
            info!(user = %event.user_id, command = %event.command, "privileged command denied");
            return Outcome::say(render::denied(&event.user_id, event.command));
        }

        match event.command {
            Command::StartSystem   => self.start(),
            Command::StopSystem    => self.stop(),
            Command::ResetRanking  => self.reset_ranking(event.now),
            Command::ShowRanking   => self.show_ranking(&event.user_id, event.now),
            Command::PerformAction => self.perform_action(&event.user_id, event.now),
        }
    }

    // ── Toggle ────────────────────────────────────────────────────────────────

    fn start(&mut self) -> Outcome {
        if self.state == SystemState::Enabled {
            return Outcome::say(render::already_started());
        }
        self.state = SystemState::Enabled;
        info!("heist system enabled");
        Outcome::say(render::system_started())
    }

    fn stop(&mut self) -> Outcome {
        if self.state == SystemState::Disabled {
            return Outcome::say(render::already_stopped());
        }
        self.state = SystemState::Disabled;
        info!("heist system disabled");
        Outcome::say(render::system_stopped())
    }

    // ── Ranking ───────────────────────────────────────────────────────────────

    fn reset_ranking(&mut self, now: DateTime<Utc>) -> Outcome {
        let archive = self.ledger.reset(now);
        let backup  = store::ledger_backup_name(now.timestamp_millis());
        if store::save(self.store.as_ref(), &backup, &archive) {
            info!(backup = %backup, users = archive.scores.len(), "ledger archived");
        } else {
            warn!(backup = %backup, "ledger archive failed, resetting anyway");
        }

        let persisted = self.persist(Dirty { ledger: true, ..Dirty::default() });
        info!("ranking reset");

        let mut out = Outcome::say(render::ranking_reset());
        out.side_effects.persist = persisted;
        out
    }

    fn show_ranking(&mut self, user: &UserId, now: DateTime<Utc>) -> Outcome {
        // Within the global cooldown the request is dropped without a reply.
        if !self.gate.check_and_record(GateKind::Ranking, user, now).allowed {
            return Outcome::silent();
        }
        let top = self.ledger.top_n(render::RANKING_SIZE);
        Outcome {
            response: Some(render::ranking(&top)),
            side_effects: SideEffects { persist: false, broadcast_ranking: true },
            ..Outcome::default()
        }
    }

    // ── Heist ─────────────────────────────────────────────────────────────────

    fn perform_action(&mut self, user: &UserId, now: DateTime<Utc>) -> Outcome {
        if self.state == SystemState::Disabled {
            debug!(user = %user, "heist ignored while disabled");
            return Outcome::silent();
        }

        let gate = self.gate.check_and_record(GateKind::Action, user, now);
        if !gate.allowed {
            return Outcome::say(render::cooldown(user, gate.remaining_secs));
        }

        let mut dirty = Dirty { intervals: true, ..Dirty::default() };

        let gap = self.intervals.record(user, now);
        let anomaly = gap.as_ref().and_then(|g| self.detector.evaluate(user, g, now));
        if let Some(ref record) = anomaly {
            self.anomalies.append(record.clone());
            dirty.anomalies = true;
        }

        let (roll, tier, points) = self.drawer.draw_from(self.random.as_mut());
        let total = self.ledger.credit(user, points);
        self.counters.record(tier);
        dirty.ledger   = true;
        dirty.counters = true;

        if tier == RewardTier::Legendary {
            self.legendary.append(LegendaryDrop { user_id: user.clone(), timestamp: now });
            dirty.legendary = true;
        }

        let persisted = self.persist(dirty);

        info!(
            user = %user,
            %tier,
            roll,
            points,
            total,
            gap_secs = ?gap.as_ref().map(|g| g.gap_secs()),
            flagged = anomaly.is_some(),
            "heist drawn"
        );

        Outcome {
            response: Some(render::draw(user, tier, points, total)),
            side_effects: SideEffects { persist: persisted, broadcast_ranking: false },
            draw: Some(DrawSummary { tier, points, new_total: total }),
            anomaly,
        }
    }

    // ── Persistence ───────────────────────────────────────────────────────────

    /// Best-effort snapshot of every dirty store. Returns true only if every
    /// save succeeded; failures leave the in-memory state authoritative.
    fn persist(&self, dirty: Dirty) -> bool {
        if !dirty.any() {
            return true;
        }
        let s = self.store.as_ref();
        let mut failed: Vec<&str> = Vec::new();
        let mut note = |name: &'static str, ok: bool| if !ok { failed.push(name) };
        if dirty.ledger    { note(store::LEDGER, store::save(s, store::LEDGER, &self.ledger)); }
        if dirty.anomalies { note(store::ANOMALIES, store::save(s, store::ANOMALIES, &self.anomalies)); }
        if dirty.counters  { note(store::COUNTERS, store::save(s, store::COUNTERS, &self.counters)); }
        if dirty.intervals { note(store::INTERVALS, store::save(s, store::INTERVALS, &self.intervals)); }
        if dirty.legendary { note(store::LEGENDARY, store::save(s, store::LEGENDARY, &self.legendary)); }

        if failed.is_empty() {
            return true;
        }
        warn!(stores = ?failed, "snapshot incomplete, continuing from memory");
        false
    }

    // ── Queries ───────────────────────────────────────────────────────────────

    pub fn state(&self) -> SystemState { self.state }
    pub fn ledger(&self) -> &ScoreLedger { &self.ledger }
    pub fn counters(&self) -> &Counters { &self.counters }
    pub fn anomalies(&self) -> &AnomalyLog { &self.anomalies }
    pub fn legendary(&self) -> &LegendaryLog { &self.legendary }
    pub fn intervals(&self) -> &IntervalTracker { &self.intervals }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::{Duration, TimeZone};

    use crate::engine::drawer::ScriptedRandom;
    use crate::store::{MemoryStore, StoreError};

    const COMMON: f64 = 0.10;
    const LEGENDARY: f64 = 0.9980;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 8, 20, 23, 0, 0).unwrap()
    }

    fn ev(user: &str, command: Command, at: DateTime<Utc>, privileged: bool) -> InboundEvent {
        InboundEvent { user_id: UserId::new(user), command, now: at, is_privileged: privileged }
    }

    fn controller(rolls: &[f64]) -> (SessionController, Arc<MemoryStore>) {
        let mem = Arc::new(MemoryStore::new());
        let ctl = SessionController::open(
            Box::new(Arc::clone(&mem)),
            Box::new(ScriptedRandom::new(rolls)),
        );
        (ctl, mem)
    }

    fn enabled(rolls: &[f64]) -> (SessionController, Arc<MemoryStore>) {
        let (mut ctl, mem) = controller(rolls);
        ctl.handle(&ev("mod", Command::StartSystem, t0(), true));
        (ctl, mem)
    }

    struct FailingStore;

    impl SnapshotStore for FailingStore {
        fn load_raw(&self, name: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::Io {
                name: name.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
            })
        }

        fn save_raw(&self, name: &str, _body: &str) -> Result<(), StoreError> {
            self.load_raw(name).map(|_| ())
        }
    }

    #[test]
    fn test_starts_disabled_and_ignores_action() {
        let (mut ctl, mem) = controller(&[COMMON]);
        assert_eq!(ctl.state(), SystemState::Disabled);

        let out = ctl.handle(&ev("ana", Command::PerformAction, t0(), false));
        assert!(out.is_silent());
        assert_eq!(out.side_effects, SideEffects::default());
        assert!(ctl.ledger().is_empty());
        assert!(mem.names().is_empty());
    }

    #[test]
    fn test_toggle_transitions() {
        let (mut ctl, _) = controller(&[COMMON]);

        let out = ctl.handle(&ev("mod", Command::StartSystem, t0(), true));
        assert_eq!(out.response.as_deref(), Some(render::system_started().as_str()));
        assert_eq!(ctl.state(), SystemState::Enabled);

        let out = ctl.handle(&ev("mod", Command::StartSystem, t0(), true));
        assert_eq!(out.response, Some(render::already_started()));
        assert_eq!(ctl.state(), SystemState::Enabled);

        let out = ctl.handle(&ev("mod", Command::StopSystem, t0(), true));
        assert_eq!(out.response, Some(render::system_stopped()));

        let out = ctl.handle(&ev("mod", Command::StopSystem, t0(), true));
        assert_eq!(out.response, Some(render::already_stopped()));
        assert_eq!(ctl.state(), SystemState::Disabled);
    }

    #[test]
    fn test_non_privileged_gets_denial() {
        let (mut ctl, _) = controller(&[COMMON]);
        for cmd in [Command::StartSystem, Command::StopSystem, Command::ResetRanking] {
            let out = ctl.handle(&ev("viewer", cmd, t0(), false));
            assert_eq!(out.response, Some(render::denied(&UserId::new("viewer"), cmd)));
        }
        assert_eq!(ctl.state(), SystemState::Disabled);
    }

    #[test]
    fn test_ana_rejected_within_cooldown() {
        let (mut ctl, mem) = enabled(&[COMMON, COMMON]);

        let first = ctl.handle(&ev("ana", Command::PerformAction, t0(), false));
        assert_eq!(first.draw.map(|d| d.new_total), Some(1));
        let intervals_before = mem.get(store::INTERVALS);

        let second = ctl.handle(&ev("Ana", Command::PerformAction, t0() + Duration::seconds(10), false));
        assert_eq!(second.response, Some(render::cooldown(&UserId::new("ana"), 18)));
        assert!(second.draw.is_none());
        assert!(second.anomaly.is_none());
        assert!(!second.side_effects.persist);

        assert_eq!(ctl.ledger().total(&UserId::new("ana")), 1);
        assert_eq!(ctl.counters().total_draws, 1);
        assert!(ctl.intervals().history(&UserId::new("ana")).is_empty());
        assert!(ctl.anomalies().is_empty());
        assert_eq!(mem.get(store::INTERVALS), intervals_before);
    }

    #[test]
    fn test_bob_legendary_and_anomaly() {
        let (mut ctl, mem) = enabled(&[COMMON, LEGENDARY, LEGENDARY]);
        let bob = UserId::new("bob");

        let first = ctl.handle(&ev("bob", Command::PerformAction, t0(), false));
        assert!(first.anomaly.is_none());

        // 29s after the last accepted action: accepted, and ≤ 30.1s.
        let t1 = t0() + Duration::seconds(29);
        let out = ctl.handle(&ev("bob", Command::PerformAction, t1, false));
        assert_eq!(out.draw, Some(DrawSummary { tier: RewardTier::Legendary, points: 500, new_total: 501 }));
        assert!(out.side_effects.persist);
        let rec = out.anomaly.expect("29s gap should be flagged");
        assert_eq!(rec.gap_secs, 29.0);
        assert_eq!(rec.recent_gaps_secs, vec![29.0]);
        assert_eq!(ctl.counters().legendary, 1);
        assert_eq!(ctl.legendary().len(), 1);
        assert_eq!(ctl.anomalies().len(), 1);

        // A relaxed 45s gap: legendary again, not flagged.
        let out = ctl.handle(&ev("bob", Command::PerformAction, t1 + Duration::seconds(45), false));
        assert!(out.anomaly.is_none());
        assert_eq!(ctl.ledger().total(&bob), 1001);
        assert_eq!(ctl.counters().legendary, 2);
        assert_eq!(ctl.anomalies().len(), 1);

        let saved: Counters = store::load_or_default(mem.as_ref(), store::COUNTERS);
        assert_eq!(saved.legendary, 2);
        assert_eq!(saved.total_draws, 3);
    }

    #[test]
    fn test_first_action_never_flagged() {
        let (mut ctl, _) = enabled(&[COMMON]);
        let out = ctl.handle(&ev("new", Command::PerformAction, t0(), false));
        assert!(out.anomaly.is_none());
        assert!(ctl.intervals().history(&UserId::new("new")).is_empty());
    }

    #[test]
    fn test_ranking_global_cooldown_is_silent() {
        let (mut ctl, _) = enabled(&[COMMON]);

        let out = ctl.handle(&ev("ana", Command::ShowRanking, t0(), false));
        assert!(out.side_effects.broadcast_ranking);
        assert!(out.response.unwrap().starts_with("No scores recorded yet"));

        let out = ctl.handle(&ev("bob", Command::ShowRanking, t0() + Duration::seconds(14), false));
        assert!(out.is_silent());
        assert!(!out.side_effects.broadcast_ranking);

        ctl.handle(&ev("bob", Command::PerformAction, t0() + Duration::seconds(14), false));
        let out = ctl.handle(&ev("bob", Command::ShowRanking, t0() + Duration::seconds(15), false));
        assert_eq!(out.response.as_deref(), Some("Top 1 players: 1. bob (1 points)"));
    }

    #[test]
    fn test_ranking_works_while_disabled() {
        let (mut ctl, _) = controller(&[COMMON]);
        let out = ctl.handle(&ev("ana", Command::ShowRanking, t0(), false));
        assert!(out.response.is_some());
    }

    #[test]
    fn test_reset_archives_and_keeps_toggle() {
        let (mut ctl, mem) = enabled(&[LEGENDARY, COMMON]);
        ctl.handle(&ev("ana", Command::PerformAction, t0(), false));
        ctl.handle(&ev("bob", Command::PerformAction, t0(), false));

        let at = t0() + Duration::minutes(5);
        let out = ctl.handle(&ev("mod", Command::ResetRanking, at, true));
        assert_eq!(out.response, Some(render::ranking_reset()));
        assert_eq!(ctl.state(), SystemState::Enabled);
        assert!(ctl.ledger().is_empty());
        assert_eq!(ctl.counters().total_draws, 2);

        let backup = store::ledger_backup_name(at.timestamp_millis());
        let archive: crate::state::ledger::LedgerArchive =
            serde_json::from_str(&mem.get(&backup).unwrap()).unwrap();
        assert_eq!(archive.archived_at, at);
        let scores: Vec<(String, u64)> = archive.scores.iter()
            .map(|e| (e.user_id.to_string(), e.points))
            .collect();
        assert_eq!(scores, vec![("ana".to_string(), 500), ("bob".to_string(), 1)]);

        let saved: ScoreLedger = store::load_or_default(mem.as_ref(), store::LEDGER);
        assert!(saved.is_empty());
    }

    #[test]
    fn test_state_survives_restart() {
        let (mut ctl, mem) = enabled(&[COMMON, COMMON]);
        ctl.handle(&ev("ana", Command::PerformAction, t0(), false));
        ctl.handle(&ev("ana", Command::PerformAction, t0() + Duration::seconds(28), false));
        drop(ctl);

        let mut ctl = SessionController::open(
            Box::new(Arc::clone(&mem)),
            Box::new(ScriptedRandom::new(&[COMMON])),
        );
        assert_eq!(ctl.state(), SystemState::Disabled);
        assert_eq!(ctl.ledger().total(&UserId::new("ana")), 2);
        assert_eq!(ctl.anomalies().len(), 1);
        assert_eq!(ctl.intervals().history(&UserId::new("ana")), vec![28_000_000_000]);

        // The restored previous time still feeds the next gap.
        ctl.handle(&ev("mod", Command::StartSystem, t0(), true));
        let out = ctl.handle(&ev("ana", Command::PerformAction, t0() + Duration::seconds(58), false));
        assert_eq!(out.anomaly.map(|a| a.gap_secs), Some(30.0));
    }

    #[test]
    fn test_failing_store_is_not_fatal() {
        let mut ctl = SessionController::open(
            Box::new(FailingStore),
            Box::new(ScriptedRandom::new(&[LEGENDARY])),
        );
        ctl.handle(&ev("mod", Command::StartSystem, t0(), true));
        let out = ctl.handle(&ev("ana", Command::PerformAction, t0(), false));
        assert_eq!(out.draw.map(|d| d.points), Some(500));
        assert!(!out.side_effects.persist);
        assert_eq!(ctl.ledger().total(&UserId::new("ana")), 500);

        let out = ctl.handle(&ev("mod", Command::ResetRanking, t0(), true));
        assert_eq!(out.response, Some(render::ranking_reset()));
        assert!(!out.side_effects.persist);
        assert!(ctl.ledger().is_empty());
    }

    #[test]
    fn test_persist_flag_reflects_successful_saves() {
        let (mut ctl, _) = enabled(&[COMMON]);
        let out = ctl.handle(&ev("ana", Command::PerformAction, t0(), false));
        assert!(out.side_effects.persist);

        let out = ctl.handle(&ev("mod", Command::ResetRanking, t0(), true));
        assert!(out.side_effects.persist);
    }

    #[test]
    fn test_gap_just_over_threshold_not_flagged() {
        let (mut ctl, _) = enabled(&[COMMON, COMMON, COMMON]);
        ctl.handle(&ev("ana", Command::PerformAction, t0(), false));

        let t1 = t0() + Duration::microseconds(30_100_900);
        let out = ctl.handle(&ev("ana", Command::PerformAction, t1, false));
        assert!(out.draw.is_some());
        assert!(out.anomaly.is_none());
        assert!(ctl.anomalies().is_empty());

        let out = ctl.handle(&ev("ana", Command::PerformAction, t1 + Duration::milliseconds(30_100), false));
        assert_eq!(out.anomaly.map(|a| a.gap_secs), Some(30.1));
    }

    #[test]
    fn test_corrupt_snapshot_reinitialized() {
        let mem = Arc::new(MemoryStore::new());
        mem.put(store::LEDGER, "{{{");
        mem.put(store::COUNTERS, r#"{"total_atracos": 4, "comun": 4}"#);
        let ctl = SessionController::open(
            Box::new(Arc::clone(&mem)),
            Box::new(ScriptedRandom::new(&[COMMON])),
        );
        assert!(ctl.ledger().is_empty());
        assert_eq!(ctl.counters().total_draws, 4);
    }
}

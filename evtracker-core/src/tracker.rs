//! The `Tracker` façade: one selected machine, its live session and its
//! cumulative totals, persisted through a [`TrackerStorage`] after every
//! accepted transition.
use crate::calculator::{self, CalculationResult, MidCheckReport};
use crate::error::{CalcError, TrackerError};
use crate::machine::{Machine, OutcomeKind};
use crate::numbers::u64_to_f64;
use crate::session::{SessionPhase, SessionState, counter_at_least};
use crate::spin_log::{LogAggregates, SpinLogEntry};
use crate::totals::CumulativeTotals;
use crate::{MachineCatalog, TrackerStorage};

/// Drives the session engine and calculator for the selected machine.
///
/// Persistence is best effort: a failed write is logged, remembered in
/// [`Tracker::last_persist_error`] and otherwise ignored, so the in-memory
/// state stays authoritative.
pub struct Tracker<S>
where
    S: TrackerStorage,
{
    machines: Vec<Machine>,
    storage: S,
    selected: usize,
    session: SessionState,
    totals: CumulativeTotals,
    last_result: Option<CalculationResult>,
    last_persist_error: Option<String>,
}

impl<S> Tracker<S>
where
    S: TrackerStorage,
{
    /// Build a tracker, restoring the previously selected machine (or the
    /// first catalog entry) together with its saved totals and session.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be read or is empty.
    pub fn new<C: MachineCatalog>(catalog: &C, storage: S) -> Result<Self, TrackerError> {
        let machines = load_machines(catalog)?;
        let saved = load_or_warn("selected machine", storage.load_selected_machine());
        let selected = saved
            .and_then(|id| machines.iter().position(|m| m.id == id))
            .unwrap_or(0);
        Ok(Self::activate(machines, storage, selected))
    }

    /// Build a tracker on `machine_id` without changing the persisted selection.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be read, is empty, or has no
    /// machine with that id.
    pub fn with_machine<C: MachineCatalog>(
        catalog: &C,
        storage: S,
        machine_id: &str,
    ) -> Result<Self, TrackerError> {
        let machines = load_machines(catalog)?;
        let selected = machines
            .iter()
            .position(|m| m.id == machine_id)
            .ok_or_else(|| TrackerError::UnknownMachine(machine_id.to_string()))?;
        Ok(Self::activate(machines, storage, selected))
    }

    fn activate(machines: Vec<Machine>, storage: S, selected: usize) -> Self {
        let mut tracker = Self {
            machines,
            storage,
            selected,
            session: SessionState::new(),
            totals: CumulativeTotals::default(),
            last_result: None,
            last_persist_error: None,
        };
        tracker.load_selected_state();
        tracker
    }

    fn load_selected_state(&mut self) {
        let id = self.machines[self.selected].id.clone();
        self.totals =
            load_or_warn("cumulative totals", self.storage.load_totals(&id)).unwrap_or_default();
        self.session = load_or_warn("session", self.storage.load_session(&id))
            .filter(|session| {
                let consistent = session.is_consistent();
                if !consistent {
                    log::warn!("ignoring inconsistent session snapshot for `{id}`");
                }
                consistent
            })
            .unwrap_or_default();
        self.last_result = None;
        log::debug!("machine `{id}` active ({} log rows restored)", self.session.spin_log.len());
    }

    /// Switch to `machine_id`, persisting the choice and loading that
    /// machine's own totals and session.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::UnknownMachine`] when the id is not in the catalog.
    pub fn select_machine(&mut self, machine_id: &str) -> Result<&Machine, TrackerError> {
        let selected = self
            .machines
            .iter()
            .position(|m| m.id == machine_id)
            .ok_or_else(|| TrackerError::UnknownMachine(machine_id.to_string()))?;
        self.selected = selected;
        let result = self.storage.save_selected_machine(machine_id);
        self.note_persist("selected machine", result);
        self.load_selected_state();
        Ok(self.machine())
    }

    #[must_use]
    pub fn machines(&self) -> &[Machine] {
        &self.machines
    }

    #[must_use]
    pub fn machine(&self) -> &Machine {
        &self.machines[self.selected]
    }

    #[must_use]
    pub const fn session(&self) -> &SessionState {
        &self.session
    }

    #[must_use]
    pub fn log(&self) -> &[SpinLogEntry] {
        &self.session.spin_log
    }

    #[must_use]
    pub fn aggregates(&self) -> LogAggregates {
        self.session.aggregates()
    }

    #[must_use]
    pub const fn totals(&self) -> &CumulativeTotals {
        &self.totals
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.session.phase()
    }

    #[must_use]
    pub const fn last_result(&self) -> Option<&CalculationResult> {
        self.last_result.as_ref()
    }

    /// Description of the most recent failed write, if any.
    #[must_use]
    pub fn last_persist_error(&self) -> Option<&str> {
        self.last_persist_error.as_deref()
    }

    #[must_use]
    pub const fn storage(&self) -> &S {
        &self.storage
    }

    /// # Errors
    ///
    /// See [`SessionState::start`].
    pub fn start_session(&mut self, counter: f64) -> Result<(), TrackerError> {
        self.session.start(counter)?;
        self.persist_session();
        Ok(())
    }

    /// # Errors
    ///
    /// See [`SessionState::record_hit`].
    pub fn record_hit(&mut self, counter: f64) -> Result<(), TrackerError> {
        self.session.record_hit(counter)?;
        self.persist_session();
        Ok(())
    }

    /// # Errors
    ///
    /// See [`SessionState::confirm_outcome`].
    pub fn confirm_outcome(&mut self, kind: OutcomeKind) -> Result<(), TrackerError> {
        self.session
            .confirm_outcome(kind, &self.machines[self.selected])?;
        self.persist_session();
        Ok(())
    }

    /// # Errors
    ///
    /// See [`SessionState::confirm_payout`].
    pub fn confirm_payout(&mut self, displayed: f64) -> Result<(), TrackerError> {
        self.session
            .confirm_payout(displayed, &self.machines[self.selected])?;
        self.persist_session();
        Ok(())
    }

    /// # Errors
    ///
    /// See [`SessionState::record_stop`].
    pub fn record_stop(&mut self, counter: Option<f64>) -> Result<(), TrackerError> {
        self.session.record_stop(counter)?;
        self.persist_session();
        Ok(())
    }

    /// # Errors
    ///
    /// See [`SessionState::confirm_end_balance`].
    pub fn confirm_end_balance(&mut self, balls: f64) -> Result<(), TrackerError> {
        self.session.confirm_end_balance(balls)?;
        self.persist_session();
        Ok(())
    }

    /// # Errors
    ///
    /// See [`SessionState::undo_last`].
    pub fn undo_last(&mut self) -> Result<(), TrackerError> {
        self.session.undo_last()?;
        self.persist_session();
        Ok(())
    }

    /// Add to the confirmed investment, returning the new session total in yen.
    ///
    /// # Errors
    ///
    /// See [`SessionState::confirm_investment`].
    pub fn confirm_investment(&mut self, yen: f64) -> Result<u64, TrackerError> {
        let total = self.session.confirm_investment(yen)?;
        self.persist_session();
        Ok(total)
    }

    /// Run the calculation on the closed session, fold it into the machine's
    /// totals and return the session to idle.
    ///
    /// # Errors
    ///
    /// Returns the first unmet calculation precondition; nothing changes in that case.
    pub fn finalize_calculation(&mut self) -> Result<CalculationResult, TrackerError> {
        let result = calculator::calculate(&self.session, &self.machines[self.selected])?;

        self.totals.fold(&result);
        self.persist_totals();
        self.session.reset();
        self.clear_session_record();
        log::info!(
            "session finalized on `{}`: {} spins, rate {:.2}, expected {} balls",
            self.machine().id,
            result.spins,
            result.rotation_rate,
            result.expected_balls
        );
        self.last_result = Some(result.clone());
        Ok(result)
    }

    /// Live rotation-rate feedback without touching any state.
    ///
    /// `typed` is used when it is a valid counter reading; otherwise `prompt`
    /// is asked for one, given the minimum acceptable value. A prompt that
    /// returns `None` cancels the check.
    ///
    /// # Errors
    ///
    /// Rejects an invalid prompted reading, and fails when no spins or no
    /// consumption have accumulated yet.
    pub fn mid_session_check<F>(
        &self,
        typed: Option<f64>,
        prompt: F,
    ) -> Result<Option<MidCheckReport>, TrackerError>
    where
        F: FnOnce(u64) -> Option<f64>,
    {
        if !self.session.has_started {
            return Err(CalcError::NoSpins.into());
        }
        let min = self.session.next_start_counter;
        let reading = match typed.filter(|v| v.is_finite() && *v >= u64_to_f64(min)) {
            Some(value) => value,
            None => match prompt(min) {
                Some(value) => value,
                None => {
                    log::debug!("mid-session check cancelled");
                    return Ok(None);
                }
            },
        };
        let counter = counter_at_least(reading, min)?;
        let report = calculator::mid_session_check(&self.session, self.machine(), counter)?;
        Ok(Some(report))
    }

    /// Clear the day's log and investment; cumulative totals stay.
    pub fn reset_daily_log(&mut self) {
        self.session.reset();
        self.last_result = None;
        self.clear_session_record();
        log::info!("daily log reset on `{}`", self.machine().id);
    }

    /// Zero this machine's cumulative totals and clear its session.
    pub fn reset_cumulative_totals(&mut self) {
        self.totals = CumulativeTotals::default();
        self.persist_totals();
        self.session.reset();
        self.last_result = None;
        self.clear_session_record();
        log::info!("cumulative totals reset on `{}`", self.machine().id);
    }

    fn persist_session(&mut self) {
        let result = self
            .storage
            .save_session(&self.machines[self.selected].id, &self.session);
        self.note_persist("session", result);
    }

    fn persist_totals(&mut self) {
        let result = self
            .storage
            .save_totals(&self.machines[self.selected].id, &self.totals);
        self.note_persist("cumulative totals", result);
    }

    fn clear_session_record(&mut self) {
        let result = self
            .storage
            .clear_session(&self.machines[self.selected].id);
        self.note_persist("session", result);
    }

    fn note_persist(&mut self, what: &str, result: Result<(), S::Error>) {
        if let Err(err) = result {
            log::warn!("failed to persist {what}: {err}");
            self.last_persist_error = Some(format!("failed to persist {what}: {err}"));
        }
    }
}

fn load_machines<C: MachineCatalog>(catalog: &C) -> Result<Vec<Machine>, TrackerError> {
    let configs = catalog
        .machines()
        .map_err(|err| TrackerError::Catalog(anyhow::Error::new(err)))?;
    if configs.is_empty() {
        return Err(TrackerError::EmptyCatalog);
    }
    Ok(configs.iter().map(crate::MachineConfig::normalize).collect())
}

fn load_or_warn<T, E: std::fmt::Display>(what: &str, result: Result<Option<T>, E>) -> Option<T> {
    result.unwrap_or_else(|err| {
        log::warn!("failed to load {what}, starting fresh: {err}");
        None
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SessionError;
    use crate::machine::{FixedPayout, MachineConfig, RestartTable, StaticCatalog};
    use crate::storage::{MemoryStorage, session_key, totals_key};
    use std::cell::Cell;
    use std::io;

    fn config(id: &str, rush_restart: u64) -> MachineConfig {
        MachineConfig {
            id: id.to_string(),
            name: id.to_uppercase(),
            per_spin_pay_balls: 14.85,
            cost_per_1k_balls: None,
            border: [(28, 18.0)].into_iter().collect(),
            jackpot: Some("1/199".to_string()),
            rush_entry: None,
            hit_options: None,
            restart: RestartTable {
                tan: Some(0),
                rush_end: Some(rush_restart),
                lt_end: None,
                charge: None,
            },
            tan_payout: Some(FixedPayout { disp: 400, net: 360 }),
            charge_payout: None,
            payout_rule: None,
        }
    }

    fn catalog() -> StaticCatalog {
        StaticCatalog::new(vec![config("alpha", 64), config("beta", 100)])
    }

    fn play_simple_session<S: TrackerStorage>(tracker: &mut Tracker<S>) {
        tracker.start_session(1000.0).unwrap();
        tracker.record_hit(1100.0).unwrap();
        tracker.confirm_outcome(OutcomeKind::Tan).unwrap();
        tracker.record_stop(Some(50.0)).unwrap();
        tracker.confirm_end_balance(200.0).unwrap();
        tracker.confirm_investment(3000.0).unwrap();
    }

    #[derive(Debug, Default)]
    struct FailingStorage;

    impl TrackerStorage for FailingStorage {
        type Error = io::Error;

        fn load_totals(&self, _: &str) -> Result<Option<CumulativeTotals>, Self::Error> {
            Err(io::Error::other("store unavailable"))
        }

        fn save_totals(&self, _: &str, _: &CumulativeTotals) -> Result<(), Self::Error> {
            Err(io::Error::other("quota exceeded"))
        }

        fn load_session(&self, _: &str) -> Result<Option<SessionState>, Self::Error> {
            Err(io::Error::other("store unavailable"))
        }

        fn save_session(&self, _: &str, _: &SessionState) -> Result<(), Self::Error> {
            Err(io::Error::other("quota exceeded"))
        }

        fn clear_session(&self, _: &str) -> Result<(), Self::Error> {
            Err(io::Error::other("quota exceeded"))
        }

        fn load_selected_machine(&self) -> Result<Option<String>, Self::Error> {
            Err(io::Error::other("store unavailable"))
        }

        fn save_selected_machine(&self, _: &str) -> Result<(), Self::Error> {
            Err(io::Error::other("quota exceeded"))
        }
    }

    #[test]
    fn every_transition_is_persisted() {
        let storage = MemoryStorage::new();
        let mut tracker = Tracker::new(&catalog(), storage.clone()).unwrap();
        tracker.start_session(10.0).unwrap();
        let saved: SessionState =
            serde_json::from_value(storage.raw(&session_key("alpha")).unwrap()).unwrap();
        assert_eq!(&saved, tracker.session());

        tracker.record_hit(40.0).unwrap();
        let saved: SessionState =
            serde_json::from_value(storage.raw(&session_key("alpha")).unwrap()).unwrap();
        assert_eq!(saved.pending_index, Some(0));
    }

    #[test]
    fn rejected_transition_does_not_touch_the_store() {
        let storage = MemoryStorage::new();
        let mut tracker = Tracker::new(&catalog(), storage.clone()).unwrap();
        assert!(matches!(
            tracker.record_hit(5.0),
            Err(TrackerError::Session(SessionError::NotStarted))
        ));
        assert!(!storage.contains(&session_key("alpha")));
    }

    #[test]
    fn finalize_folds_totals_and_returns_to_idle() {
        let storage = MemoryStorage::new();
        let mut tracker = Tracker::new(&catalog(), storage.clone()).unwrap();
        play_simple_session(&mut tracker);

        let result = tracker.finalize_calculation().unwrap();
        assert_eq!(result.spins, 150);
        assert_eq!(tracker.phase(), SessionPhase::Idle);
        assert_eq!(tracker.session(), &SessionState::default());
        assert_eq!(tracker.totals().total_spin, 150);
        assert_eq!(tracker.totals().total_hit_count, 1);
        assert_eq!(tracker.totals().total_expect_balls, result.expected_balls);
        assert_eq!(tracker.last_result(), Some(&result));
        assert!(storage.contains(&totals_key("alpha")));
        assert!(!storage.contains(&session_key("alpha")));
    }

    #[test]
    fn failed_calculation_leaves_everything_intact() {
        let mut tracker = Tracker::new(&catalog(), MemoryStorage::new()).unwrap();
        tracker.start_session(0.0).unwrap();
        tracker.record_stop(Some(30.0)).unwrap();
        let before = tracker.session().clone();
        assert!(matches!(
            tracker.finalize_calculation(),
            Err(TrackerError::Calc(CalcError::EndBalancePending))
        ));
        assert_eq!(tracker.session(), &before);
        assert_eq!(tracker.totals(), &CumulativeTotals::default());
    }

    #[test]
    fn selection_is_restored_with_its_session() {
        let storage = MemoryStorage::new();
        {
            let mut tracker = Tracker::new(&catalog(), storage.clone()).unwrap();
            assert_eq!(tracker.machine().id, "alpha");
            tracker.select_machine("beta").unwrap();
            tracker.start_session(77.0).unwrap();
        }
        let tracker = Tracker::new(&catalog(), storage).unwrap();
        assert_eq!(tracker.machine().id, "beta");
        assert_eq!(tracker.log(), &[SpinLogEntry::open(77)]);
    }

    #[test]
    fn one_shot_machine_does_not_change_selection() {
        let storage = MemoryStorage::new();
        let tracker = Tracker::with_machine(&catalog(), storage.clone(), "beta").unwrap();
        assert_eq!(tracker.machine().id, "beta");
        assert_eq!(storage.load_selected_machine().unwrap(), None);
        assert!(matches!(
            Tracker::with_machine(&catalog(), MemoryStorage::new(), "gamma"),
            Err(TrackerError::UnknownMachine(id)) if id == "gamma"
        ));
    }

    #[test]
    fn unknown_machine_and_empty_catalog_are_rejected() {
        let mut tracker = Tracker::new(&catalog(), MemoryStorage::new()).unwrap();
        assert!(matches!(
            tracker.select_machine("gamma"),
            Err(TrackerError::UnknownMachine(_))
        ));
        assert_eq!(tracker.machine().id, "alpha");
        assert!(matches!(
            Tracker::new(&StaticCatalog::default(), MemoryStorage::new()),
            Err(TrackerError::EmptyCatalog)
        ));
    }

    #[test]
    fn mid_check_prompts_only_when_needed() {
        let mut tracker = Tracker::new(&catalog(), MemoryStorage::new()).unwrap();
        tracker.start_session(100.0).unwrap();
        tracker.confirm_investment(1000.0).unwrap();

        let asked = Cell::new(None);
        let report = tracker
            .mid_session_check(Some(145.0), |min| {
                asked.set(Some(min));
                None
            })
            .unwrap()
            .unwrap();
        assert_eq!(asked.get(), None);
        assert_eq!(report.spins, 45);

        let report = tracker
            .mid_session_check(Some(20.0), |min| {
                asked.set(Some(min));
                Some(130.0)
            })
            .unwrap()
            .unwrap();
        assert_eq!(asked.get(), Some(100));
        assert_eq!(report.spins, 30);

        assert_eq!(tracker.mid_session_check(None, |_| None).unwrap(), None);
        assert!(matches!(
            tracker.mid_session_check(None, |_| Some(50.0)),
            Err(TrackerError::Session(SessionError::CounterBelowMinimum { min: 100, .. }))
        ));
    }

    #[test]
    fn resets_clear_the_right_things() {
        let storage = MemoryStorage::new();
        let mut tracker = Tracker::new(&catalog(), storage.clone()).unwrap();
        play_simple_session(&mut tracker);
        tracker.finalize_calculation().unwrap();
        tracker.start_session(5.0).unwrap();

        tracker.reset_daily_log();
        assert_eq!(tracker.phase(), SessionPhase::Idle);
        assert_eq!(tracker.last_result(), None);
        assert_eq!(tracker.totals().total_spin, 150);
        assert!(!storage.contains(&session_key("alpha")));

        tracker.start_session(5.0).unwrap();
        tracker.reset_cumulative_totals();
        assert_eq!(tracker.totals(), &CumulativeTotals::default());
        assert_eq!(tracker.phase(), SessionPhase::Idle);
        assert_eq!(
            storage.load_totals("alpha").unwrap(),
            Some(CumulativeTotals::default())
        );
    }

    #[test]
    fn inconsistent_snapshot_loads_as_a_fresh_session() {
        let storage = MemoryStorage::new();
        storage.insert_raw(
            &session_key("alpha"),
            serde_json::json!({
                "spinLog": [{
                    "from": 0, "to": 0, "add": 0, "nextStart": 0,
                    "label": "start", "payout": null, "payoutDisp": null
                }],
                "pendingIndex": 5,
                "nextStartCounter": 0,
                "hasStarted": true
            }),
        );
        let mut tracker = Tracker::new(&catalog(), storage).unwrap();
        assert_eq!(tracker.session(), &SessionState::default());
        assert!(matches!(
            tracker.confirm_outcome(OutcomeKind::Tan),
            Err(TrackerError::Session(SessionError::NoPendingHit))
        ));
        tracker.start_session(0.0).unwrap();
        assert_eq!(tracker.phase(), SessionPhase::Open);
    }

    #[test]
    fn persistence_failures_are_swallowed() {
        let mut tracker = Tracker::new(&catalog(), FailingStorage).unwrap();
        assert_eq!(tracker.last_persist_error(), None);
        play_simple_session(&mut tracker);
        assert!(
            tracker
                .last_persist_error()
                .is_some_and(|msg| msg.contains("quota exceeded"))
        );
        let result = tracker.finalize_calculation().unwrap();
        assert_eq!(tracker.totals().total_spin, result.spins);
    }
}

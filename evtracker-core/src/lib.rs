//! EV Tracker Core
//!
//! Platform-agnostic session logic for tracking pachinko play: the spin-log
//! state machine, payout conversion, the expectation calculator and the
//! per-machine cumulative totals. Storage and the machine catalog are
//! supplied by the embedding front end through the traits below.

pub mod calculator;
pub mod constants;
pub mod error;
pub mod format;
pub mod machine;
pub mod numbers;
pub mod payout;
pub mod session;
pub mod spin_log;
pub mod storage;
pub mod totals;
pub mod tracker;

// Re-export commonly used types
pub use calculator::{
    CalculationResult, MidCheckReport, RateTier, calculate, expected_balls, invest_balls,
    mid_session_check, rotation_rate,
};
pub use error::{CalcError, SessionError, TrackerError};
pub use format::{fmt_int, fmt_rate1, fmt_rate2, fmt_signed_balls, hit_summary, log_line, log_lines};
pub use machine::{
    FixedPayout, Machine, MachineConfig, OutcomeKind, ParseOutcomeError, PayoutRule, RestartTable,
    StaticCatalog,
};
pub use payout::displayed_to_net;
pub use session::{SessionPhase, SessionState};
pub use spin_log::{EntryLabel, LogAggregates, SpinLogEntry};
pub use storage::MemoryStorage;
pub use totals::{CumulativeTotals, GoalColor, GoalProgress};
pub use tracker::Tracker;

/// Trait for abstracting where machine records come from
/// Platform-specific implementations should provide this
pub trait MachineCatalog {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load every machine record, in display order
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be read or parsed.
    fn machines(&self) -> Result<Vec<MachineConfig>, Self::Error>;
}

/// Trait for abstracting save/load of per-machine state
/// Platform-specific implementations should provide this
pub trait TrackerStorage {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load the cumulative totals of a machine
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn load_totals(&self, machine_id: &str) -> Result<Option<CumulativeTotals>, Self::Error>;

    /// Save the cumulative totals of a machine
    ///
    /// # Errors
    ///
    /// Returns an error if the totals cannot be written.
    fn save_totals(&self, machine_id: &str, totals: &CumulativeTotals) -> Result<(), Self::Error>;

    /// Load the saved session snapshot of a machine
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn load_session(&self, machine_id: &str) -> Result<Option<SessionState>, Self::Error>;

    /// Save the session snapshot of a machine
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be written.
    fn save_session(&self, machine_id: &str, session: &SessionState) -> Result<(), Self::Error>;

    /// Remove the session snapshot of a machine
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be removed.
    fn clear_session(&self, machine_id: &str) -> Result<(), Self::Error>;

    /// Load the id of the last selected machine
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn load_selected_machine(&self) -> Result<Option<String>, Self::Error>;

    /// Remember the selected machine
    ///
    /// # Errors
    ///
    /// Returns an error if the id cannot be written.
    fn save_selected_machine(&self, machine_id: &str) -> Result<(), Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    struct FixtureCatalog;

    impl MachineCatalog for FixtureCatalog {
        type Error = Infallible;

        fn machines(&self) -> Result<Vec<MachineConfig>, Self::Error> {
            Ok(vec![
                serde_json::from_str(
                    r#"{"id": "fixture", "name": "Fixture", "perSpinPayBalls": 15.0,
                        "border": {"28": 17.5}}"#,
                )
                .expect("fixture parses"),
            ])
        }
    }

    #[test]
    fn tracker_runs_against_custom_collaborators() {
        let mut tracker = Tracker::new(&FixtureCatalog, MemoryStorage::new()).unwrap();
        tracker.start_session(0.0).unwrap();
        tracker.record_hit(200.0).unwrap();
        tracker.confirm_outcome(OutcomeKind::RushEnd).unwrap();
        tracker.confirm_payout(1000.0).unwrap();
        assert_eq!(tracker.aggregates().total_net_payout, 920);
        tracker.record_stop(None).unwrap();
        tracker.confirm_end_balance(500.0).unwrap();
        tracker.confirm_investment(5000.0).unwrap();

        let result = tracker.finalize_calculation().unwrap();
        assert!((result.consumed_balls - (1250.0 + 920.0 - 500.0)).abs() < 1e-9);
        assert_eq!(result.border, Some(17.5));
        assert_eq!(tracker.totals().total_hit_count, 1);
    }

    #[test]
    fn accessors_are_idempotent() {
        let mut tracker = Tracker::new(&FixtureCatalog, MemoryStorage::new()).unwrap();
        tracker.start_session(10.0).unwrap();
        tracker.record_hit(60.0).unwrap();
        assert_eq!(tracker.aggregates(), tracker.aggregates());
        assert_eq!(tracker.totals(), tracker.totals());
        assert_eq!(tracker.log().to_vec(), tracker.log().to_vec());
    }
}

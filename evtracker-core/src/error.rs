//! Error types shared by the session engine, the calculator and the tracker façade.
use thiserror::Error;

use crate::machine::OutcomeKind;

/// Rejections raised by session log transitions. State is never mutated when
/// one of these is returned.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SessionError {
    #[error("{field} must be a finite number")]
    NotFinite { field: &'static str },
    #[error("{field} must not be negative (got {value})")]
    Negative { field: &'static str, value: f64 },
    #[error("counter reading is invalid: must be at least {min} (got {value})")]
    CounterBelowMinimum { min: u64, value: f64 },
    #[error("a session is already running; stop it or reset the log first")]
    AlreadyStarted,
    #[error("press start first")]
    NotStarted,
    #[error("choose the hit outcome (single / RUSH / LT) first")]
    HitPending,
    #[error("confirm the displayed payout first")]
    PayoutPending,
    #[error("confirm the ending ball balance first")]
    EndBalancePending,
    #[error("record a hit first")]
    NoPendingHit,
    #[error("no displayed payout is awaiting confirmation")]
    NoPendingPayout,
    #[error("no ending ball balance is awaiting confirmation")]
    NoPendingEndBalance,
    #[error("the session has already been stopped; run the calculation or undo the stop")]
    AlreadyStopped,
    #[error("outcome {0} is not available on this machine")]
    OutcomeUnavailable(OutcomeKind),
    #[error("investment must be a positive yen amount")]
    InvalidInvestment,
    #[error("{field} is too large to record")]
    TooLarge { field: &'static str },
    #[error("nothing to undo")]
    NothingToUndo,
}

/// Precondition failures raised at the calculator boundary.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CalcError {
    #[error("the spin log has no spins yet")]
    NoSpins,
    #[error("choose the hit outcome before calculating")]
    HitPending,
    #[error("confirm the displayed payout before calculating")]
    PayoutPending,
    #[error("confirm the ending ball balance before calculating")]
    EndBalancePending,
    #[error("the ending ball balance is not confirmed (stop, then confirm the balance)")]
    EndBalanceMissing,
    #[error("no investment has been confirmed")]
    NoInvestment,
    #[error("payout / ending balance input is invalid: consumed balls {consumed:.0} is not positive")]
    NonPositiveConsumption { consumed: f64 },
}

/// Errors surfaced by the `Tracker` façade.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Calc(#[from] CalcError),
    #[error("unknown machine id `{0}`")]
    UnknownMachine(String),
    #[error("the machine catalog is empty")]
    EmptyCatalog,
    #[error("failed to load the machine catalog: {0}")]
    Catalog(#[source] anyhow::Error),
}

//! Session log engine: the strict state machine behind the spin log.
//!
//! Every transition validates its input before touching state, so a rejected
//! call leaves the session exactly as it was. Each accepted forward
//! transition can be reverted by [`SessionState::undo_last`].
use serde::{Deserialize, Deserializer, Serialize};

use crate::constants::YEN_PER_K;
use crate::error::SessionError;
use crate::machine::{Machine, OutcomeKind};
use crate::numbers::{floor_f64_to_u64, round_f64_to_u64, u64_to_f64};
use crate::payout::displayed_to_net;
use crate::spin_log::{EntryLabel, LogAggregates, SpinLogEntry};

/// Where the session currently sits in the start → hit → outcome → payout →
/// stop → end-balance sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionPhase {
    Idle,
    Open,
    PendingHit,
    AwaitingPayout,
    AwaitingEndBalance,
    /// Stopped with a confirmed ending balance; ready for the calculation.
    Closed,
}

/// Persisted per-machine session snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    #[serde(default)]
    pub spin_log: Vec<SpinLogEntry>,
    #[serde(default, deserialize_with = "index_or_none")]
    pub pending_index: Option<usize>,
    #[serde(default)]
    pub next_start_counter: u64,
    #[serde(default, deserialize_with = "index_or_none")]
    pub payout_confirm_index: Option<usize>,
    #[serde(default)]
    pub end_balls_yame: Option<u64>,
    #[serde(default)]
    pub end_balls_pending: bool,
    #[serde(default)]
    pub has_started: bool,
    #[serde(default)]
    pub confirmed_invest_yen: u64,
}

/// Accept `null`, a non-negative index, or the legacy `-1` sentinel.
fn index_or_none<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<i64>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| usize::try_from(value).ok()))
}

/// Validate a numeric input and floor it to a whole count.
fn whole_count(field: &'static str, value: f64) -> Result<u64, SessionError> {
    if !value.is_finite() {
        return Err(SessionError::NotFinite { field });
    }
    if value < 0.0 {
        return Err(SessionError::Negative { field, value });
    }
    Ok(floor_f64_to_u64(value))
}

/// Validate a counter reading against the monotonic minimum.
pub(crate) fn counter_at_least(value: f64, min: u64) -> Result<u64, SessionError> {
    if !value.is_finite() {
        return Err(SessionError::NotFinite { field: "counter" });
    }
    if value < u64_to_f64(min) {
        return Err(SessionError::CounterBelowMinimum { min, value });
    }
    Ok(floor_f64_to_u64(value).max(min))
}

impl SessionState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        if !self.has_started || self.spin_log.is_empty() {
            return SessionPhase::Idle;
        }
        if self.end_balls_pending {
            return SessionPhase::AwaitingEndBalance;
        }
        if self.payout_confirm_index.is_some() {
            return SessionPhase::AwaitingPayout;
        }
        if self.pending_index.is_some() {
            return SessionPhase::PendingHit;
        }
        match self.spin_log.last().map(|entry| entry.label) {
            Some(EntryLabel::Stop) => SessionPhase::Closed,
            _ => SessionPhase::Open,
        }
    }

    #[must_use]
    pub fn aggregates(&self) -> LogAggregates {
        LogAggregates::of(&self.spin_log)
    }

    #[must_use]
    pub fn last_entry(&self) -> Option<&SpinLogEntry> {
        self.spin_log.last()
    }

    /// Spins so far if the open segment were closed at `counter`.
    #[must_use]
    pub fn spins_through(&self, counter: u64) -> u64 {
        let confirmed = self.aggregates().total_spins;
        match self.spin_log.last() {
            Some(last) if last.label.is_start() => {
                confirmed.saturating_add(counter.saturating_sub(last.from))
            }
            _ => confirmed,
        }
    }

    /// Reject the call when any confirmation is outstanding.
    fn ensure_nothing_pending(&self) -> Result<(), SessionError> {
        if self.pending_index.is_some() {
            return Err(SessionError::HitPending);
        }
        if self.payout_confirm_index.is_some() {
            return Err(SessionError::PayoutPending);
        }
        if self.end_balls_pending {
            return Err(SessionError::EndBalancePending);
        }
        Ok(())
    }

    /// Open a new session at `counter`, discarding any previous log.
    ///
    /// # Errors
    ///
    /// Rejects a second start and non-finite or negative readings.
    pub fn start(&mut self, counter: f64) -> Result<(), SessionError> {
        if self.has_started {
            return Err(SessionError::AlreadyStarted);
        }
        let counter = whole_count("counter", counter)?;

        self.spin_log.clear();
        self.spin_log.push(SpinLogEntry::open(counter));
        self.pending_index = None;
        self.payout_confirm_index = None;
        self.end_balls_pending = false;
        self.end_balls_yame = None;
        self.next_start_counter = counter;
        self.has_started = true;
        log::debug!("session started at counter {counter}");
        Ok(())
    }

    /// Record a hit at `counter`, closing the open segment.
    ///
    /// # Errors
    ///
    /// Requires an open segment, no outstanding confirmation, and a reading at
    /// or above the segment start.
    pub fn record_hit(&mut self, counter: f64) -> Result<(), SessionError> {
        if !self.has_started {
            return Err(SessionError::NotStarted);
        }
        self.ensure_nothing_pending()?;
        let idx = match self.spin_log.last() {
            Some(last) if last.label.is_start() => self.spin_log.len() - 1,
            Some(last) if last.label == EntryLabel::Stop => {
                return Err(SessionError::AlreadyStopped);
            }
            _ => return Err(SessionError::NotStarted),
        };
        let counter = counter_at_least(counter, self.next_start_counter)?;

        let row = &mut self.spin_log[idx];
        row.to = counter;
        row.add = counter.saturating_sub(row.from);
        row.next_start = None;
        row.label = EntryLabel::PendingHit;
        row.payout = None;
        row.payout_disp = None;
        self.pending_index = Some(idx);
        log::debug!("hit recorded at counter {counter} (+{})", row.add);
        Ok(())
    }

    /// Finalize the pending hit as `kind`.
    ///
    /// Fixed-payout outcomes reopen a segment at the machine's restart value
    /// immediately; variable ones wait for [`Self::confirm_payout`].
    ///
    /// # Errors
    ///
    /// Requires a pending hit and an outcome the machine offers.
    pub fn confirm_outcome(
        &mut self,
        kind: OutcomeKind,
        machine: &Machine,
    ) -> Result<(), SessionError> {
        let Some(idx) = self.pending_index else {
            if self.payout_confirm_index.is_some() {
                return Err(SessionError::PayoutPending);
            }
            return Err(SessionError::NoPendingHit);
        };
        if !machine.offers(kind) {
            return Err(SessionError::OutcomeUnavailable(kind));
        }

        let next_start = machine.restart_for(kind);
        let Some(row) = self.spin_log.get_mut(idx) else {
            return Err(SessionError::NoPendingHit);
        };
        row.next_start = Some(next_start);
        row.label = EntryLabel::Outcome(kind);
        self.next_start_counter = next_start;
        self.pending_index = None;

        if let Some(fixed) = machine.fixed_payout(kind) {
            row.payout_disp = Some(fixed.disp);
            row.payout = Some(fixed.net);
            self.spin_log.push(SpinLogEntry::open(next_start));
            log::debug!("outcome {kind} confirmed, resuming at {next_start}");
        } else {
            row.payout = None;
            row.payout_disp = None;
            self.payout_confirm_index = Some(idx);
            log::debug!("outcome {kind} confirmed, awaiting displayed payout");
        }
        Ok(())
    }

    /// Confirm the displayed payout of a RUSH/LT outcome and reopen a segment.
    ///
    /// # Errors
    ///
    /// Requires an outcome awaiting its payout and a finite, non-negative value.
    pub fn confirm_payout(&mut self, displayed: f64, machine: &Machine) -> Result<(), SessionError> {
        let Some(idx) = self.payout_confirm_index else {
            return Err(SessionError::NoPendingPayout);
        };
        let displayed = whole_count("displayed payout", displayed)?;
        let net = displayed_to_net(displayed, &machine.payout_rule);

        let Some(row) = self.spin_log.get_mut(idx) else {
            return Err(SessionError::NoPendingPayout);
        };
        row.payout_disp = Some(displayed);
        row.payout = Some(net);
        self.payout_confirm_index = None;
        self.spin_log
            .push(SpinLogEntry::open(self.next_start_counter));
        log::debug!("payout confirmed: displayed {displayed}, net {net}");
        Ok(())
    }

    /// Record the stop at `counter` (defaults to the current segment start).
    ///
    /// # Errors
    ///
    /// Requires a started, open session and a reading at or above the segment start.
    pub fn record_stop(&mut self, counter: Option<f64>) -> Result<(), SessionError> {
        if !self.has_started || self.spin_log.is_empty() {
            return Err(SessionError::NotStarted);
        }
        self.ensure_nothing_pending()?;
        if self.phase() == SessionPhase::Closed {
            return Err(SessionError::AlreadyStopped);
        }
        let from = self.next_start_counter;
        let counter = match counter {
            Some(value) => counter_at_least(value, from)?,
            None => from,
        };

        self.spin_log.push(SpinLogEntry {
            to: counter,
            add: counter - from,
            next_start: Some(counter),
            label: EntryLabel::PendingStop,
            ..SpinLogEntry::open(from)
        });
        self.next_start_counter = counter;
        self.end_balls_pending = true;
        log::debug!("stop recorded at counter {counter} (+{})", counter - from);
        Ok(())
    }

    /// Confirm the balls in hand at the stop.
    ///
    /// # Errors
    ///
    /// Requires a pending stop and a finite, non-negative value.
    pub fn confirm_end_balance(&mut self, balls: f64) -> Result<(), SessionError> {
        if !self.end_balls_pending {
            return Err(SessionError::NoPendingEndBalance);
        }
        let balls = whole_count("ending balance", balls)?;

        self.end_balls_yame = Some(balls);
        self.end_balls_pending = false;
        if let Some(last) = self
            .spin_log
            .last_mut()
            .filter(|last| last.label == EntryLabel::PendingStop)
        {
            last.label = EntryLabel::Stop;
            last.end_balls = Some(balls);
        }
        log::debug!("ending balance confirmed: {balls} balls");
        Ok(())
    }

    /// Add `yen` to the confirmed investment and attribute it to the most
    /// recent row that accumulated spins.
    ///
    /// # Errors
    ///
    /// Requires a started session and a finite amount that rounds to at least one yen.
    pub fn confirm_investment(&mut self, yen: f64) -> Result<u64, SessionError> {
        if !self.has_started {
            return Err(SessionError::NotStarted);
        }
        if !yen.is_finite() {
            return Err(SessionError::NotFinite {
                field: "investment",
            });
        }
        let yen = round_f64_to_u64(yen);
        if yen == 0 {
            return Err(SessionError::InvalidInvestment);
        }

        let Some(total) = self.confirmed_invest_yen.checked_add(yen) else {
            return Err(SessionError::TooLarge {
                field: "investment",
            });
        };

        self.confirmed_invest_yen = total;
        if let Some(row) = self.spin_log.iter_mut().rev().find(|row| row.add > 0) {
            row.invest_k += u64_to_f64(yen) / YEN_PER_K;
        }
        log::debug!(
            "investment confirmed: +{yen} yen (total {})",
            self.confirmed_invest_yen
        );
        Ok(self.confirmed_invest_yen)
    }

    /// Revert the most recent forward transition.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NothingToUndo`] when the session is idle.
    pub fn undo_last(&mut self) -> Result<(), SessionError> {
        if self.spin_log.is_empty() {
            return Err(SessionError::NothingToUndo);
        }

        if self.end_balls_pending {
            self.end_balls_pending = false;
            self.end_balls_yame = None;
            let stop_pending = self
                .spin_log
                .last()
                .is_some_and(|last| last.label == EntryLabel::PendingStop);
            if stop_pending {
                if let Some(stop) = self.spin_log.pop() {
                    self.next_start_counter = stop.from;
                }
            }
            log::debug!("undo: stop cancelled");
            return Ok(());
        }

        if let Some(row) = self
            .payout_confirm_index
            .and_then(|idx| self.spin_log.get_mut(idx))
        {
            row.label = EntryLabel::PendingHit;
            row.next_start = None;
            row.payout = None;
            row.payout_disp = None;
            self.next_start_counter = row.from;
            self.pending_index = self.payout_confirm_index.take();
            log::debug!("undo: outcome reverted to pending hit");
            return Ok(());
        }

        if let Some(row) = self
            .pending_index
            .and_then(|idx| self.spin_log.get_mut(idx))
        {
            row.label = EntryLabel::Start;
            row.to = row.from;
            row.add = 0;
            row.next_start = Some(row.from);
            row.payout = None;
            row.payout_disp = None;
            self.pending_index = None;
            log::debug!("undo: hit reverted to open segment");
            return Ok(());
        }

        if let Some(last) = self
            .spin_log
            .last_mut()
            .filter(|last| last.label == EntryLabel::Stop)
        {
            last.label = EntryLabel::PendingStop;
            last.end_balls = None;
            self.end_balls_yame = None;
            self.end_balls_pending = true;
            log::debug!("undo: ending balance reopened");
            return Ok(());
        }

        if self.undo_auto_opened_segment() {
            return Ok(());
        }

        self.spin_log.pop();
        match self.spin_log.last() {
            None => {
                *self = Self {
                    confirmed_invest_yen: self.confirmed_invest_yen,
                    ..Self::default()
                };
                log::debug!("undo: session returned to idle");
            }
            Some(last) => {
                self.next_start_counter = last.next_start.unwrap_or(self.next_start_counter);
                log::debug!("undo: last entry removed");
            }
        }
        Ok(())
    }

    /// Collapse `[outcome, empty start]` back into the state before the
    /// segment was auto-opened. Returns `false` when the tail does not match.
    fn undo_auto_opened_segment(&mut self) -> bool {
        let len = self.spin_log.len();
        if len < 2 || !self.spin_log[len - 1].is_empty_start() {
            return false;
        }
        let prev_idx = len - 2;
        let Some(kind) = self.spin_log[prev_idx].label.outcome() else {
            return false;
        };

        self.spin_log.pop();
        let prev = &mut self.spin_log[prev_idx];
        prev.payout = None;
        prev.payout_disp = None;
        if kind.has_fixed_payout() {
            prev.label = EntryLabel::PendingHit;
            prev.next_start = None;
            self.next_start_counter = prev.from;
            self.pending_index = Some(prev_idx);
            log::debug!("undo: {kind} reverted to pending hit");
        } else {
            self.payout_confirm_index = Some(prev_idx);
            log::debug!("undo: {kind} payout reopened");
        }
        true
    }

    /// Whether the pointers and flags agree with the log rows they refer to.
    /// Snapshots that fail this are not safe to resume.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        if self.pending_index.is_some() && self.payout_confirm_index.is_some() {
            return false;
        }
        let pending_ok = self.pending_index.is_none_or(|idx| {
            self.spin_log
                .get(idx)
                .is_some_and(|row| row.label == EntryLabel::PendingHit)
        });
        let payout_ok = self.payout_confirm_index.is_none_or(|idx| {
            self.spin_log.get(idx).is_some_and(|row| {
                row.payout.is_none()
                    && row
                        .label
                        .outcome()
                        .is_some_and(|kind| !kind.has_fixed_payout())
            })
        });
        let stop_ok = !self.end_balls_pending
            || self
                .spin_log
                .last()
                .is_some_and(|row| row.label == EntryLabel::PendingStop);
        pending_ok && payout_ok && stop_ok
    }

    /// Clear the session back to idle, including the confirmed investment.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

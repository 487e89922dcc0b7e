//! Spin log rows and the aggregates derived from them.
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::machine::OutcomeKind;

/// State of a single log row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntryLabel {
    /// Open segment; spins accumulate from `from` until the next hit or stop.
    Start,
    /// Hit observed, outcome not chosen yet.
    PendingHit,
    /// Finalized hit outcome.
    Outcome(OutcomeKind),
    /// Stop observed, ending balance not confirmed yet.
    PendingStop,
    /// Finalized stop carrying the ending balance.
    Stop,
}

impl EntryLabel {
    #[must_use]
    pub const fn is_start(self) -> bool {
        matches!(self, Self::Start)
    }

    #[must_use]
    pub const fn outcome(self) -> Option<OutcomeKind> {
        match self {
            Self::Outcome(kind) => Some(kind),
            _ => None,
        }
    }
}

impl fmt::Display for EntryLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => f.write_str("開始"),
            Self::PendingHit => f.write_str("当たり（未確定）"),
            Self::Outcome(kind) => f.write_str(kind.label()),
            Self::PendingStop => f.write_str("ヤメ（持ち玉未確定）"),
            Self::Stop => f.write_str("ヤメ"),
        }
    }
}

/// One row of the session's spin log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpinLogEntry {
    pub from: u64,
    pub to: u64,
    /// Spins in this segment (`to - from`).
    pub add: u64,
    /// Counter value the next segment starts from; `None` while the row is pending.
    pub next_start: Option<u64>,
    pub label: EntryLabel,
    /// Net payout used by the calculation.
    pub payout: Option<u64>,
    /// Payout as shown on the result screen.
    pub payout_disp: Option<u64>,
    /// Investment attributed to this row, in 1000-yen units.
    #[serde(default)]
    pub invest_k: f64,
    #[serde(default)]
    pub end_balls: Option<u64>,
}

impl SpinLogEntry {
    /// A freshly opened segment at `counter`.
    #[must_use]
    pub const fn open(counter: u64) -> Self {
        Self {
            from: counter,
            to: counter,
            add: 0,
            next_start: Some(counter),
            label: EntryLabel::Start,
            payout: None,
            payout_disp: None,
            invest_k: 0.0,
            end_balls: None,
        }
    }

    /// Whether this is an untouched segment opened automatically after an outcome.
    #[must_use]
    pub fn is_empty_start(&self) -> bool {
        self.label.is_start() && self.add == 0
    }
}

/// Total spins across the log.
#[must_use]
pub fn total_spins(log: &[SpinLogEntry]) -> u64 {
    log.iter().fold(0_u64, |sum, entry| sum.saturating_add(entry.add))
}

/// Finalized outcomes that count as first hits (charges excluded).
#[must_use]
pub fn hit_count(log: &[SpinLogEntry]) -> u64 {
    let hits = log
        .iter()
        .filter_map(|entry| entry.label.outcome())
        .filter(|kind| kind.counts_as_hit())
        .count();
    u64::try_from(hits).unwrap_or(u64::MAX)
}

/// Sum of confirmed net payouts; unconfirmed rows count as zero.
#[must_use]
pub fn total_net_payout(log: &[SpinLogEntry]) -> u64 {
    log.iter()
        .filter_map(|entry| entry.payout)
        .fold(0_u64, u64::saturating_add)
}

/// Session-level aggregates, recomputed on demand.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogAggregates {
    pub total_spins: u64,
    pub hit_count: u64,
    pub total_net_payout: u64,
}

impl LogAggregates {
    #[must_use]
    pub fn of(log: &[SpinLogEntry]) -> Self {
        Self {
            total_spins: total_spins(log),
            hit_count: hit_count(log),
            total_net_payout: total_net_payout(log),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finalized(from: u64, to: u64, kind: OutcomeKind, payout: Option<u64>) -> SpinLogEntry {
        SpinLogEntry {
            to,
            add: to - from,
            next_start: Some(0),
            label: EntryLabel::Outcome(kind),
            payout,
            payout_disp: payout,
            ..SpinLogEntry::open(from)
        }
    }

    #[test]
    fn aggregates_skip_charges_and_null_payouts() {
        let log = vec![
            finalized(100, 180, OutcomeKind::Tan, Some(360)),
            finalized(0, 40, OutcomeKind::Charge, Some(280)),
            finalized(0, 25, OutcomeKind::RushEnd, None),
            SpinLogEntry::open(64),
        ];
        let agg = LogAggregates::of(&log);
        assert_eq!(agg.total_spins, 145);
        assert_eq!(agg.hit_count, 2);
        assert_eq!(agg.total_net_payout, 640);
    }

    #[test]
    fn aggregates_saturate_instead_of_overflowing() {
        let log = vec![
            finalized(0, u64::MAX - 1, OutcomeKind::RushEnd, Some(u64::MAX - 1)),
            finalized(0, u64::MAX - 1, OutcomeKind::RushEnd, Some(u64::MAX - 1)),
        ];
        let agg = LogAggregates::of(&log);
        assert_eq!(agg.total_spins, u64::MAX);
        assert_eq!(agg.total_net_payout, u64::MAX);
    }

    #[test]
    fn labels_render_like_the_result_screen() {
        assert_eq!(EntryLabel::Start.to_string(), "開始");
        assert_eq!(EntryLabel::Outcome(OutcomeKind::LtEnd).to_string(), "LT終了");
        assert_eq!(EntryLabel::PendingStop.to_string(), "ヤメ（持ち玉未確定）");
    }

    #[test]
    fn label_serializes_as_tagged_variant() {
        let json = serde_json::to_string(&EntryLabel::Outcome(OutcomeKind::RushEnd)).unwrap();
        assert_eq!(json, r#"{"outcome":"rushEnd"}"#);
        let back: EntryLabel = serde_json::from_str(r#""pendingHit""#).unwrap();
        assert_eq!(back, EntryLabel::PendingHit);
    }
}

//! Display helpers shared by every presentation layer.
use std::fmt::Write as _;

use crate::numbers::{floor_tenths, i64_to_f64, round_f64_to_i64, u64_to_f64};
use crate::spin_log::{EntryLabel, SpinLogEntry};
use crate::totals::CumulativeTotals;

/// Round to the nearest integer and group thousands with commas.
#[must_use]
pub fn fmt_int(value: f64) -> String {
    let rounded = round_f64_to_i64(value);
    let digits = rounded.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if rounded < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// One decimal, truncated rather than rounded.
#[must_use]
pub fn fmt_rate1(value: f64) -> String {
    if !value.is_finite() {
        return "0.0".to_string();
    }
    format!("{:.1}", floor_tenths(value))
}

#[must_use]
pub fn fmt_rate2(value: f64) -> String {
    if !value.is_finite() {
        return "0.00".to_string();
    }
    format!("{value:.2}")
}

/// Ball count with an explicit `+` for gains.
#[must_use]
pub fn fmt_signed_balls(balls: i64) -> String {
    let text = fmt_int(i64_to_f64(balls));
    if balls > 0 { format!("+{text}") } else { text }
}

/// Render one log row as `label  range(+add) / 1.5k / 表記出玉：N玉 / 持ち玉：N玉  #n`.
#[must_use]
pub fn log_line(entry: &SpinLogEntry, position: usize) -> String {
    let mut line = entry.label.to_string();
    line.push_str("  ");
    if entry.label == EntryLabel::Start {
        let _ = write!(line, "{}", entry.from);
    } else {
        let _ = write!(line, "{} → {}", entry.from, entry.to);
    }
    if entry.add > 0 {
        let _ = write!(line, "（+{}）", entry.add);
    }
    if entry.invest_k > 0.0 {
        let _ = write!(line, " / {:.1}k", entry.invest_k);
    }
    if let Some(disp) = entry.payout_disp.or(entry.payout) {
        let _ = write!(line, " / 表記出玉：{disp}玉");
    }
    if let Some(balls) = entry.end_balls {
        let _ = write!(line, " / 持ち玉：{balls}玉");
    }
    let _ = write!(line, "  #{}", position + 1);
    line
}

/// Every log row, oldest first.
#[must_use]
pub fn log_lines(log: &[SpinLogEntry]) -> Vec<String> {
    log.iter()
        .enumerate()
        .map(|(i, entry)| log_line(entry, i))
        .collect()
}

/// `hits / spins = 1/N`, with a dash while no hit has been recorded.
#[must_use]
pub fn hit_summary(totals: &CumulativeTotals) -> String {
    let ratio = totals
        .hit_probability_denominator()
        .map_or_else(|| "—".to_string(), |n| format!("1/{n}"));
    format!(
        "{} / {} = {ratio}",
        totals.total_hit_count,
        fmt_int(u64_to_f64(totals.total_spin))
    )
}

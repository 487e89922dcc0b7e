use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::ValueEnum;
use colored::{ColoredString, Colorize};
use evtracker_core::numbers::u64_to_f64;
use evtracker_core::{
    CalculationResult, CumulativeTotals, GoalColor, GoalProgress, LogAggregates, Machine,
    MidCheckReport, RateTier, SessionPhase, SpinLogEntry, Tracker, TrackerStorage, fmt_int,
    fmt_rate1, fmt_rate2, fmt_signed_balls, hit_summary, log_lines,
};
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Coloured, human-readable output
    Console,
    /// One JSON document per invocation
    Json,
}

/// Extra result produced by the command that just ran.
#[derive(Debug, Clone, Default)]
pub enum Outcome {
    #[default]
    None,
    Calculation(CalculationResult),
    MidCheck(Option<MidCheckReport>),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MachineSummary<'a> {
    id: &'a str,
    name: &'a str,
    selected: bool,
    jackpot: Option<&'a str>,
    rush_entry: Option<&'a str>,
    border: Option<f64>,
}

impl<'a> MachineSummary<'a> {
    fn of(machine: &'a Machine, selected: bool) -> Self {
        Self {
            id: &machine.id,
            name: &machine.name,
            selected,
            jackpot: machine.jackpot.as_deref(),
            rush_entry: machine.rush_entry.as_deref(),
            border: machine.reference_border(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StateReport<'a> {
    command: &'a str,
    generated_at: DateTime<Utc>,
    machine: MachineSummary<'a>,
    phase: SessionPhase,
    next_start_counter: u64,
    confirmed_invest_yen: u64,
    log: &'a [SpinLogEntry],
    aggregates: LogAggregates,
    totals: &'a CumulativeTotals,
    average_rotation_rate: f64,
    expected_yen: f64,
    goal: GoalProgress,
    #[serde(skip_serializing_if = "Option::is_none")]
    calculation: Option<&'a CalculationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mid_check: Option<&'a MidCheckReport>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    cancelled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    persist_error: Option<&'a str>,
}

/// Render the machine catalog with the selected entry marked.
pub fn write_machines<W: Write, S: TrackerStorage>(
    out: &mut W,
    tracker: &Tracker<S>,
    format: ReportFormat,
) -> Result<()> {
    let selected = &tracker.machine().id;
    let summaries: Vec<MachineSummary<'_>> = tracker
        .machines()
        .iter()
        .map(|m| MachineSummary::of(m, &m.id == selected))
        .collect();
    match format {
        ReportFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, &summaries)?;
            writeln!(out)?;
        }
        ReportFormat::Console => {
            writeln!(out, "{}", "🎰 Machines".bright_cyan().bold())?;
            for m in &summaries {
                let marker = if m.selected { "▶".green() } else { " ".normal() };
                writeln!(
                    out,
                    "{marker} {:<16} {}  border(28) {}  {}  {}",
                    m.id,
                    m.name.bold(),
                    m.border.map_or_else(|| "—".to_string(), fmt_rate1),
                    m.jackpot.unwrap_or("—"),
                    m.rush_entry.unwrap_or("—"),
                )?;
            }
        }
    }
    Ok(())
}

/// Render the session log, the cumulative totals and any command outcome.
pub fn write_state<W: Write, S: TrackerStorage>(
    out: &mut W,
    tracker: &Tracker<S>,
    command: &str,
    outcome: &Outcome,
    format: ReportFormat,
) -> Result<()> {
    let totals = tracker.totals();
    let (calculation, mid_check, cancelled) = match outcome {
        Outcome::None => (None, None, false),
        Outcome::Calculation(result) => (Some(result), None, false),
        Outcome::MidCheck(report) => (None, report.as_ref(), report.is_none()),
    };
    match format {
        ReportFormat::Json => {
            let report = StateReport {
                command,
                generated_at: Utc::now(),
                machine: MachineSummary::of(tracker.machine(), true),
                phase: tracker.phase(),
                next_start_counter: tracker.session().next_start_counter,
                confirmed_invest_yen: tracker.session().confirmed_invest_yen,
                log: tracker.log(),
                aggregates: tracker.aggregates(),
                totals,
                average_rotation_rate: totals.average_rotation_rate(),
                expected_yen: totals.expected_yen(),
                goal: totals.goal_progress(),
                calculation,
                mid_check,
                cancelled,
                persist_error: tracker.last_persist_error(),
            };
            serde_json::to_writer_pretty(&mut *out, &report)?;
            writeln!(out)?;
        }
        ReportFormat::Console => {
            write_header(out, tracker.machine())?;
            if let Some(result) = calculation {
                write_calculation(out, result)?;
            }
            if let Some(report) = mid_check {
                write_mid_check(out, report)?;
            }
            if cancelled {
                writeln!(out, "{}", "mid-session check cancelled".yellow())?;
            }
            write_log(out, tracker)?;
            write_totals(out, totals)?;
        }
    }
    Ok(())
}

fn write_header<W: Write>(out: &mut W, machine: &Machine) -> Result<()> {
    writeln!(
        out,
        "{} {}",
        "🎰".bright_cyan(),
        format!("{} ({})", machine.name, machine.id).bright_cyan().bold()
    )?;
    writeln!(out, "{}", "================================".cyan())?;
    Ok(())
}

fn write_log<W: Write, S: TrackerStorage>(out: &mut W, tracker: &Tracker<S>) -> Result<()> {
    let session = tracker.session();
    let agg = tracker.aggregates();
    writeln!(out, "{}", "📜 回転ログ".bold())?;
    if session.spin_log.is_empty() {
        writeln!(out, "   (empty)")?;
    }
    for line in log_lines(&session.spin_log) {
        writeln!(out, "   {line}")?;
    }
    writeln!(
        out,
        "総回転数：{} 回 / 純増出玉：{} 玉 / 総投資：{} 円",
        fmt_int(u64_to_f64(agg.total_spins)),
        fmt_int(u64_to_f64(agg.total_net_payout)),
        fmt_int(u64_to_f64(session.confirmed_invest_yen))
    )?;
    writeln!(out, "状態：{}", phase_label(tracker.phase()))?;
    writeln!(out)?;
    Ok(())
}

fn write_calculation<W: Write>(out: &mut W, result: &CalculationResult) -> Result<()> {
    writeln!(out, "{}", "🧮 期待値計算".bright_yellow().bold())?;
    writeln!(out, "回した回転数：{} 回", fmt_int(u64_to_f64(result.spins)))?;
    writeln!(
        out,
        "今回の回転率：{} 回/k",
        tint(fmt_rate1(result.rotation_rate), result.tier)
    )?;
    writeln!(
        out,
        "消費玉：{} 玉 / 期待値：{} 玉",
        fmt_int(result.consumed_balls),
        signed(result.expected_balls)
    )?;
    writeln!(out)?;
    Ok(())
}

fn write_mid_check<W: Write>(out: &mut W, report: &MidCheckReport) -> Result<()> {
    writeln!(out, "{}", "⏱ 回転率チェック".bright_yellow().bold())?;
    writeln!(out, "回転数：{} 回", fmt_int(u64_to_f64(report.spins)))?;
    writeln!(
        out,
        "現在の回転率：{} 回/k",
        tint(fmt_rate1(report.rotation_rate), report.tier)
    )?;
    if let Some(border) = report.border {
        writeln!(out, "28交換ボーダー：{}", fmt_rate1(border))?;
    }
    if let Some(diff) = report.border_diff {
        let sign = if diff >= 0.0 { "+" } else { "" };
        writeln!(out, "差：{}", tint(format!("{sign}{}", fmt_rate1(diff)), report.tier))?;
    }
    writeln!(out)?;
    Ok(())
}

fn write_totals<W: Write>(out: &mut W, totals: &CumulativeTotals) -> Result<()> {
    let goal = totals.goal_progress();
    writeln!(out, "{}", "📊 累積".bold())?;
    writeln!(
        out,
        "累積期待値：{} 玉 ({} 円)",
        signed(totals.total_expect_balls),
        fmt_int(totals.expected_yen())
    )?;
    writeln!(out, "累計確率：{}", hit_summary(totals))?;
    writeln!(
        out,
        "累計投資：{} 円",
        fmt_int(u64_to_f64(totals.total_invest_yen))
    )?;
    writeln!(
        out,
        "累計回転率：{} 回/k",
        fmt_rate1(totals.average_rotation_rate())
    )?;
    writeln!(
        out,
        "目標期待値：{} 円  達成率：{} %",
        goal_tint(fmt_int(u64_to_f64(goal.next_goal_yen)), goal.color),
        fmt_rate2(goal.percent)
    )?;
    Ok(())
}

/// Plain-text outcome line for state-changing commands.
pub fn write_notice<W: Write>(out: &mut W, message: &str, format: ReportFormat) -> Result<()> {
    if format == ReportFormat::Console {
        writeln!(out, "{} {message}", "✔".green())?;
    }
    Ok(())
}

const fn phase_label(phase: SessionPhase) -> &'static str {
    match phase {
        SessionPhase::Idle => "未開始",
        SessionPhase::Open => "回転中",
        SessionPhase::PendingHit => "当たり（結果待ち）",
        SessionPhase::AwaitingPayout => "表記出玉待ち",
        SessionPhase::AwaitingEndBalance => "持ち玉待ち",
        SessionPhase::Closed => "ヤメ（計算可能）",
    }
}

fn signed(balls: i64) -> ColoredString {
    let text = fmt_signed_balls(balls);
    match balls.signum() {
        1 => text.blue(),
        -1 => text.red(),
        _ => text.normal(),
    }
}

fn tint(text: String, tier: Option<RateTier>) -> ColoredString {
    match tier {
        Some(RateTier::Bad) => text.red(),
        Some(RateTier::Blue) => text.blue(),
        Some(RateTier::Green) => text.green(),
        Some(RateTier::Purple) => text.magenta(),
        None => text.normal(),
    }
}

fn goal_tint(text: String, color: GoalColor) -> ColoredString {
    match color {
        GoalColor::Blue => text.blue(),
        GoalColor::Yellow => text.yellow(),
        GoalColor::Green => text.green(),
        GoalColor::Red => text.red(),
        GoalColor::Rainbow => text.bright_magenta().bold(),
    }
}

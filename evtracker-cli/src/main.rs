mod report;
mod storage;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use colored::Colorize;
use evtracker_core::{OutcomeKind, StaticCatalog, Tracker};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use report::{Outcome, ReportFormat, write_machines, write_notice, write_state};
use storage::FileStorage;

const BUNDLED_CATALOG: &str = include_str!("../assets/machines.json");

#[derive(Debug, Parser)]
#[command(name = "evtracker", version)]
#[command(about = "Track pachinko sessions and their expected value, one machine at a time")]
struct Args {
    /// Directory holding the saved sessions and totals
    #[arg(long, global = true, default_value = ".evtracker")]
    data_dir: PathBuf,

    /// Machine catalog JSON to use instead of the bundled one
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// Operate on this machine for one invocation without changing the selection
    #[arg(long, global = true)]
    machine: Option<String>,

    /// Output report format
    #[arg(long, global = true, value_enum, default_value_t = ReportFormat::Console)]
    report: ReportFormat,

    /// Verbose output (debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the machines in the catalog
    Machines,
    /// Select the machine to track
    Select { id: String },
    /// Start a session at the current data counter
    Start {
        #[arg(allow_negative_numbers = true)]
        counter: f64,
    },
    /// Record a hit at the current data counter
    Hit {
        #[arg(allow_negative_numbers = true)]
        counter: f64,
    },
    /// Choose how the pending hit ended (tan, rush-end, lt-end, charge)
    Outcome { kind: OutcomeKind },
    /// Confirm the payout shown on the result screen
    Payout {
        #[arg(allow_negative_numbers = true)]
        displayed: f64,
    },
    /// Stop playing; the counter defaults to the current segment start
    Stop {
        #[arg(allow_negative_numbers = true)]
        counter: Option<f64>,
    },
    /// Confirm the balls in hand after stopping
    EndBalance {
        #[arg(allow_negative_numbers = true)]
        balls: f64,
    },
    /// Revert the most recent step
    Undo,
    /// Add money put into the machine, in yen
    Invest {
        #[arg(allow_negative_numbers = true)]
        yen: f64,
    },
    /// Calculate the session's expected value and add it to the totals
    Calc,
    /// Check the rotation rate so far; asks for the counter when it is missing
    MidCheck {
        #[arg(allow_negative_numbers = true)]
        counter: Option<f64>,
    },
    /// Show the current session log
    Log,
    /// Show the cumulative totals
    Totals,
    /// Clear today's log and investment
    ResetLog {
        #[arg(long)]
        yes: bool,
    },
    /// Zero the cumulative totals of the selected machine
    ResetTotals {
        #[arg(long)]
        yes: bool,
    },
}

impl Command {
    const fn name(&self) -> &'static str {
        match self {
            Self::Machines => "machines",
            Self::Select { .. } => "select",
            Self::Start { .. } => "start",
            Self::Hit { .. } => "hit",
            Self::Outcome { .. } => "outcome",
            Self::Payout { .. } => "payout",
            Self::Stop { .. } => "stop",
            Self::EndBalance { .. } => "end-balance",
            Self::Undo => "undo",
            Self::Invest { .. } => "invest",
            Self::Calc => "calc",
            Self::MidCheck { .. } => "mid-check",
            Self::Log => "log",
            Self::Totals => "totals",
            Self::ResetLog { .. } => "reset-log",
            Self::ResetTotals { .. } => "reset-totals",
        }
    }
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_logging(args.verbose);

    let catalog = load_catalog(args.catalog.as_deref())?;
    let storage = FileStorage::new(&args.data_dir);
    let mut tracker = match args.machine.as_deref() {
        Some(id) => Tracker::with_machine(&catalog, storage, id),
        None => Tracker::new(&catalog, storage),
    }
    .context("opening the tracker")?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match apply(&mut tracker, &args.command, &mut out, args.report) {
        Ok(outcome) => {
            if matches!(args.command, Command::Machines) {
                write_machines(&mut out, &tracker, args.report)?;
            } else {
                write_state(&mut out, &tracker, args.command.name(), &outcome, args.report)?;
            }
            if let Some(err) = tracker.last_persist_error() {
                eprintln!("{} {err}", "⚠".yellow());
            }
            out.flush()?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            out.flush()?;
            log::debug!("{} rejected: {err:?}", args.command.name());
            eprintln!("{} {err}", "✖".red());
            Ok(ExitCode::FAILURE)
        }
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

fn load_catalog(path: Option<&Path>) -> Result<StaticCatalog> {
    match path {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading machine catalog {}", path.display()))?;
            StaticCatalog::from_json(&json)
                .with_context(|| format!("parsing machine catalog {}", path.display()))
        }
        None => StaticCatalog::from_json(BUNDLED_CATALOG).context("parsing bundled machine catalog"),
    }
}

/// Run one command against the tracker. `Err` means the command was
/// rejected and nothing changed.
fn apply<W: Write>(
    tracker: &mut Tracker<FileStorage>,
    command: &Command,
    out: &mut W,
    format: ReportFormat,
) -> Result<Outcome> {
    let notice = match command {
        Command::Machines | Command::Log | Command::Totals => None,
        Command::Select { id } => {
            let machine = tracker.select_machine(id)?;
            Some(format!("selected {} ({})", machine.name, machine.id))
        }
        Command::Start { counter } => {
            tracker.start_session(*counter)?;
            Some(format!("session started at {counter}"))
        }
        Command::Hit { counter } => {
            tracker.record_hit(*counter)?;
            Some("hit recorded; choose the outcome next".to_string())
        }
        Command::Outcome { kind } => {
            tracker.confirm_outcome(*kind)?;
            Some(format!("outcome {} confirmed", kind.label()))
        }
        Command::Payout { displayed } => {
            tracker.confirm_payout(*displayed)?;
            Some("payout confirmed".to_string())
        }
        Command::Stop { counter } => {
            tracker.record_stop(*counter)?;
            Some("stopped; confirm the ending ball balance next".to_string())
        }
        Command::EndBalance { balls } => {
            tracker.confirm_end_balance(*balls)?;
            Some("ending balance confirmed".to_string())
        }
        Command::Undo => {
            tracker.undo_last()?;
            Some("last step undone".to_string())
        }
        Command::Invest { yen } => {
            let total = tracker.confirm_investment(*yen)?;
            Some(format!("total investment {total} yen"))
        }
        Command::Calc => {
            let result = tracker.finalize_calculation()?;
            write_notice(out, "calculation added to the totals", format)?;
            return Ok(Outcome::Calculation(result));
        }
        Command::MidCheck { counter } => {
            let report = tracker.mid_session_check(*counter, |min| prompt_counter(min, format))?;
            return Ok(Outcome::MidCheck(report));
        }
        Command::ResetLog { yes } => {
            if !yes {
                bail!("refusing to clear the log without --yes");
            }
            tracker.reset_daily_log();
            Some("daily log cleared".to_string())
        }
        Command::ResetTotals { yes } => {
            if !yes {
                bail!("refusing to reset the cumulative totals without --yes");
            }
            tracker.reset_cumulative_totals();
            Some("cumulative totals reset".to_string())
        }
    };
    if let Some(message) = notice {
        write_notice(out, &message, format)?;
    }
    Ok(Outcome::None)
}

/// Ask for the current data counter on stdin. Empty input or EOF cancels;
/// anything unparsable is handed on as NaN so the tracker rejects it.
fn prompt_counter(min: u64, format: ReportFormat) -> Option<f64> {
    if format == ReportFormat::Console {
        eprint!("current data counter (at least {min}): ");
        let _ = io::stderr().flush();
    }
    let mut line = String::new();
    match io::stdin().lock().read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.parse().unwrap_or(f64::NAN))
            }
        }
    }
}

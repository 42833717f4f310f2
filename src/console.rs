// ===============================
// src/console.rs (actor command parsing)
// ===============================
use thiserror::Error;

use crate::domain::{AnnotationEdit, CompoundingMode, NoteStatus};
use crate::ledger::MAX_STEPS;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Balance(f64),
    Rate(f64),
    Trades(i64),
    Mode(CompoundingMode),
    /// `timer` alone lists presets
    Timer(Option<u32>),
    Calc,
    Edit { index: u32, edit: AnnotationEdit },
    Show,
    Summary,
    Export(Option<String>),
    Cancel,
    Metrics,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq)]
pub enum CommandError {
    #[error("unknown command `{0}` (try `help`)")]
    Unknown(String),
    #[error("`{cmd}` needs {what}")]
    Missing { cmd: &'static str, what: &'static str },
    #[error("`{cmd}`: cannot parse `{value}` as {what}")]
    Invalid { cmd: &'static str, value: String, what: &'static str },
}

pub const HELP: &str = "\
commands:
  balance <amount>             initial balance
  rate <value>                 percent per trade (or amount in fixed mode), negative = loss
  trades <n>                   number of trades
  mode percentage|fixed        compounding mode
  timer [secs]                 countdown length (no argument lists presets)
  calc                         recalculate the ledger (after the countdown)
  note <trade> <text>          set a trade note (first edit per trade waits for the countdown)
  status <trade> profit|loss|unset
  clear <trade>                reset a trade's note and status
  show | summary               print the table / headline numbers
  export [path]                write the text report
  cancel                       drop the pending countdown
  metrics                      print counters
  help | quit";

fn parse_num<T: std::str::FromStr>(cmd: &'static str, what: &'static str, arg: Option<&str>) -> Result<T, CommandError> {
    let raw = arg.ok_or(CommandError::Missing { cmd, what })?;
    raw.trim_start_matches('$')
        .replace(',', "")
        .parse()
        .map_err(|_| CommandError::Invalid { cmd, value: raw.to_string(), what })
}

/// `inf`/`nan` parse as f64 but never make a usable balance or rate.
fn parse_amount(cmd: &'static str, what: &'static str, arg: Option<&str>) -> Result<f64, CommandError> {
    let v: f64 = parse_num(cmd, what, arg)?;
    if !v.is_finite() {
        return Err(CommandError::Invalid { cmd, value: arg.unwrap_or_default().to_string(), what });
    }
    Ok(v)
}

fn parse_steps(arg: Option<&str>) -> Result<i64, CommandError> {
    const WHAT: &str = "a whole number up to 100000";
    let v: i64 = parse_num("trades", WHAT, arg)?;
    if v > MAX_STEPS {
        return Err(CommandError::Invalid { cmd: "trades", value: arg.unwrap_or_default().to_string(), what: WHAT });
    }
    Ok(v)
}

fn parse_index(cmd: &'static str, arg: Option<&str>) -> Result<u32, CommandError> {
    parse_num(cmd, "a trade number", arg)
}

/// Parse one input line. Blank lines yield `Ok(None)`.
pub fn parse(line: &str) -> Result<Option<Command>, CommandError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (head, rest) = match line.split_once(char::is_whitespace) {
        Some((h, r)) => (h, r.trim()),
        None => (line, ""),
    };
    let mut args = rest.split_whitespace();

    let cmd = match head.to_ascii_lowercase().as_str() {
        "balance" | "b" => Command::Balance(parse_amount("balance", "an amount", args.next())?),
        "rate" | "r" => Command::Rate(parse_amount("rate", "a number", args.next())?),
        "trades" | "n" => Command::Trades(parse_steps(args.next())?),
        "mode" => {
            let raw = args.next().ok_or(CommandError::Missing { cmd: "mode", what: "percentage|fixed" })?;
            let mode = CompoundingMode::parse(raw)
                .ok_or_else(|| CommandError::Invalid { cmd: "mode", value: raw.to_string(), what: "percentage|fixed" })?;
            Command::Mode(mode)
        }
        "timer" | "t" => match args.next() {
            None => Command::Timer(None),
            Some(v) => Command::Timer(Some(parse_num("timer", "seconds", Some(v))?)),
        },
        "calc" | "calculate" | "c" => Command::Calc,
        "note" => {
            let index = parse_index("note", args.next())?;
            // everything after the index, spacing preserved
            let text = rest.split_once(char::is_whitespace).map(|(_, t)| t.trim()).unwrap_or("");
            Command::Edit { index, edit: AnnotationEdit::Note(text.to_string()) }
        }
        "status" => {
            let index = parse_index("status", args.next())?;
            let raw = args.next().ok_or(CommandError::Missing { cmd: "status", what: "profit|loss|unset" })?;
            let st = NoteStatus::parse(raw)
                .ok_or_else(|| CommandError::Invalid { cmd: "status", value: raw.to_string(), what: "profit|loss|unset" })?;
            Command::Edit { index, edit: AnnotationEdit::Status(st) }
        }
        "clear" => Command::Edit { index: parse_index("clear", args.next())?, edit: AnnotationEdit::Clear },
        "show" | "table" | "ls" => Command::Show,
        "summary" | "sum" => Command::Summary,
        "export" | "pdf" => Command::Export(args.next().map(str::to_string)),
        "cancel" => Command::Cancel,
        "metrics" => Command::Metrics,
        "help" | "h" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(Some(cmd))
}

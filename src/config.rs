// ===============================
// src/config.rs
// ===============================
/*
=============================================================================
Project : growth_gate — compounding trade ledger with a cool-down gate
Module  : config.rs
Version : 0.1.0
License : MIT (see LICENSE)

Summary : Projects account growth/decline over N trades (percentage or
          fixed step), forces a countdown before every recalculation and
          before a trade note is first edited, persists the session to a
          JSON store, exports a text report, and records JSONL events.
=============================================================================
*/
use clap::Parser;
use dotenvy::dotenv;
use std::env;

use crate::domain::{CompoundingConfig, CompoundingMode};
use crate::ledger::MAX_STEPS;

/// Countdown choices offered to the actor (seconds). Any positive value is accepted.
pub const TIMER_PRESETS: [(u32, &str); 7] = [
    (5, "5 seconds"),
    (10, "10 seconds"),
    (15, "15 seconds"),
    (20, "20 seconds"),
    (30, "30 seconds"),
    (60, "1 minute"),
    (600, "10 minutes"),
];

/// Command-line flags; anything left unset falls back to ENV, then defaults.
#[derive(Parser, Debug, Default)]
#[command(name = "growth_gate", version, about = "Compounding trade ledger with a cool-down gate")]
pub struct Cli {
    /// JSON file holding the persisted session
    #[arg(long)]
    pub store: Option<String>,
    /// Keep everything in memory (nothing is written to disk)
    #[arg(long)]
    pub memory: bool,
    /// Append session events as JSONL to this file
    #[arg(long)]
    pub record: Option<String>,
    /// Default path for `export`
    #[arg(long)]
    pub report: Option<String>,
    /// Countdown seconds used when nothing is stored yet
    #[arg(long)]
    pub timer: Option<u32>,
}

#[derive(Clone, Debug)]
pub struct Args {
    // files
    pub store_file: Option<String>, // None => memory only
    pub record_file: Option<String>,
    pub report_file: String,

    // logging
    pub log_level: String,

    // calculator defaults (used when the store has nothing)
    pub defaults: CompoundingConfig,
    pub default_timer_secs: u32,
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

pub fn load() -> Args {
    // .env first so RECORD_FILE, STORE_FILE etc. are visible
    let _ = dotenv();
    from_parts(Cli::parse())
}

pub fn from_parts(cli: Cli) -> Args {
    // ===== Files =====
    let store_file = if cli.memory {
        None
    } else {
        Some(cli.store.or_else(|| env::var("STORE_FILE").ok()).unwrap_or_else(|| "growth_gate.json".to_string()))
    };
    let record_file = cli.record.or_else(|| env::var("RECORD_FILE").ok()).filter(|s| !s.trim().is_empty());
    let report_file = cli
        .report
        .or_else(|| env::var("REPORT_FILE").ok())
        .unwrap_or_else(|| "trading-growth-report.txt".to_string());

    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

    // ===== Calculator defaults =====
    //   DEFAULT_BALANCE=100  DEFAULT_RATE=30  DEFAULT_TRADES=30  DEFAULT_MODE=percentage
    let base = CompoundingConfig::default();
    let defaults = CompoundingConfig {
        initial_balance: env_parse("DEFAULT_BALANCE").filter(|v: &f64| v.is_finite()).unwrap_or(base.initial_balance),
        rate: env_parse("DEFAULT_RATE").filter(|v: &f64| v.is_finite()).unwrap_or(base.rate),
        step_count: env_parse::<i64>("DEFAULT_TRADES").map(|n| n.min(MAX_STEPS)).unwrap_or(base.step_count),
        mode: env::var("DEFAULT_MODE").ok().and_then(|s| CompoundingMode::parse(&s)).unwrap_or(base.mode),
    };
    let default_timer_secs = cli
        .timer
        .or_else(|| env_parse("TIMER_SECS"))
        .filter(|&t| t > 0)
        .unwrap_or(10);

    Args { store_file, record_file, report_file, log_level, defaults, default_timer_secs }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_flag_disables_store() {
        let args = from_parts(Cli { memory: true, store: Some("x.json".into()), ..Default::default() });
        assert!(args.store_file.is_none());
    }

    #[test]
    fn flags_win_over_builtin_defaults() {
        let args = from_parts(Cli { store: Some("s.json".into()), report: Some("r.txt".into()), timer: Some(30), ..Default::default() });
        assert_eq!(args.store_file.as_deref(), Some("s.json"));
        assert_eq!(args.report_file, "r.txt");
        assert_eq!(args.default_timer_secs, 30);
    }

    #[test]
    fn zero_timer_flag_is_ignored() {
        let args = from_parts(Cli { timer: Some(0), ..Default::default() });
        assert!(args.default_timer_secs > 0);
    }

    #[test]
    fn presets_are_ascending() {
        assert!(TIMER_PRESETS.windows(2).all(|w| w[0].0 < w[1].0));
    }
}

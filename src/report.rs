// ===============================
// src/report.rs (table rendering + text export)
// ===============================
use std::fmt::Write as _;
use std::path::Path;
use thiserror::Error;

use crate::domain::{Annotation, CompoundingMode, NoteStatus};
use crate::format::{signed_usd, usd};
use crate::session::LedgerSession;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("nothing to export: ledger is empty")]
    EmptyLedger,
    #[error("report io: {0}")]
    Io(#[from] std::io::Error),
}

/// "Profit (30%)" / "Loss (12.5%)" header for the change column; fixed mode
/// shows the flat amount instead, e.g. "Profit ($5.00)".
pub fn change_header(rate: f64, mode: CompoundingMode) -> String {
    let side = if rate >= 0.0 { "Profit" } else { "Loss" };
    match mode {
        CompoundingMode::Percentage => format!("{side} ({}%)", rate.abs()),
        CompoundingMode::Fixed => format!("{side} ({})", usd(rate.abs())),
    }
}

fn note_cell(a: Option<&Annotation>) -> String {
    match a {
        None => String::new(),
        Some(a) if a.is_blank() => String::new(),
        Some(a) => match (a.status, a.note.is_empty()) {
            (NoteStatus::Unset, _) => a.note.clone(),
            (st, true) => format!("[{}]", st.as_str()),
            (st, false) => format!("[{}] {}", st.as_str(), a.note),
        },
    }
}

/// Rows as strings: Trade No, Start Balance, Change, End Balance, Note.
pub fn rows(session: &LedgerSession) -> Vec<[String; 5]> {
    session
        .ledger()
        .iter()
        .map(|r| {
            let opening = r.sequence_index == 0;
            [
                if opening { "Start".to_string() } else { r.sequence_index.to_string() },
                if opening { "-".to_string() } else { usd(r.opening_balance) },
                if opening { "-".to_string() } else { signed_usd(r.delta) },
                usd(r.closing_balance),
                note_cell(session.annotation(r.sequence_index)),
            ]
        })
        .collect()
}

pub fn render_table(session: &LedgerSession) -> String {
    let header = [
        "Trade No".to_string(),
        "Start Balance".to_string(),
        change_header(session.config().rate, session.config().mode),
        "End Balance".to_string(),
        "Note".to_string(),
    ];
    let body = rows(session);

    let mut widths = header.each_ref().map(|h| h.chars().count());
    for row in &body {
        for (w, cell) in widths.iter_mut().zip(row.iter()) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    let mut line = |cells: &[String; 5]| {
        let parts: Vec<String> = cells.iter().zip(widths.iter()).map(|(c, &w)| format!("{c:<w$}")).collect();
        let _ = writeln!(out, "| {} |", parts.join(" | ").trim_end());
    };
    line(&header);
    line(&widths.map(|w| "-".repeat(w)));
    for row in &body {
        line(row);
    }
    out
}

pub fn render_summary(session: &LedgerSession) -> String {
    let s = session.summary();
    let mut out = String::new();
    let _ = writeln!(out, "Initial Balance : {}", usd(s.initial_balance));
    let _ = writeln!(out, "{:<16}: {}", if s.is_profit() { "Total Profit" } else { "Total Loss" }, usd(s.total_change));
    let _ = writeln!(out, "Final Balance   : {}", usd(s.final_balance));
    out
}

pub fn render_report(session: &LedgerSession) -> Result<String, ReportError> {
    if session.ledger().is_empty() {
        return Err(ReportError::EmptyLedger);
    }
    let cfg = session.config();
    let s = session.summary();
    let mut out = String::new();
    let _ = writeln!(out, "Trading Growth Report");
    let _ = writeln!(out);
    let _ = writeln!(out, "Initial Balance: {}", usd(cfg.initial_balance));
    let unit = match cfg.mode {
        CompoundingMode::Percentage => "%",
        CompoundingMode::Fixed => " per trade",
    };
    let _ = writeln!(out, "Profit/Loss Rate: {}{}", cfg.rate, unit);
    let _ = writeln!(out, "Final Balance: {}", usd(s.final_balance));
    let _ = writeln!(out);
    out.push_str(&render_table(session));
    Ok(out)
}

pub fn export(session: &LedgerSession, path: impl AsRef<Path>) -> Result<usize, ReportError> {
    let body = render_report(session)?;
    if let Some(parent) = path.as_ref().parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, &body)?;
    Ok(session.ledger().len())
}

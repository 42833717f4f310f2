// ===============================
// src/ledger.rs
// ===============================
//
// Compounding ledger generator.
// - Percentage mode: delta = opening * rate/100  -> geometric growth
// - Fixed mode     : delta = rate                -> arithmetic growth
// Both chain the closing balance of step i-1 into the opening balance of step i.
// No rounding here; formatting rounds at the edge.
//
use crate::domain::{CompoundingConfig, CompoundingMode, TradeRecord};

/// Largest ledger ever generated; longer step counts are cut to this.
pub const MAX_STEPS: i64 = 100_000;

pub fn generate(cfg: &CompoundingConfig) -> Vec<TradeRecord> {
    if !cfg.initial_balance.is_finite() || cfg.initial_balance <= 0.0 || cfg.step_count <= 0 {
        return Vec::new();
    }
    let Ok(steps) = u32::try_from(cfg.step_count.min(MAX_STEPS)) else {
        return Vec::new();
    };
    let growth = cfg.rate / 100.0;

    let mut out = Vec::with_capacity(steps as usize + 1);
    out.push(TradeRecord {
        sequence_index: 0,
        opening_balance: cfg.initial_balance,
        delta: 0.0,
        closing_balance: cfg.initial_balance,
    });

    let mut balance = cfg.initial_balance;
    for i in 1..=steps {
        let delta = match cfg.mode {
            CompoundingMode::Percentage => balance * growth,
            CompoundingMode::Fixed => cfg.rate,
        };
        let closing = balance + delta;
        out.push(TradeRecord { sequence_index: i, opening_balance: balance, delta, closing_balance: closing });
        balance = closing;
    }
    out
}

/// Headline numbers shown above the table and in the exported report.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LedgerSummary {
    pub initial_balance: f64,
    pub final_balance: f64,
    pub total_change: f64,
}

impl LedgerSummary {
    pub fn is_profit(&self) -> bool { self.total_change >= 0.0 }
}

/// Read off the ledger itself; an empty ledger falls back to the configured
/// initial balance.
pub fn summarize(cfg: &CompoundingConfig, ledger: &[TradeRecord]) -> LedgerSummary {
    let initial_balance = ledger.first().map(|r| r.opening_balance).unwrap_or(cfg.initial_balance);
    let final_balance = ledger.last().map(|r| r.closing_balance).unwrap_or(initial_balance);
    LedgerSummary { initial_balance, final_balance, total_change: final_balance - initial_balance }
}

/// True when every record after the opening one starts where the previous one closed.
pub fn is_chained(ledger: &[TradeRecord]) -> bool {
    ledger.windows(2).all(|w| {
        w[1].opening_balance == w[0].closing_balance && w[1].sequence_index == w[0].sequence_index + 1
    })
}

// ===============================
// src/domain.rs
// ===============================
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompoundingMode { #[default] Percentage, Fixed }

impl CompoundingMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "percentage" | "percent" | "pct" | "%" => Some(CompoundingMode::Percentage),
            "fixed" | "amount" | "flat" => Some(CompoundingMode::Fixed),
            _ => None,
        }
    }
    pub fn as_str(&self) -> &'static str {
        match self { CompoundingMode::Percentage => "percentage", CompoundingMode::Fixed => "fixed" }
    }
}

/// Generator input. `step_count` is signed on purpose: negative counts are a
/// valid (empty) configuration, not a parse error.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompoundingConfig {
    pub initial_balance: f64,
    pub step_count: i64,
    pub mode: CompoundingMode,
    pub rate: f64,
}

impl Default for CompoundingConfig {
    fn default() -> Self {
        Self { initial_balance: 100.0, step_count: 30, mode: CompoundingMode::Percentage, rate: 30.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord { pub sequence_index: u32, pub opening_balance: f64, pub delta: f64, pub closing_balance: f64 }

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteStatus { Profit, Loss, #[default] Unset }

impl NoteStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "profit" | "win" | "p" => Some(NoteStatus::Profit),
            "loss" | "l" => Some(NoteStatus::Loss),
            "unset" | "none" | "-" => Some(NoteStatus::Unset),
            _ => None,
        }
    }
    pub fn as_str(&self) -> &'static str {
        match self { NoteStatus::Profit => "profit", NoteStatus::Loss => "loss", NoteStatus::Unset => "unset" }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Annotation { pub note: String, pub status: NoteStatus }

impl Annotation {
    pub fn is_blank(&self) -> bool { self.note.is_empty() && self.status == NoteStatus::Unset }
}

/// A single change to one record's annotation, applied once its index is unlocked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AnnotationEdit { Note(String), Status(NoteStatus), Clear }

/// What a gated request is for (labels for events and metrics).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateKind { Calculate, Unlock(u32) }

impl GateKind {
    pub fn label(&self) -> &'static str {
        match self { GateKind::Calculate => "calculate", GateKind::Unlock(_) => "unlock" }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    GateRequested { ts_ns: i128, kind: GateKind, duration_secs: u32 },
    GateSuperseded { ts_ns: i128, kind: GateKind },
    GateFired { ts_ns: i128, kind: GateKind },
    GateCancelled { ts_ns: i128, kind: GateKind },
    LedgerGenerated { ts_ns: i128, config: CompoundingConfig, records: usize, final_balance: f64 },
    LedgerCleared { ts_ns: i128, config: CompoundingConfig },
    Unlocked { ts_ns: i128, index: u32 },
    Annotated { ts_ns: i128, index: u32, annotation: Annotation },
    Note(String),
}

pub fn now_ns() -> i128 {
    chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0) as i128
}

// ===============================
// src/session.rs (ledger + annotations + unlocked indices)
// ===============================
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

use crate::domain::{now_ns, Annotation, AnnotationEdit, CompoundingConfig, Event, TradeRecord};
use crate::ledger::{self, LedgerSummary};

/// Everything that lives and dies with one generated ledger.
/// Deferred actions from the scheduler run against this.
#[derive(Debug, Default)]
pub struct LedgerSession {
    config: CompoundingConfig,
    ledger: Vec<TradeRecord>,
    annotations: BTreeMap<u32, Annotation>,
    unlocked: BTreeSet<u32>,
    outbox: Vec<Event>,
}

impl LedgerSession {
    pub fn new(config: CompoundingConfig) -> Self {
        Self { config, ..Default::default() }
    }

    /// Rebuild from persisted state. Annotations outside `1..=N` are dropped;
    /// nothing starts unlocked.
    pub fn restore(config: CompoundingConfig, ledger: Vec<TradeRecord>, annotations: BTreeMap<u32, Annotation>) -> Self {
        let mut s = Self::new(config);
        let n = ledger.len().saturating_sub(1) as u32;
        s.annotations = (1..=n).map(|i| (i, Annotation::default())).collect();
        for (i, a) in annotations {
            if let Some(slot) = s.annotations.get_mut(&i) {
                *slot = a;
            }
        }
        s.ledger = ledger;
        s
    }

    pub fn config(&self) -> &CompoundingConfig { &self.config }
    pub fn ledger(&self) -> &[TradeRecord] { &self.ledger }
    pub fn annotations(&self) -> &BTreeMap<u32, Annotation> { &self.annotations }
    pub fn annotation(&self, index: u32) -> Option<&Annotation> { self.annotations.get(&index) }
    pub fn unlocked(&self) -> &BTreeSet<u32> { &self.unlocked }
    pub fn is_unlocked(&self, index: u32) -> bool { self.unlocked.contains(&index) }
    pub fn summary(&self) -> LedgerSummary { ledger::summarize(&self.config, &self.ledger) }

    /// Highest trade index (`N`); 0 when the ledger is empty.
    pub fn last_index(&self) -> u32 { self.ledger.len().saturating_sub(1) as u32 }
    pub fn is_annotatable(&self, index: u32) -> bool { index >= 1 && index <= self.last_index() }

    /// Replace the ledger with one generated from `config`. Annotations reset
    /// to unset and the unlocked set is cleared in the same step.
    pub fn regenerate(&mut self, config: CompoundingConfig) {
        self.config = config;
        let ledger = ledger::generate(&self.config);
        self.unlocked.clear();
        let n = ledger.len().saturating_sub(1) as u32;
        self.annotations = (1..=n).map(|i| (i, Annotation::default())).collect();
        self.ledger = ledger;

        if self.ledger.is_empty() {
            info!(balance = self.config.initial_balance, steps = self.config.step_count, "ledger cleared (invalid config)");
            self.outbox.push(Event::LedgerCleared { ts_ns: now_ns(), config: self.config });
        } else {
            let s = self.summary();
            info!(records = self.ledger.len(), final_balance = s.final_balance, "ledger generated");
            self.outbox.push(Event::LedgerGenerated {
                ts_ns: now_ns(),
                config: self.config,
                records: self.ledger.len(),
                final_balance: s.final_balance,
            });
        }
    }

    pub fn mark_unlocked(&mut self, index: u32) -> bool {
        if !self.is_annotatable(index) {
            return false;
        }
        let fresh = self.unlocked.insert(index);
        if fresh {
            self.outbox.push(Event::Unlocked { ts_ns: now_ns(), index });
        }
        fresh
    }

    /// Apply one edit to an annotation. Returns false for indices outside `1..=N`.
    pub fn apply_edit(&mut self, index: u32, edit: AnnotationEdit) -> bool {
        let Some(slot) = self.annotations.get_mut(&index) else {
            return false;
        };
        match edit {
            AnnotationEdit::Note(text) => slot.note = text,
            AnnotationEdit::Status(st) => slot.status = st,
            AnnotationEdit::Clear => *slot = Annotation::default(),
        }
        let annotation = slot.clone();
        self.outbox.push(Event::Annotated { ts_ns: now_ns(), index, annotation });
        true
    }

    /// Events produced since the last drain, oldest first.
    pub fn drain_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.outbox)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CompoundingMode, NoteStatus};

    fn cfg(steps: i64) -> CompoundingConfig {
        CompoundingConfig { initial_balance: 100.0, step_count: steps, mode: CompoundingMode::Fixed, rate: 5.0 }
    }

    fn session(steps: i64) -> LedgerSession {
        let mut s = LedgerSession::new(cfg(steps));
        s.regenerate(cfg(steps));
        s
    }

    #[test]
    fn regenerate_resets_annotations_and_unlocks() {
        let mut s = session(3);
        assert_eq!(s.annotations().keys().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert!(s.annotation(0).is_none());

        assert!(s.mark_unlocked(2));
        assert!(s.apply_edit(2, AnnotationEdit::Note("entry late".into())));
        assert!(s.is_unlocked(2));

        s.regenerate(cfg(3));
        assert!(s.unlocked().is_empty());
        assert!(s.annotations().values().all(Annotation::is_blank));
    }

    #[test]
    fn invalid_config_clears_everything() {
        let mut s = session(3);
        s.mark_unlocked(1);
        s.regenerate(cfg(0));
        assert!(s.ledger().is_empty());
        assert!(s.annotations().is_empty());
        assert!(s.unlocked().is_empty());
        let events = s.drain_events();
        assert!(matches!(events.last(), Some(Event::LedgerCleared { .. })));
    }

    #[test]
    fn out_of_range_indices_are_ignored() {
        let mut s = session(2);
        assert!(!s.mark_unlocked(0));
        assert!(!s.mark_unlocked(3));
        assert!(!s.apply_edit(0, AnnotationEdit::Status(NoteStatus::Profit)));
        assert!(!s.apply_edit(9, AnnotationEdit::Clear));
        assert!(s.unlocked().is_empty());
    }

    #[test]
    fn restore_keeps_only_matching_annotations() {
        let src = session(2);
        let mut notes = BTreeMap::new();
        notes.insert(1, Annotation { note: "ok".into(), status: NoteStatus::Profit });
        notes.insert(7, Annotation { note: "stale".into(), status: NoteStatus::Loss });

        let s = LedgerSession::restore(*src.config(), src.ledger().to_vec(), notes);
        assert_eq!(s.annotation(1).map(|a| a.status), Some(NoteStatus::Profit));
        assert!(s.annotation(2).map(Annotation::is_blank).unwrap_or(false));
        assert!(s.annotation(7).is_none());
        assert!(s.unlocked().is_empty());
    }
}

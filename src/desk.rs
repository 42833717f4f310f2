// ===============================
// src/desk.rs (session owner: draft config + gate + store + recorder)
// ===============================
//
// Every ledger recalculation and every first edit of a trade note goes
// through the countdown gate. Once an index has paid its countdown it stays
// unlocked until the next recalculation.
//
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::domain::{now_ns, AnnotationEdit, CompoundingConfig, CompoundingMode, Event, GateKind};
use crate::ledger::MAX_STEPS;
use crate::metrics::{
    ANNOTATIONS, GATES_CANCELLED, GATES_FIRED, GATES_REQUESTED, GATES_SUPERSEDED, GATE_TICKS,
    LEDGERS_GENERATED, LEDGER_FINAL_BALANCE, LEDGER_RECORDS, UNLOCKS,
};
use crate::scheduler::{GateState, GatedScheduler, IntervalTimer, RequestOutcome, TickOutcome, Timer};
use crate::session::LedgerSession;
use crate::store::{self, KvStore, Snapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockOutcome {
    /// Index already unlocked; the edit ran immediately.
    Applied,
    /// Countdown started; the edit runs when it reaches zero.
    Gated(RequestOutcome),
    /// Index outside `1..=N` of the current ledger; nothing happened.
    OutOfRange,
}

pub struct Desk<T: Timer = IntervalTimer> {
    draft: CompoundingConfig,
    duration_secs: u32,
    session: LedgerSession,
    gate: GatedScheduler<LedgerSession, T>,
    store: Box<dyn KvStore>,
    rec_tx: Option<mpsc::Sender<Event>>,
}

impl<T: Timer> Desk<T> {
    pub fn new(snap: Snapshot, store: Box<dyn KvStore>, timer: T, rec_tx: Option<mpsc::Sender<Event>>) -> Self {
        let session = LedgerSession::restore(snap.ledger_config, snap.ledger, snap.annotations);
        Self {
            draft: snap.config,
            duration_secs: snap.timer_secs.max(1),
            session,
            gate: GatedScheduler::new(timer),
            store,
            rec_tx,
        }
    }

    pub fn draft(&self) -> &CompoundingConfig { &self.draft }
    pub fn session(&self) -> &LedgerSession { &self.session }
    pub fn duration_secs(&self) -> u32 { self.duration_secs }
    pub fn is_counting(&self) -> bool { self.gate.state() == GateState::Counting }
    pub fn remaining(&self) -> u32 { self.gate.remaining() }
    pub fn pending_kind(&self) -> Option<GateKind> { self.gate.pending_kind() }
    #[cfg(test)]
    pub fn gate(&self) -> &GatedScheduler<LedgerSession, T> { &self.gate }
    #[cfg(test)]
    pub fn store(&self) -> &dyn KvStore { self.store.as_ref() }

    // ---- form inputs (ungated; they only take effect on the next calculation) ----

    // non-finite amounts are ignored: they cannot be stored as JSON numbers
    pub fn set_initial_balance(&mut self, v: f64) {
        if v.is_finite() { self.draft.initial_balance = v; self.persist(); }
    }
    pub fn set_rate(&mut self, v: f64) {
        if v.is_finite() { self.draft.rate = v; self.persist(); }
    }
    pub fn set_step_count(&mut self, v: i64) { self.draft.step_count = v.min(MAX_STEPS); self.persist(); }
    pub fn set_mode(&mut self, v: CompoundingMode) { self.draft.mode = v; self.persist(); }

    /// New countdown length for the *next* request; a running countdown keeps
    /// its remaining seconds. Zero is rejected.
    pub fn set_duration(&mut self, secs: u32) -> bool {
        if secs == 0 {
            return false;
        }
        self.duration_secs = secs;
        debug!(secs, counting = self.gate.is_active(), "timer duration changed");
        self.persist();
        true
    }

    // ---- gated actions ----

    /// Queue a recalculation from the draft as it is *now*; edits made while
    /// counting down do not leak into this run.
    pub fn request_calculate(&mut self) -> RequestOutcome {
        let cfg = self.draft;
        let action = Box::new(move |s: &mut LedgerSession| s.regenerate(cfg));
        self.arm(GateKind::Calculate, action)
    }

    /// Pay the countdown once per index, then edit freely until the next
    /// recalculation.
    pub fn request_unlock_or_run(&mut self, index: u32, edit: AnnotationEdit) -> UnlockOutcome {
        if !self.session.is_annotatable(index) {
            debug!(index, last = self.session.last_index(), "unlock ignored: index out of range");
            return UnlockOutcome::OutOfRange;
        }
        if self.session.is_unlocked(index) {
            self.session.apply_edit(index, edit);
            self.settle();
            return UnlockOutcome::Applied;
        }
        let action = Box::new(move |s: &mut LedgerSession| {
            s.mark_unlocked(index);
            s.apply_edit(index, edit);
        });
        UnlockOutcome::Gated(self.arm(GateKind::Unlock(index), action))
    }

    fn arm(&mut self, kind: GateKind, action: Box<dyn FnOnce(&mut LedgerSession)>) -> RequestOutcome {
        let duration_secs = self.duration_secs;
        let outcome = self.gate.request_gated(kind, duration_secs, action);
        GATES_REQUESTED.with_label_values(&[kind.label()]).inc();
        if let RequestOutcome::Superseded(prev) = outcome {
            GATES_SUPERSEDED.with_label_values(&[prev.label()]).inc();
            self.record(Event::GateSuperseded { ts_ns: now_ns(), kind: prev });
            info!(?prev, ?kind, "pending action replaced");
        }
        self.record(Event::GateRequested { ts_ns: now_ns(), kind, duration_secs });
        outcome
    }

    /// One second elapsed on the gate timer.
    pub fn tick(&mut self) -> TickOutcome {
        if !self.gate.is_active() {
            return TickOutcome::Idle;
        }
        GATE_TICKS.inc();
        let out = self.gate.tick(&mut self.session);
        if let TickOutcome::Fired(kind) = out {
            GATES_FIRED.with_label_values(&[kind.label()]).inc();
            self.record(Event::GateFired { ts_ns: now_ns(), kind });
            self.settle();
        }
        out
    }

    pub fn cancel(&mut self) -> Option<GateKind> {
        let kind = self.gate.cancel()?;
        GATES_CANCELLED.inc();
        self.record(Event::GateCancelled { ts_ns: now_ns(), kind });
        info!(?kind, "pending action cancelled");
        Some(kind)
    }

    // ---- persistence / events ----

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            config: self.draft,
            timer_secs: self.duration_secs,
            ledger_config: *self.session.config(),
            ledger: self.session.ledger().to_vec(),
            annotations: self.session.annotations().clone(),
        }
    }

    pub fn persist(&mut self) -> bool {
        let snap = self.snapshot();
        store::save_logged(self.store.as_mut(), &snap)
    }

    /// Forward session events to metrics + recorder, then save.
    fn settle(&mut self) {
        for ev in self.session.drain_events() {
            match &ev {
                Event::LedgerGenerated { records, final_balance, .. } => {
                    LEDGERS_GENERATED.inc();
                    LEDGER_RECORDS.set(*records as i64);
                    LEDGER_FINAL_BALANCE.set(*final_balance);
                }
                Event::LedgerCleared { .. } => {
                    LEDGERS_GENERATED.inc();
                    LEDGER_RECORDS.set(0);
                    LEDGER_FINAL_BALANCE.set(0.0);
                }
                Event::Unlocked { .. } => UNLOCKS.inc(),
                Event::Annotated { .. } => ANNOTATIONS.inc(),
                _ => {}
            }
            self.record(ev);
        }
        self.persist();
    }

    fn record(&self, ev: Event) {
        if let Some(tx) = &self.rec_tx {
            if let Err(e) = tx.try_send(ev) {
                warn!(?e, "recorder channel full or closed, event dropped");
            }
        }
    }
}

impl Desk<IntervalTimer> {
    /// Resolves once per second while a countdown is running.
    pub async fn next_tick(&mut self) {
        self.gate.next_tick().await
    }
}

// ===============================
// src/scheduler.rs
// ===============================
//
// Single-slot countdown gate.
// - request_gated(): install a deferred action + start a 1s repeating timer
//   (a newer request replaces the pending one, no queue)
// - tick()        : called once per elapsed second, fires the action at 0
// - cancel()      : drop the pending action without running it
// The timer is started on entering Counting and cancelled on every exit.
//
use std::time::Duration;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::debug;

use crate::domain::GateKind;

pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Deferred action, owned by the scheduler until it fires.
pub type Deferred<C> = Box<dyn FnOnce(&mut C)>;

/// Repeating timer primitive. `cancel` must be idempotent.
pub trait Timer {
    fn start(&mut self, period: Duration);
    fn cancel(&mut self);
    fn is_running(&self) -> bool;
}

/// Production timer backed by `tokio::time::Interval`.
#[derive(Default)]
pub struct IntervalTimer {
    interval: Option<Interval>,
}

impl IntervalTimer {
    pub fn new() -> Self { Self::default() }

    /// Resolves on the next period; never resolves while cancelled.
    pub async fn tick(&mut self) {
        match self.interval.as_mut() {
            Some(iv) => { iv.tick().await; }
            None => std::future::pending::<()>().await,
        }
    }
}

impl Timer for IntervalTimer {
    fn start(&mut self, period: Duration) {
        // first tick one period from now, not immediately
        let mut iv = interval_at(Instant::now() + period, period);
        iv.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.interval = Some(iv);
    }
    fn cancel(&mut self) { self.interval = None; }
    fn is_running(&self) -> bool { self.interval.is_some() }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState { Idle, Counting }

/// Result of a request: whether it displaced an earlier pending action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    Accepted,
    Superseded(GateKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Idle,
    Counting { remaining: u32 },
    Fired(GateKind),
}

struct PendingAction<C> {
    kind: GateKind,
    callback: Option<Deferred<C>>,
}

pub struct GatedScheduler<C, T: Timer = IntervalTimer> {
    pending: Option<PendingAction<C>>,
    remaining: u32,
    active: bool,
    timer: T,
}

impl<C, T: Timer> GatedScheduler<C, T> {
    pub fn new(timer: T) -> Self {
        Self { pending: None, remaining: 0, active: false, timer }
    }

    pub fn state(&self) -> GateState {
        if self.active { GateState::Counting } else { GateState::Idle }
    }
    pub fn is_active(&self) -> bool { self.active }
    pub fn remaining(&self) -> u32 { self.remaining }
    pub fn pending_kind(&self) -> Option<GateKind> { self.pending.as_ref().map(|p| p.kind) }
    #[cfg(test)]
    pub fn timer(&self) -> &T { &self.timer }

    /// Install `action` to run after `duration_secs` ticks. Any pending action
    /// is dropped unfired and the countdown restarts from `duration_secs`.
    pub fn request_gated(&mut self, kind: GateKind, duration_secs: u32, action: Deferred<C>) -> RequestOutcome {
        let replaced = self.pending.take().map(|p| p.kind);
        // restart, never stack, the timer
        self.timer.cancel();

        self.pending = Some(PendingAction { kind, callback: Some(action) });
        self.remaining = duration_secs;
        self.active = true;
        self.timer.start(TICK_PERIOD);
        debug_assert!(self.timer.is_running());

        debug!(?kind, duration_secs, ?replaced, "gate armed");
        match replaced {
            Some(prev) => RequestOutcome::Superseded(prev),
            None => RequestOutcome::Accepted,
        }
    }

    /// One elapsed second. At zero the pending action runs exactly once and
    /// the scheduler goes back to Idle.
    pub fn tick(&mut self, ctx: &mut C) -> TickOutcome {
        if !self.active {
            return TickOutcome::Idle;
        }
        if self.remaining > 0 {
            self.remaining -= 1;
        }
        if self.remaining > 0 {
            return TickOutcome::Counting { remaining: self.remaining };
        }

        self.active = false;
        self.timer.cancel();
        match self.pending.take() {
            Some(PendingAction { kind, callback }) => {
                if let Some(cb) = callback {
                    cb(ctx);
                }
                TickOutcome::Fired(kind)
            }
            // nothing to run; still leave Counting cleanly
            None => TickOutcome::Idle,
        }
    }

    /// Drop the pending action (if any) without running it.
    pub fn cancel(&mut self) -> Option<GateKind> {
        self.active = false;
        self.remaining = 0;
        self.timer.cancel();
        self.pending.take().map(|p| p.kind)
    }
}

impl<C> GatedScheduler<C, IntervalTimer> {
    /// Wait for the next countdown tick; pends forever while Idle.
    pub async fn next_tick(&mut self) {
        self.timer.tick().await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Counts start/cancel calls so tests can check the timer is released.
    #[derive(Debug, Default)]
    pub(crate) struct ManualTimer {
        pub running: bool,
        pub starts: u32,
        pub cancels: u32,
    }

    impl Timer for ManualTimer {
        fn start(&mut self, _period: Duration) {
            assert!(!self.running, "timer started twice without cancel");
            self.running = true;
            self.starts += 1;
        }
        fn cancel(&mut self) {
            self.running = false;
            self.cancels += 1;
        }
        fn is_running(&self) -> bool { self.running }
    }

    type Log = Vec<&'static str>;

    fn push(tag: &'static str) -> Deferred<Log> {
        Box::new(move |log: &mut Log| log.push(tag))
    }

    fn sched() -> GatedScheduler<Log, ManualTimer> {
        GatedScheduler::new(ManualTimer::default())
    }

    #[test]
    fn fires_once_after_duration() {
        let mut s = sched();
        let mut log = Log::new();
        assert_eq!(s.request_gated(GateKind::Calculate, 3, push("a")), RequestOutcome::Accepted);
        assert_eq!(s.state(), GateState::Counting);
        assert!(s.timer().is_running());

        assert_eq!(s.tick(&mut log), TickOutcome::Counting { remaining: 2 });
        assert_eq!(s.tick(&mut log), TickOutcome::Counting { remaining: 1 });
        assert!(log.is_empty());
        assert_eq!(s.tick(&mut log), TickOutcome::Fired(GateKind::Calculate));
        assert_eq!(log, vec!["a"]);

        assert_eq!(s.state(), GateState::Idle);
        assert!(!s.timer().is_running());
        assert!(s.pending_kind().is_none());

        // further ticks do nothing
        assert_eq!(s.tick(&mut log), TickOutcome::Idle);
        assert_eq!(log, vec!["a"]);
    }

    #[test]
    fn newer_request_replaces_pending_one() {
        let mut s = sched();
        let mut log = Log::new();
        s.request_gated(GateKind::Calculate, 10, push("A"));
        let out = s.request_gated(GateKind::Unlock(2), 5, push("B"));
        assert_eq!(out, RequestOutcome::Superseded(GateKind::Calculate));
        assert_eq!(s.remaining(), 5);

        for _ in 0..4 {
            assert!(matches!(s.tick(&mut log), TickOutcome::Counting { .. }));
        }
        assert_eq!(s.tick(&mut log), TickOutcome::Fired(GateKind::Unlock(2)));
        for _ in 0..20 {
            s.tick(&mut log);
        }
        assert_eq!(log, vec!["B"]);
        // one live timer at a time: two starts, every start matched by a cancel
        assert_eq!(s.timer().starts, 2);
        assert!(!s.timer().is_running());
    }

    #[test]
    fn supersede_mid_countdown_resets_remaining() {
        let mut s = sched();
        let mut log = Log::new();
        s.request_gated(GateKind::Calculate, 4, push("A"));
        s.tick(&mut log);
        s.tick(&mut log);
        assert_eq!(s.remaining(), 2);
        s.request_gated(GateKind::Calculate, 4, push("B"));
        assert_eq!(s.remaining(), 4);
        for _ in 0..3 {
            s.tick(&mut log);
        }
        assert!(log.is_empty());
        s.tick(&mut log);
        assert_eq!(log, vec!["B"]);
    }

    #[test]
    fn zero_duration_fires_on_first_tick() {
        let mut s = sched();
        let mut log = Log::new();
        s.request_gated(GateKind::Calculate, 0, push("now"));
        assert!(s.is_active());
        assert_eq!(s.tick(&mut log), TickOutcome::Fired(GateKind::Calculate));
        assert_eq!(log, vec!["now"]);
    }

    #[test]
    fn cancel_drops_action_and_is_idempotent() {
        let mut s = sched();
        let mut log = Log::new();
        s.request_gated(GateKind::Unlock(1), 2, push("x"));
        assert_eq!(s.cancel(), Some(GateKind::Unlock(1)));
        assert_eq!(s.cancel(), None);
        assert_eq!(s.state(), GateState::Idle);
        assert!(!s.timer().is_running());
        for _ in 0..5 {
            assert_eq!(s.tick(&mut log), TickOutcome::Idle);
        }
        assert!(log.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn interval_timer_ticks_each_second_until_fired() {
        let mut s: GatedScheduler<Log> = GatedScheduler::new(IntervalTimer::new());
        let mut log = Log::new();
        s.request_gated(GateKind::Calculate, 2, push("done"));

        let started = Instant::now();
        s.next_tick().await;
        assert_eq!(s.tick(&mut log), TickOutcome::Counting { remaining: 1 });
        s.next_tick().await;
        assert_eq!(s.tick(&mut log), TickOutcome::Fired(GateKind::Calculate));
        assert_eq!(started.elapsed(), Duration::from_secs(2));
        assert_eq!(log, vec!["done"]);
        assert!(!s.timer().is_running());

        // idle scheduler never wakes up
        let idle = tokio::time::timeout(Duration::from_secs(30), s.next_tick()).await;
        assert!(idle.is_err());
    }
}

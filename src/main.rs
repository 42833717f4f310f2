// ===============================
// src/main.rs
// ===============================
/*
=============================================================================
Project : growth_gate — compounding trade ledger with a cool-down gate
Module  : main.rs
Version : 0.1.0
License : MIT (see LICENSE)

Summary : Projects account growth/decline over N trades (percentage or
          fixed step), forces a countdown before every recalculation and
          before a trade note is first edited, persists the session to a
          JSON store, exports a text report, and records JSONL events.

Usage   : cargo run -- --store ./state/session.json --record ./state/events.jsonl
          > rate 30
          > trades 10
          > calc          (countdown, then the table)
          > note 3 took profit early
=============================================================================
*/
mod config;
mod console;
mod desk;
mod domain;
mod format;
mod ledger;
mod metrics;
mod recorder;
mod report;
mod scheduler;
mod session;
mod store;

use tokio::{
    io::{AsyncBufReadExt, BufReader},
    select,
    sync::mpsc,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::console::Command;
use crate::desk::{Desk, UnlockOutcome};
use crate::domain::{Event, GateKind};
use crate::scheduler::{IntervalTimer, RequestOutcome, TickOutcome};
use crate::store::{JsonFileStore, KvStore, MemoryStore};

#[tokio::main]
async fn main() {
    // ---- Load config ----
    let args = config::load();

    // ---- Logging ----
    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    // ---- Metrics ----
    metrics::init();

    // ---- Store + restore ----
    let kv: Box<dyn KvStore> = match &args.store_file {
        Some(path) => Box::new(JsonFileStore::open(path)),
        None => Box::new(MemoryStore::new()),
    };
    let snap = store::load(kv.as_ref(), args.defaults, args.default_timer_secs);

    info!(
        store = ?args.store_file,
        record = ?args.record_file,
        report = %args.report_file,
        balance = snap.config.initial_balance,
        rate = snap.config.rate,
        trades = snap.config.step_count,
        mode = snap.config.mode.as_str(),
        timer_secs = snap.timer_secs,
        restored_records = snap.ledger.len(),
        "startup config"
    );

    // ---- Recorder (optional) ----
    let (rec_tx, rec_task) = match args.record_file.clone() {
        Some(path) => {
            let (tx, rx) = mpsc::channel::<Event>(1024);
            let task = tokio::spawn(recorder::run(rx, path));
            let _ = tx.try_send(Event::Note(format!("session started, {} stored records", snap.ledger.len())));
            (Some(tx), Some(task))
        }
        None => (None, None),
    };

    let mut desk: Desk = Desk::new(snap, kv, IntervalTimer::new(), rec_tx);
    println!("{}", console::HELP);
    print_state(&desk);

    // ---- Input + countdown loop ----
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        select! {
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(l)) => l,
                    Ok(None) => break,
                    Err(e) => {
                        warn!(?e, "stdin read failed");
                        break;
                    }
                };
                match console::parse(&line) {
                    Ok(Some(Command::Quit)) => break,
                    Ok(Some(cmd)) => handle(&mut desk, cmd, &args.report_file),
                    Ok(None) => {}
                    Err(e) => println!("{e}"),
                }
            }
            _ = desk.next_tick() => {
                match desk.tick() {
                    TickOutcome::Counting { remaining } => println!("  ... {remaining}"),
                    TickOutcome::Fired(kind) => {
                        println!("  ... go ({})", kind.label());
                        match kind {
                            GateKind::Calculate => print_state(&desk),
                            GateKind::Unlock(i) => println!("trade #{i} unlocked\n{}", report::render_table(desk.session())),
                        }
                    }
                    TickOutcome::Idle => {}
                }
            }
        }
    }

    if let Some(kind) = desk.pending_kind() {
        info!(?kind, "session ended with a pending action, discarded");
    }
    desk.persist();

    // closing the channel lets the recorder flush and stop
    drop(desk);
    if let Some(task) = rec_task {
        let _ = task.await;
    }
    info!("bye");
}

fn print_state(desk: &Desk) {
    let d = desk.draft();
    println!(
        "inputs: balance {}  rate {}  trades {}  mode {}  timer {}s",
        format::usd(d.initial_balance),
        d.rate,
        d.step_count,
        d.mode.as_str(),
        desk.duration_secs()
    );
    if desk.session().ledger().is_empty() {
        println!("no ledger yet: set balance/rate/trades and `calc`");
        return;
    }
    println!("{}", report::render_summary(desk.session()));
    println!("{}", report::render_table(desk.session()));
    let unlocked = desk.session().unlocked();
    if !unlocked.is_empty() {
        println!("unlocked trades: {:?}", unlocked);
    }
}

fn announce(outcome: RequestOutcome, secs: u32) {
    match outcome {
        RequestOutcome::Accepted => println!("calm down... {secs}s"),
        RequestOutcome::Superseded(prev) => println!("calm down... {secs}s (replaces pending {})", prev.label()),
    }
}

fn handle(desk: &mut Desk, cmd: Command, default_report: &str) {
    match cmd {
        Command::Balance(v) => desk.set_initial_balance(v),
        Command::Rate(v) => desk.set_rate(v),
        Command::Trades(v) => desk.set_step_count(v),
        Command::Mode(m) => desk.set_mode(m),
        Command::Timer(None) => {
            for (secs, label) in config::TIMER_PRESETS {
                let mark = if secs == desk.duration_secs() { "*" } else { " " };
                println!(" {mark} {secs:>4}  {label}");
            }
        }
        Command::Timer(Some(secs)) => {
            if !desk.set_duration(secs) {
                println!("timer must be at least 1 second");
            } else if desk.is_counting() {
                println!("timer set to {secs}s, applies from the next countdown");
            }
        }
        Command::Calc => {
            let out = desk.request_calculate();
            announce(out, desk.remaining());
        }
        Command::Edit { index, edit } => match desk.request_unlock_or_run(index, edit) {
            UnlockOutcome::Applied => println!("{}", report::render_table(desk.session())),
            UnlockOutcome::Gated(out) => announce(out, desk.remaining()),
            UnlockOutcome::OutOfRange => {
                println!("no trade #{index} (valid: 1..={})", desk.session().last_index())
            }
        },
        Command::Show => print_state(desk),
        Command::Summary => println!("{}", report::render_summary(desk.session())),
        Command::Export(path) => {
            let path = path.unwrap_or_else(|| default_report.to_string());
            match report::export(desk.session(), &path) {
                Ok(n) => {
                    info!(%path, rows = n, "report exported");
                    println!("wrote {path}");
                }
                Err(e) => {
                    warn!(?e, %path, "export failed");
                    println!("{e}");
                }
            }
        }
        Command::Cancel => match desk.cancel() {
            Some(kind) => println!("cancelled pending {}", kind.label()),
            None => println!("nothing pending"),
        },
        Command::Metrics => print!("{}", metrics::encode_metrics()),
        Command::Help => println!("{}", console::HELP),
        Command::Quit => {}
    }
}

use std::sync::mpsc;
use std::time::Duration;

use alarm::{AlarmTimings, Event};
use anyhow::{Context as _, Result};
use clap::Parser;
use tsm::EngineConfig;

#[derive(Parser, Debug)]
#[command(author, version, about = "Door alarm controller demo")]
struct Opts {
    /// Delay between enabling and being armed.
    #[arg(long = "arming-ms", default_value_t = 3000, value_name = "MS")]
    arming_ms: u64,

    /// Grace period after the door opens before the alarm triggers.
    #[arg(long = "grace-ms", default_value_t = 10000, value_name = "MS")]
    grace_ms: u64,

    /// When to simulate the door opening, counted from start-up.
    #[arg(long = "door-open-ms", default_value_t = 20000, value_name = "MS")]
    door_open_ms: u64,

    /// Dispatch loop poll interval; bounds shutdown latency.
    #[arg(long = "poll-ms", default_value_t = 1000, value_name = "MS")]
    poll_ms: u64,

    /// Stop after this many seconds instead of waiting for Ctrl-C.
    #[arg(long = "run-for", value_name = "SECS")]
    run_for: Option<u64>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let opts = Opts::parse();

    let timings = AlarmTimings {
        arming: Duration::from_millis(opts.arming_ms),
        grace: Duration::from_millis(opts.grace_ms),
    };
    let config = EngineConfig::builder()
        .name("alarm")
        .poll_interval(Duration::from_millis(opts.poll_ms))
        .build();

    let machine = alarm::builder(timings)?
        .config(config)
        .spawn()
        .context("failed to start alarm")?;

    let (quit_tx, quit_rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = quit_tx.send(());
    })
    .context("failed to install Ctrl-C handler")?;

    machine.process_event(Event::EnableAlarm)?;
    machine.future_event(Duration::from_millis(opts.door_open_ms), Event::DoorOpen)?;

    match opts.run_for {
        Some(secs) => {
            // Either Ctrl-C or the deadline ends the run.
            let _ = quit_rx.recv_timeout(Duration::from_secs(secs));
        }
        None => {
            let _ = quit_rx.recv();
        }
    }

    let (state, triggered) = machine.inspect(|state, alarm| (state, alarm.triggered));
    machine.stop()?;
    log::info!("final state {state}, triggered {triggered} time(s)");
    Ok(())
}

//! Many producer threads feeding one running machine.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use tsm::{symbols, EngineConfig, OverflowPolicy, StateMachine, StateTable};

static LOGGER: Lazy<()> = Lazy::new(|| {
    let _ = env_logger::builder().is_test(true).try_init();
});

symbols! {
    enum Mode { Counting }
}

symbols! {
    enum Tick { Red, Green, Blue }
}

#[derive(Default)]
struct Tally {
    red: usize,
    green: usize,
    blue: usize,
}

const PER_PRODUCER: usize = 300;

fn counting_machine(config: EngineConfig) -> StateMachine<Mode, Tick, Tally> {
    let table = StateTable::<Mode, Tick, Tally>::builder(Mode::Counting)
        .transition_with(
            Mode::Counting,
            Tick::Red,
            |ctx| {
                ctx.data_mut().red += 1;
                Ok(())
            },
            Mode::Counting,
        )
        .transition_with(
            Mode::Counting,
            Tick::Green,
            |ctx| {
                ctx.data_mut().green += 1;
                Ok(())
            },
            Mode::Counting,
        )
        .transition_with(
            Mode::Counting,
            Tick::Blue,
            |ctx| {
                ctx.data_mut().blue += 1;
                Ok(())
            },
            Mode::Counting,
        )
        .build()
        .unwrap();
    StateMachine::builder(table).config(config).spawn().unwrap()
}

fn wait_for_total(machine: &StateMachine<Mode, Tick, Tally>, total: usize) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if machine.inspect(|_, tally| tally.red + tally.green + tally.blue) == total {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    false
}

#[test]
fn every_posted_event_is_dispatched_exactly_once() {
    Lazy::force(&LOGGER);
    let config = EngineConfig::builder()
        .name("producers")
        .poll_interval(Duration::from_millis(20))
        .build();
    let machine = Arc::new(counting_machine(config));

    let handles: Vec<_> = Tick::ALL
        .iter()
        .map(|&tick| {
            let sender = machine.sender();
            thread::spawn(move || {
                for _ in 0..PER_PRODUCER {
                    sender.send(tick).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert!(wait_for_total(&machine, 3 * PER_PRODUCER));
    machine.inspect(|_, tally| {
        assert_eq!(tally.red, PER_PRODUCER);
        assert_eq!(tally.green, PER_PRODUCER);
        assert_eq!(tally.blue, PER_PRODUCER);
    });
    machine.stop().unwrap();
}

#[test]
fn blocking_queue_applies_backpressure_without_loss() {
    Lazy::force(&LOGGER);
    let config = EngineConfig::builder()
        .name("backpressure")
        .poll_interval(Duration::from_millis(20))
        .queue_capacity(4, OverflowPolicy::Block)
        .build();
    let machine = counting_machine(config);

    thread::scope(|scope| {
        for &tick in Tick::ALL {
            let machine = &machine;
            scope.spawn(move || {
                for _ in 0..PER_PRODUCER {
                    machine.post(tick).unwrap();
                }
            });
        }
    });

    assert!(wait_for_total(&machine, 3 * PER_PRODUCER));
    assert!(machine.queue_len() <= 4);
}

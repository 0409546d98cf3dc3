use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::config::EngineConfig;

mod table;

crate::symbols! {
    pub(crate) enum Light { Off, On, Broken }
}

crate::symbols! {
    pub(crate) enum Input { Toggle, Tap, Smash, Ignored }
}

/// Shared, ordered log of what actions and hooks observed.
#[derive(Clone, Default)]
pub(crate) struct Journal {
    lines: Arc<Mutex<Vec<String>>>,
}

impl Journal {
    pub(crate) fn push(&self, line: impl Into<String>) {
        self.lines.lock().unwrap().push(line.into());
    }

    pub(crate) fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }
}

pub(crate) fn fast_config(name: &str) -> EngineConfig {
    EngineConfig::builder()
        .name(name)
        .poll_interval(Duration::from_millis(20))
        .build()
}

/// Polls `condition` until it holds or `timeout` elapses.
pub(crate) fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

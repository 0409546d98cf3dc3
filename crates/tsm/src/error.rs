//! Error types for the runtime.
//!
//! Unmatched transitions, ambiguous tables and stale timer deliveries are not
//! errors; they are defined dispatch outcomes. The types here cover the faults
//! that remain: configuration mistakes, a full bounded queue, use after
//! shutdown, and failing actions.

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::action::ActionError;

/// Errors raised when posting into an [`EventQueue`](crate::queue::EventQueue).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("event queue full ({capacity} events)")]
    Full { capacity: usize },
    #[error("event queue closed")]
    Closed,
}

/// Errors raised by the [`TimedEventScheduler`](crate::timer::TimedEventScheduler).
#[derive(Error, Debug)]
pub enum TimerError {
    #[error("timer service has been shut down")]
    ShutDown,
    #[error("delay {delay:?} cannot be turned into a deadline")]
    DelayOutOfRange { delay: Duration },
    #[error("failed to spawn timer thread: {0}")]
    Spawn(#[source] io::Error),
}

/// Errors detected while building a [`StateTable`](crate::table::StateTable).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    #[error("state {state} has more than one enter hook")]
    DuplicateEnterHook { state: &'static str },
    #[error("state {state} has more than one exit hook")]
    DuplicateExitHook { state: &'static str },
}

/// Errors detected by [`EngineConfig::validate`](crate::config::EngineConfig::validate).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("poll interval must be greater than zero")]
    ZeroPollInterval,
    #[error("poll interval {0:?} is too large")]
    PollIntervalOutOfRange(Duration),
    #[error("queue capacity must be greater than zero")]
    ZeroQueueCapacity,
}

/// Failure of a single [`StateMachine::process_event`](crate::machine::StateMachine::process_event).
#[derive(Error, Debug)]
pub enum DispatchError {
    /// The transition action failed; the transition was not taken.
    #[error("action for {event} in state {state} failed: {source}")]
    Action {
        state: &'static str,
        event: &'static str,
        #[source]
        source: ActionError,
    },
    /// An exit or enter hook failed; the state change itself completed.
    #[error("{kind} hook of state {state} failed: {source}")]
    Hook {
        kind: HookKind,
        state: &'static str,
        #[source]
        source: ActionError,
    },
    #[error("state machine has been stopped")]
    Stopped,
    /// `process_event` was called from inside an action of the same machine.
    #[error("re-entrant dispatch from inside an action")]
    Reentrant,
}

/// Which hook a [`DispatchError::Hook`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    Enter,
    Exit,
}

impl std::fmt::Display for HookKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Enter => f.write_str("enter"),
            Self::Exit => f.write_str("exit"),
        }
    }
}

/// Lifecycle and posting errors of a [`StateMachine`](crate::machine::StateMachine).
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error(transparent)]
    Timer(#[from] TimerError),
    #[error("failed to spawn dispatch thread: {0}")]
    Spawn(#[source] io::Error),
    #[error("dispatch loop already running")]
    AlreadyRunning,
    #[error("state machine has been stopped")]
    Stopped,
    #[error("stop requested from inside an action")]
    StopFromAction,
}

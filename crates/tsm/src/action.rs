//! Actions and the engine handle passed to them.
//!
//! Transition actions and enter/exit hooks share one shape: a callable that
//! receives a [`Context`] for the owning state machine. Through the context an
//! action reads the current state, mutates the instance data and posts or
//! schedules further events.

use std::any::Any;
use std::error::Error;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::error::{QueueError, TimerError};
use crate::queue::EventQueue;
use crate::timer::TimedEventScheduler;

/// Error returned by a failing action.
pub type ActionError = Box<dyn Error + Send + Sync + 'static>;

pub type ActionResult = Result<(), ActionError>;

/// Shared, immutable action callable.
pub type Action<S, E, D> = Arc<dyn Fn(&mut Context<'_, S, E, D>) -> ActionResult + Send + Sync>;

/// An action panicked; the panic was contained by the engine.
#[derive(Error, Debug)]
#[error("action panicked: {message}")]
pub struct ActionPanicked {
    pub message: String,
}

/// Per-dispatch handle to the state machine running an action.
pub struct Context<'a, S, E, D> {
    state: S,
    event: E,
    data: &'a mut D,
    queue: &'a EventQueue<E>,
    timers: &'a TimedEventScheduler<E>,
    machine: &'a str,
}

impl<'a, S: Copy, E: Copy, D> Context<'a, S, E, D> {
    pub(crate) fn new(
        state: S,
        event: E,
        data: &'a mut D,
        queue: &'a EventQueue<E>,
        timers: &'a TimedEventScheduler<E>,
        machine: &'a str,
    ) -> Self {
        Self {
            state,
            event,
            data,
            queue,
            timers,
            machine,
        }
    }

    /// The current state.
    ///
    /// For transition actions and exit hooks this is the state being left;
    /// for enter hooks it is the state just entered.
    pub fn state(&self) -> S {
        self.state
    }

    /// The event being dispatched.
    pub fn event(&self) -> E {
        self.event
    }

    pub fn data(&self) -> &D {
        self.data
    }

    pub fn data_mut(&mut self) -> &mut D {
        self.data
    }

    /// Name of the owning state machine, for log output.
    pub fn machine_name(&self) -> &str {
        self.machine
    }

    /// Enqueues `event` behind everything already queued for this machine.
    pub fn post(&self, event: E) -> Result<(), QueueError> {
        self.queue.send(event)
    }

    /// Schedules `event` into this machine's queue after `delay`.
    pub fn future_event(&self, delay: Duration, event: E) -> Result<(), TimerError> {
        self.timers.schedule(delay, event)
    }

    pub(crate) fn set_state(&mut self, state: S) {
        self.state = state;
    }
}

/// Runs `action`, turning a panic into an [`ActionError`].
pub(crate) fn invoke<S, E, D>(action: &Action<S, E, D>, ctx: &mut Context<'_, S, E, D>) -> ActionResult {
    match panic::catch_unwind(AssertUnwindSafe(|| action.as_ref()(ctx))) {
        Ok(result) => result,
        Err(payload) => Err(Box::new(ActionPanicked {
            message: panic_message(payload.as_ref()),
        })),
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

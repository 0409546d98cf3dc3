//! Structured observation of the dispatch path.
//!
//! A [`TraceHook`] receives one [`TraceRecord`] per notable step, on the thread
//! doing the dispatch and in the order the steps happen. Hooks must be cheap;
//! they run inside the execution lock of the machine.

use std::sync::Arc;

/// One observed step of a state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceRecord<S, E> {
    /// The dispatch loop started in `state`.
    Started { state: S },
    /// The dispatch loop was stopped in `state`.
    Stopped { state: S },
    /// An event is about to be dispatched.
    Received { state: S, event: E },
    /// No transition row matched; nothing ran.
    Unhandled { state: S, event: E },
    /// The transition action for `event` ran (or the row had none).
    Action { state: S, event: E, target: S },
    /// The exit hook of `state` is due.
    Exit { state: S },
    /// `state` became current and its enter hook is due.
    Enter { state: S },
    /// An action or hook failed.
    Failed { state: S, event: E, error: String },
}

pub type TraceHook<S, E> = Arc<dyn Fn(&TraceRecord<S, E>) + Send + Sync>;

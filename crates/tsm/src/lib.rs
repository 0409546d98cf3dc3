//! # tsm
//!
//! A runtime for reactive, table-driven finite-state machines. Behaviour is
//! written down as a static transition table plus per-state enter/exit hooks;
//! the runtime owns the event queue, the delayed-event timer and the dispatch
//! loop that applies the table to every incoming event.
//!
//! ## Module Overview
//! - [`symbol`]  – Naming of state and event values for diagnostics.
//! - [`queue`]   – Thread-safe FIFO mailbox feeding the dispatch loop.
//! - [`timer`]   – One-shot delayed delivery of events into a queue.
//! - [`table`]   – Transition rows and enter/exit hooks.
//! - [`action`]  – Action callables and the [`Context`] handed to them.
//! - [`machine`] – The engine: dispatch, dispatch loop and lifecycle.
//! - [`config`]  – Engine sizing and timing configuration.
//! - [`trace`]   – Structured observation of dispatch.
//!
//! ## Example
//!
//! ```
//! use tsm::{symbols, StateMachine, StateTable};
//!
//! symbols! {
//!     pub enum Light { Off, On }
//! }
//! symbols! {
//!     pub enum Switch { Toggle }
//! }
//!
//! let table = StateTable::<Light, Switch>::builder(Light::Off)
//!     .transition(Light::Off, Switch::Toggle, Light::On)
//!     .transition(Light::On, Switch::Toggle, Light::Off)
//!     .build()
//!     .unwrap();
//!
//! let machine = StateMachine::builder(table).build().unwrap();
//! machine.process_event(Switch::Toggle).unwrap();
//! assert_eq!(machine.state(), Light::On);
//! ```

pub mod action;
pub mod config;
pub mod error;
pub mod machine;
pub mod queue;
pub mod symbol;
pub mod table;
pub mod timer;
pub mod trace;

pub use action::{Action, ActionError, ActionResult, Context};
pub use config::{EngineConfig, EngineConfigBuilder};
pub use error::{
    ConfigError, DispatchError, EngineError, HookKind, QueueError, TableError, TimerError,
};
pub use machine::{Dispatch, StateMachine, StateMachineBuilder};
pub use queue::{EventQueue, EventSender, OverflowPolicy, QueueConfig};
pub use symbol::Symbol;
pub use table::{StateTable, StateTableBuilder, Transition};
pub use timer::TimedEventScheduler;
pub use trace::{TraceHook, TraceRecord};

#[cfg(test)]
mod tests;

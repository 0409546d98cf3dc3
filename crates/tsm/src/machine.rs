//! The state machine engine.
//!
//! A [`StateMachine`] owns the current state, an immutable [`StateTable`], an
//! [`EventQueue`], a [`TimedEventScheduler`] and one dispatch thread. Events
//! reach it either through the queue (`post`, timers, actions) or directly
//! through [`StateMachine::process_event`]. Both paths take the same execution
//! lock, so at most one dispatch runs at a time and actions of one machine
//! never overlap.

use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use parking_lot::Mutex;

use crate::action::{invoke, panic_message, ActionError, Context};
use crate::config::EngineConfig;
use crate::error::{DispatchError, EngineError, HookKind};
use crate::queue::{EventQueue, EventSender};
use crate::symbol::Symbol;
use crate::table::StateTable;
use crate::timer::TimedEventScheduler;
use crate::trace::{TraceHook, TraceRecord};

/// Outcome of a successful dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch<S> {
    /// No row matched; nothing ran.
    Unhandled,
    /// A self-transition: the action ran, hooks were skipped.
    Internal(S),
    /// The state changed with exit and enter hooks run.
    Transitioned { from: S, to: S },
}

struct Core<S, D> {
    state: S,
    data: D,
}

/// Where a machine is in its one-way lifecycle.
enum Lifecycle {
    Idle,
    Running(JoinHandle<()>),
    Stopped,
}

struct Shared<S, E, D> {
    name: String,
    table: StateTable<S, E, D>,
    core: Mutex<Core<S, D>>,
    /// Copy of `core.state`, readable while a dispatch holds `core`.
    current: Mutex<S>,
    owner: Mutex<Option<ThreadId>>,
    queue: Arc<EventQueue<E>>,
    timers: TimedEventScheduler<E>,
    running: AtomicBool,
    stopped: AtomicBool,
    poll_interval: Duration,
    trace: Option<TraceHook<S, E>>,
}

/// Marks the current thread as dispatching for one machine.
struct OwnerGuard<'a> {
    slot: &'a Mutex<Option<ThreadId>>,
}

impl<'a> OwnerGuard<'a> {
    fn enter(slot: &'a Mutex<Option<ThreadId>>) -> Self {
        *slot.lock() = Some(thread::current().id());
        Self { slot }
    }
}

impl Drop for OwnerGuard<'_> {
    fn drop(&mut self) {
        *self.slot.lock() = None;
    }
}

impl<S: Symbol, E: Symbol, D: Send + 'static> Shared<S, E, D> {
    fn dispatching_here(&self) -> bool {
        *self.owner.lock() == Some(thread::current().id())
    }

    fn emit(&self, record: TraceRecord<S, E>) {
        if let Some(hook) = &self.trace {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| hook(&record))) {
                log::error!(
                    "{}: trace hook panicked on {record:?}: {}",
                    self.name,
                    panic_message(payload.as_ref())
                );
            }
        }
    }

    fn failed(&self, state: S, event: E, error: &ActionError) {
        log::error!(
            "{}: {} in state {} failed: {error}",
            self.name,
            event.name(),
            state.name()
        );
        self.emit(TraceRecord::Failed {
            state,
            event,
            error: error.to_string(),
        });
    }

    fn current(&self) -> S {
        *self.current.lock()
    }

    fn dispatch(&self, event: E) -> Result<Dispatch<S>, DispatchError> {
        if self.dispatching_here() {
            return Err(DispatchError::Reentrant);
        }
        let mut core = self.core.lock();
        if self.stopped.load(Ordering::Acquire) {
            return Err(DispatchError::Stopped);
        }
        let _owner = OwnerGuard::enter(&self.owner);
        let Core { state, data } = &mut *core;
        let current = *state;

        log::debug!("{}: {} received in {}", self.name, event.name(), current.name());
        self.emit(TraceRecord::Received {
            state: current,
            event,
        });

        let Some(row) = self.table.find(current, event) else {
            log::debug!("{}: {} unhandled in {}", self.name, event.name(), current.name());
            self.emit(TraceRecord::Unhandled {
                state: current,
                event,
            });
            return Ok(Dispatch::Unhandled);
        };

        let mut ctx = Context::new(current, event, data, &self.queue, &self.timers, &self.name);
        if let Some(action) = &row.action {
            if let Err(source) = invoke(action, &mut ctx) {
                self.failed(current, event, &source);
                return Err(DispatchError::Action {
                    state: current.name(),
                    event: event.name(),
                    source,
                });
            }
        }

        let next = row.to;
        self.emit(TraceRecord::Action {
            state: current,
            event,
            target: next,
        });
        if next == current {
            return Ok(Dispatch::Internal(current));
        }

        let mut hook_error = None;

        self.emit(TraceRecord::Exit { state: current });
        if let Some(hook) = self.table.exit_hook(current) {
            if let Err(source) = invoke(hook, &mut ctx) {
                self.failed(current, event, &source);
                hook_error = Some(DispatchError::Hook {
                    kind: HookKind::Exit,
                    state: current.name(),
                    source,
                });
            }
        }

        *state = next;
        *self.current.lock() = next;
        ctx.set_state(next);
        log::info!(
            "{}: {} -> {} on {}",
            self.name,
            current.name(),
            next.name(),
            event.name()
        );

        self.emit(TraceRecord::Enter { state: next });
        if let Some(hook) = self.table.enter_hook(next) {
            if let Err(source) = invoke(hook, &mut ctx) {
                self.failed(next, event, &source);
                if hook_error.is_none() {
                    hook_error = Some(DispatchError::Hook {
                        kind: HookKind::Enter,
                        state: next.name(),
                        source,
                    });
                }
            }
        }

        match hook_error {
            Some(err) => Err(err),
            None => Ok(Dispatch::Transitioned {
                from: current,
                to: next,
            }),
        }
    }
}

/// Clears the running flag however the dispatch loop exits.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn run_loop<S: Symbol, E: Symbol, D: Send + 'static>(shared: Arc<Shared<S, E, D>>) {
    let _running = RunningGuard(&shared.running);
    let state = shared.current();
    log::info!("{}: dispatch loop started in {}", shared.name, state.name());
    shared.emit(TraceRecord::Started { state });

    while shared.running.load(Ordering::Acquire) {
        let Some(event) = shared.queue.try_receive(shared.poll_interval) else {
            continue;
        };
        if !shared.running.load(Ordering::Acquire) {
            // Stop was requested while waiting; leave the event queued.
            shared.queue.requeue_front(event);
            break;
        }
        match shared.dispatch(event) {
            Ok(_) => {}
            Err(DispatchError::Stopped) => {
                // Another caller finished stopping first.
                shared.queue.requeue_front(event);
                break;
            }
            Err(err) => log::error!("{}: dispatch failed: {err}", shared.name),
        }
    }

    log::debug!("{}: dispatch loop exited", shared.name);
}

/// Table-driven state machine with its own event queue, timers and
/// dispatch thread.
///
/// The lifecycle is one-way: idle after [`build`](StateMachineBuilder::build),
/// running after [`start`](Self::start), stopped after [`stop`](Self::stop) or
/// drop. Dropping the machine stops it and joins the dispatch thread.
pub struct StateMachine<S: Symbol, E: Symbol, D: Send + 'static = ()> {
    shared: Arc<Shared<S, E, D>>,
    lifecycle: Mutex<Lifecycle>,
}

impl<S: Symbol, E: Symbol, D: Send + Default + 'static> StateMachine<S, E, D> {
    /// Starts building a machine whose instance data is `D::default()`.
    pub fn builder(table: StateTable<S, E, D>) -> StateMachineBuilder<S, E, D> {
        StateMachineBuilder::new(table, D::default())
    }
}

impl<S: Symbol, E: Symbol, D: Send + 'static> StateMachine<S, E, D> {
    /// Starts building a machine carrying `data`.
    pub fn with_data(table: StateTable<S, E, D>, data: D) -> StateMachineBuilder<S, E, D> {
        StateMachineBuilder::new(table, data)
    }

    /// Dispatches `event` against the current state, synchronously.
    ///
    /// 1. The first row matching (current state, `event`) is selected; with
    ///    none, nothing happens and [`Dispatch::Unhandled`] is returned.
    /// 2. The row's action runs. If it fails the state is left unchanged.
    /// 3. On a self-transition no hook runs.
    /// 4. Otherwise the exit hook of the current state runs, the state is
    ///    assigned, then the enter hook of the new state runs.
    ///
    /// Serialised with the dispatch loop and with other callers. Calling this
    /// from inside one of this machine's own actions fails with
    /// [`DispatchError::Reentrant`]; use [`Context::post`] instead.
    pub fn process_event(&self, event: E) -> Result<Dispatch<S>, DispatchError> {
        self.shared.dispatch(event)
    }

    /// Enqueues `event` for the dispatch loop.
    pub fn post(&self, event: E) -> Result<(), EngineError> {
        self.shared.queue.send(event)?;
        Ok(())
    }

    /// Schedules `event` into this machine's queue once `delay` has elapsed.
    ///
    /// Returns immediately and cannot be cancelled. The event is dispatched
    /// against whatever state is current when it arrives.
    pub fn future_event(&self, delay: Duration, event: E) -> Result<(), EngineError> {
        self.shared.timers.schedule(delay, event)?;
        Ok(())
    }

    /// Producer handle for other threads.
    pub fn sender(&self) -> EventSender<E> {
        EventSender::new(Arc::clone(&self.shared.queue))
    }

    /// Launches the dispatch loop on a dedicated thread.
    pub fn start(&self) -> Result<(), EngineError> {
        let mut lifecycle = self.lifecycle.lock();
        match *lifecycle {
            Lifecycle::Idle => {}
            Lifecycle::Running(_) => return Err(EngineError::AlreadyRunning),
            Lifecycle::Stopped => return Err(EngineError::Stopped),
        }

        self.shared.running.store(true, Ordering::Release);
        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name(format!("{}-dispatch", self.shared.name))
            .spawn(move || run_loop(shared));
        match spawned {
            Ok(handle) => {
                *lifecycle = Lifecycle::Running(handle);
                Ok(())
            }
            Err(err) => {
                self.shared.running.store(false, Ordering::Release);
                Err(EngineError::Spawn(err))
            }
        }
    }

    /// Stops the dispatch loop and blocks until it has exited.
    ///
    /// Takes at most one poll interval plus the dispatch in progress. Waits
    /// for concurrent direct [`process_event`](Self::process_event) calls,
    /// then closes the queue and discards pending timers. Events still queued
    /// are never dispatched. Idempotent.
    pub fn stop(&self) -> Result<(), EngineError> {
        if self.shared.dispatching_here() {
            return Err(EngineError::StopFromAction);
        }

        let previous = {
            let mut lifecycle = self.lifecycle.lock();
            self.shared.running.store(false, Ordering::Release);
            mem::replace(&mut *lifecycle, Lifecycle::Stopped)
        };
        if let Lifecycle::Running(handle) = previous {
            if handle.join().is_err() {
                log::error!("{}: dispatch thread panicked", self.shared.name);
            }
        }

        let newly_stopped = {
            let core = self.shared.core.lock();
            let _owner = OwnerGuard::enter(&self.shared.owner);
            let newly_stopped = !self.shared.stopped.swap(true, Ordering::AcqRel);
            if newly_stopped {
                self.shared.emit(TraceRecord::Stopped { state: core.state });
                log::info!(
                    "{}: stopped in {} with {} event(s) queued",
                    self.shared.name,
                    core.state.name(),
                    self.shared.queue.len()
                );
            }
            newly_stopped
        };
        if newly_stopped {
            self.shared.queue.close();
            self.shared.timers.shutdown();
        }
        Ok(())
    }

    /// The current state.
    ///
    /// Never waits for a dispatch in progress. During a transition the new
    /// state is visible from the moment it is assigned, before its enter hook
    /// runs.
    pub fn state(&self) -> S {
        self.shared.current()
    }

    /// Runs `f` with the current state and instance data under the
    /// execution lock.
    ///
    /// # Panics
    ///
    /// When called from this machine's own actions, hooks or trace hook,
    /// which already hold the execution lock. Such a panic is contained like
    /// any other action panic. Actions use [`Context::data`] instead.
    pub fn inspect<R>(&self, f: impl FnOnce(S, &D) -> R) -> R {
        assert!(
            !self.shared.dispatching_here(),
            "{}: inspect called from inside a dispatch",
            self.shared.name
        );
        let core = self.shared.core.lock();
        f(core.state, &core.data)
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.stopped.load(Ordering::Acquire)
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn table(&self) -> &StateTable<S, E, D> {
        &self.shared.table
    }

    /// Events waiting in the queue.
    pub fn queue_len(&self) -> usize {
        self.shared.queue.len()
    }

    /// Scheduled events that have not fired yet.
    pub fn pending_timers(&self) -> usize {
        self.shared.timers.pending()
    }
}

impl<S: Symbol, E: Symbol, D: Send + 'static> Drop for StateMachine<S, E, D> {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            // Dropped from inside an action: the loop exits at its next poll.
            log::warn!("{}: {err}; dispatch thread not joined", self.shared.name);
            self.shared.running.store(false, Ordering::Release);
        }
    }
}

/// Builder for [`StateMachine`].
pub struct StateMachineBuilder<S, E, D> {
    table: StateTable<S, E, D>,
    data: D,
    config: EngineConfig,
    trace: Option<TraceHook<S, E>>,
}

impl<S: Symbol, E: Symbol, D: Send + 'static> StateMachineBuilder<S, E, D> {
    pub fn new(table: StateTable<S, E, D>, data: D) -> Self {
        Self {
            table,
            data,
            config: EngineConfig::default(),
            trace: None,
        }
    }

    /// Replaces the instance data.
    pub fn data(mut self, data: D) -> Self {
        self.data = data;
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn trace_hook(mut self, hook: TraceHook<S, E>) -> Self {
        self.trace = Some(hook);
        self
    }

    /// Builds an idle machine in the table's initial state.
    pub fn build(self) -> Result<StateMachine<S, E, D>, EngineError> {
        self.config.validate()?;

        let queue = Arc::new(EventQueue::with_config(self.config.queue));
        let timers =
            TimedEventScheduler::with_name(Arc::clone(&queue), &format!("{}-timer", self.config.name))?;
        let initial = self.table.initial();
        log::info!("{}: initial state {}", self.config.name, initial.name());

        let shared = Arc::new(Shared {
            name: self.config.name,
            table: self.table,
            core: Mutex::new(Core {
                state: initial,
                data: self.data,
            }),
            current: Mutex::new(initial),
            owner: Mutex::new(None),
            queue,
            timers,
            running: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            poll_interval: self.config.poll_interval,
            trace: self.trace,
        });

        Ok(StateMachine {
            shared,
            lifecycle: Mutex::new(Lifecycle::Idle),
        })
    }

    /// Builds the machine and starts its dispatch loop.
    pub fn spawn(self) -> Result<StateMachine<S, E, D>, EngineError> {
        let machine = self.build()?;
        machine.start()?;
        Ok(machine)
    }
}

//! Delayed delivery of events into an [`EventQueue`].
//!
//! All timers of one scheduler are serviced by a single thread that sleeps on
//! a min-heap of deadlines. A scheduled delivery cannot be cancelled: it is
//! sent exactly once, no earlier than its delay, regardless of what the state
//! machine has done in the meantime.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::error::TimerError;
use crate::queue::EventQueue;

/// Stand-in delay for deadlines that overflow [`Instant`]: about a century.
pub const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

fn deadline_after(delay: Duration) -> Option<Instant> {
    let now = Instant::now();
    now.checked_add(delay).or_else(|| now.checked_add(FAR_FUTURE))
}

struct Pending<E> {
    deadline: Instant,
    seq: u64,
    event: E,
}

impl<E> PartialEq for Pending<E> {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl<E> Eq for Pending<E> {}

impl<E> PartialOrd for Pending<E> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<E> Ord for Pending<E> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.deadline
            .cmp(&other.deadline)
            .then(self.seq.cmp(&other.seq))
    }
}

struct TimerState<E> {
    heap: BinaryHeap<Reverse<Pending<E>>>,
    next_seq: u64,
    shutdown: bool,
}

struct Inner<E> {
    state: Mutex<TimerState<E>>,
    wake: Condvar,
    queue: Arc<EventQueue<E>>,
}

/// One-shot timer service bound to a single event queue.
pub struct TimedEventScheduler<E> {
    inner: Arc<Inner<E>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<E: Send + 'static> TimedEventScheduler<E> {
    /// Starts the timer thread for `queue`.
    pub fn new(queue: Arc<EventQueue<E>>) -> Result<Self, TimerError> {
        Self::with_name(queue, "tsm-timer")
    }

    pub fn with_name(queue: Arc<EventQueue<E>>, name: &str) -> Result<Self, TimerError> {
        let inner = Arc::new(Inner {
            state: Mutex::new(TimerState {
                heap: BinaryHeap::new(),
                next_seq: 0,
                shutdown: false,
            }),
            wake: Condvar::new(),
            queue,
        });

        let worker_inner = Arc::clone(&inner);
        let handle = thread::Builder::new()
            .name(name.to_owned())
            .spawn(move || run(&worker_inner))
            .map_err(TimerError::Spawn)?;

        Ok(Self {
            inner,
            worker: Mutex::new(Some(handle)),
        })
    }
}

impl<E> TimedEventScheduler<E> {
    /// Arranges for `event` to be sent to the queue once `delay` has elapsed.
    ///
    /// Returns immediately. There is no handle to abort the delivery.
    ///
    /// A delay too large to represent as a deadline is clamped to
    /// [`FAR_FUTURE`], which in practice never fires.
    pub fn schedule(&self, delay: Duration, event: E) -> Result<(), TimerError> {
        let deadline = deadline_after(delay).ok_or(TimerError::DelayOutOfRange { delay })?;
        let mut state = self.inner.state.lock();
        if state.shutdown {
            return Err(TimerError::ShutDown);
        }
        let seq = state.next_seq;
        state.next_seq += 1;

        // Only an earlier deadline than the current head changes how long the
        // timer thread has to sleep.
        let earliest = state
            .heap
            .peek()
            .map_or(true, |Reverse(head)| deadline < head.deadline);
        state.heap.push(Reverse(Pending {
            deadline,
            seq,
            event,
        }));
        if earliest {
            self.inner.wake.notify_one();
        }
        log::trace!("timer #{seq} armed for {delay:?}");
        Ok(())
    }

    /// Number of deliveries that have not fired yet.
    pub fn pending(&self) -> usize {
        self.inner.state.lock().heap.len()
    }

    /// Stops the timer thread and discards undelivered timers.
    ///
    /// Idempotent; later calls to [`schedule`](Self::schedule) fail with
    /// [`TimerError::ShutDown`].
    pub fn shutdown(&self) {
        {
            let mut state = self.inner.state.lock();
            if !state.shutdown {
                state.shutdown = true;
                let discarded = state.heap.len();
                state.heap.clear();
                if discarded > 0 {
                    log::warn!("timer shutdown discarded {discarded} pending event(s)");
                }
            }
            self.inner.wake.notify_all();
        }

        if let Some(handle) = self.worker.lock().take() {
            if handle.join().is_err() {
                log::error!("timer thread panicked");
            }
        }
    }
}

impl<E> Drop for TimedEventScheduler<E> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run<E>(inner: &Inner<E>) {
    let mut state = inner.state.lock();
    while !state.shutdown {
        match next_due(&mut state) {
            Some(due) => {
                let seq = due.seq;
                // Deliver without holding the timer lock so a blocking queue
                // cannot stall `schedule`.
                let result = MutexGuard::unlocked(&mut state, || inner.queue.send(due.event));
                match result {
                    Ok(()) => log::trace!("timer #{seq} fired"),
                    Err(err) => log::warn!("timer #{seq} could not deliver event: {err}"),
                }
            }
            None => match state.heap.peek() {
                Some(Reverse(head)) => {
                    let deadline = head.deadline;
                    inner.wake.wait_until(&mut state, deadline);
                }
                None => inner.wake.wait(&mut state),
            },
        }
    }
}

fn next_due<E>(state: &mut TimerState<E>) -> Option<Pending<E>> {
    match state.heap.peek() {
        Some(Reverse(head)) if head.deadline <= Instant::now() => {
            state.heap.pop().map(|Reverse(due)| due)
        }
        _ => None,
    }
}

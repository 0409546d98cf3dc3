//! Event queue feeding the dispatch loop.
//!
//! A FIFO mailbox shared between any number of producers (callers, timers,
//! actions) and the single consumer owned by the state machine. The queue has
//! no knowledge of states or tables.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::QueueError;

/// What a bounded queue does when a producer posts into a full queue.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Refuse the new event with [`QueueError::Full`].
    #[default]
    Reject,
    /// Evict the oldest queued event to make room.
    DropOldest,
    /// Suspend the producer until the consumer makes room.
    ///
    /// An action posting into its own full machine blocks the consumer and
    /// never returns.
    Block,
}

/// Sizing of an [`EventQueue`].
///
/// The default is unbounded: `send` never blocks and never fails, at the cost
/// of unlimited growth when producers outpace the consumer.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct QueueConfig {
    pub capacity: Option<usize>,
    pub overflow: OverflowPolicy,
}

impl QueueConfig {
    pub const fn unbounded() -> Self {
        Self {
            capacity: None,
            overflow: OverflowPolicy::Reject,
        }
    }

    pub const fn bounded(capacity: usize, overflow: OverflowPolicy) -> Self {
        Self {
            capacity: Some(capacity),
            overflow,
        }
    }
}

/// Thread-safe FIFO of events.
pub struct EventQueue<E> {
    events: Mutex<VecDeque<E>>,
    available: Condvar,
    space: Condvar,
    closed: AtomicBool,
    config: QueueConfig,
}

impl<E> EventQueue<E> {
    /// Creates an unbounded queue.
    pub fn new() -> Self {
        Self::with_config(QueueConfig::unbounded())
    }

    pub fn with_config(config: QueueConfig) -> Self {
        Self {
            events: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
            space: Condvar::new(),
            closed: AtomicBool::new(false),
            config,
        }
    }

    /// Appends `event` at the tail and wakes one waiting receiver.
    ///
    /// On an unbounded queue this never blocks and never fails. On a full
    /// bounded queue the configured [`OverflowPolicy`] applies. Fails with
    /// [`QueueError::Closed`] once the queue is closed.
    pub fn send(&self, event: E) -> Result<(), QueueError> {
        let mut events = self.events.lock();
        if self.is_closed() {
            return Err(QueueError::Closed);
        }
        if let Some(capacity) = self.config.capacity {
            match self.config.overflow {
                OverflowPolicy::Reject if events.len() >= capacity => {
                    return Err(QueueError::Full { capacity });
                }
                OverflowPolicy::DropOldest if events.len() >= capacity => {
                    events.pop_front();
                    log::warn!("event queue full ({capacity}), dropped oldest event");
                }
                OverflowPolicy::Block => {
                    while events.len() >= capacity {
                        self.space.wait(&mut events);
                        if self.is_closed() {
                            return Err(QueueError::Closed);
                        }
                    }
                }
                _ => {}
            }
        }
        events.push_back(event);
        self.available.notify_one();
        Ok(())
    }

    /// Blocks until an event is available and dequeues it.
    pub fn receive(&self) -> E {
        let mut events = self.events.lock();
        loop {
            if let Some(event) = events.pop_front() {
                self.space.notify_one();
                return event;
            }
            self.available.wait(&mut events);
        }
    }

    /// Waits at most `timeout` for the next event.
    ///
    /// Returns `None` on timeout without consuming anything. A timeout too
    /// large to represent as a deadline waits like [`receive`](Self::receive).
    pub fn try_receive(&self, timeout: Duration) -> Option<E> {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return Some(self.receive());
        };
        let mut events = self.events.lock();
        loop {
            if let Some(event) = events.pop_front() {
                self.space.notify_one();
                return Some(event);
            }
            if self.available.wait_until(&mut events, deadline).timed_out() {
                let event = events.pop_front();
                if event.is_some() {
                    self.space.notify_one();
                }
                return event;
            }
        }
    }

    /// Puts an already received event back at the head of the queue.
    ///
    /// Ignores the capacity: the slot was freed by the matching receive.
    pub(crate) fn requeue_front(&self, event: E) {
        let mut events = self.events.lock();
        events.push_front(event);
        self.available.notify_one();
    }

    /// Refuses further sends and releases producers blocked on a full queue.
    ///
    /// Events already queued stay in place and can still be received.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        let _events = self.events.lock();
        self.space.notify_all();
        self.available.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Maximum depth, or `None` when unbounded.
    pub fn capacity(&self) -> Option<usize> {
        self.config.capacity
    }

    pub fn config(&self) -> QueueConfig {
        self.config
    }
}

impl<E> Default for EventQueue<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Cloneable producer handle onto a shared [`EventQueue`].
pub struct EventSender<E> {
    queue: Arc<EventQueue<E>>,
}

impl<E> EventSender<E> {
    pub fn new(queue: Arc<EventQueue<E>>) -> Self {
        Self { queue }
    }

    pub fn send(&self, event: E) -> Result<(), QueueError> {
        self.queue.send(event)
    }
}

impl<E> Clone for EventSender<E> {
    fn clone(&self) -> Self {
        Self {
            queue: Arc::clone(&self.queue),
        }
    }
}

//! Engine configuration.

use std::time::{Duration, Instant};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::queue::{OverflowPolicy, QueueConfig};

/// Default bounded wait of the dispatch loop between stop-flag checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Configuration for a [`StateMachine`](crate::machine::StateMachine).
///
/// `poll_interval` bounds how long [`stop`](crate::machine::StateMachine::stop)
/// waits for the dispatch loop to notice the request.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub name: String,
    pub poll_interval: Duration,
    pub queue: QueueConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            name: "tsm".to_owned(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            queue: QueueConfig::unbounded(),
        }
    }
}

impl EngineConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval.is_zero() {
            return Err(ConfigError::ZeroPollInterval);
        }
        if Instant::now().checked_add(self.poll_interval).is_none() {
            return Err(ConfigError::PollIntervalOutOfRange(self.poll_interval));
        }
        if self.queue.capacity == Some(0) {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        Ok(())
    }
}

/// Builder for ergonomic engine configuration construction.
#[derive(Debug, Clone, Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    /// Sets the machine name used in logs and thread names.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Sets the dispatch loop poll interval.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// Bounds the event queue to `capacity` events.
    pub fn queue_capacity(mut self, capacity: usize, overflow: OverflowPolicy) -> Self {
        self.config.queue = QueueConfig::bounded(capacity, overflow);
        self
    }

    /// Removes any bound from the event queue.
    pub fn unbounded_queue(mut self) -> Self {
        self.config.queue = QueueConfig::unbounded();
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> EngineConfig {
        self.config
    }
}

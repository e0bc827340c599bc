//! Synchronization of user-requested display values with the device.

mod engine;
mod error;
mod parameter;
mod poller;
mod queue;
mod worker;

pub use engine::{Snapshot, StepDirection, SyncEngine};
pub use error::SyncError;
pub use parameter::{Parameter, Value};
pub use queue::PendingWriteQueue;

pub(crate) use parameter::ParameterState;

use std::time::Duration;

/// Settings of a [SyncEngine].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// How often the device is re-read
    pub poll_interval: Duration,
    /// Brightness change of a single scroll step, 0 disables stepping
    pub step_size: u8,
    pub start_paused: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            poll_interval: Duration::from_secs(10),
            step_size: 1,
            start_paused: false,
        }
    }
}

#[cfg(test)]
mod test;

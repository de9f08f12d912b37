//! Periodic status snapshot writer

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, trace, warn};

use super::snapshot::StatusSnapshot;
use crate::domain::BotState;
use crate::farm::FarmStateMachine;
use crate::ipc::write_atomic;
use crate::timer::TimerGate;

/// Writes a [`StatusSnapshot`] every interval of tick time
#[derive(Debug)]
pub struct StatusPublisher {
    path: PathBuf,
    gate: TimerGate,
    published: u64,
}

impl StatusPublisher {
    /// The first snapshot goes out on the first tick
    pub fn new(path: impl Into<PathBuf>, interval: Duration) -> Self {
        let path = path.into();
        debug!(path = %path.display(), ?interval, "StatusPublisher::new: called");
        Self {
            path,
            gate: TimerGate::ready(interval),
            published: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshots successfully written so far
    pub fn published(&self) -> u64 {
        self.published
    }

    /// Publish if the interval has elapsed
    pub fn tick(&mut self, dt: f32, bot: &BotState, machine: &FarmStateMachine) -> bool {
        if !self.gate.tick(dt) {
            return false;
        }
        self.publish(bot, machine)
    }

    /// Write a snapshot now; IO failures are logged and reported as false
    pub fn publish(&mut self, bot: &BotState, machine: &FarmStateMachine) -> bool {
        let now_ms = chrono::Utc::now().timestamp_millis();
        let snapshot = StatusSnapshot::capture(bot, machine.state(), machine.counters().quests_completed, now_ms);

        let json = match serde_json::to_string_pretty(&snapshot) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "StatusPublisher: failed to serialize snapshot");
                return false;
            }
        };

        match write_atomic(&self.path, &json) {
            Ok(()) => {
                self.published += 1;
                trace!(path = %self.path.display(), "StatusPublisher::publish: written");
                true
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "StatusPublisher: failed to write snapshot");
                false
            }
        }
    }
}

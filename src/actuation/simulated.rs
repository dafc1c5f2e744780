//! Stand-in backend for benches and CI without motor hardware

use std::collections::HashMap;
use tracing::info;

use super::types::Command;

/// No-hardware backend: logs and counts every command
#[derive(Debug, Default)]
pub struct Simulated {
    invocations: HashMap<Command, u64>,
    last: Option<Command>,
}

impl Simulated {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&mut self, command: Command) {
        info!("[simulated] {}", command);
        *self.invocations.entry(command).or_insert(0) += 1;
        self.last = Some(command);
    }

    /// How many times `command` was executed
    pub fn invocations(&self, command: Command) -> u64 {
        self.invocations.get(&command).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.invocations.values().sum()
    }

    pub fn last(&self) -> Option<Command> {
        self.last
    }
}

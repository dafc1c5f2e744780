use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::auth::{Action, Role};

/// Symbolic command sent by a caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    Forward,
    Backward,
    Left,
    Right,
    Stop,
    LightOn,
    LightOff,
    StorageOpen,
    StorageClose,
}

impl Command {
    pub const ALL: [Command; 9] = [
        Command::Forward,
        Command::Backward,
        Command::Left,
        Command::Right,
        Command::Stop,
        Command::LightOn,
        Command::LightOff,
        Command::StorageOpen,
        Command::StorageClose,
    ];

    /// Drive commands (including stop)
    pub const MOTION: [Command; 5] = [
        Command::Forward,
        Command::Backward,
        Command::Left,
        Command::Right,
        Command::Stop,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Forward => "forward",
            Command::Backward => "backward",
            Command::Left => "left",
            Command::Right => "right",
            Command::Stop => "stop",
            Command::LightOn => "light_on",
            Command::LightOff => "light_off",
            Command::StorageOpen => "storage_open",
            Command::StorageClose => "storage_close",
        }
    }

    pub fn is_motion(&self) -> bool {
        Self::MOTION.contains(self)
    }

    /// Access-gate action this command requires
    pub fn action(&self) -> Action {
        if self.is_motion() {
            Action::Move
        } else {
            Action::ToggleFeature
        }
    }

    /// Byte understood by the motor microcontroller, if any
    pub fn serial_byte(&self) -> Option<u8> {
        match self {
            Command::Forward => Some(b'F'),
            Command::Backward => Some(b'B'),
            Command::Left => Some(b'L'),
            Command::Right => Some(b'R'),
            Command::Stop => Some(b'S'),
            _ => None,
        }
    }

    /// Drive line to assert for this command
    ///
    /// `Some(None)` clears every line (stop); `None` means the command has
    /// no drive-line meaning.
    pub fn drive_line(&self) -> Option<Option<DriveLine>> {
        match self {
            Command::Forward => Some(Some(DriveLine::Forward)),
            Command::Backward => Some(Some(DriveLine::Backward)),
            Command::Left => Some(Some(DriveLine::Left)),
            Command::Right => Some(Some(DriveLine::Right)),
            Command::Stop => Some(None),
            _ => None,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Command {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == normalized)
            .ok_or_else(|| format!("unknown command '{}'", s))
    }
}

/// One of the four digital outputs of the direct-pin backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DriveLine {
    Forward,
    Backward,
    Left,
    Right,
}

impl DriveLine {
    /// Position in the (forward, backward, left, right) value array
    pub fn index(&self) -> usize {
        match self {
            DriveLine::Forward => 0,
            DriveLine::Backward => 1,
            DriveLine::Left => 2,
            DriveLine::Right => 3,
        }
    }

    /// Line values with only this line asserted
    pub fn one_hot(&self) -> [u8; 4] {
        let mut values = [0u8; 4];
        values[self.index()] = 1;
        values
    }
}

/// Outcome of an accepted command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ack {
    /// Executed by the backend
    Acknowledged,
    /// Accepted, but the hardware did not (fully) carry it out
    AcknowledgedWithWarning(String),
}

impl Ack {
    pub fn warning(&self) -> Option<&str> {
        match self {
            Ack::Acknowledged => None,
            Ack::AcknowledgedWithWarning(reason) => Some(reason),
        }
    }
}

/// Rejection surfaced to the caller
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("role '{role}' may not issue '{command}'")]
    Forbidden { role: Role, command: Command },
}

/// Hardware-side problem; recovered locally and reported as a warning
#[derive(Debug, Error)]
pub enum ActuationFault {
    #[error("{backend} write failed: {source}")]
    Io {
        backend: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{backend} backend has no mapping for '{command}'")]
    Unmapped {
        backend: &'static str,
        command: Command,
    },
}

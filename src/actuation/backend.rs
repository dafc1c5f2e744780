//! Motion backend

use serde::Serialize;

use super::pins::DirectPin;
use super::serial::SerialLink;
use super::simulated::Simulated;
use super::types::{ActuationFault, Command};
use crate::config::PinAssignment;

/// Backend kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Serial,
    Pins,
    Simulated,
}

impl BackendKind {
    pub fn name_str(&self) -> &'static str {
        match self {
            Self::Serial => "serial",
            Self::Pins => "pins",
            Self::Simulated => "simulated",
        }
    }
}

/// The single hardware strategy bound for the lifetime of the process
#[derive(Debug)]
pub enum ActuationBackend {
    /// Microcontroller over a serial port
    SerialLink(SerialLink),
    /// Four GPIO drive lines
    DirectPin(DirectPin),
    /// No hardware
    Simulated(Simulated),
}

/// Static description of the bound backend
#[derive(Debug, Clone, Serialize)]
pub struct BackendInfo {
    pub kind: BackendKind,
    /// Serial port path or GPIO chip path
    pub device: Option<String>,
    pub baud_rate: Option<u32>,
    pub pins: Option<PinAssignment>,
}

impl ActuationBackend {
    pub fn kind(&self) -> BackendKind {
        match self {
            Self::SerialLink(_) => BackendKind::Serial,
            Self::DirectPin(_) => BackendKind::Pins,
            Self::Simulated(_) => BackendKind::Simulated,
        }
    }

    pub fn info(&self) -> BackendInfo {
        match self {
            Self::SerialLink(link) => BackendInfo {
                kind: BackendKind::Serial,
                device: Some(link.port().to_string()),
                baud_rate: Some(link.baud()),
                pins: None,
            },
            Self::DirectPin(pin) => BackendInfo {
                kind: BackendKind::Pins,
                device: Some(pin.chip().to_string()),
                baud_rate: None,
                pins: Some(pin.pins()),
            },
            Self::Simulated(_) => BackendInfo {
                kind: BackendKind::Simulated,
                device: None,
                baud_rate: None,
                pins: None,
            },
        }
    }

    /// Run one command against the hardware
    pub(crate) fn execute(&mut self, command: Command) -> Result<(), ActuationFault> {
        match self {
            Self::SerialLink(link) => link.send(command),
            Self::DirectPin(pin) => pin.apply(command),
            Self::Simulated(sim) => {
                sim.record(command);
                Ok(())
            }
        }
    }
}

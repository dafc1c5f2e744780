//! Backend selection
//!
//! Runs once at startup. Selection never fails: when hardware cannot be
//! opened the robot degrades to the simulated backend instead of aborting.

use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

use super::backend::ActuationBackend;
use super::pins::DirectPin;
use super::serial::SerialLink;
use super::simulated::Simulated;
use crate::config::{ActuationConfig, BackendMode};

/// List GPIO character devices present on this host
pub fn discover_gpio_chips() -> Vec<String> {
    let mut chips = Vec::new();

    if let Ok(entries) = std::fs::read_dir("/dev") {
        for entry in entries.flatten() {
            let name = entry.file_name();
            let name_str = name.to_string_lossy();
            if name_str.starts_with("gpiochip") {
                chips.push(format!("/dev/{}", name_str));
            }
        }
    }

    chips.sort();
    chips
}

/// Whether the host exposes a pin-control interface
pub fn pin_control_available(config: &ActuationConfig) -> bool {
    Path::new(&config.gpio_chip).exists() || !discover_gpio_chips().is_empty()
}

/// Bind the backend described by `config`
///
/// Blocking: opening the serial link waits for the controller to settle.
pub fn select(config: &ActuationConfig) -> ActuationBackend {
    let backend = resolve(
        config.mode,
        pin_control_available(config),
        || open_serial(config),
        || open_pins(config),
    );
    info!("Actuation backend: {}", backend.kind().name_str());
    backend
}

/// Selection policy, separated from the hardware probes
fn resolve(
    mode: BackendMode,
    pin_control: bool,
    serial: impl FnOnce() -> Option<ActuationBackend>,
    pins: impl FnOnce() -> Option<ActuationBackend>,
) -> ActuationBackend {
    let selected = match mode {
        BackendMode::Simulated => None,
        BackendMode::Serial => serial(),
        BackendMode::Pins => pins(),
        BackendMode::Auto if pin_control => serial().or_else(pins),
        BackendMode::Auto => {
            info!("No pin-control interface on this host");
            None
        }
    };

    selected.unwrap_or_else(|| ActuationBackend::Simulated(Simulated::new()))
}

fn open_serial(config: &ActuationConfig) -> Option<ActuationBackend> {
    match SerialLink::open(
        &config.serial_port,
        config.baud_rate,
        Duration::from_millis(config.io_timeout_ms),
        Duration::from_millis(config.settle_delay_ms),
    ) {
        Ok(link) => Some(ActuationBackend::SerialLink(link)),
        Err(e) => {
            warn!("Serial link {} unavailable: {}", config.serial_port, e);
            None
        }
    }
}

fn open_pins(config: &ActuationConfig) -> Option<ActuationBackend> {
    match DirectPin::open(&config.gpio_chip, config.pins) {
        Ok(pin) => Some(ActuationBackend::DirectPin(pin)),
        Err(e) => {
            warn!("Drive lines on {} unavailable: {}", config.gpio_chip, e);
            None
        }
    }
}

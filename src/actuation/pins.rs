//! Direct drive lines
//!
//! Four GPIO outputs, one per direction. Every motion command first drives
//! all lines low and then raises exactly one, so at no point are two lines
//! high at once.

use gpio_cdev::{Chip, LineRequestFlags, MultiLineHandle};
use std::io;
use tracing::{debug, info};

use super::types::{ActuationFault, Command, DriveLine};
use crate::config::PinAssignment;

const CONSUMER: &str = "rescue-rover";
const ALL_LOW: [u8; 4] = [0; 4];

/// Sink for drive-line values in (forward, backward, left, right) order
pub trait DriveLines: Send {
    fn set_values(&mut self, values: [u8; 4]) -> io::Result<()>;
}

/// Drive lines backed by the GPIO character device
pub struct GpioDriveLines {
    handle: MultiLineHandle,
}

impl GpioDriveLines {
    /// Request the four lines as outputs, initially low
    pub fn request(chip_path: &str, pins: &PinAssignment) -> Result<Self, gpio_cdev::Error> {
        let mut chip = Chip::new(chip_path)?;
        let lines = chip.get_lines(&pins.offsets())?;
        let handle = lines.request(LineRequestFlags::OUTPUT, &ALL_LOW, CONSUMER)?;
        Ok(Self { handle })
    }
}

impl DriveLines for GpioDriveLines {
    fn set_values(&mut self, values: [u8; 4]) -> io::Result<()> {
        self.handle.set_values(&values).map_err(io::Error::other)
    }
}

pub struct DirectPin {
    chip: String,
    pins: PinAssignment,
    handle: Box<dyn DriveLines>,
    asserted: Option<DriveLine>,
}

impl DirectPin {
    /// Open the GPIO chip and claim the drive lines
    pub fn open(chip_path: &str, pins: PinAssignment) -> Result<Self, gpio_cdev::Error> {
        info!(
            "Configuring drive lines on {} (F={} B={} L={} R={})",
            chip_path, pins.forward, pins.backward, pins.left, pins.right
        );
        let lines = GpioDriveLines::request(chip_path, &pins)?;
        Ok(Self::with_lines(chip_path, pins, lines))
    }

    /// Use an arbitrary line sink
    pub fn with_lines(chip_path: &str, pins: PinAssignment, lines: impl DriveLines + 'static) -> Self {
        Self {
            chip: chip_path.to_string(),
            pins,
            handle: Box::new(lines),
            asserted: None,
        }
    }

    pub fn chip(&self) -> &str {
        &self.chip
    }

    pub fn pins(&self) -> PinAssignment {
        self.pins
    }

    /// Line currently driven high, as last written
    pub fn asserted(&self) -> Option<DriveLine> {
        self.asserted
    }

    pub(crate) fn apply(&mut self, command: Command) -> Result<(), ActuationFault> {
        let target = command.drive_line().ok_or(ActuationFault::Unmapped {
            backend: "pins",
            command,
        })?;

        self.write(ALL_LOW)?;
        self.asserted = None;

        if let Some(line) = target {
            self.write(line.one_hot())?;
            self.asserted = Some(line);
        }

        debug!("Drive lines now {:?} after {}", self.asserted, command);
        Ok(())
    }

    fn write(&mut self, values: [u8; 4]) -> Result<(), ActuationFault> {
        self.handle
            .set_values(values)
            .map_err(|source| ActuationFault::Io {
                backend: "pins",
                source,
            })
    }
}

impl std::fmt::Debug for DirectPin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectPin")
            .field("chip", &self.chip)
            .field("pins", &self.pins)
            .field("asserted", &self.asserted)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::DriveLines;
    use parking_lot::Mutex;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// In-memory lines that remember the highest number of simultaneously
    /// asserted outputs ever written
    #[derive(Clone, Default)]
    pub struct FakeLines {
        pub state: Arc<Mutex<[u8; 4]>>,
        pub max_asserted: Arc<AtomicUsize>,
        pub writes: Arc<AtomicUsize>,
    }

    impl FakeLines {
        pub fn values(&self) -> [u8; 4] {
            *self.state.lock()
        }

        pub fn asserted_count(&self) -> usize {
            self.values().iter().filter(|v| **v != 0).count()
        }
    }

    impl DriveLines for FakeLines {
        fn set_values(&mut self, values: [u8; 4]) -> io::Result<()> {
            let high = values.iter().filter(|v| **v != 0).count();
            *self.state.lock() = values;
            self.max_asserted.fetch_max(high, Ordering::SeqCst);
            self.writes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Lines whose every write fails
    pub struct DeadLines;

    impl DriveLines for DeadLines {
        fn set_values(&mut self, _values: [u8; 4]) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::Other, "line request revoked"))
        }
    }
}

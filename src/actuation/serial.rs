//! Serial link to the motor microcontroller
//!
//! The firmware reads one byte per command (`F`, `B`, `L`, `R`, `S`) and
//! ramps the motors itself. Opening the port resets the board, so the first
//! write must wait for it to come back up.

use std::io::Write;
use std::time::Duration;
use tracing::{debug, info};

use super::types::{ActuationFault, Command};

pub struct SerialLink {
    port: String,
    baud: u32,
    handle: Box<dyn Write + Send>,
}

impl SerialLink {
    /// Open the port and wait `settle` before returning
    pub fn open(
        port: &str,
        baud: u32,
        timeout: Duration,
        settle: Duration,
    ) -> Result<Self, serialport::Error> {
        info!("Opening serial link on {} at {} baud", port, baud);

        let handle = serialport::new(port, baud).timeout(timeout).open()?;
        Ok(Self::settled(port, baud, handle, settle))
    }

    /// Wrap a freshly opened writer, blocking until the controller is back
    pub(crate) fn settled(
        port: &str,
        baud: u32,
        handle: impl Write + Send + 'static,
        settle: Duration,
    ) -> Self {
        debug!("Waiting {}ms for controller reset", settle.as_millis());
        std::thread::sleep(settle);
        Self::from_writer(port, baud, handle)
    }

    /// Wrap an already-open writer
    pub fn from_writer(port: &str, baud: u32, handle: impl Write + Send + 'static) -> Self {
        Self {
            port: port.to_string(),
            baud,
            handle: Box::new(handle),
        }
    }

    pub fn port(&self) -> &str {
        &self.port
    }

    pub fn baud(&self) -> u32 {
        self.baud
    }

    /// Write the command byte
    pub(crate) fn send(&mut self, command: Command) -> Result<(), ActuationFault> {
        let byte = command.serial_byte().ok_or(ActuationFault::Unmapped {
            backend: "serial",
            command,
        })?;

        self.handle
            .write_all(&[byte])
            .and_then(|_| self.handle.flush())
            .map_err(|source| ActuationFault::Io {
                backend: "serial",
                source,
            })?;

        debug!("Serial {} <- {:?} ({})", self.port, byte as char, command);
        Ok(())
    }
}

impl std::fmt::Debug for SerialLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialLink")
            .field("port", &self.port)
            .field("baud", &self.baud)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use parking_lot::Mutex;
    use std::io::{self, Write};
    use std::sync::Arc;
    use std::time::Instant;

    /// Writer that records every byte
    #[derive(Clone, Default)]
    pub struct RecordingPort(pub Arc<Mutex<Vec<u8>>>);

    impl RecordingPort {
        pub fn bytes(&self) -> Vec<u8> {
            self.0.lock().clone()
        }

        pub fn clear(&self) {
            self.0.lock().clear();
        }
    }

    impl Write for RecordingPort {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Writer that remembers when the first byte arrived
    #[derive(Clone, Default)]
    pub struct TimedPort(pub Arc<Mutex<Option<Instant>>>);

    impl TimedPort {
        pub fn first_write(&self) -> Option<Instant> {
            *self.0.lock()
        }
    }

    impl Write for TimedPort {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().get_or_insert_with(Instant::now);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Writer that behaves like an unplugged device
    pub struct UnpluggedPort;

    impl Write for UnpluggedPort {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{RecordingPort, TimedPort, UnpluggedPort};
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_send_writes_single_byte() {
        let port = RecordingPort::default();
        let mut link = SerialLink::from_writer("/dev/ttyACM0", 9600, port.clone());

        link.send(Command::Forward).unwrap();
        assert_eq!(port.bytes(), b"F");

        link.send(Command::Stop).unwrap();
        assert_eq!(port.bytes(), b"FS");
    }

    #[test]
    fn test_feature_command_is_unmapped() {
        let port = RecordingPort::default();
        let mut link = SerialLink::from_writer("/dev/ttyACM0", 9600, port.clone());

        let err = link.send(Command::LightOn).unwrap_err();
        assert!(matches!(err, ActuationFault::Unmapped { .. }));
        assert!(port.bytes().is_empty());
    }

    #[test]
    fn test_write_failure_is_io_fault() {
        let mut link = SerialLink::from_writer("/dev/ttyACM0", 9600, UnpluggedPort);
        let err = link.send(Command::Left).unwrap_err();
        assert!(matches!(err, ActuationFault::Io { .. }));
    }

    #[test]
    fn test_first_write_waits_for_controller_reset() {
        let port = TimedPort::default();
        let opened_at = Instant::now();
        let mut link =
            SerialLink::settled("/dev/ttyACM0", 9600, port.clone(), Duration::from_millis(80));
        assert!(port.first_write().is_none());

        link.send(Command::Forward).unwrap();
        let first = port.first_write().unwrap();
        assert!(first.duration_since(opened_at) >= Duration::from_millis(80));
    }

    #[test]
    fn test_open_missing_port_fails() {
        let result = SerialLink::open(
            "/dev/does-not-exist-rover",
            9600,
            Duration::from_millis(100),
            Duration::ZERO,
        );
        assert!(result.is_err());
    }
}

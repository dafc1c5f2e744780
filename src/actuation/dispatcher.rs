//! Command dispatcher
//!
//! Sole owner of the bound backend. Every command passes the access gate,
//! then takes the backend lock for exactly one write. Hardware failures are
//! logged and turned into [`Ack::AcknowledgedWithWarning`]; only
//! authorization failures reach the caller as errors.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

use super::backend::{ActuationBackend, BackendInfo};
use super::types::{Ack, ActuationFault, Command, DispatchError};
use crate::auth::{allowed, Role};

/// Most recent accepted command
#[derive(Debug, Clone, Serialize)]
pub struct LastCommand {
    pub command: Command,
    pub role: Role,
    pub at: DateTime<Utc>,
    pub warning: Option<String>,
}

/// Snapshot for the status endpoint
#[derive(Debug, Clone, Serialize)]
pub struct ActuationStatus {
    pub backend: BackendInfo,
    pub dispatched: u64,
    pub warnings: u64,
    pub rejected: u64,
    pub last_command: Option<LastCommand>,
}

pub struct CommandDispatcher {
    backend: Mutex<ActuationBackend>,
    info: BackendInfo,
    dispatched: AtomicU64,
    warnings: AtomicU64,
    rejected: AtomicU64,
    last: Mutex<Option<LastCommand>>,
}

impl CommandDispatcher {
    /// Take ownership of the backend chosen at startup
    pub fn new(backend: ActuationBackend) -> Self {
        let info = backend.info();
        Self {
            backend: Mutex::new(backend),
            info,
            dispatched: AtomicU64::new(0),
            warnings: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            last: Mutex::new(None),
        }
    }

    /// Execute `command` on behalf of a caller holding `role`
    ///
    /// Blocking: holds the backend lock for the duration of one write, which
    /// the backend bounds with its I/O timeout. Call from a blocking context.
    pub fn dispatch(&self, command: Command, role: Role) -> Result<Ack, DispatchError> {
        if !allowed(role, command.action()) {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            debug!("Rejected {} from role {}", command, role);
            return Err(DispatchError::Forbidden { role, command });
        }

        let result = self.backend.lock().execute(command);
        self.dispatched.fetch_add(1, Ordering::Relaxed);

        let ack = match result {
            Ok(()) => Ack::Acknowledged,
            Err(fault) => self.soft_fail(command, fault),
        };

        *self.last.lock() = Some(LastCommand {
            command,
            role,
            at: Utc::now(),
            warning: ack.warning().map(str::to_string),
        });

        Ok(ack)
    }

    fn soft_fail(&self, command: Command, fault: ActuationFault) -> Ack {
        self.warnings.fetch_add(1, Ordering::Relaxed);
        match &fault {
            ActuationFault::Io { .. } => warn!("Command {} failed: {}", command, fault),
            ActuationFault::Unmapped { .. } => info!("Command {} ignored: {}", command, fault),
        }
        Ack::AcknowledgedWithWarning(fault.to_string())
    }

    /// Bring the robot to a halt before shutdown
    pub fn shutdown(&self) {
        match self.backend.lock().execute(Command::Stop) {
            Ok(()) => info!("Actuation stopped"),
            Err(e) => warn!("Failed to stop robot on shutdown: {}", e),
        }
    }

    pub fn status(&self) -> ActuationStatus {
        ActuationStatus {
            backend: self.info.clone(),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            warnings: self.warnings.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            last_command: self.last.lock().clone(),
        }
    }

    /// Inspect the backend under its lock
    pub fn with_backend<R>(&self, f: impl FnOnce(&ActuationBackend) -> R) -> R {
        f(&self.backend.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuation::pins::testing::{DeadLines, FakeLines};
    use crate::actuation::pins::DirectPin;
    use crate::actuation::serial::testing::{RecordingPort, UnpluggedPort};
    use crate::actuation::serial::SerialLink;
    use crate::actuation::simulated::Simulated;
    use crate::actuation::types::DriveLine;
    use crate::config::PinAssignment;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    fn simulated() -> CommandDispatcher {
        CommandDispatcher::new(ActuationBackend::Simulated(Simulated::new()))
    }

    fn pins() -> (CommandDispatcher, FakeLines) {
        let lines = FakeLines::default();
        let backend = ActuationBackend::DirectPin(DirectPin::with_lines(
            "/dev/gpiochip0",
            PinAssignment::default(),
            lines.clone(),
        ));
        (CommandDispatcher::new(backend), lines)
    }

    fn serial() -> (CommandDispatcher, RecordingPort) {
        let port = RecordingPort::default();
        let backend =
            ActuationBackend::SerialLink(SerialLink::from_writer("/dev/ttyACM0", 9600, port.clone()));
        (CommandDispatcher::new(backend), port)
    }

    fn sim_count(dispatcher: &CommandDispatcher, command: Command) -> u64 {
        dispatcher.with_backend(|backend| match backend {
            ActuationBackend::Simulated(sim) => sim.invocations(command),
            _ => unreachable!(),
        })
    }

    #[test]
    fn test_viewer_is_forbidden_and_backend_untouched() {
        let dispatcher = simulated();
        for command in Command::ALL {
            let err = dispatcher.dispatch(command, Role::Viewer).unwrap_err();
            assert_eq!(
                err,
                DispatchError::Forbidden {
                    role: Role::Viewer,
                    command
                }
            );
        }
        dispatcher.with_backend(|backend| match backend {
            ActuationBackend::Simulated(sim) => assert_eq!(sim.total(), 0),
            _ => unreachable!(),
        });
        let status = dispatcher.status();
        assert_eq!(status.rejected, Command::ALL.len() as u64);
        assert_eq!(status.dispatched, 0);
    }

    #[test]
    fn test_viewer_rejected_before_serial_write() {
        let (dispatcher, port) = serial();
        assert!(dispatcher.dispatch(Command::Forward, Role::Viewer).is_err());
        assert!(port.bytes().is_empty());
    }

    #[test]
    fn test_simulated_records_exactly_one_invocation() {
        for role in [Role::Operator, Role::Admin] {
            for command in Command::MOTION {
                let dispatcher = simulated();
                let ack = dispatcher.dispatch(command, role).unwrap();
                assert_eq!(ack, Ack::Acknowledged);
                assert_eq!(sim_count(&dispatcher, command), 1);
            }
        }
    }

    #[test]
    fn test_simulated_accepts_feature_toggles() {
        let dispatcher = simulated();
        let ack = dispatcher.dispatch(Command::StorageOpen, Role::Admin).unwrap();
        assert_eq!(ack, Ack::Acknowledged);
        assert_eq!(sim_count(&dispatcher, Command::StorageOpen), 1);
    }

    #[test]
    fn test_serial_writes_exact_bytes() {
        let (dispatcher, port) = serial();
        dispatcher.dispatch(Command::Forward, Role::Operator).unwrap();
        assert_eq!(port.bytes(), b"F");

        port.clear();
        dispatcher.dispatch(Command::Backward, Role::Admin).unwrap();
        assert_eq!(port.bytes(), b"B");
    }

    #[test]
    fn test_serial_feature_toggle_acknowledged_with_warning() {
        let (dispatcher, port) = serial();
        let ack = dispatcher.dispatch(Command::LightOn, Role::Operator).unwrap();
        assert!(ack.warning().is_some_and(|w| w.contains("light_on")));
        assert!(port.bytes().is_empty());
    }

    #[test]
    fn test_io_failure_is_swallowed() {
        let backend =
            ActuationBackend::SerialLink(SerialLink::from_writer("/dev/ttyACM0", 9600, UnpluggedPort));
        let dispatcher = CommandDispatcher::new(backend);

        let ack = dispatcher.dispatch(Command::Right, Role::Operator).unwrap();
        assert!(matches!(ack, Ack::AcknowledgedWithWarning(_)));

        let status = dispatcher.status();
        assert_eq!(status.warnings, 1);
        assert!(status.last_command.unwrap().warning.is_some());
    }

    #[test]
    fn test_dead_drive_lines_are_swallowed() {
        let backend = ActuationBackend::DirectPin(DirectPin::with_lines(
            "/dev/gpiochip0",
            PinAssignment::default(),
            DeadLines,
        ));
        let dispatcher = CommandDispatcher::new(backend);
        let ack = dispatcher.dispatch(Command::Forward, Role::Operator).unwrap();
        assert!(matches!(ack, Ack::AcknowledgedWithWarning(_)));
    }

    #[test]
    fn test_direct_pin_forward_then_stop() {
        let (dispatcher, lines) = pins();

        dispatcher.dispatch(Command::Forward, Role::Operator).unwrap();
        assert_eq!(lines.values(), DriveLine::Forward.one_hot());
        assert_eq!(lines.asserted_count(), 1);

        dispatcher.dispatch(Command::Stop, Role::Operator).unwrap();
        assert_eq!(lines.asserted_count(), 0);
    }

    #[test]
    fn test_concurrent_dispatch_never_asserts_two_lines() {
        let (dispatcher, lines) = pins();
        let dispatcher = Arc::new(dispatcher);
        let done = Arc::new(AtomicBool::new(false));

        let sampler = {
            let lines = lines.clone();
            let done = done.clone();
            std::thread::spawn(move || {
                let mut worst = 0;
                while !done.load(Ordering::SeqCst) {
                    worst = worst.max(lines.asserted_count());
                }
                worst
            })
        };

        let operators: Vec<_> = (0..2)
            .map(|session| {
                let dispatcher = dispatcher.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        let command = if (i + session) % 2 == 0 {
                            Command::Forward
                        } else {
                            Command::Stop
                        };
                        dispatcher.dispatch(command, Role::Operator).unwrap();
                    }
                })
            })
            .collect();

        for handle in operators {
            handle.join().unwrap();
        }
        done.store(true, Ordering::SeqCst);

        assert!(sampler.join().unwrap() <= 1);
        assert_eq!(lines.max_asserted.load(Ordering::SeqCst), 1);
        assert_eq!(dispatcher.status().dispatched, 100);
    }

    #[test]
    fn test_shutdown_stops_robot() {
        let (dispatcher, lines) = pins();
        dispatcher.dispatch(Command::Left, Role::Admin).unwrap();
        dispatcher.shutdown();
        assert_eq!(lines.asserted_count(), 0);
    }

    #[test]
    fn test_status_reports_backend() {
        let (dispatcher, _port) = serial();
        dispatcher.dispatch(Command::Stop, Role::Operator).unwrap();
        let status = dispatcher.status();
        assert_eq!(status.backend.kind, crate::actuation::BackendKind::Serial);
        assert_eq!(status.backend.device.as_deref(), Some("/dev/ttyACM0"));
        assert_eq!(status.dispatched, 1);
        assert_eq!(status.last_command.unwrap().command, Command::Stop);
    }
}

//! Robot actuation
//!
//! Executes discrete motion and feature commands on exactly one hardware
//! strategy, chosen once at startup:
//!
//! ```text
//! request --> access gate --> CommandDispatcher --> ActuationBackend
//!                                                     |
//!                                  [SerialLink | DirectPin | Simulated]
//! ```
//!
//! - **SerialLink**: single-byte commands to a motor microcontroller
//! - **DirectPin**: four GPIO drive lines, at most one high at a time
//! - **Simulated**: logs and counts commands, never fails

mod backend;
mod dispatcher;
mod pins;
mod selector;
mod serial;
mod simulated;
mod types;

pub use backend::{ActuationBackend, BackendInfo, BackendKind};
pub use dispatcher::{ActuationStatus, CommandDispatcher, LastCommand};
pub use pins::{DirectPin, DriveLines, GpioDriveLines};
pub use selector::{discover_gpio_chips, pin_control_available, select};
pub use serial::SerialLink;
pub use simulated::Simulated;
pub use types::{Ack, ActuationFault, Command, DispatchError, DriveLine};

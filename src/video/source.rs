//! Camera frame sources

use std::io;
use thiserror::Error;

use super::frame::RawFrame;

/// Why a capture cycle produced no frame
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("camera {device} unavailable: {reason}")]
    Unavailable { device: String, reason: String },

    #[error("frame read failed: {0}")]
    Io(#[from] io::Error),

    #[error("frame too small ({0} bytes)")]
    Truncated(usize),

    #[error("encode failed: {0}")]
    Encode(String),
}

impl CaptureError {
    /// Stable key for log throttling
    pub fn key(&self) -> &'static str {
        match self {
            CaptureError::Unavailable { .. } => "capture_unavailable",
            CaptureError::Io(_) => "capture_io",
            CaptureError::Truncated(_) => "capture_truncated",
            CaptureError::Encode(_) => "capture_encode",
        }
    }
}

/// Anything the capture loop can pull raw frames from
///
/// `acquire` blocks until a frame is available or the attempt fails. A
/// failed attempt must leave the source usable for the next call.
pub trait FrameSource: Send {
    fn acquire(&mut self) -> Result<RawFrame, CaptureError>;

    /// Human-readable device name for logs
    fn name(&self) -> &str;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn acquire(&mut self) -> Result<RawFrame, CaptureError> {
        (**self).acquire()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::VecDeque;

    /// Replays a fixed script of results, then fails forever
    pub struct ScriptedSource {
        script: VecDeque<Result<RawFrame, CaptureError>>,
        pub attempts: usize,
    }

    impl ScriptedSource {
        pub fn new(script: impl IntoIterator<Item = Result<RawFrame, CaptureError>>) -> Self {
            Self {
                script: script.into_iter().collect(),
                attempts: 0,
            }
        }
    }

    impl FrameSource for ScriptedSource {
        fn acquire(&mut self) -> Result<RawFrame, CaptureError> {
            self.attempts += 1;
            self.script.pop_front().unwrap_or_else(|| {
                Err(CaptureError::Unavailable {
                    device: "scripted".to_string(),
                    reason: "script exhausted".to_string(),
                })
            })
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    pub fn failure() -> Result<RawFrame, CaptureError> {
        Err(CaptureError::Io(io::Error::new(
            io::ErrorKind::TimedOut,
            "select timeout",
        )))
    }
}

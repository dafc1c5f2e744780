//! Camera capture
//!
//! A [`FrameSource`] (V4L2 in production) feeds the [`Frames`] iterator,
//! which encodes to JPEG and retries failed cycles per [`RetryPolicy`].

pub mod capture;
pub mod device;
pub mod encoder;
pub mod format;
pub mod frame;
pub mod source;

pub use capture::{standby_jpeg, CaptureHandle, Frames, RetryDelay, RetryPolicy};
pub use device::V4l2Source;
pub use encoder::JpegEncoder;
pub use format::{PixelFormat, Resolution};
pub use frame::{is_valid_jpeg, EncodedFrame, RawFrame};
pub use source::{CaptureError, FrameSource};

//! Live camera streaming
//!
//! - `MjpegStreamHandler` - latest-frame hub and viewer registry
//! - `viewer_stream` - per-viewer `multipart/x-mixed-replace` body

pub mod mjpeg;
pub mod multipart;

pub use mjpeg::{MjpegStreamHandler, StreamStatus, ViewerGuard, ViewerStats};
pub use multipart::{create_mjpeg_part, viewer_stream, MULTIPART_CONTENT_TYPE};

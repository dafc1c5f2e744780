//! V4L2 camera source
//!
//! Opens the device lazily and reopens it after a read error, so a camera
//! that is unplugged and plugged back in recovers without a restart.

use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};
use v4l::buffer::Type;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::capture::Parameters;
use v4l::video::Capture;
use v4l::Format;

use super::format::{PixelFormat, Resolution};
use super::frame::RawFrame;
use super::source::{CaptureError, FrameSource};
use crate::config::VideoConfig;

/// Number of memory-mapped capture buffers
const BUFFER_COUNT: u32 = 4;
/// Frames smaller than this are treated as garbage
const MIN_FRAME_SIZE: usize = 128;
/// Longest wait for a single frame before the cycle counts as failed
const CAPTURE_TIMEOUT: Duration = Duration::from_secs(2);

struct OpenStream {
    // Keeps the device handle alive for the lifetime of the stream
    _device: Device,
    stream: MmapStream<'static>,
    resolution: Resolution,
    format: PixelFormat,
}

/// Camera backed by a V4L2 device node
pub struct V4l2Source {
    path: PathBuf,
    name: String,
    resolution: Resolution,
    format: PixelFormat,
    fps: u32,
    stream: Option<OpenStream>,
}

impl V4l2Source {
    pub fn new(path: impl AsRef<Path>, resolution: Resolution, format: PixelFormat, fps: u32) -> Self {
        let path = path.as_ref().to_path_buf();
        Self {
            name: path.display().to_string(),
            path,
            resolution,
            format,
            fps,
            stream: None,
        }
    }

    pub fn from_config(config: &VideoConfig) -> Self {
        Self::new(
            &config.device,
            Resolution::new(config.width, config.height),
            config.format.into(),
            config.fps,
        )
    }

    fn unavailable(&self, reason: impl ToString) -> CaptureError {
        CaptureError::Unavailable {
            device: self.name.clone(),
            reason: reason.to_string(),
        }
    }

    fn open(&self) -> Result<OpenStream, CaptureError> {
        debug!("Opening video device: {:?}", self.path);
        let device = Device::with_path(&self.path).map_err(|e| self.unavailable(e))?;

        let requested = Format::new(
            self.resolution.width,
            self.resolution.height,
            self.format.to_fourcc(),
        );
        let actual = device
            .set_format(&requested)
            .map_err(|e| self.unavailable(format!("failed to set format: {}", e)))?;

        let format = PixelFormat::from_fourcc(actual.fourcc).ok_or_else(|| {
            self.unavailable(format!("unsupported pixel format {}", actual.fourcc))
        })?;
        let resolution = Resolution::new(actual.width, actual.height);
        if resolution != self.resolution || format != self.format {
            warn!(
                "Requested {} {}, device negotiated {} {}",
                self.resolution, self.format, resolution, format
            );
        }

        if self.fps > 0 {
            if let Err(e) = device.set_params(&Parameters::with_fps(self.fps)) {
                warn!("Failed to set frame rate {} on {}: {}", self.fps, self.name, e);
            }
        }

        let mut stream = MmapStream::with_buffers(&device, Type::VideoCapture, BUFFER_COUNT)
            .map_err(|e| self.unavailable(format!("failed to map buffers: {}", e)))?;
        stream.set_timeout(CAPTURE_TIMEOUT);

        info!("Camera {} streaming {} {}", self.name, resolution, format);
        Ok(OpenStream {
            _device: device,
            stream,
            resolution,
            format,
        })
    }
}

impl FrameSource for V4l2Source {
    fn acquire(&mut self) -> Result<RawFrame, CaptureError> {
        if self.stream.is_none() {
            self.stream = Some(self.open()?);
        }
        let Some(open) = self.stream.as_mut() else {
            return Err(self.unavailable("stream not open"));
        };

        let (buf, meta) = match CaptureStream::next(&mut open.stream) {
            Ok(frame) => frame,
            Err(e) => {
                // Force a reopen on the next cycle
                self.stream = None;
                return Err(CaptureError::Io(e));
            }
        };

        let used = match meta.bytesused as usize {
            0 => buf.len(),
            n => n.min(buf.len()),
        };
        if used < MIN_FRAME_SIZE {
            return Err(CaptureError::Truncated(used));
        }

        Ok(RawFrame::new(
            Bytes::copy_from_slice(&buf[..used]),
            open.resolution,
            open.format,
        ))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_device_is_unavailable() {
        let mut source = V4l2Source::new(
            "/dev/rescue-rover-missing-camera",
            Resolution::VGA,
            PixelFormat::Mjpeg,
            30,
        );
        match source.acquire() {
            Err(CaptureError::Unavailable { device, .. }) => {
                assert_eq!(device, "/dev/rescue-rover-missing-camera");
            }
            other => panic!("expected Unavailable, got {:?}", other.map(|f| f.data.len())),
        }
        // Still usable afterwards
        assert!(source.acquire().is_err());
    }
}

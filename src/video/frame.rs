//! Video frame data structures

use bytes::Bytes;
use std::time::Instant;

use super::format::{PixelFormat, Resolution};

/// Frame as delivered by the camera, before encoding
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub data: Bytes,
    pub resolution: Resolution,
    pub format: PixelFormat,
}

impl RawFrame {
    pub fn new(data: impl Into<Bytes>, resolution: Resolution, format: PixelFormat) -> Self {
        Self {
            data: data.into(),
            resolution,
            format,
        }
    }
}

/// The most recent encoded camera image
///
/// Cloning is cheap: the JPEG payload is reference counted and never
/// mutated after construction.
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    data: Bytes,
    /// Frame sequence number, assigned by the capture loop
    pub sequence: u64,
    /// Timestamp when frame was captured
    pub captured_at: Instant,
    /// Placeholder shown while the camera is unavailable
    pub standby: bool,
}

impl EncodedFrame {
    pub fn new(data: Bytes, sequence: u64) -> Self {
        Self {
            data,
            sequence,
            captured_at: Instant::now(),
            standby: false,
        }
    }

    /// Placeholder frame published while the camera is down
    pub fn standby(data: Bytes, sequence: u64) -> Self {
        Self {
            standby: true,
            ..Self::new(data, sequence)
        }
    }

    /// JPEG bytes
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// JPEG bytes (cheap clone)
    pub fn data_bytes(&self) -> Bytes {
        self.data.clone()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn age(&self) -> std::time::Duration {
        self.captured_at.elapsed()
    }

    pub fn is_valid_jpeg(&self) -> bool {
        is_valid_jpeg(&self.data)
    }
}

/// Check JPEG start/end markers
pub fn is_valid_jpeg(data: &[u8]) -> bool {
    if data.len() < 4 {
        return false;
    }

    // Check start marker (0xFFD8)
    if data[0] != 0xFF || data[1] != 0xD8 {
        return false;
    }

    // Valid end markers: 0xFFD9, 0xD900, 0x0000 (padded)
    let end = data.len();
    let end_marker = ((data[end - 2] as u16) << 8) | data[end - 1] as u16;
    matches!(end_marker, 0xFFD9 | 0xD900 | 0x0000)
}

//! JPEG encoder implementation
//!
//! MJPEG input is validated and passed through. Raw YUYV is repacked to
//! I420 and handed to turbojpeg's YUV encoder; RGB24 goes straight to
//! turbojpeg.

use bytes::Bytes;

use crate::error::{AppError, Result};
use crate::video::format::{PixelFormat, Resolution};
use crate::video::frame::{is_valid_jpeg, RawFrame};

/// JPEG encoder using turbojpeg
///
/// Note: This encoder is NOT thread-safe due to turbojpeg limitations.
/// It is owned by the capture thread.
pub struct JpegEncoder {
    quality: u8,
    compressor: Option<turbojpeg::Compressor>,
    /// I420 buffer for YUV encoding (Y + U + V planes)
    i420_buffer: Vec<u8>,
}

impl JpegEncoder {
    /// Create an encoder; the compressor itself is set up on first raw frame
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
            compressor: None,
            i420_buffer: Vec::new(),
        }
    }

    /// Produce JPEG bytes for `frame`
    pub fn encode(&mut self, frame: &RawFrame) -> Result<Bytes> {
        match frame.format {
            PixelFormat::Mjpeg => {
                if is_valid_jpeg(&frame.data) {
                    Ok(frame.data.clone())
                } else {
                    Err(AppError::VideoError(format!(
                        "Corrupt MJPEG frame ({} bytes)",
                        frame.data.len()
                    )))
                }
            }
            PixelFormat::Yuyv => self.encode_yuyv(&frame.data, frame.resolution),
            PixelFormat::Rgb24 => self.encode_rgb(&frame.data, frame.resolution),
        }
    }

    fn compressor(&mut self) -> Result<&mut turbojpeg::Compressor> {
        if self.compressor.is_none() {
            let mut compressor = turbojpeg::Compressor::new().map_err(|e| {
                AppError::VideoError(format!("Failed to create turbojpeg compressor: {}", e))
            })?;
            compressor
                .set_quality(self.quality as i32)
                .map_err(|e| AppError::VideoError(format!("Failed to set JPEG quality: {}", e)))?;
            compressor
                .set_subsamp(turbojpeg::Subsamp::Sub2x2)
                .map_err(|e| AppError::VideoError(format!("Failed to set subsampling: {}", e)))?;
            self.compressor = Some(compressor);
        }

        self.compressor
            .as_mut()
            .ok_or_else(|| AppError::VideoError("JPEG compressor unavailable".to_string()))
    }

    /// Encode YUYV (YUV422) frame to JPEG
    fn encode_yuyv(&mut self, data: &[u8], resolution: Resolution) -> Result<Bytes> {
        let width = resolution.width as usize;
        let height = resolution.height as usize;
        let expected_size = width * height * 2;

        if width % 2 != 0 || data.len() < expected_size {
            return Err(AppError::VideoError(format!(
                "YUYV data too small or odd width: {} bytes for {}",
                data.len(),
                resolution
            )));
        }

        yuyv_to_i420(data, width, height, &mut self.i420_buffer);

        // Split borrows: the compressor and the buffer are separate fields
        let buffer = std::mem::take(&mut self.i420_buffer);
        let result = self.compressor().and_then(|compressor| {
            let yuv_image = turbojpeg::YuvImage {
                pixels: buffer.as_slice(),
                width,
                height,
                align: 1,
                subsamp: turbojpeg::Subsamp::Sub2x2,
            };
            compressor
                .compress_yuv_to_vec(yuv_image)
                .map_err(|e| AppError::VideoError(format!("JPEG compression failed: {}", e)))
        });
        self.i420_buffer = buffer;

        result.map(Bytes::from)
    }

    /// Encode RGB24 frame to JPEG
    fn encode_rgb(&mut self, data: &[u8], resolution: Resolution) -> Result<Bytes> {
        let width = resolution.width as usize;
        let height = resolution.height as usize;
        let expected_size = width * height * 3;

        if data.len() < expected_size {
            return Err(AppError::VideoError(format!(
                "RGB data too small: {} < {}",
                data.len(),
                expected_size
            )));
        }

        let image = turbojpeg::Image {
            pixels: &data[..expected_size],
            width,
            pitch: width * 3,
            height,
            format: turbojpeg::PixelFormat::RGB,
        };

        self.compressor()?
            .compress_to_vec(image)
            .map(Bytes::from)
            .map_err(|e| AppError::VideoError(format!("JPEG compression failed: {}", e)))
    }
}

/// Repack YUYV into planar I420, taking chroma from even rows
fn yuyv_to_i420(src: &[u8], width: usize, height: usize, dst: &mut Vec<u8>) {
    let chroma_width = width.div_ceil(2);
    let chroma_height = height.div_ceil(2);
    let y_size = width * height;
    let c_size = chroma_width * chroma_height;

    dst.clear();
    dst.resize(y_size + 2 * c_size, 0);
    let (y_plane, chroma) = dst.split_at_mut(y_size);
    let (u_plane, v_plane) = chroma.split_at_mut(c_size);

    for row in 0..height {
        let line = &src[row * width * 2..(row + 1) * width * 2];
        for (pair, quad) in line.chunks_exact(4).enumerate() {
            y_plane[row * width + pair * 2] = quad[0];
            y_plane[row * width + pair * 2 + 1] = quad[2];
            if row % 2 == 0 {
                let c = (row / 2) * chroma_width + pair;
                u_plane[c] = quad[1];
                v_plane[c] = quad[3];
            }
        }
    }
}

//! Still-image encoding for the camera feed

pub mod jpeg;

pub use jpeg::JpegEncoder;

//! Rescue Rover - remote-operated robot service
//!
//! Drives a small rover through one of three actuation backends (serial
//! microcontroller, direct GPIO drive lines or simulation) and streams its
//! camera to browsers as MJPEG over HTTP.

pub mod actuation;
pub mod auth;
pub mod config;
pub mod error;
pub mod state;
pub mod stream;
pub mod utils;
pub mod video;
pub mod web;

pub use error::{AppError, Result};

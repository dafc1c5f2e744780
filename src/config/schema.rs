use serde::{Deserialize, Serialize};

use crate::auth::Role;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Web server settings
    pub web: WebConfig,
    /// Motion backend settings
    pub actuation: ActuationConfig,
    /// Camera capture settings
    pub video: VideoConfig,
    /// Access tokens
    pub auth: AuthConfig,
}

/// Web server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WebConfig {
    /// Bind address
    pub bind_address: String,
    /// HTTP port
    pub http_port: u16,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            http_port: 5000,
        }
    }
}

/// Which motion backend to bind at startup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendMode {
    /// Probe the host: serial link, then drive lines, then simulation
    #[default]
    Auto,
    /// Serial link only (falls back to simulation if the port won't open)
    Serial,
    /// Drive lines only (falls back to simulation if the chip won't open)
    Pins,
    /// Never touch hardware
    Simulated,
}

impl std::str::FromStr for BackendMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "serial" => Ok(Self::Serial),
            "pins" | "gpio" => Ok(Self::Pins),
            "simulated" | "sim" => Ok(Self::Simulated),
            other => Err(format!(
                "invalid backend '{}', expected auto, serial, pins or simulated",
                other
            )),
        }
    }
}

/// GPIO line offsets for the four drive lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinAssignment {
    pub forward: u32,
    pub backward: u32,
    pub left: u32,
    pub right: u32,
}

impl PinAssignment {
    /// Offsets in drive-line order (forward, backward, left, right)
    pub fn offsets(&self) -> [u32; 4] {
        [self.forward, self.backward, self.left, self.right]
    }
}

impl Default for PinAssignment {
    fn default() -> Self {
        Self {
            forward: 17,
            backward: 18,
            left: 27,
            right: 22,
        }
    }
}

/// Motion backend configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ActuationConfig {
    pub mode: BackendMode,
    /// Serial port of the motor microcontroller
    pub serial_port: String,
    /// Serial baud rate (the firmware listens at 9600)
    pub baud_rate: u32,
    /// Wait after opening the port before the first write (board resets on open)
    pub settle_delay_ms: u64,
    /// Upper bound for a single backend write
    pub io_timeout_ms: u64,
    /// GPIO character device used for direct drive lines
    pub gpio_chip: String,
    pub pins: PinAssignment,
}

impl Default for ActuationConfig {
    fn default() -> Self {
        Self {
            mode: BackendMode::Auto,
            serial_port: "/dev/ttyACM0".to_string(),
            baud_rate: 9600,
            settle_delay_ms: 2000,
            io_timeout_ms: 1000,
            gpio_chip: "/dev/gpiochip0".to_string(),
            pins: PinAssignment::default(),
        }
    }
}

/// Camera pixel format requested from the device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureFormat {
    #[default]
    Mjpeg,
    Yuyv,
}

/// Camera capture configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VideoConfig {
    /// Video device path (e.g., /dev/video0)
    pub device: String,
    pub format: CaptureFormat,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// JPEG quality (1-100), used when the camera delivers raw frames
    pub quality: u8,
    pub retry: RetryConfig,
    /// Re-send the last frame to viewers after this many idle seconds
    pub keepalive_secs: u64,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            device: "/dev/video0".to_string(),
            format: CaptureFormat::Mjpeg,
            width: 640,
            height: 480,
            fps: 30,
            quality: 80,
            retry: RetryConfig::default(),
            keepalive_secs: 5,
        }
    }
}

/// Capture failure handling
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    /// First wait after a failed capture (0 = retry immediately)
    pub initial_backoff_ms: u64,
    /// Upper bound for the doubling wait
    pub max_backoff_ms: u64,
    /// Consecutive failures before entering standby (None = never)
    pub failure_ceiling: Option<u32>,
    /// Wait between attempts while in standby
    pub standby_interval_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_backoff_ms: 10,
            max_backoff_ms: 500,
            failure_ceiling: Some(100),
            standby_interval_ms: 1000,
        }
    }
}

/// A pre-provisioned credential
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccessToken {
    pub token: String,
    pub username: String,
    pub role: Role,
}

/// Authentication configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AuthConfig {
    pub tokens: Vec<AccessToken>,
}

//! Frame capture loop
//!
//! [`Frames`] is a lazy, endless iterator: each `next()` pulls raw frames
//! from a [`FrameSource`] until one encodes, skipping failed cycles
//! according to a [`RetryPolicy`]. [`CaptureHandle::spawn`] drives it on a
//! blocking thread and publishes every frame to the stream hub.

use bytes::Bytes;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::encoder::JpegEncoder;
use super::format::{PixelFormat, Resolution};
use super::frame::{EncodedFrame, RawFrame};
use super::source::{CaptureError, FrameSource};
use crate::config::RetryConfig;
use crate::stream::MjpegStreamHandler;
use crate::utils::LogThrottler;

/// Longest single sleep between stop-flag checks
const STOP_POLL: Duration = Duration::from_millis(50);

/// Wait between consecutive failed captures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDelay {
    /// Try again at once
    Immediate,
    /// Start at `initial`, double per consecutive failure, cap at `max`
    Backoff { initial: Duration, max: Duration },
}

/// How the capture loop reacts to failed cycles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub delay: RetryDelay,
    /// Consecutive failures before the loop enters standby
    pub failure_ceiling: Option<u32>,
    /// Wait between attempts while in standby
    pub standby_interval: Duration,
}

impl RetryPolicy {
    /// Retry forever with no wait
    pub fn immediate() -> Self {
        Self {
            delay: RetryDelay::Immediate,
            failure_ceiling: None,
            standby_interval: Duration::ZERO,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        let delay = if config.initial_backoff_ms == 0 {
            RetryDelay::Immediate
        } else {
            RetryDelay::Backoff {
                initial: Duration::from_millis(config.initial_backoff_ms),
                max: Duration::from_millis(config.max_backoff_ms.max(config.initial_backoff_ms)),
            }
        };
        Self {
            delay,
            failure_ceiling: config.failure_ceiling.filter(|&n| n > 0),
            standby_interval: Duration::from_millis(config.standby_interval_ms),
        }
    }

    /// Whether `failures` consecutive failures put the loop in standby
    pub fn in_standby(&self, failures: u32) -> bool {
        self.failure_ceiling.is_some_and(|ceiling| failures >= ceiling)
    }

    /// Wait after the `failures`-th consecutive failure
    pub fn delay_after(&self, failures: u32) -> Duration {
        if self.in_standby(failures) {
            return self.standby_interval;
        }
        match self.delay {
            RetryDelay::Immediate => Duration::ZERO,
            RetryDelay::Backoff { initial, max } => {
                let doublings = failures.saturating_sub(1).min(16);
                initial.saturating_mul(1 << doublings).min(max)
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// Encoded frames pulled from a camera, one per successful cycle
///
/// Ends only when the stop flag is raised; once ended it stays ended.
pub struct Frames<S> {
    source: S,
    encoder: JpegEncoder,
    policy: RetryPolicy,
    stop: Arc<AtomicBool>,
    standby_frame: Option<Bytes>,
    sequence: u64,
    failures: u32,
    standby_announced: bool,
    throttler: LogThrottler,
    finished: bool,
}

impl<S: FrameSource> Frames<S> {
    pub fn new(source: S, encoder: JpegEncoder, policy: RetryPolicy) -> Self {
        Self {
            source,
            encoder,
            policy,
            stop: Arc::new(AtomicBool::new(false)),
            standby_frame: None,
            sequence: 0,
            failures: 0,
            standby_announced: false,
            throttler: LogThrottler::with_secs(5),
            finished: false,
        }
    }

    /// Image emitted once when the loop enters standby
    pub fn with_standby_frame(mut self, jpeg: Bytes) -> Self {
        self.standby_frame = Some(jpeg);
        self
    }

    /// Flag that ends the iterator when set
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.failures
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    fn capture_once(&mut self) -> Result<Bytes, CaptureError> {
        let raw = self.source.acquire()?;
        self.encoder
            .encode(&raw)
            .map_err(|e| CaptureError::Encode(e.to_string()))
    }

    fn record_failure(&mut self, err: &CaptureError) {
        self.failures = self.failures.saturating_add(1);
        if let Some(suppressed) = self.throttler.check(err.key()) {
            if suppressed > 0 {
                error!(
                    "Capture failed on {}: {} (suppressed {} repeats)",
                    self.source.name(),
                    err,
                    suppressed
                );
            } else {
                error!("Capture failed on {}: {}", self.source.name(), err);
            }
        }
    }

    fn record_success(&mut self) {
        if self.failures > 0 {
            info!(
                "Camera {} recovered after {} failed cycles",
                self.source.name(),
                self.failures
            );
            self.throttler.clear_all();
        }
        self.failures = 0;
        self.standby_announced = false;
    }

    /// Sleep for `total`, waking early if the stop flag is raised
    fn wait(&self, total: Duration) {
        let mut remaining = total;
        while !remaining.is_zero() && !self.stopped() {
            let step = remaining.min(STOP_POLL);
            thread::sleep(step);
            remaining -= step;
        }
    }

    fn next_sequence(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }
}

impl<S: FrameSource> Iterator for Frames<S> {
    type Item = EncodedFrame;

    fn next(&mut self) -> Option<EncodedFrame> {
        while !self.finished {
            if self.stopped() {
                self.finished = true;
                break;
            }

            match self.capture_once() {
                Ok(jpeg) => {
                    self.record_success();
                    let sequence = self.next_sequence();
                    return Some(EncodedFrame::new(jpeg, sequence));
                }
                Err(e) => {
                    self.record_failure(&e);

                    if self.policy.in_standby(self.failures) && !self.standby_announced {
                        self.standby_announced = true;
                        warn!(
                            "Camera {} failed {} times in a row, entering standby",
                            self.source.name(),
                            self.failures
                        );
                        if let Some(jpeg) = self.standby_frame.clone() {
                            let sequence = self.next_sequence();
                            return Some(EncodedFrame::standby(jpeg, sequence));
                        }
                    }

                    self.wait(self.policy.delay_after(self.failures));
                }
            }
        }
        None
    }
}

/// Encode a flat grey placeholder at `resolution`
pub fn standby_jpeg(encoder: &mut JpegEncoder, resolution: Resolution) -> Option<Bytes> {
    let pixels = vec![0x40u8; resolution.pixels() * 3];
    let frame = RawFrame::new(pixels, resolution, PixelFormat::Rgb24);
    match encoder.encode(&frame) {
        Ok(jpeg) => Some(jpeg),
        Err(e) => {
            warn!("Failed to render standby frame: {}", e);
            None
        }
    }
}

/// Running capture thread
pub struct CaptureHandle {
    stop: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl CaptureHandle {
    /// Drive `frames` on a blocking thread, publishing each one to `hub`
    pub fn spawn<S>(frames: Frames<S>, hub: Arc<MjpegStreamHandler>) -> Self
    where
        S: FrameSource + 'static,
    {
        let stop = frames.stop_flag();
        let task = tokio::task::spawn_blocking(move || {
            info!("Capture loop started on {}", frames.source.name());
            for frame in frames {
                hub.update_frame(frame);
            }
            hub.close();
            info!("Capture loop stopped");
        });
        Self { stop, task }
    }

    /// Ask the loop to finish after the current cycle
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Stop and wait for the thread to exit
    pub async fn shutdown(self) {
        self.stop();
        if let Err(e) = self.task.await {
            warn!("Capture thread ended abnormally: {}", e);
        }
        debug!("Capture thread joined");
    }
}

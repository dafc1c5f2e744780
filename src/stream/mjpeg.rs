//! MJPEG frame hub
//!
//! Holds the most recent encoded camera frame and fans it out to HTTP
//! viewers. The capture thread is the only writer; viewers read the frame
//! lock-free and are woken through a broadcast notification.

use arc_swap::ArcSwap;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::video::EncodedFrame;

/// Viewer ID type (UUID string)
pub type ViewerId = String;

/// Per-viewer session information
#[derive(Debug, Clone)]
pub struct ViewerSession {
    pub id: ViewerId,
    pub connected_at: Instant,
    /// Last time a frame was handed to this viewer
    pub last_activity: Instant,
    pub frames_sent: u64,
    pub fps_calculator: FpsCalculator,
}

impl ViewerSession {
    pub fn new(id: ViewerId) -> Self {
        let now = Instant::now();
        Self {
            id,
            connected_at: now,
            last_activity: now,
            frames_sent: 0,
            fps_calculator: FpsCalculator::new(),
        }
    }

    pub fn connected_duration(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

/// Rolling one-second frame rate
#[derive(Debug, Clone)]
pub struct FpsCalculator {
    frame_times: VecDeque<Instant>,
    window: Duration,
}

impl FpsCalculator {
    pub fn new() -> Self {
        Self {
            frame_times: VecDeque::with_capacity(64),
            window: Duration::from_secs(1),
        }
    }

    pub fn record_frame(&mut self) {
        let now = Instant::now();
        self.frame_times.push_back(now);
        while let Some(&oldest) = self.frame_times.front() {
            if now.duration_since(oldest) > self.window {
                self.frame_times.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn current_fps(&self) -> u32 {
        self.frame_times.len() as u32
    }
}

impl Default for FpsCalculator {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-viewer statistics for the status endpoint
#[derive(Debug, Clone, Serialize)]
pub struct ViewerStats {
    pub id: String,
    pub frames_sent: u64,
    pub fps: u32,
    pub connected_secs: u64,
}

/// Snapshot of the hub for the status endpoint
#[derive(Debug, Clone, Serialize)]
pub struct StreamStatus {
    /// A live (non-standby) frame is available
    pub online: bool,
    pub standby: bool,
    pub frames_published: u64,
    pub last_frame_age_ms: Option<u64>,
    pub viewer_count: usize,
    pub viewers: Vec<ViewerStats>,
}

/// Latest-frame hub shared by the capture thread and all viewers
pub struct MjpegStreamHandler {
    /// Current frame, swapped whole so readers never see a partial one
    current_frame: ArcSwap<Option<EncodedFrame>>,
    frame_notify: broadcast::Sender<()>,
    closed: AtomicBool,
    frames_published: AtomicU64,
    viewers: RwLock<HashMap<ViewerId, ViewerSession>>,
}

impl MjpegStreamHandler {
    pub fn new() -> Self {
        let (frame_notify, _) = broadcast::channel(16);
        Self {
            current_frame: ArcSwap::from_pointee(None),
            frame_notify,
            closed: AtomicBool::new(false),
            frames_published: AtomicU64::new(0),
            viewers: RwLock::new(HashMap::new()),
        }
    }

    /// Publish a new current frame and wake viewers
    pub fn update_frame(&self, frame: EncodedFrame) {
        if frame.is_empty() {
            return;
        }
        self.current_frame.store(Arc::new(Some(frame)));
        self.frames_published.fetch_add(1, Ordering::Relaxed);
        let _ = self.frame_notify.send(());
    }

    /// Mark the feed as finished; every viewer stream ends
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!("MJPEG hub closed");
        }
        let _ = self.frame_notify.send(());
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// A live camera frame is being served
    pub fn is_online(&self) -> bool {
        !self.is_closed()
            && (**self.current_frame.load())
                .as_ref()
                .is_some_and(|frame| !frame.standby)
    }

    pub fn current_frame(&self) -> Option<EncodedFrame> {
        (**self.current_frame.load()).clone()
    }

    /// Subscribe to frame updates
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.frame_notify.subscribe()
    }

    pub fn viewer_count(&self) -> usize {
        self.viewers.read().len()
    }

    pub fn register_viewer(&self, id: ViewerId) {
        let count = {
            let mut viewers = self.viewers.write();
            viewers.insert(id.clone(), ViewerSession::new(id.clone()));
            viewers.len()
        };
        info!("Viewer {} connected (total: {})", id, count);
    }

    pub fn unregister_viewer(&self, id: &str) {
        let Some(session) = self.viewers.write().remove(id) else {
            return;
        };
        let secs = session.connected_duration().as_secs_f32();
        let avg_fps = if secs > 0.1 {
            session.frames_sent as f32 / secs
        } else {
            0.0
        };
        info!(
            "Viewer {} disconnected after {:.1}s ({} frames, {:.1} avg FPS)",
            id, secs, session.frames_sent, avg_fps
        );
    }

    pub fn record_frame_sent(&self, id: &str) {
        if let Some(session) = self.viewers.write().get_mut(id) {
            session.last_activity = Instant::now();
            session.frames_sent += 1;
            session.fps_calculator.record_frame();
        }
    }

    pub fn frames_sent(&self, id: &str) -> Option<u64> {
        self.viewers.read().get(id).map(|s| s.frames_sent)
    }

    pub fn status(&self) -> StreamStatus {
        let frame = self.current_frame();
        let mut viewers: Vec<ViewerStats> = self
            .viewers
            .read()
            .values()
            .map(|session| ViewerStats {
                id: session.id.clone(),
                frames_sent: session.frames_sent,
                fps: session.fps_calculator.current_fps(),
                connected_secs: session.connected_duration().as_secs(),
            })
            .collect();
        viewers.sort_by(|a, b| a.id.cmp(&b.id));

        StreamStatus {
            online: self.is_online(),
            standby: frame.as_ref().is_some_and(|f| f.standby),
            frames_published: self.frames_published.load(Ordering::Relaxed),
            last_frame_age_ms: frame.map(|f| f.age().as_millis() as u64),
            viewer_count: viewers.len(),
            viewers,
        }
    }
}

impl Default for MjpegStreamHandler {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard for viewer registration
///
/// Unregisters on drop, so a viewer that disconnects mid-frame is removed
/// without any explicit cleanup path.
pub struct ViewerGuard {
    id: ViewerId,
    handler: Arc<MjpegStreamHandler>,
}

impl ViewerGuard {
    pub fn new(id: ViewerId, handler: Arc<MjpegStreamHandler>) -> Self {
        handler.register_viewer(id.clone());
        Self { id, handler }
    }

    pub fn id(&self) -> &ViewerId {
        &self.id
    }
}

impl Drop for ViewerGuard {
    fn drop(&mut self) {
        self.handler.unregister_viewer(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn frame(seq: u64) -> EncodedFrame {
        EncodedFrame::new(Bytes::from_static(&[0xFF, 0xD8, 0x00, 0xFF, 0xD9]), seq)
    }

    #[test]
    fn test_update_frame_notifies() {
        let hub = MjpegStreamHandler::new();
        let mut rx = hub.subscribe();
        assert!(hub.current_frame().is_none());
        assert!(!hub.is_online());

        hub.update_frame(frame(1));
        assert!(rx.try_recv().is_ok());
        assert_eq!(hub.current_frame().unwrap().sequence, 1);
        assert!(hub.is_online());
        assert_eq!(hub.status().frames_published, 1);
    }

    #[test]
    fn test_standby_frame_is_not_online() {
        let hub = MjpegStreamHandler::new();
        hub.update_frame(EncodedFrame::standby(
            Bytes::from_static(&[0xFF, 0xD8, 0xFF, 0xD9]),
            1,
        ));
        assert!(!hub.is_online());
        assert!(hub.status().standby);
    }

    #[test]
    fn test_viewer_guard_registers_and_unregisters() {
        let hub = Arc::new(MjpegStreamHandler::new());
        let guard = ViewerGuard::new("a".to_string(), hub.clone());
        let _other = ViewerGuard::new("b".to_string(), hub.clone());
        assert_eq!(hub.viewer_count(), 2);

        hub.record_frame_sent(guard.id());
        hub.record_frame_sent(guard.id());
        assert_eq!(hub.frames_sent("a"), Some(2));
        assert_eq!(hub.status().viewers[0].frames_sent, 2);

        drop(guard);
        assert_eq!(hub.viewer_count(), 1);
        assert_eq!(hub.frames_sent("a"), None);
    }

    #[test]
    fn test_close() {
        let hub = MjpegStreamHandler::new();
        hub.update_frame(frame(1));
        hub.close();
        assert!(hub.is_closed());
        assert!(!hub.is_online());
        // Last frame stays available for snapshots
        assert!(hub.current_frame().is_some());
    }
}

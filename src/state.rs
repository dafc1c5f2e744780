use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::actuation::CommandDispatcher;
use crate::auth::SessionStore;
use crate::config::AppConfig;
use crate::stream::MjpegStreamHandler;

/// Application-wide state shared across handlers
///
/// Config is fixed after startup. The dispatcher owns the only handle to
/// the actuation hardware; the MJPEG hub is fed by the capture thread.
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub sessions: SessionStore,
    pub dispatcher: Arc<CommandDispatcher>,
    pub mjpeg: Arc<MjpegStreamHandler>,
    started_at: Instant,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        sessions: SessionStore,
        dispatcher: Arc<CommandDispatcher>,
        mjpeg: Arc<MjpegStreamHandler>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config: Arc::new(config),
            sessions,
            dispatcher,
            mjpeg,
            started_at: Instant::now(),
        })
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Idle interval after which viewers get the last frame again
    pub fn keepalive(&self) -> Duration {
        Duration::from_secs(self.config.video.keepalive_secs.max(1))
    }
}

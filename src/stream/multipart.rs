//! Per-viewer multipart body
//!
//! Every viewer gets its own producer task feeding a one-slot channel. The
//! task wakes on frame notifications, re-sends the last frame when the
//! camera goes quiet, and jumps straight to the newest frame if the viewer
//! falls behind. Dropping the body drops the channel receiver, which ends
//! the producer and unregisters the viewer; nobody else is affected.

use bytes::{BufMut, Bytes, BytesMut};
use futures::Stream;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;
use tracing::debug;

use super::mjpeg::{MjpegStreamHandler, ViewerGuard, ViewerId};

/// Multipart boundary token
pub const BOUNDARY: &str = "frame";

/// `Content-Type` of the `/video_feed` response
pub const MULTIPART_CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";

/// Create MJPEG multipart frame bytes
pub fn create_mjpeg_part(jpeg_data: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(128 + jpeg_data.len());

    buf.put_slice(b"--");
    buf.put_slice(BOUNDARY.as_bytes());
    buf.put_slice(b"\r\n");
    buf.put_slice(b"Content-Type: image/jpeg\r\n");
    buf.put_slice(format!("Content-Length: {}\r\n", jpeg_data.len()).as_bytes());
    buf.put_slice(b"\r\n");
    buf.put_slice(jpeg_data);
    buf.put_slice(b"\r\n");

    buf.freeze()
}

/// Endless multipart body for one viewer
///
/// Ends when the viewer goes away or the hub is closed.
pub fn viewer_stream(
    handler: Arc<MjpegStreamHandler>,
    viewer_id: ViewerId,
    keepalive: Duration,
) -> impl Stream<Item = Result<Bytes, io::Error>> + Send + 'static {
    let guard = Arc::new(ViewerGuard::new(viewer_id, handler.clone()));
    let notify = handler.subscribe();

    // Capacity 1: a slow viewer holds at most one pending part
    let (tx, mut rx) = mpsc::channel::<Bytes>(1);

    let producer_guard = guard.clone();
    let producer_handler = handler.clone();
    tokio::spawn(async move {
        let _guard = producer_guard;
        feed_viewer(producer_handler, notify, tx, keepalive).await;
    });

    async_stream::stream! {
        while let Some(part) = rx.recv().await {
            handler.record_frame_sent(guard.id());
            yield Ok::<Bytes, io::Error>(part);
        }
    }
}

async fn feed_viewer(
    handler: Arc<MjpegStreamHandler>,
    mut notify: broadcast::Receiver<()>,
    tx: mpsc::Sender<Bytes>,
    keepalive: Duration,
) {
    let mut last_seq = None;

    if let Some(frame) = handler.current_frame() {
        if tx.send(create_mjpeg_part(frame.data())).await.is_err() {
            return;
        }
        last_seq = Some(frame.sequence);
    }

    loop {
        if handler.is_closed() {
            break;
        }

        let woke = tokio::select! {
            _ = tx.closed() => break,
            woke = tokio::time::timeout(keepalive, notify.recv()) => woke,
        };

        let resend = match woke {
            Ok(Ok(())) => false,
            Ok(Err(RecvError::Lagged(skipped))) => {
                debug!("Viewer lagged, skipping {} notifications", skipped);
                false
            }
            Ok(Err(RecvError::Closed)) => break,
            // Quiet camera: repeat the last frame so the connection stays warm
            Err(_) => true,
        };

        if handler.is_closed() {
            break;
        }
        let Some(frame) = handler.current_frame() else {
            continue;
        };
        if !resend && last_seq == Some(frame.sequence) {
            continue;
        }
        if tx.send(create_mjpeg_part(frame.data())).await.is_err() {
            break;
        }
        last_seq = Some(frame.sequence);
    }
}

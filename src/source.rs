// src/source.rs
//
// Frame acquisition. A dedicated grabber thread keeps reading the source
// and publishes only the newest frame, so a slow analysis loop skips stale
// frames instead of queueing them. Read errors and long stalls reopen the
// source after a delay; the grabber never gives up on its own.

use crate::pipeline::PipelineMetrics;
use crate::types::{Frame, SharedFrame};
use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

pub trait FrameSource: Send {
    /// Next frame, or `None` when nothing is available right now.
    fn read(&mut self) -> Result<Option<Frame>>;

    fn reopen(&mut self) -> Result<()>;
}

const IDLE_SLEEP: Duration = Duration::from_millis(10);
/// Consecutive empty reads (about 2 s) before a stream counts as stalled
const STALL_READS: u32 = 200;

pub struct FrameGrabber {
    latest: watch::Receiver<Option<SharedFrame>>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl FrameGrabber {
    pub fn spawn(
        mut source: Box<dyn FrameSource>,
        reconnect_delay: Duration,
        metrics: PipelineMetrics,
    ) -> Result<Self> {
        let (tx, rx) = watch::channel(None);
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);

        let handle = std::thread::Builder::new()
            .name("frame-grabber".to_string())
            .spawn(move || {
                grab_loop(source.as_mut(), &tx, &flag, reconnect_delay, &metrics);
                debug!("Frame grabber stopped");
            })
            .context("Failed to spawn frame grabber thread")?;

        info!("✓ Frame grabber started");
        Ok(Self {
            latest: rx,
            running,
            handle: Some(handle),
        })
    }

    /// Receiver that always holds the most recent frame.
    pub fn subscribe(&self) -> watch::Receiver<Option<SharedFrame>> {
        self.latest.clone()
    }
}

impl Drop for FrameGrabber {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Frame grabber thread panicked");
            }
        }
    }
}

fn grab_loop(
    source: &mut dyn FrameSource,
    tx: &watch::Sender<Option<SharedFrame>>,
    running: &AtomicBool,
    reconnect_delay: Duration,
    metrics: &PipelineMetrics,
) {
    let mut empty_reads = 0u32;
    while running.load(Ordering::SeqCst) {
        match source.read() {
            Ok(Some(frame)) => {
                empty_reads = 0;
                tx.send_replace(Some(Arc::new(frame)));
            }
            Ok(None) => {
                empty_reads += 1;
                if empty_reads < STALL_READS {
                    std::thread::sleep(IDLE_SLEEP);
                    continue;
                }
                warn!("No frames for {} reads, reopening source", empty_reads);
                empty_reads = 0;
                reconnect(source, reconnect_delay, metrics);
            }
            Err(e) => {
                warn!("Frame read failed: {:#}", e);
                reconnect(source, reconnect_delay, metrics);
            }
        }
    }
}

fn reconnect(source: &mut dyn FrameSource, delay: Duration, metrics: &PipelineMetrics) {
    metrics.inc(&metrics.source_reconnects);
    std::thread::sleep(delay);
    match source.reopen() {
        Ok(()) => info!("✓ Source reopened"),
        Err(e) => error!("Failed to reopen source: {:#}", e),
    }
}

// ============================================================================
// OPENCV CAPTURE
// ============================================================================

#[cfg(feature = "opencv")]
pub use capture::OpenCvSource;

#[cfg(feature = "opencv")]
mod capture {
    use super::FrameSource;
    use crate::clock::{Clock, SystemClock};
    use crate::types::Frame;
    use anyhow::{bail, Context, Result};
    use opencv::{
        core::{Mat, Size},
        imgproc,
        prelude::*,
        videoio::{self, VideoCapture},
    };
    use tracing::info;

    /// RTSP stream or video file, resized to the analysis frame size.
    pub struct OpenCvSource {
        uri: String,
        cap: VideoCapture,
        width: usize,
        height: usize,
        next_index: u64,
    }

    impl OpenCvSource {
        pub fn open(uri: &str, width: usize, height: usize) -> Result<Self> {
            let cap = open_capture(uri)?;
            info!("✓ Video source opened ({}x{})", width, height);
            Ok(Self {
                uri: uri.to_string(),
                cap,
                width,
                height,
                next_index: 0,
            })
        }
    }

    fn open_capture(uri: &str) -> Result<VideoCapture> {
        let mut cap = VideoCapture::from_file(uri, videoio::CAP_ANY)
            .with_context(|| format!("Failed to open video source {}", uri))?;
        if !cap.is_opened()? {
            bail!("Video source {} did not open", uri);
        }
        // Keep only the newest frame in the driver queue
        cap.set(videoio::CAP_PROP_BUFFERSIZE, 1.0)?;
        Ok(cap)
    }

    impl FrameSource for OpenCvSource {
        fn read(&mut self) -> Result<Option<Frame>> {
            let mut mat = Mat::default();
            if !self.cap.read(&mut mat)? || mat.empty() {
                return Ok(None);
            }

            let mut resized = Mat::default();
            imgproc::resize(
                &mat,
                &mut resized,
                Size::new(self.width as i32, self.height as i32),
                0.0,
                0.0,
                imgproc::INTER_LINEAR,
            )?;
            let mut rgb = Mat::default();
            imgproc::cvt_color(&resized, &mut rgb, imgproc::COLOR_BGR2RGB, 0)?;

            let frame = Frame {
                data: rgb.data_bytes()?.to_vec(),
                width: self.width,
                height: self.height,
                index: self.next_index,
                timestamp: SystemClock.now(),
            };
            self.next_index += 1;
            Ok(Some(frame))
        }

        fn reopen(&mut self) -> Result<()> {
            let _ = self.cap.release();
            self.cap = open_capture(&self.uri)?;
            Ok(())
        }
    }
}

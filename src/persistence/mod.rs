// src/persistence/mod.rs
//
// Best-effort persistence of alert episodes: clip encoding and the JSON
// alert log. Nothing in here can fail the analysis loop.

pub mod alert_log;
pub mod clip;
pub mod pool;

pub use alert_log::{AlertLogHandle, AlertLogWriter, LogEntry};
pub use clip::{ClipEncoder, ClipRequest, EncodedClip, JpegSequenceEncoder};
pub use pool::{ClipDispatcher, ClipWorkerPool};

#[cfg(feature = "opencv")]
pub use clip::Mp4ClipEncoder;

/// Fire-and-forget destination for clip requests.
pub trait ClipSink {
    /// Hand over a request without blocking. Returns false if it was dropped.
    fn submit(&self, request: ClipRequest) -> bool;
}

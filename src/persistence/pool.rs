// src/persistence/pool.rs
//
// Bounded clip worker pool. The analysis loop hands requests over with
// `try_send`; a full queue drops the request instead of stalling analysis.
// Each worker writes the log entry and then encodes on the blocking pool.

use super::alert_log::{AlertLogHandle, LogEntry};
use super::clip::{ClipEncoder, ClipRequest};
use super::ClipSink;
use crate::pipeline::PipelineMetrics;
use crate::types::ClipConfig;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

pub struct ClipWorkerPool {
    tx: mpsc::Sender<ClipRequest>,
    workers: Vec<JoinHandle<()>>,
    metrics: PipelineMetrics,
}

impl ClipWorkerPool {
    pub fn spawn(
        config: &ClipConfig,
        encoder: Arc<dyn ClipEncoder>,
        log: AlertLogHandle,
        metrics: PipelineMetrics,
    ) -> Self {
        let (tx, rx) = mpsc::channel::<ClipRequest>(config.queue_capacity);
        let rx = Arc::new(Mutex::new(rx));
        let output_dir = PathBuf::from(&config.output_dir);

        let workers = (0..config.max_concurrent_encodes)
            .map(|worker_id| {
                let rx = Arc::clone(&rx);
                let encoder = Arc::clone(&encoder);
                let log = log.clone();
                let metrics = metrics.clone();
                let output_dir = output_dir.clone();
                tokio::spawn(async move {
                    loop {
                        // Hold the lock only while waiting for the next request
                        let next = rx.lock().await.recv().await;
                        let Some(request) = next else { break };
                        persist(worker_id, request, &encoder, &log, &metrics, &output_dir).await;
                    }
                    debug!("Clip worker {} stopped", worker_id);
                })
            })
            .collect();

        info!(
            "✓ Clip worker pool ready ({} workers, queue {})",
            config.max_concurrent_encodes, config.queue_capacity
        );

        Self {
            tx,
            workers,
            metrics,
        }
    }

    pub fn dispatcher(&self) -> ClipDispatcher {
        ClipDispatcher {
            tx: self.tx.clone(),
            metrics: self.metrics.clone(),
        }
    }

    /// Wait for queued clips to finish. Workers exit once every dispatcher
    /// has been dropped as well.
    pub async fn shutdown(self) {
        drop(self.tx);
        for worker in self.workers {
            if let Err(e) = worker.await {
                error!("Clip worker ended abnormally: {}", e);
            }
        }
    }
}

/// Cloneable submission handle held by the analyzer.
#[derive(Clone)]
pub struct ClipDispatcher {
    tx: mpsc::Sender<ClipRequest>,
    metrics: PipelineMetrics,
}

impl ClipSink for ClipDispatcher {
    fn submit(&self, request: ClipRequest) -> bool {
        match self.tx.try_send(request) {
            Ok(()) => {
                self.metrics.inc(&self.metrics.clips_dispatched);
                true
            }
            Err(mpsc::error::TrySendError::Full(req)) => {
                self.metrics.inc(&self.metrics.clips_dropped);
                warn!(
                    "Clip queue full, dropping clip for ID {} ({})",
                    req.track_id, req.label
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(req)) => {
                self.metrics.inc(&self.metrics.clips_dropped);
                error!("Clip workers stopped, dropping clip for ID {}", req.track_id);
                false
            }
        }
    }
}

async fn persist(
    worker_id: usize,
    request: ClipRequest,
    encoder: &Arc<dyn ClipEncoder>,
    log: &AlertLogHandle,
    metrics: &PipelineMetrics,
    output_dir: &Path,
) {
    let clip_path = encoder.clip_path(&request, output_dir);
    log.append(LogEntry {
        camera: request.camera.clone(),
        timestamp: request.timestamp(),
        kind: request.label.clone(),
        file: clip_path.display().to_string(),
        track_id: Some(request.track_id),
    });

    let encoder = Arc::clone(encoder);
    let dir = output_dir.to_path_buf();
    let track_id = request.track_id;
    let result = tokio::task::spawn_blocking(move || encoder.encode(&request, &dir)).await;

    match result {
        Ok(Ok(clip)) => {
            metrics.inc(&metrics.clips_saved);
            info!(
                "   [Saved] {} ({} frames, worker {})",
                clip.path.display(),
                clip.frames_written,
                worker_id
            );
        }
        Ok(Err(e)) => {
            metrics.inc(&metrics.clip_failures);
            error!("Error saving clip for ID {}: {:#}", track_id, e);
        }
        Err(e) => {
            metrics.inc(&metrics.clip_failures);
            error!("Clip encoder panicked for ID {}: {}", track_id, e);
        }
    }
}

// src/pipeline/metrics.rs
//
// Counters for every stage of the pipeline. Cheap to clone; clip workers
// and the log writer update the same counters as the analysis loop.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct PipelineMetrics {
    pub total_frames: Arc<AtomicU64>,
    pub analyzed_frames: Arc<AtomicU64>,
    /// Frames the tracker had no output for
    pub untracked_frames: Arc<AtomicU64>,
    pub observations: Arc<AtomicU64>,
    pub alerts_started: Arc<AtomicU64>,
    pub alerts_cleared: Arc<AtomicU64>,
    pub alerts_timed_out: Arc<AtomicU64>,
    pub clips_dispatched: Arc<AtomicU64>,
    pub clips_dropped: Arc<AtomicU64>,
    pub clips_saved: Arc<AtomicU64>,
    pub clip_failures: Arc<AtomicU64>,
    pub log_failures: Arc<AtomicU64>,
    pub scorer_failures: Arc<AtomicU64>,
    pub entities_evicted: Arc<AtomicU64>,
    pub source_reconnects: Arc<AtomicU64>,
    pub started_at: Instant,
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            total_frames: Arc::new(AtomicU64::new(0)),
            analyzed_frames: Arc::new(AtomicU64::new(0)),
            untracked_frames: Arc::new(AtomicU64::new(0)),
            observations: Arc::new(AtomicU64::new(0)),
            alerts_started: Arc::new(AtomicU64::new(0)),
            alerts_cleared: Arc::new(AtomicU64::new(0)),
            alerts_timed_out: Arc::new(AtomicU64::new(0)),
            clips_dispatched: Arc::new(AtomicU64::new(0)),
            clips_dropped: Arc::new(AtomicU64::new(0)),
            clips_saved: Arc::new(AtomicU64::new(0)),
            clip_failures: Arc::new(AtomicU64::new(0)),
            log_failures: Arc::new(AtomicU64::new(0)),
            scorer_failures: Arc::new(AtomicU64::new(0)),
            entities_evicted: Arc::new(AtomicU64::new(0)),
            source_reconnects: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }

    pub fn inc(&self, counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn fps(&self) -> f64 {
        let frames = self.total_frames.load(Ordering::Relaxed);
        let elapsed = self.started_at.elapsed().as_secs_f64();
        if elapsed > 0.01 {
            frames as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        MetricsSummary {
            total_frames: load(&self.total_frames),
            analyzed_frames: load(&self.analyzed_frames),
            untracked_frames: load(&self.untracked_frames),
            observations: load(&self.observations),
            fps: self.fps(),
            alerts_started: load(&self.alerts_started),
            alerts_cleared: load(&self.alerts_cleared),
            alerts_timed_out: load(&self.alerts_timed_out),
            clips_dispatched: load(&self.clips_dispatched),
            clips_dropped: load(&self.clips_dropped),
            clips_saved: load(&self.clips_saved),
            clip_failures: load(&self.clip_failures),
            log_failures: load(&self.log_failures),
            scorer_failures: load(&self.scorer_failures),
            entities_evicted: load(&self.entities_evicted),
            source_reconnects: load(&self.source_reconnects),
            elapsed_secs: self.started_at.elapsed().as_secs_f64(),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSummary {
    pub total_frames: u64,
    pub analyzed_frames: u64,
    pub untracked_frames: u64,
    pub observations: u64,
    pub fps: f64,
    pub alerts_started: u64,
    pub alerts_cleared: u64,
    pub alerts_timed_out: u64,
    pub clips_dispatched: u64,
    pub clips_dropped: u64,
    pub clips_saved: u64,
    pub clip_failures: u64,
    pub log_failures: u64,
    pub scorer_failures: u64,
    pub entities_evicted: u64,
    pub source_reconnects: u64,
    pub elapsed_secs: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_counters() {
        let metrics = PipelineMetrics::new();
        let other = metrics.clone();
        other.inc(&other.clips_saved);
        metrics.add(&metrics.clips_saved, 2);
        assert_eq!(metrics.summary().clips_saved, 3);
    }
}

// src/main.rs

use anomaly_watch::clock::{Clock, ManualClock};
use anomaly_watch::persistence::{AlertLogWriter, ClipEncoder, ClipWorkerPool};
use anomaly_watch::pipeline::{AlertEvent, BehaviorAnalyzer, PipelineMetrics};
use anomaly_watch::replay::Recording;
use anomaly_watch::scoring::{DisabledScorer, PoseSequenceScorer};
use anomaly_watch::source::FrameSource;
use anomaly_watch::types::{Config, ModelConfig};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "anomaly-watch",
    about = "Behavioral anomaly alerts from pose-tracking streams",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch the configured camera stream
    Run {
        #[arg(short, long, default_value = "config.yaml")]
        config: PathBuf,

        /// JSON-lines feed from the pose tracker, `-` for stdin
        #[arg(long, default_value = "-")]
        tracks: String,
    },

    /// Replay a recorded tracker log through the analyzer
    Replay {
        #[arg(short, long, default_value = "config.yaml")]
        config: PathBuf,

        /// Recording in JSON-lines format
        #[arg(short, long)]
        recording: PathBuf,

        /// Pace frames by their recorded timestamps
        #[arg(long)]
        realtime: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = match &cli.command {
        Commands::Run { config, .. } | Commands::Replay { config, .. } => config.clone(),
    };
    // Config decides the log filter, so loading it logs through a temporary subscriber
    let bootstrap = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    let config = tracing::subscriber::with_default(bootstrap, || Config::load(&config_path))?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("🎥 Anomaly watch starting (camera {})", config.camera.name);
    info!(
        "Thresholds: pose={:.2}, steal={:.2}/{:.2}, min motion={:.2}",
        config.detection.pose_threshold,
        config.detection.steal_threshold,
        config.detection.steal_threshold_escalated,
        config.detection.stealing_min_motion_error
    );

    match cli.command {
        Commands::Run { tracks, .. } => run_live(config, &tracks).await,
        Commands::Replay {
            recording,
            realtime,
            ..
        } => run_replay(config, &recording, realtime).await,
    }
}

// ============================================================================
// SERVICES
// ============================================================================

struct Services {
    analyzer: BehaviorAnalyzer,
    pool: ClipWorkerPool,
    log_task: JoinHandle<()>,
    metrics: PipelineMetrics,
}

fn build_services(config: Config, clock: Arc<dyn Clock>) -> Result<Services> {
    let metrics = PipelineMetrics::new();
    std::fs::create_dir_all(&config.clip.output_dir)
        .with_context(|| format!("Failed to create clip directory {}", config.clip.output_dir))?;

    let (log, log_task) =
        AlertLogWriter::spawn(PathBuf::from(&config.clip.log_file), metrics.clone());
    let pool = ClipWorkerPool::spawn(&config.clip, build_encoder(&config), log, metrics.clone());
    let (motion, theft) = build_scorers(&config.models)?;

    let analyzer = BehaviorAnalyzer::new(
        config,
        clock,
        motion,
        theft,
        Box::new(pool.dispatcher()),
        metrics.clone(),
    )?;

    Ok(Services {
        analyzer,
        pool,
        log_task,
        metrics,
    })
}

#[cfg(feature = "opencv")]
fn build_encoder(config: &Config) -> Arc<dyn ClipEncoder> {
    Arc::new(anomaly_watch::persistence::Mp4ClipEncoder::new(config.clip.fps))
}

#[cfg(not(feature = "opencv"))]
fn build_encoder(config: &Config) -> Arc<dyn ClipEncoder> {
    Arc::new(anomaly_watch::persistence::JpegSequenceEncoder::new(
        config.clip.jpeg_quality,
    ))
}

type Scorers = (
    Box<dyn PoseSequenceScorer>,
    Option<Box<dyn PoseSequenceScorer>>,
);

#[cfg(feature = "onnx")]
fn build_scorers(models: &ModelConfig) -> Result<Scorers> {
    use anomaly_watch::scoring::onnx::{OnnxProbabilityScorer, OnnxReconstructionScorer};

    let motion: Box<dyn PoseSequenceScorer> = match &models.anomaly_model_path {
        Some(path) => Box::new(
            OnnxReconstructionScorer::new(path, models.num_threads)
                .with_context(|| format!("Failed to load motion model {}", path))?,
        ),
        None => {
            warn!("No motion model configured, fight/fall detection disabled");
            Box::new(DisabledScorer)
        }
    };

    let theft: Option<Box<dyn PoseSequenceScorer>> = match &models.stealing_model_path {
        Some(path) => match OnnxProbabilityScorer::new(path, models.num_threads) {
            Ok(scorer) => {
                info!("✓ Theft classifier loaded");
                Some(Box::new(scorer) as Box<dyn PoseSequenceScorer>)
            }
            Err(e) => {
                warn!("Theft classifier unavailable ({:#}), theft detection disabled", e);
                None
            }
        },
        None => None,
    };

    Ok((motion, theft))
}

#[cfg(not(feature = "onnx"))]
fn build_scorers(models: &ModelConfig) -> Result<Scorers> {
    if models.anomaly_model_path.is_some() || models.stealing_model_path.is_some() {
        warn!("Built without the `onnx` feature, configured models are ignored");
    }
    warn!("Sequence models disabled, fight/fall and theft detection are off");
    Ok((Box::new(DisabledScorer), None))
}

fn log_events(analyzer: &mut BehaviorAnalyzer) {
    for event in analyzer.drain_events() {
        match event {
            AlertEvent::Started {
                track_id,
                label,
                clip_dispatched,
                ..
            } => {
                if !clip_dispatched {
                    warn!("ID {}: no clip for {}", track_id, label);
                }
            }
            AlertEvent::Cleared {
                track_id, duration, ..
            } => info!("✓ ID {} back to normal after {:.1}s", track_id, duration),
            AlertEvent::TimedOut {
                track_id,
                cooldown_until,
                ..
            } => debug!("ID {} suppressed until {:.1}", track_id, cooldown_until),
            AlertEvent::EntitiesEvicted { count, .. } => {
                debug!("Evicted {} stale entities", count)
            }
        }
    }
}

fn log_summary(metrics: &PipelineMetrics) {
    let s = metrics.summary();
    info!(
        "📊 {} frames ({:.1} fps), {} analyzed, {} untracked, {} alerts, {} timed out",
        s.total_frames,
        s.fps,
        s.analyzed_frames,
        s.untracked_frames,
        s.alerts_started,
        s.alerts_timed_out
    );
    info!(
        "   Clips: {} saved, {} dropped, {} failed; log failures: {}",
        s.clips_saved, s.clips_dropped, s.clip_failures, s.log_failures
    );
    match serde_json::to_string(&s) {
        Ok(json) => debug!("metrics {}", json),
        Err(e) => warn!("Failed to serialize metrics: {}", e),
    }
}

/// Drain the clip queue and the log writer, then report.
async fn finish(services: Services) -> Result<()> {
    let Services {
        analyzer,
        pool,
        log_task,
        metrics,
    } = services;

    // The analyzer holds a dispatcher; workers only exit once it is gone
    drop(analyzer);
    pool.shutdown().await;
    if let Err(e) = log_task.await {
        error!("Alert log writer ended abnormally: {}", e);
    }

    log_summary(&metrics);
    Ok(())
}

// ============================================================================
// MODES
// ============================================================================

async fn run_replay(config: Config, recording: &Path, realtime: bool) -> Result<()> {
    let recording = Recording::load(recording)?;
    let (mut source, mut tracker) = recording.into_parts();

    // Analysis time follows the recording, not the wall clock
    let clock = Arc::new(ManualClock::new(0.0));
    let mut services = build_services(config, clock.clone())?;

    let mut previous: Option<f64> = None;
    while let Some(frame) = source.read()? {
        if realtime {
            if let Some(prev) = previous {
                let dt = frame.timestamp - prev;
                if dt > 0.0 {
                    tokio::time::sleep(Duration::from_secs_f64(dt)).await;
                }
            }
        }
        previous = Some(frame.timestamp);
        clock.set(frame.timestamp);

        let views = services
            .analyzer
            .process_tracked(Arc::new(frame), &mut tracker)?
            .unwrap_or_default();
        for view in views.iter().filter(|v| v.alert_active) {
            debug!("{}", view.caption());
        }
        log_events(&mut services.analyzer);
    }

    info!("✓ Replay finished");
    finish(services).await
}

#[cfg(feature = "opencv")]
async fn run_live(config: Config, tracks: &str) -> Result<()> {
    use anomaly_watch::clock::SystemClock;
    use anomaly_watch::replay::StreamTracker;
    use anomaly_watch::source::{FrameGrabber, OpenCvSource};
    use std::io::BufReader;

    let source = OpenCvSource::open(
        &config.camera.source,
        config.camera.frame_width,
        config.camera.frame_height,
    )?;
    let mut tracker = if tracks == "-" {
        StreamTracker::spawn(BufReader::new(std::io::stdin()))?
    } else {
        let file = std::fs::File::open(tracks)
            .with_context(|| format!("Failed to open tracker feed {}", tracks))?;
        StreamTracker::spawn(BufReader::new(file))?
    };

    let reconnect_delay = Duration::from_millis(config.camera.reconnect_delay_ms);
    let mut services = build_services(config, Arc::new(SystemClock))?;
    let grabber = FrameGrabber::spawn(Box::new(source), reconnect_delay, services.metrics.clone())?;
    let mut frames = grabber.subscribe();

    let mut report = tokio::time::interval(Duration::from_secs(60));
    report.tick().await;
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            changed = frames.changed() => {
                if changed.is_err() {
                    warn!("Frame grabber stopped");
                    break;
                }
                let Some(frame) = frames.borrow_and_update().clone() else {
                    continue;
                };
                if let Err(e) = services.analyzer.process_tracked(frame, &mut tracker) {
                    warn!("Tracker feed failed: {:#}", e);
                }
                log_events(&mut services.analyzer);
            }
            _ = report.tick() => log_summary(&services.metrics),
            _ = &mut shutdown => {
                info!("Shutting down");
                break;
            }
        }
    }

    drop(grabber);
    finish(services).await
}

#[cfg(not(feature = "opencv"))]
async fn run_live(config: Config, tracks: &str) -> Result<()> {
    let _ = (config, tracks);
    anyhow::bail!("Live capture needs the `opencv` feature; rebuild with --features opencv or use `replay`")
}

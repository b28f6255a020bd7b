// src/pipeline/analyzer.rs
//
// Per-frame orchestration. Every observed person gets a position/stillness
// update on every tracked frame; the heavier analysis (pose window, gaze,
// sequence scorers, decision rules, alert lifecycle) only runs on every
// `logic_skip`-th tracked frame. Alert starts cut a clip from the rolling
// frame buffer and hand it to the clip sink without waiting on it.

use super::event_bus::{AlertEvent, EventBus};
use super::frame_buffer::RollingFrameBuffer;
use super::metrics::PipelineMetrics;
use crate::analysis::keypoints::{centroid_px, person_height_px};
use crate::analysis::signals::{
    classify_gaze, estimate_steal_speed, hand_near_face, head_scan_completed, is_pacing,
    path_metrics_available, PathMetrics, StealSpeed,
};
use crate::analysis::{
    AlertLifecycle, BehaviorLabel, Decision, DecisionEngine, DecisionInputs, Severity,
    Transition,
};
use crate::clock::Clock;
use crate::persistence::{ClipRequest, ClipSink};
use crate::replay::PoseTracker;
use crate::scoring::PoseSequenceScorer;
use crate::tracking::{EntityTable, EntityView, TrackedEntity};
use crate::types::{Config, Frame, Keypoints, Observation, SharedFrame};
use anyhow::Result;
use chrono::Local;
use std::sync::Arc;
use tracing::{debug, info, warn};

const MAX_PENDING_EVENTS: usize = 256;

pub struct BehaviorAnalyzer {
    config: Config,
    clock: Arc<dyn Clock>,
    entities: EntityTable,
    decision: DecisionEngine,
    lifecycle: AlertLifecycle,
    motion_scorer: Box<dyn PoseSequenceScorer>,
    theft_scorer: Option<Box<dyn PoseSequenceScorer>>,
    frame_buffer: RollingFrameBuffer,
    events: EventBus,
    metrics: PipelineMetrics,
    clips: Box<dyn ClipSink + Send>,
    frame_count: u64,
}

impl BehaviorAnalyzer {
    pub fn new(
        config: Config,
        clock: Arc<dyn Clock>,
        motion_scorer: Box<dyn PoseSequenceScorer>,
        theft_scorer: Option<Box<dyn PoseSequenceScorer>>,
        clips: Box<dyn ClipSink + Send>,
        metrics: PipelineMetrics,
    ) -> Result<Self> {
        config.validate()?;
        info!(
            "✓ Behavior analyzer ready (motion: {}, theft: {}, logic skip {})",
            motion_scorer.name(),
            theft_scorer.as_ref().map(|s| s.name()).unwrap_or("none"),
            config.detection.logic_skip
        );
        Ok(Self {
            entities: EntityTable::new(&config),
            decision: DecisionEngine::new(&config),
            lifecycle: AlertLifecycle::new(&config),
            frame_buffer: RollingFrameBuffer::new(config.clip.buffer_frames),
            events: EventBus::new(MAX_PENDING_EVENTS),
            config,
            clock,
            motion_scorer,
            theft_scorer,
            metrics,
            clips,
            frame_count: 0,
        })
    }

    /// Ask the tracker about `frame` and analyze its answer. Frames the
    /// tracker has no output for are skipped entirely, so the analysis
    /// cadence follows tracked frames rather than grabbed ones.
    pub fn process_tracked(
        &mut self,
        frame: SharedFrame,
        tracker: &mut dyn PoseTracker,
    ) -> Result<Option<Vec<EntityView>>> {
        match tracker.track(&frame)? {
            Some(observations) => Ok(Some(self.process_frame(frame, &observations))),
            None => {
                self.metrics.inc(&self.metrics.untracked_frames);
                Ok(None)
            }
        }
    }

    /// Feed one frame and the tracker output for it. Returns the overlay
    /// state of every person observed on this frame.
    pub fn process_frame(
        &mut self,
        frame: SharedFrame,
        observations: &[Observation],
    ) -> Vec<EntityView> {
        let now = self.clock.now();
        self.frame_count += 1;
        self.metrics.inc(&self.metrics.total_frames);
        self.frame_buffer.push(Arc::clone(&frame));

        let analyze = self.frame_count % self.config.detection.logic_skip == 0;
        if analyze {
            self.metrics.inc(&self.metrics.analyzed_frames);
        }

        let mut views = Vec::with_capacity(observations.len());
        for obs in observations {
            self.metrics.inc(&self.metrics.observations);

            let entity = self.entities.observe(obs.id, now);
            entity.last_bbox = obs.bbox;
            match centroid_px(&obs.keypoints, frame.width, frame.height) {
                Some(centroid) => entity.last_speed = entity.history.record_position(centroid),
                None => debug!("ID {}: no keypoints on frame {}", obs.id, frame.index),
            }

            if analyze {
                self.analyze_entity(obs, &frame, now);
            }

            if let Some(entity) = self.entities.get(obs.id) {
                views.push(entity.view());
            }
        }

        self.sweep_if_due(now);
        views
    }

    fn analyze_entity(&mut self, obs: &Observation, frame: &Frame, now: f64) {
        let Some(entity) = self.entities.get_mut(obs.id) else {
            return;
        };

        entity.history.record_pose(obs.keypoints.clone());
        let suppressed = self.decision.in_cooldown(now, entity.alert.last_cooldown);
        if !suppressed && entity.alert.last_cooldown.take().is_some() {
            // Positions kept accumulating during cooldown; windows refill from here
            entity.history.reset_behavior();
            debug!("ID {}: cooldown over", entity.id);
        }

        let inputs = if suppressed {
            DecisionInputs::idle(now, entity)
        } else {
            let (motion_error, theft_probability) = if entity.history.pose_window_ready() {
                let window = entity.history.pose_window();
                let motion = score_or_zero(self.motion_scorer.as_mut(), &window, &self.metrics);
                let theft = self
                    .theft_scorer
                    .as_deref_mut()
                    .map(|s| score_or_zero(s, &window, &self.metrics))
                    .unwrap_or(0.0);
                (motion, theft)
            } else {
                (0.0, 0.0)
            };
            extract_inputs(entity, obs, frame, now, motion_error, theft_probability)
        };

        let Decision { label, debug_info } = self.decision.decide(&inputs);
        let started_at = entity.alert.alert_start;
        let (shown, transition) = self.lifecycle.apply(&mut entity.alert, label, now);

        entity.debug_info = if shown == label { debug_info } else { String::new() };
        entity.current_label = shown;

        match transition {
            Transition::Idle | Transition::Continuing => {}
            Transition::Started => {
                let tracked_for = now - entity.first_seen;
                match shown.severity() {
                    Severity::High => warn!(
                        "⚡ Alert ID {}: {} (tracked {:.1}s)",
                        entity.id, shown, tracked_for
                    ),
                    _ => info!(
                        "⚡ Alert ID {}: {} (tracked {:.1}s)",
                        entity.id, shown, tracked_for
                    ),
                }
                self.metrics.inc(&self.metrics.alerts_started);
                let request = ClipRequest {
                    track_id: entity.id,
                    label: shown.to_string(),
                    camera: self.config.camera.name.clone(),
                    captured_at: Local::now(),
                    frames: self.frame_buffer.snapshot(),
                };
                let clip_dispatched = self.clips.submit(request);
                self.events.publish(AlertEvent::Started {
                    track_id: entity.id,
                    label: shown.to_string(),
                    timestamp: now,
                    clip_dispatched,
                });
            }
            Transition::Cleared => {
                self.metrics.inc(&self.metrics.alerts_cleared);
                self.events.publish(AlertEvent::Cleared {
                    track_id: entity.id,
                    timestamp: now,
                    duration: started_at.map(|t| now - t).unwrap_or(0.0),
                });
            }
            Transition::TimedOut => {
                info!(
                    "ID {}: alert timed out, cooling down for {:.0}s",
                    entity.id, self.config.alert.cooldown_seconds
                );
                entity.history.reset_behavior();
                self.metrics.inc(&self.metrics.alerts_timed_out);
                self.events.publish(AlertEvent::TimedOut {
                    track_id: entity.id,
                    timestamp: now,
                    cooldown_until: now + self.config.alert.cooldown_seconds,
                });
            }
        }
    }

    fn sweep_if_due(&mut self, now: f64) {
        let interval = self.config.tracking.sweep_interval_frames;
        if interval == 0 || self.frame_count % interval != 0 || self.entities.is_empty() {
            return;
        }
        let evicted = self.entities.evict_stale(now);
        if evicted > 0 {
            self.metrics.add(&self.metrics.entities_evicted, evicted as u64);
            self.events.publish(AlertEvent::EntitiesEvicted {
                count: evicted,
                timestamp: now,
            });
        }
    }

    pub fn drain_events(&mut self) -> Vec<AlertEvent> {
        self.events.drain()
    }

    pub fn entity(&self, id: u32) -> Option<&TrackedEntity> {
        self.entities.get(id)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }
}

fn score_or_zero(
    scorer: &mut dyn PoseSequenceScorer,
    window: &[Keypoints],
    metrics: &PipelineMetrics,
) -> f32 {
    match scorer.score(window) {
        Ok(score) => score,
        Err(e) => {
            metrics.inc(&metrics.scorer_failures);
            warn!("{} scorer failed: {:#}", scorer.name(), e);
            0.0
        }
    }
}

/// Gaze is recorded here, so it only advances on analyzed frames outside
/// of cooldown.
fn extract_inputs(
    entity: &mut TrackedEntity,
    obs: &Observation,
    frame: &Frame,
    now: f64,
    motion_error: f32,
    theft_probability: f32,
) -> DecisionInputs {
    let kp = &obs.keypoints;
    let height = person_height_px(kp, frame.height);
    let speed = entity.last_speed;
    let history = &mut entity.history;

    if let Some(gaze) = classify_gaze(kp) {
        history.record_gaze(gaze);
    }

    let path = path_metrics_available(&history.positions)
        .then(|| PathMetrics::from_positions(&history.positions));
    let pacing = path.is_some_and(|p| is_pacing(&p, height, speed));
    let poses = history.poses.to_vec();

    DecisionInputs {
        now,
        last_cooldown: entity.alert.last_cooldown,
        motion_error,
        theft_probability,
        speed,
        person_height_px: height,
        hand_near_face: hand_near_face(kp, height),
        scanning: head_scan_completed(&history.gaze),
        pacing,
        stationary_counter: history.stationary_counter,
        path,
        history_full: history.positions.is_full(),
        steal_speed: estimate_steal_speed(&poses, frame.width, frame.height, height),
    }
}

impl DecisionInputs {
    /// Inputs for a suppressed entity: only the cooldown stamp matters.
    fn idle(now: f64, entity: &TrackedEntity) -> Self {
        Self {
            now,
            last_cooldown: entity.alert.last_cooldown,
            motion_error: 0.0,
            theft_probability: 0.0,
            speed: entity.last_speed,
            person_height_px: 0.0,
            hand_near_face: false,
            scanning: false,
            pacing: false,
            stationary_counter: entity.history.stationary_counter,
            path: None,
            history_full: false,
            steal_speed: StealSpeed::Slow,
        }
    }
}

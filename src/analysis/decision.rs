// src/analysis/decision.rs
//
// Prioritized rule evaluation. Fuses the heuristic signals with the two
// sequence-model scores into one label per analyzed frame.
//
// Priority (first match wins):
//   1. cooldown after a forced alert reset  → Normal
//   2. motion anomaly + fast movement       → Pose Anomaly (Fight/Fall)
//   3. theft classifier (hands off face)    → CRIME: FAST/SLOW, or Normal when
//      pacing/fast movers miss the escalated threshold
//   4. completed head scan                  → Scanning (Suspicious)
//   5. pacing                               → Pacing
//   6. stillness counter exceeded           → Loitering (Still)
//   7. full history, low movement, small box → Suspicious Behavior / Loitering (Area)
//   8. otherwise                            → Normal

use super::signals::{PathMetrics, StealSpeed};
use crate::types::{Config, Rgb};
use std::fmt;

/// Speed (px per sample) above which a motion anomaly reads as fight/fall
const FIGHT_MIN_SPEED: f32 = 10.0;
/// Speed above which a theft alert needs the escalated confidence
const FAST_MOVER_SPEED: f32 = 10.0;
/// Below this many person-heights of path, the person is barely moving
const LOW_MOVEMENT_HEIGHTS: f32 = 2.0;
const SWAY_BOX_HEIGHTS: f32 = 0.5;
const AREA_BOX_HEIGHTS: f32 = 1.5;

// ============================================================================
// LABELS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BehaviorLabel {
    Normal,
    PoseAnomaly,
    Crime(StealSpeed),
    Scanning,
    Pacing,
    LoiteringStill,
    SuspiciousBehavior,
    LoiteringArea,
}

/// Alert severity class. Downstream consumers key off the display color,
/// so each class maps to a fixed set of colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    None,
    Low,
    Medium,
    High,
}

impl BehaviorLabel {
    pub fn is_alert(&self) -> bool {
        !matches!(self, Self::Normal)
    }

    pub fn color(&self) -> Rgb {
        match self {
            Self::Normal => Rgb::GREEN,
            Self::PoseAnomaly => Rgb::RED,
            Self::Crime(_) => Rgb::PURPLE,
            Self::Scanning | Self::SuspiciousBehavior => Rgb::MAGENTA,
            Self::Pacing => Rgb::ORANGE,
            Self::LoiteringStill | Self::LoiteringArea => Rgb::BLUE,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::Normal => Severity::None,
            Self::PoseAnomaly | Self::Crime(_) => Severity::High,
            Self::Scanning | Self::SuspiciousBehavior | Self::Pacing => Severity::Medium,
            Self::LoiteringStill | Self::LoiteringArea => Severity::Low,
        }
    }
}

impl fmt::Display for BehaviorLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => f.write_str("Normal"),
            Self::PoseAnomaly => f.write_str("Pose Anomaly (Fight/Fall)"),
            Self::Crime(speed) => write!(f, "CRIME: {}", speed.as_str()),
            Self::Scanning => f.write_str("Scanning (Suspicious)"),
            Self::Pacing => f.write_str("Pacing"),
            Self::LoiteringStill => f.write_str("Loitering (Still)"),
            Self::SuspiciousBehavior => f.write_str("Suspicious Behavior"),
            Self::LoiteringArea => f.write_str("Loitering (Area)"),
        }
    }
}

// ============================================================================
// INPUTS / OUTPUT
// ============================================================================

/// Everything the rules look at for one entity on one analyzed frame.
#[derive(Debug, Clone)]
pub struct DecisionInputs {
    pub now: f64,
    pub last_cooldown: Option<f64>,
    /// Motion-anomaly score, 0 while the pose window is incomplete
    pub motion_error: f32,
    /// Theft probability, 0 without a classifier or a full window
    pub theft_probability: f32,
    /// Displacement since the last stored centroid, px
    pub speed: f32,
    pub person_height_px: f32,
    pub hand_near_face: bool,
    pub scanning: bool,
    pub pacing: bool,
    pub stationary_counter: u32,
    /// Present once more than half of the position history is filled
    pub path: Option<PathMetrics>,
    pub history_full: bool,
    pub steal_speed: StealSpeed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub label: BehaviorLabel,
    pub debug_info: String,
}

impl Decision {
    fn plain(label: BehaviorLabel) -> Self {
        Self {
            label,
            debug_info: String::new(),
        }
    }
}

// ============================================================================
// ENGINE
// ============================================================================

#[derive(Debug, Clone)]
pub struct DecisionEngine {
    pose_threshold: f32,
    steal_threshold: f32,
    steal_threshold_escalated: f32,
    stealing_min_motion_error: f32,
    stillness_limit: u32,
    cooldown_seconds: f64,
}

impl DecisionEngine {
    pub fn new(config: &Config) -> Self {
        Self {
            pose_threshold: config.detection.pose_threshold,
            steal_threshold: config.detection.steal_threshold,
            steal_threshold_escalated: config.detection.steal_threshold_escalated,
            stealing_min_motion_error: config.detection.stealing_min_motion_error,
            stillness_limit: config.stillness_limit(),
            cooldown_seconds: config.alert.cooldown_seconds,
        }
    }

    pub fn in_cooldown(&self, now: f64, last_cooldown: Option<f64>) -> bool {
        last_cooldown.is_some_and(|t| now - t < self.cooldown_seconds)
    }

    pub fn decide(&self, inputs: &DecisionInputs) -> Decision {
        if self.in_cooldown(inputs.now, inputs.last_cooldown) {
            return Decision::plain(BehaviorLabel::Normal);
        }

        if inputs.motion_error > self.pose_threshold && inputs.speed > FIGHT_MIN_SPEED {
            return Decision::plain(BehaviorLabel::PoseAnomaly);
        }

        if self.theft_rule_matches(inputs) {
            // A match that misses the escalated threshold still ends evaluation
            let label = if self.theft_escalation_passes(inputs) {
                BehaviorLabel::Crime(inputs.steal_speed)
            } else {
                BehaviorLabel::Normal
            };
            return Decision::plain(label);
        }

        if inputs.scanning {
            return Decision::plain(BehaviorLabel::Scanning);
        }

        if inputs.pacing {
            let ratio = inputs.path.map(|p| p.pacing_ratio).unwrap_or(0.0);
            return Decision {
                label: BehaviorLabel::Pacing,
                debug_info: format!("R:{:.1}", ratio),
            };
        }

        if super::signals::stillness_exceeded(inputs.stationary_counter, self.stillness_limit) {
            return Decision::plain(BehaviorLabel::LoiteringStill);
        }

        if inputs.history_full {
            if let Some(path) = inputs.path {
                if let Some(label) = classify_area(&path, inputs.person_height_px) {
                    return Decision::plain(label);
                }
            }
        }

        Decision::plain(BehaviorLabel::Normal)
    }

    /// Theft needs a confident classifier, some motion anomaly and hands away
    /// from the face.
    fn theft_rule_matches(&self, inputs: &DecisionInputs) -> bool {
        inputs.theft_probability > self.steal_threshold
            && inputs.motion_error > self.stealing_min_motion_error
            && !inputs.hand_near_face
    }

    /// Pacing or fast-moving people need extra confidence.
    fn theft_escalation_passes(&self, inputs: &DecisionInputs) -> bool {
        let required = if inputs.pacing || inputs.speed > FAST_MOVER_SPEED {
            self.steal_threshold_escalated
        } else {
            self.steal_threshold
        };
        inputs.theft_probability > required
    }
}

/// Swaying in place vs. hanging around a small area, for someone who has
/// covered little ground over the full history window.
fn classify_area(path: &PathMetrics, person_height_px: f32) -> Option<BehaviorLabel> {
    if path.path_length >= person_height_px * LOW_MOVEMENT_HEIGHTS {
        return None;
    }
    let sway = person_height_px * SWAY_BOX_HEIGHTS;
    let area = person_height_px * AREA_BOX_HEIGHTS;

    if path.box_width < sway && path.box_height < sway {
        Some(BehaviorLabel::SuspiciousBehavior)
    } else if path.box_width < area && path.box_height < area {
        Some(BehaviorLabel::LoiteringArea)
    } else {
        None
    }
}

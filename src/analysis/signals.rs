// src/analysis/signals.rs
//
// Pure signal extractors. Each one reads the current keypoints and/or an
// entity's rolling history and returns a plain value for the decision
// engine. Degenerate geometry short-circuits to a non-triggering result.

use super::keypoints::{LEFT_SHOULDER, LEFT_WRIST, NOSE, RIGHT_SHOULDER, RIGHT_WRIST};
use crate::history::{GazeDirection, RingBuffer, JITTER_PX};
use crate::types::Keypoints;

// ============================================================================
// HEAD SCAN
// ============================================================================

/// Shoulder spans narrower than this (normalized) give no usable gaze ratio
const MIN_SHOULDER_WIDTH: f32 = 0.01;
const GAZE_LEFT_RATIO: f32 = 0.15;
const GAZE_RIGHT_RATIO: f32 = 0.85;

/// Where the nose sits between the shoulders: 0.0 = left shoulder, 1.0 = right.
pub fn classify_gaze(kp: &Keypoints) -> Option<GazeDirection> {
    let nose = kp.get(NOSE)?;
    let left = kp.get(LEFT_SHOULDER)?;
    let right = kp.get(RIGHT_SHOULDER)?;

    let shoulder_width = (right[0] - left[0]).abs();
    if shoulder_width < MIN_SHOULDER_WIDTH {
        return None;
    }

    let ratio = (nose[0] - left[0]) / shoulder_width;
    Some(if ratio < GAZE_LEFT_RATIO {
        GazeDirection::Left
    } else if ratio > GAZE_RIGHT_RATIO {
        GazeDirection::Right
    } else {
        GazeDirection::Center
    })
}

/// A scan is complete once both extremes appear inside the gaze window.
pub fn head_scan_completed(gaze: &RingBuffer<GazeDirection>) -> bool {
    gaze.contains(&GazeDirection::Left) && gaze.contains(&GazeDirection::Right)
}

// ============================================================================
// HAND NEAR FACE
// ============================================================================

const HAND_FACE_RATIO: f32 = 0.15;

/// Either wrist close to the nose, relative to body height. Used to veto
/// stealing alerts caused by eating, phone calls or face touching.
pub fn hand_near_face(kp: &Keypoints, person_height_px: f32) -> bool {
    let Some(nose) = kp.get(NOSE) else {
        return false;
    };
    let threshold = person_height_px * HAND_FACE_RATIO;

    [LEFT_WRIST, RIGHT_WRIST]
        .iter()
        .filter_map(|&i| kp.get(i))
        .any(|w| (w[0] - nose[0]).hypot(w[1] - nose[1]) * person_height_px < threshold)
}

// ============================================================================
// PATH GEOMETRY / PACING
// ============================================================================

/// Pacing needs this many person-heights of travelled path
const PACING_DISTANCE_HEIGHTS: f32 = 5.0;
const PACING_MIN_RATIO: f32 = 1.5;
const PACING_MIN_SPEED: f32 = 2.0;

/// Geometry of the stored centroid trail.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PathMetrics {
    /// Sum of steps longer than the jitter threshold
    pub path_length: f32,
    pub box_width: f32,
    pub box_height: f32,
    pub diagonal: f32,
    /// path_length / diagonal, 0 when the box is degenerate
    pub pacing_ratio: f32,
}

impl PathMetrics {
    pub fn from_positions(positions: &RingBuffer<(f32, f32)>) -> Self {
        let Some(&(x0, y0)) = positions.first() else {
            return Self::default();
        };

        let (mut min_x, mut max_x, mut min_y, mut max_y) = (x0, x0, y0, y0);
        let mut path_length = 0.0;
        let mut prev = (x0, y0);

        for &(x, y) in positions.iter().skip(1) {
            min_x = min_x.min(x);
            max_x = max_x.max(x);
            min_y = min_y.min(y);
            max_y = max_y.max(y);

            let step = (x - prev.0).hypot(y - prev.1);
            if step > JITTER_PX {
                path_length += step;
            }
            prev = (x, y);
        }

        let box_width = max_x - min_x;
        let box_height = max_y - min_y;
        let diagonal = box_width.hypot(box_height);
        let pacing_ratio = if diagonal > 0.0 {
            path_length / diagonal
        } else {
            0.0
        };

        Self {
            path_length,
            box_width,
            box_height,
            diagonal,
            pacing_ratio,
        }
    }
}

/// Path metrics are only meaningful once more than half the history is filled.
pub fn path_metrics_available(positions: &RingBuffer<(f32, f32)>) -> bool {
    positions.len() > positions.capacity() / 2
}

/// Back-and-forth motion: much more ground covered than the bounding box of
/// the trail explains, while still moving right now.
pub fn is_pacing(metrics: &PathMetrics, person_height_px: f32, speed: f32) -> bool {
    metrics.path_length > person_height_px * PACING_DISTANCE_HEIGHTS
        && metrics.pacing_ratio > PACING_MIN_RATIO
        && speed > PACING_MIN_SPEED
}

// ============================================================================
// STILLNESS
// ============================================================================

pub fn stillness_exceeded(stationary_counter: u32, stillness_limit: u32) -> bool {
    stationary_counter > stillness_limit
}

// ============================================================================
// STEALING SPEED
// ============================================================================

const STEAL_SPEED_WINDOW: usize = 15;
const STEAL_SPEED_MIN_SAMPLES: usize = 5;
/// Wrist step above this fraction of body height counts as a snatch
const SNATCH_HEIGHT_RATIO: f32 = 0.10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StealSpeed {
    Fast,
    Slow,
}

impl StealSpeed {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fast => "FAST (SNATCH)",
            Self::Slow => "SLOW (PICK)",
        }
    }
}

/// Fastest single-step wrist movement over the recent pose samples.
/// Too few samples yields the conservative `Slow`.
pub fn estimate_steal_speed(
    poses: &[Keypoints],
    frame_width: usize,
    frame_height: usize,
    person_height_px: f32,
) -> StealSpeed {
    if poses.len() < STEAL_SPEED_MIN_SAMPLES {
        return StealSpeed::Slow;
    }

    let recent = &poses[poses.len().saturating_sub(STEAL_SPEED_WINDOW)..];
    let (w, h) = (frame_width as f32, frame_height as f32);

    let max_step = recent
        .windows(2)
        .flat_map(|pair| {
            [LEFT_WRIST, RIGHT_WRIST].into_iter().filter_map(move |i| {
                let prev = pair[0].get(i)?;
                let curr = pair[1].get(i)?;
                Some(((curr[0] - prev[0]) * w).hypot((curr[1] - prev[1]) * h))
            })
        })
        .fold(0.0f32, f32::max);

    if max_step > person_height_px * SNATCH_HEIGHT_RATIO {
        StealSpeed::Fast
    } else {
        StealSpeed::Slow
    }
}

#[cfg(test)]
mod tests {
    use super::super::keypoints::fixtures::{looking, standing};
    use super::*;

    fn gaze_ring(samples: &[GazeDirection], cap: usize) -> RingBuffer<GazeDirection> {
        let mut ring = RingBuffer::new(cap);
        for s in samples {
            ring.push(*s);
        }
        ring
    }

    #[test]
    fn test_gaze_classification_thresholds() {
        assert_eq!(classify_gaze(&looking(0.5, 0.05)), Some(GazeDirection::Left));
        assert_eq!(classify_gaze(&looking(0.5, 0.5)), Some(GazeDirection::Center));
        assert_eq!(classify_gaze(&looking(0.5, 0.95)), Some(GazeDirection::Right));
    }

    #[test]
    fn test_gaze_degenerate_shoulders() {
        let mut kp = standing(0.5);
        kp.0[RIGHT_SHOULDER][0] = kp.0[LEFT_SHOULDER][0] + 0.001;
        assert_eq!(classify_gaze(&kp), None);
        assert_eq!(classify_gaze(&Keypoints(vec![[0.5, 0.5]; 3])), None);
    }

    #[test]
    fn test_head_scan_needs_both_sides() {
        use GazeDirection::*;
        assert!(!head_scan_completed(&gaze_ring(&[Left, Center, Left], 10)));
        assert!(head_scan_completed(&gaze_ring(&[Left, Center, Right], 10)));
        // LEFT has already aged out of a 2-sample window
        assert!(!head_scan_completed(&gaze_ring(&[Left, Center, Right], 2)));
    }

    #[test]
    fn test_hand_near_face() {
        let mut kp = standing(0.5);
        assert!(!hand_near_face(&kp, 216.0));
        kp.0[RIGHT_WRIST] = [0.52, 0.22];
        assert!(hand_near_face(&kp, 216.0));
    }

    #[test]
    fn test_path_metrics_back_and_forth() {
        let mut ring = RingBuffer::new(20);
        for i in 0..20 {
            let x = if i % 2 == 0 { 100.0 } else { 150.0 };
            ring.push((x, 200.0));
        }
        let m = PathMetrics::from_positions(&ring);
        assert_eq!(m.path_length, 950.0);
        assert_eq!(m.box_width, 50.0);
        assert_eq!(m.box_height, 0.0);
        assert_eq!(m.pacing_ratio, 19.0);
        assert!(is_pacing(&m, 100.0, 50.0));
        assert!(!is_pacing(&m, 100.0, 1.0));
    }

    #[test]
    fn test_path_metrics_straight_walk_is_not_pacing() {
        let mut ring = RingBuffer::new(20);
        for i in 0..20 {
            ring.push((i as f32 * 40.0, 100.0));
        }
        let m = PathMetrics::from_positions(&ring);
        assert!((m.pacing_ratio - 1.0).abs() < 1e-4);
        assert!(!is_pacing(&m, 100.0, 40.0));
    }

    #[test]
    fn test_path_metrics_degenerate_box() {
        let mut ring = RingBuffer::new(4);
        ring.push((10.0, 10.0));
        ring.push((10.0, 10.0));
        let m = PathMetrics::from_positions(&ring);
        assert_eq!(m.diagonal, 0.0);
        assert_eq!(m.pacing_ratio, 0.0);
        assert_eq!(PathMetrics::from_positions(&RingBuffer::new(4)), PathMetrics::default());
    }

    #[test]
    fn test_path_metrics_availability_is_strictly_over_half() {
        let mut ring = RingBuffer::new(10);
        for i in 0..5 {
            ring.push((i as f32, 0.0));
        }
        assert!(!path_metrics_available(&ring));
        ring.push((9.0, 0.0));
        assert!(path_metrics_available(&ring));
    }

    #[test]
    fn test_stillness_is_strictly_greater() {
        assert!(!stillness_exceeded(60, 60));
        assert!(stillness_exceeded(61, 60));
    }

    #[test]
    fn test_steal_speed_needs_samples() {
        let poses = vec![standing(0.5); 4];
        assert_eq!(estimate_steal_speed(&poses, 640, 360, 216.0), StealSpeed::Slow);
    }

    #[test]
    fn test_steal_speed_fast_wrist() {
        let mut poses = vec![standing(0.5); 10];
        // 0.1 * 640 = 64 px jump, threshold is 21.6 px
        poses[9].0[LEFT_WRIST][0] += 0.1;
        assert_eq!(estimate_steal_speed(&poses, 640, 360, 216.0), StealSpeed::Fast);
    }

    #[test]
    fn test_steal_speed_only_recent_window_counts() {
        let mut poses = vec![standing(0.5); 30];
        poses[2].0[RIGHT_WRIST][0] += 0.2;
        assert_eq!(estimate_steal_speed(&poses, 640, 360, 216.0), StealSpeed::Slow);
    }
}

// src/history/mod.rs
//
// Rolling per-entity history: centroid positions, gaze samples and the
// raw pose window fed to the sequence scorers.

pub mod ring_buffer;

pub use ring_buffer::RingBuffer;

use crate::types::Keypoints;

/// Steps at or below this many pixels are treated as tracker jitter
pub const JITTER_PX: f32 = 2.0;
/// Displacement below this counts as standing still
pub const STILLNESS_PX: f32 = 5.0;
/// Fixed length of the pose sequence consumed by the scorers
pub const POSE_WINDOW: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GazeDirection {
    Left,
    Right,
    Center,
}

#[derive(Debug)]
pub struct EntityHistory {
    /// Centroids in frame pixels, jitter steps dropped
    pub positions: RingBuffer<(f32, f32)>,
    pub gaze: RingBuffer<GazeDirection>,
    pub poses: RingBuffer<Keypoints>,
    /// Consecutive samples with displacement under `STILLNESS_PX`
    pub stationary_counter: u32,
}

impl EntityHistory {
    pub fn new(history_len: usize, scan_len: usize) -> Self {
        Self {
            positions: RingBuffer::new(history_len),
            gaze: RingBuffer::new(scan_len),
            poses: RingBuffer::new(POSE_WINDOW),
            stationary_counter: 0,
        }
    }

    /// Record a centroid and return the raw displacement from the last
    /// stored position (0 when there is none).
    ///
    /// Jitter-sized moves are not stored so the pacing box is not inflated,
    /// but the raw displacement still drives the stillness counter.
    pub fn record_position(&mut self, centroid: (f32, f32)) -> f32 {
        let Some(&(lx, ly)) = self.positions.last() else {
            self.positions.push(centroid);
            return 0.0;
        };

        let displacement = (centroid.0 - lx).hypot(centroid.1 - ly);
        if displacement > JITTER_PX {
            self.positions.push(centroid);
        }

        if displacement < STILLNESS_PX {
            self.stationary_counter += 1;
        } else {
            self.stationary_counter = 0;
        }
        displacement
    }

    pub fn record_gaze(&mut self, sample: GazeDirection) {
        self.gaze.push(sample);
    }

    /// Push a pose frame; the window only ever holds the latest `POSE_WINDOW`.
    pub fn record_pose(&mut self, keypoints: Keypoints) {
        self.poses.push(keypoints);
    }

    pub fn pose_window_ready(&self) -> bool {
        self.poses.len() == POSE_WINDOW
    }

    pub fn pose_window(&self) -> Vec<Keypoints> {
        self.poses.to_vec()
    }

    /// Full behavioral reset after a forced alert timeout. The pose window is
    /// kept: it describes body motion, not where the person has been.
    pub fn reset_behavior(&mut self) {
        self.positions.clear();
        self.gaze.clear();
        self.stationary_counter = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_position_has_zero_displacement() {
        let mut h = EntityHistory::new(10, 4);
        assert_eq!(h.record_position((100.0, 100.0)), 0.0);
        assert_eq!(h.positions.len(), 1);
        assert_eq!(h.stationary_counter, 0);
    }

    #[test]
    fn test_jitter_not_stored_but_counts_as_still() {
        let mut h = EntityHistory::new(10, 4);
        h.record_position((100.0, 100.0));
        let d = h.record_position((101.0, 101.0));
        assert!(d < JITTER_PX);
        assert_eq!(h.positions.len(), 1);
        assert_eq!(h.stationary_counter, 1);
    }

    #[test]
    fn test_small_move_stored_and_still() {
        let mut h = EntityHistory::new(10, 4);
        h.record_position((100.0, 100.0));
        let d = h.record_position((103.0, 100.0));
        assert_eq!(d, 3.0);
        assert_eq!(h.positions.len(), 2);
        assert_eq!(h.stationary_counter, 1);
    }

    #[test]
    fn test_large_move_resets_stillness() {
        let mut h = EntityHistory::new(10, 4);
        h.record_position((100.0, 100.0));
        h.record_position((100.0, 101.0));
        h.record_position((100.0, 102.0));
        assert_eq!(h.stationary_counter, 2);
        h.record_position((120.0, 100.0));
        assert_eq!(h.stationary_counter, 0);
    }

    #[test]
    fn test_displacement_measured_from_last_stored_position() {
        let mut h = EntityHistory::new(10, 4);
        h.record_position((100.0, 100.0));
        h.record_position((101.5, 100.0));
        // Second sample was jitter, so this is measured from (100, 100)
        let d = h.record_position((103.0, 100.0));
        assert_eq!(d, 3.0);
    }

    #[test]
    fn test_pose_window_ready_only_when_full() {
        let mut h = EntityHistory::new(10, 4);
        for _ in 0..POSE_WINDOW - 1 {
            h.record_pose(Keypoints::default());
        }
        assert!(!h.pose_window_ready());
        h.record_pose(Keypoints::default());
        assert!(h.pose_window_ready());
        h.record_pose(Keypoints::default());
        assert!(h.pose_window_ready());
        assert_eq!(h.pose_window().len(), POSE_WINDOW);
    }

    #[test]
    fn test_reset_behavior_clears_spatial_history() {
        let mut h = EntityHistory::new(10, 4);
        h.record_position((0.0, 0.0));
        h.record_position((1.0, 0.0));
        h.record_gaze(GazeDirection::Left);
        h.record_pose(Keypoints::default());
        h.reset_behavior();
        assert!(h.positions.is_empty());
        assert!(h.gaze.is_empty());
        assert_eq!(h.stationary_counter, 0);
        assert_eq!(h.poses.len(), 1);
    }
}

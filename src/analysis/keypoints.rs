// src/analysis/keypoints.rs
//
// COCO-17 keypoint indices and the body geometry derived from them.

use crate::types::Keypoints;

pub const NOSE: usize = 0;
pub const LEFT_SHOULDER: usize = 5;
pub const RIGHT_SHOULDER: usize = 6;
pub const LEFT_WRIST: usize = 9;
pub const RIGHT_WRIST: usize = 10;
pub const LEFT_ANKLE: usize = 15;
pub const RIGHT_ANKLE: usize = 16;

/// Lower bound on the estimated person height in pixels
pub const MIN_PERSON_HEIGHT_PX: f32 = 100.0;

/// Mean of all keypoints, in frame pixels (truncated to whole pixels).
/// `None` when the tracker produced no keypoints.
pub fn centroid_px(kp: &Keypoints, frame_width: usize, frame_height: usize) -> Option<(f32, f32)> {
    if kp.is_empty() {
        return None;
    }
    let n = kp.len() as f32;
    let (sx, sy) = kp.0.iter().fold((0.0f32, 0.0f32), |(ax, ay), p| (ax + p[0], ay + p[1]));
    let cx = (sx / n * frame_width as f32).floor();
    let cy = (sy / n * frame_height as f32).floor();
    Some((cx, cy))
}

/// Nose-to-feet height in pixels, floored so thresholds derived from it
/// never collapse when the body is foreshortened or partly out of frame.
pub fn person_height_px(kp: &Keypoints, frame_height: usize) -> f32 {
    let Some(nose) = kp.get(NOSE) else {
        return MIN_PERSON_HEIGHT_PX;
    };
    let feet_y = match (kp.get(LEFT_ANKLE), kp.get(RIGHT_ANKLE)) {
        (Some(l), Some(r)) => l[1].max(r[1]),
        (Some(a), None) | (None, Some(a)) => a[1],
        (None, None) => return MIN_PERSON_HEIGHT_PX,
    };
    ((feet_y - nose[1]).abs() * frame_height as f32).max(MIN_PERSON_HEIGHT_PX)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// Upright person: nose at (x, 0.2), shoulders 0.1 apart, ankles at 0.8.
    pub fn standing(x: f32) -> Keypoints {
        let mut points = vec![[x, 0.5]; 17];
        points[NOSE] = [x, 0.2];
        points[LEFT_SHOULDER] = [x - 0.05, 0.3];
        points[RIGHT_SHOULDER] = [x + 0.05, 0.3];
        points[LEFT_WRIST] = [x - 0.06, 0.5];
        points[RIGHT_WRIST] = [x + 0.06, 0.5];
        points[LEFT_ANKLE] = [x - 0.03, 0.8];
        points[RIGHT_ANKLE] = [x + 0.03, 0.8];
        Keypoints(points)
    }

    /// Same pose with the nose shifted so it sits at `ratio` across the shoulders.
    pub fn looking(x: f32, ratio: f32) -> Keypoints {
        let mut kp = standing(x);
        let left = kp.0[LEFT_SHOULDER][0];
        let right = kp.0[RIGHT_SHOULDER][0];
        kp.0[NOSE][0] = left + ratio * (right - left);
        kp
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_centroid_scales_to_pixels() {
        let kp = Keypoints(vec![[0.25, 0.5], [0.75, 0.5]]);
        assert_eq!(centroid_px(&kp, 640, 360), Some((320.0, 180.0)));
    }

    #[test]
    fn test_centroid_empty_is_none() {
        assert_eq!(centroid_px(&Keypoints::default(), 640, 360), None);
    }

    #[test]
    fn test_person_height_from_nose_to_lowest_ankle() {
        let kp = standing(0.5);
        let h = person_height_px(&kp, 360);
        assert!((h - 216.0).abs() < 0.01);
    }

    #[test]
    fn test_person_height_floor() {
        let mut kp = standing(0.5);
        kp.0[LEFT_ANKLE][1] = 0.25;
        kp.0[RIGHT_ANKLE][1] = 0.25;
        assert_eq!(person_height_px(&kp, 360), MIN_PERSON_HEIGHT_PX);
        assert_eq!(person_height_px(&Keypoints::default(), 360), MIN_PERSON_HEIGHT_PX);
    }
}

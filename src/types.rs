// src/types.rs

use serde::{Deserialize, Serialize};
use std::sync::Arc;

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub camera: CameraConfig,
    pub models: ModelConfig,
    pub detection: DetectionConfig,
    pub behavior: BehaviorConfig,
    pub alert: AlertConfig,
    pub tracking: TrackingConfig,
    pub clip: ClipConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Name written into every alert log entry and clip file name
    pub name: String,
    /// RTSP URL or file path opened by the live source
    pub source: String,
    /// Frames are resized to this size before tracking and analysis
    pub frame_width: usize,
    pub frame_height: usize,
    /// Delay before reopening a failed stream
    pub reconnect_delay_ms: u64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            name: "Tapo_TC200C".to_string(),
            source: "rtsp://127.0.0.1:554/stream1".to_string(),
            frame_width: 640,
            frame_height: 360,
            reconnect_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Pose autoencoder (ONNX). Required for fight/fall detection.
    pub anomaly_model_path: Option<String>,
    /// Theft classifier (ONNX). Optional; stealing detection is disabled without it.
    pub stealing_model_path: Option<String>,
    pub num_threads: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            anomaly_model_path: Some("anomaly_detector.onnx".to_string()),
            stealing_model_path: Some("stealing_classifier.onnx".to_string()),
            num_threads: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Motion-anomaly score above which fight/fall is considered
    pub pose_threshold: f32,
    /// Theft classifier probability required for a stealing alert
    pub steal_threshold: f32,
    /// Escalated theft probability when the person is pacing or moving fast
    pub steal_threshold_escalated: f32,
    /// Stealing also needs at least this much motion-anomaly score
    pub stealing_min_motion_error: f32,
    /// Analysis runs on every Nth frame
    pub logic_skip: u64,
    /// Expected source frame rate, used to convert seconds into sample counts
    pub fps: u32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            pose_threshold: 0.25,
            steal_threshold: 0.85,
            steal_threshold_escalated: 0.90,
            stealing_min_motion_error: 0.08,
            logic_skip: 3,
            fps: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    pub history_seconds: u32,
    pub scan_window_seconds: u32,
    pub stillness_seconds: u32,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            history_seconds: 30,
            scan_window_seconds: 4,
            stillness_seconds: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Longest time an alert episode may stay active before a forced reset
    pub max_duration_seconds: f64,
    /// Suppression window after a forced reset
    pub cooldown_seconds: f64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            max_duration_seconds: 10.0,
            cooldown_seconds: 30.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Entities unseen for this long are evicted. 0 disables eviction.
    pub entity_ttl_seconds: f64,
    pub sweep_interval_frames: u64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            entity_ttl_seconds: 60.0,
            sweep_interval_frames: 150,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipConfig {
    pub output_dir: String,
    pub log_file: String,
    /// Rolling frame buffer size (frames snapshotted into each clip)
    pub buffer_frames: usize,
    pub fps: u32,
    pub max_concurrent_encodes: usize,
    pub queue_capacity: usize,
    pub jpeg_quality: u8,
}

impl Default for ClipConfig {
    fn default() -> Self {
        Self {
            output_dir: "ai_model/detections".to_string(),
            log_file: "ai_model/detections_log.json".to_string(),
            buffer_frames: 150,
            fps: 15,
            max_concurrent_encodes: 2,
            queue_capacity: 16,
            jpeg_quality: 85,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "anomaly_watch=info".to_string(),
        }
    }
}

// ============================================================================
// FRAMES AND OBSERVATIONS
// ============================================================================

/// Raw RGB frame. Shared as `Arc<Frame>` once acquired and never mutated.
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: usize,
    pub height: usize,
    pub index: u64,
    pub timestamp: f64,
}

impl Frame {
    /// Frame with geometry only, used when replaying tracker output without video.
    pub fn blank(width: usize, height: usize, index: u64, timestamp: f64) -> Self {
        Self {
            data: Vec::new(),
            width,
            height,
            index,
            timestamp,
        }
    }

    pub fn has_pixels(&self) -> bool {
        self.data.len() >= self.width * self.height * 3
    }
}

pub type SharedFrame = Arc<Frame>;

/// Normalized (0..1) keypoints of one person in one frame, COCO-17 order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Keypoints(pub Vec<[f32; 2]>);

impl Keypoints {
    pub fn get(&self, index: usize) -> Option<[f32; 2]> {
        self.0.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Flattened `[x0, y0, x1, y1, ...]` layout expected by the sequence models
    pub fn flatten_into(&self, out: &mut Vec<f32>) {
        for p in &self.0 {
            out.push(p[0]);
            out.push(p[1]);
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

/// One tracked person in one frame, as produced by the pose tracker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub id: u32,
    pub bbox: BoundingBox,
    pub keypoints: Keypoints,
}

/// Display color in RGB order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const GREEN: Rgb = Rgb(0, 255, 0);
    pub const RED: Rgb = Rgb(255, 0, 0);
    pub const PURPLE: Rgb = Rgb(128, 0, 128);
    pub const MAGENTA: Rgb = Rgb(255, 0, 255);
    pub const ORANGE: Rgb = Rgb(255, 165, 0);
    pub const BLUE: Rgb = Rgb(0, 0, 255);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults_from_empty_yaml() {
        let config: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.detection.fps, 15);
        assert_eq!(config.detection.logic_skip, 3);
        assert_eq!(config.alert.cooldown_seconds, 30.0);
        assert_eq!(config.clip.buffer_frames, 150);
    }

    #[test]
    fn test_partial_yaml_keeps_other_defaults() {
        let yaml = "detection:\n  pose_threshold: 0.4\ncamera:\n  name: lobby\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.detection.pose_threshold, 0.4);
        assert_eq!(config.detection.steal_threshold, 0.85);
        assert_eq!(config.camera.name, "lobby");
        assert_eq!(config.camera.frame_width, 640);
    }

    #[test]
    fn test_keypoints_flatten_order() {
        let kp = Keypoints(vec![[0.1, 0.2], [0.3, 0.4]]);
        let mut out = Vec::new();
        kp.flatten_into(&mut out);
        assert_eq!(out, vec![0.1, 0.2, 0.3, 0.4]);
    }
}

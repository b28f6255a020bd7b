// src/config.rs

use crate::types::Config;
use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;
use tracing::info;

/// Environment variable that overrides `camera.source`
pub const SOURCE_ENV_VAR: &str = "ANOMALY_WATCH_SOURCE";
/// Upper bound on any per-entity window, in samples
pub const MAX_WINDOW_SAMPLES: u32 = 100_000;

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: Config = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup`. Returns whether any applied.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> bool {
        match lookup(SOURCE_ENV_VAR) {
            Some(source) => {
                info!("Camera source overridden by {}", SOURCE_ENV_VAR);
                self.camera.source = source;
                true
            }
            None => false,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let d = &self.detection;
        if d.fps == 0 {
            bail!("detection.fps must be positive");
        }
        if d.logic_skip == 0 {
            bail!("detection.logic_skip must be positive");
        }
        for (name, value) in [
            ("detection.steal_threshold", d.steal_threshold),
            ("detection.steal_threshold_escalated", d.steal_threshold_escalated),
        ] {
            if !(0.0..=1.0).contains(&value) {
                bail!("{} must be within [0, 1], got {}", name, value);
            }
        }
        if d.pose_threshold < 0.0 || d.stealing_min_motion_error < 0.0 {
            bail!("motion error thresholds must be non-negative");
        }

        let b = &self.behavior;
        if b.history_seconds == 0 || b.scan_window_seconds == 0 || b.stillness_seconds == 0 {
            bail!("behavior windows must be at least one second");
        }
        for (name, seconds) in [
            ("behavior.history_seconds", b.history_seconds),
            ("behavior.scan_window_seconds", b.scan_window_seconds),
            ("behavior.stillness_seconds", b.stillness_seconds),
        ] {
            match seconds.checked_mul(d.fps) {
                Some(samples) if samples <= MAX_WINDOW_SAMPLES => {}
                _ => bail!(
                    "{} at {} fps exceeds {} samples",
                    name,
                    d.fps,
                    MAX_WINDOW_SAMPLES
                ),
            }
        }

        if self.alert.max_duration_seconds <= 0.0 {
            bail!("alert.max_duration_seconds must be positive");
        }
        if self.alert.cooldown_seconds < 0.0 {
            bail!("alert.cooldown_seconds must be non-negative");
        }
        if self.tracking.entity_ttl_seconds < 0.0 {
            bail!("tracking.entity_ttl_seconds must be non-negative");
        }

        let c = &self.clip;
        if c.buffer_frames == 0 || c.fps == 0 {
            bail!("clip.buffer_frames and clip.fps must be positive");
        }
        if c.max_concurrent_encodes == 0 || c.queue_capacity == 0 {
            bail!("clip worker pool needs at least one worker and one queue slot");
        }
        if self.camera.frame_width == 0 || self.camera.frame_height == 0 {
            bail!("camera frame size must be positive");
        }
        Ok(())
    }

    /// Position history capacity in samples
    pub fn history_len(&self) -> usize {
        self.behavior.history_seconds.saturating_mul(self.detection.fps) as usize
    }

    /// Gaze history capacity in samples
    pub fn scan_len(&self) -> usize {
        self.behavior.scan_window_seconds.saturating_mul(self.detection.fps) as usize
    }

    /// Consecutive still samples before "Loitering (Still)"
    pub fn stillness_limit(&self) -> u32 {
        self.behavior.stillness_seconds.saturating_mul(self.detection.fps)
    }
}

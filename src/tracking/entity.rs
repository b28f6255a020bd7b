// src/tracking/entity.rs

use crate::analysis::{AlertState, BehaviorLabel};
use crate::history::EntityHistory;
use crate::types::{BoundingBox, Rgb};
use serde::Serialize;

/// Per-track state, created on first sighting of a tracker id.
#[derive(Debug)]
pub struct TrackedEntity {
    pub id: u32,
    pub history: EntityHistory,
    pub alert: AlertState,
    pub current_label: BehaviorLabel,
    pub debug_info: String,
    /// Raw displacement recorded on the latest frame
    pub last_speed: f32,
    pub last_bbox: BoundingBox,
    pub first_seen: f64,
    pub last_seen: f64,
}

impl TrackedEntity {
    pub fn new(id: u32, history_len: usize, scan_len: usize, now: f64) -> Self {
        Self {
            id,
            history: EntityHistory::new(history_len, scan_len),
            alert: AlertState::default(),
            current_label: BehaviorLabel::Normal,
            debug_info: String::new(),
            last_speed: 0.0,
            last_bbox: BoundingBox::default(),
            first_seen: now,
            last_seen: now,
        }
    }

    pub fn current_color(&self) -> Rgb {
        self.current_label.color()
    }

    pub fn view(&self) -> EntityView {
        EntityView {
            id: self.id,
            label: self.current_label.to_string(),
            color: self.current_color(),
            debug_info: self.debug_info.clone(),
            bbox: self.last_bbox,
            alert_active: self.alert.is_active(),
        }
    }
}

/// What the drawing layer needs for one person on one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityView {
    pub id: u32,
    pub label: String,
    pub color: Rgb,
    pub debug_info: String,
    pub bbox: BoundingBox,
    pub alert_active: bool,
}

impl EntityView {
    /// Overlay text in the form "ID 7: Pacing R:2.4"
    pub fn caption(&self) -> String {
        if self.debug_info.is_empty() {
            format!("ID {}: {}", self.id, self.label)
        } else {
            format!("ID {}: {} {}", self.id, self.label, self.debug_info)
        }
    }
}

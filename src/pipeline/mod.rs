// src/pipeline/mod.rs

pub mod analyzer;
pub mod event_bus;
pub mod frame_buffer;
pub mod metrics;

pub use analyzer::BehaviorAnalyzer;
pub use event_bus::{AlertEvent, EventBus};
pub use frame_buffer::RollingFrameBuffer;
pub use metrics::{MetricsSummary, PipelineMetrics};

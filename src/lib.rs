// src/lib.rs
//
// Per-person behavioral anomaly detection over pose-tracking output:
// rolling histories, rule-based classification, alert episodes with
// cooldown, and best-effort clip capture.

pub mod analysis;
pub mod clock;
pub mod config;
pub mod history;
pub mod persistence;
pub mod pipeline;
pub mod replay;
pub mod scoring;
pub mod source;
pub mod tracking;
pub mod types;

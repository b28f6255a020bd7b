// src/analysis/mod.rs
//
// Behavior analysis for one tracked person.
//
// Signal flow per analyzed frame:
//   keypoints + history → signals ─┐
//   pose window → scorers ─────────┼→ decision → lifecycle → label / clip request
//   cooldown stamp ────────────────┘

pub mod decision;
pub mod keypoints;
pub mod lifecycle;
pub mod signals;

pub use decision::{BehaviorLabel, Decision, DecisionEngine, DecisionInputs, Severity};
pub use lifecycle::{AlertLifecycle, AlertState, Transition};
pub use signals::{PathMetrics, StealSpeed};

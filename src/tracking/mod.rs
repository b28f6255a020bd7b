// src/tracking/mod.rs

pub mod entity;
pub mod table;

pub use entity::{EntityView, TrackedEntity};
pub use table::EntityTable;

//! Batched rendering

pub mod batch;

pub use batch::{BatchStats, RenderBatch};

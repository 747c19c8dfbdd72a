//! Model training
//!
//! Training loop, checkpointing, and metrics tracking.

pub mod checkpoint;
pub mod metrics;
pub mod trainer;

pub use checkpoint::CheckpointMeta;
pub use metrics::{Metrics, TrainingHistory};
pub use trainer::DiffusionTrainer;

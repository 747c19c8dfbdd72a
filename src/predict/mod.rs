//! Prediction and inference
//!
//! Reverse sampling and forecast orchestration.

pub mod inference;
pub mod sampler;
pub mod summary;

pub use inference::Predictor;

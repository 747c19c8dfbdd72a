//! Transforms and conditioning features
//!
//! Maps raw batting lines into model space and back.

pub mod condition;
pub mod scaler;
pub mod transform;

pub use condition::{condition_vector, select_conditioning_season, target_delta};
pub use scaler::Scaler;

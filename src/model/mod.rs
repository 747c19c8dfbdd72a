//! The diffusion model
//!
//! Noise schedule, timestep embedding, and the conditional noise-prediction
//! network shared by training and sampling.

pub mod denoiser;
pub mod schedule;
pub mod time_embed;

pub use denoiser::{Denoiser, DenoiserConfig, NoisePredictor};
pub use schedule::NoiseSchedule;

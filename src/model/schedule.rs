//! Fixed diffusion noise schedule
//!
//! A linear variance schedule over a fixed number of steps, with every
//! derived coefficient precomputed once. Training and sampling must index
//! this table identically by integer timestep - the forward and reverse
//! processes diverge otherwise - so the schedule is built explicitly at
//! startup and shared by reference, never recomputed or mutated.

use crate::DiffusionConfig;
use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor};

/// Precomputed per-step diffusion coefficients
#[derive(Debug, Clone)]
pub struct NoiseSchedule {
    steps: usize,
    betas: Vec<f64>,
    alphas: Vec<f64>,
    alpha_bar: Vec<f64>,
    sqrt_alpha_bar: Vec<f64>,
    sqrt_one_minus_alpha_bar: Vec<f64>,
    sqrt_recip_alphas: Vec<f64>,
    posterior_variance: Vec<f64>,
}

impl NoiseSchedule {
    /// Build a linear schedule: beta interpolated from `beta_start` to
    /// `beta_end` over `steps` timesteps.
    pub fn linear(steps: usize, beta_start: f64, beta_end: f64) -> Self {
        assert!(steps > 0, "schedule needs at least one step");

        let denom = (steps - 1).max(1) as f64;
        let betas: Vec<f64> = (0..steps)
            .map(|i| beta_start + (beta_end - beta_start) * i as f64 / denom)
            .collect();

        let alphas: Vec<f64> = betas.iter().map(|b| 1.0 - b).collect();

        let mut alpha_bar = Vec::with_capacity(steps);
        let mut prod = 1.0;
        for a in &alphas {
            prod *= a;
            alpha_bar.push(prod);
        }

        let sqrt_alpha_bar: Vec<f64> = alpha_bar.iter().map(|ab| ab.sqrt()).collect();
        let sqrt_one_minus_alpha_bar: Vec<f64> =
            alpha_bar.iter().map(|ab| (1.0 - ab).sqrt()).collect();
        let sqrt_recip_alphas: Vec<f64> = alphas.iter().map(|a| (1.0 / a).sqrt()).collect();

        // alpha_bar[-1] is defined as 1, so the first posterior variance is 0
        let posterior_variance: Vec<f64> = (0..steps)
            .map(|i| {
                let prev = if i == 0 { 1.0 } else { alpha_bar[i - 1] };
                betas[i] * (1.0 - prev) / (1.0 - alpha_bar[i])
            })
            .collect();

        NoiseSchedule {
            steps,
            betas,
            alphas,
            alpha_bar,
            sqrt_alpha_bar,
            sqrt_one_minus_alpha_bar,
            sqrt_recip_alphas,
            posterior_variance,
        }
    }

    pub fn from_config(config: &DiffusionConfig) -> Self {
        Self::linear(config.steps, config.beta_start, config.beta_end)
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn beta(&self, t: usize) -> f64 {
        self.betas[t]
    }

    pub fn alpha(&self, t: usize) -> f64 {
        self.alphas[t]
    }

    pub fn alpha_bar(&self, t: usize) -> f64 {
        self.alpha_bar[t]
    }

    pub fn sqrt_alpha_bar(&self, t: usize) -> f64 {
        self.sqrt_alpha_bar[t]
    }

    pub fn sqrt_one_minus_alpha_bar(&self, t: usize) -> f64 {
        self.sqrt_one_minus_alpha_bar[t]
    }

    pub fn sqrt_recip_alpha(&self, t: usize) -> f64 {
        self.sqrt_recip_alphas[t]
    }

    pub fn posterior_variance(&self, t: usize) -> f64 {
        self.posterior_variance[t]
    }

    /// Gather per-example coefficients for a batch of timesteps as a
    /// broadcastable [batch, 1] tensor.
    fn gather<B: Backend>(
        values: &[f64],
        t: &Tensor<B, 1, Int>,
        device: &B::Device,
    ) -> Tensor<B, 2> {
        let values: Vec<f32> = values.iter().map(|v| *v as f32).collect();
        let table = Tensor::<B, 1>::from_floats(values.as_slice(), device);
        table.select(0, t.clone()).unsqueeze_dim(1)
    }

    /// Forward-noise clean targets to their per-example timestep:
    /// `sqrt(alpha_bar_t) * y0 + sqrt(1 - alpha_bar_t) * noise`.
    pub fn q_sample<B: Backend>(
        &self,
        y0: Tensor<B, 2>,
        t: &Tensor<B, 1, Int>,
        noise: Tensor<B, 2>,
    ) -> Tensor<B, 2> {
        let device = y0.device();
        let sab = Self::gather::<B>(&self.sqrt_alpha_bar, t, &device);
        let s1m = Self::gather::<B>(&self.sqrt_one_minus_alpha_bar, t, &device);
        y0 * sab + noise * s1m
    }
}

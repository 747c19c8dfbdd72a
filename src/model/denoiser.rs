//! Noise-prediction network
//!
//! Architecture: sinusoidal time embedding -> Linear -> ReLU, concatenated
//! with the noisy target and conditioning vector, then three hidden ReLU
//! layers down to the 2-dim noise estimate:
//!
//! [y_t(2) | cond(4) | time(32)] -> 256 -> 256 -> 256 -> 2
//!
//! Purely feed-forward; a full reverse pass costs one forward evaluation
//! per schedule step for the whole sample batch.

use burn::module::Module;
use burn::nn::{Linear, LinearConfig};
use burn::record::{FullPrecisionSettings, Recorder};
use burn::tensor::activation::relu;
use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor};

use crate::features::condition::{COND_DIM, TARGET_DIM};
use crate::model::time_embed::sinusoidal_embedding;

/// Configuration for the denoiser
#[derive(Debug, Clone)]
pub struct DenoiserConfig {
    pub target_dim: usize,
    pub cond_dim: usize,
    pub time_embed_dim: usize,
    pub hidden_dim: usize,
}

impl Default for DenoiserConfig {
    fn default() -> Self {
        DenoiserConfig {
            target_dim: TARGET_DIM,
            cond_dim: COND_DIM,
            time_embed_dim: 32,
            hidden_dim: 256,
        }
    }
}

impl DenoiserConfig {
    pub fn from_model_config(config: &crate::ModelConfig) -> Self {
        DenoiserConfig {
            time_embed_dim: config.time_embed_dim,
            hidden_dim: config.hidden_dim,
            ..Self::default()
        }
    }
}

/// Anything that can estimate the injected noise for a noisy target batch.
///
/// The reverse sampler works against this seam so tests can substitute
/// fixed predictors for a trained network.
pub trait NoisePredictor<B: Backend> {
    /// Predict the noise component of `y_t` [batch, 2] at integer timesteps
    /// `t` [batch] given conditioning vectors `cond` [batch, 4].
    fn predict_noise(
        &self,
        y_t: Tensor<B, 2>,
        t: Tensor<B, 1, Int>,
        cond: Tensor<B, 2>,
    ) -> Tensor<B, 2>;
}

/// Conditional noise-prediction MLP
#[derive(Module, Debug)]
pub struct Denoiser<B: Backend> {
    time_proj: Linear<B>,
    input: Linear<B>,
    hidden1: Linear<B>,
    hidden2: Linear<B>,
    output: Linear<B>,
    time_embed_dim: usize,
}

impl<B: Backend> Denoiser<B> {
    pub fn new(device: &B::Device, config: DenoiserConfig) -> Self {
        let in_dim = config.target_dim + config.cond_dim + config.time_embed_dim;
        Denoiser {
            time_proj: LinearConfig::new(config.time_embed_dim, config.time_embed_dim)
                .init(device),
            input: LinearConfig::new(in_dim, config.hidden_dim).init(device),
            hidden1: LinearConfig::new(config.hidden_dim, config.hidden_dim).init(device),
            hidden2: LinearConfig::new(config.hidden_dim, config.hidden_dim).init(device),
            output: LinearConfig::new(config.hidden_dim, config.target_dim).init(device),
            time_embed_dim: config.time_embed_dim,
        }
    }

    /// Forward pass over a batch. Every row is processed independently;
    /// inference relies on that to draw thousands of samples in one call.
    pub fn forward(
        &self,
        y_t: Tensor<B, 2>,
        t: Tensor<B, 1, Int>,
        cond: Tensor<B, 2>,
    ) -> Tensor<B, 2> {
        let device = y_t.device();
        let temb = self.embed_timesteps(&t, &device);
        let temb = relu(self.time_proj.forward(temb));

        let x = Tensor::cat(vec![y_t, cond, temb], 1);
        let x = relu(self.input.forward(x));
        let x = relu(self.hidden1.forward(x));
        let x = relu(self.hidden2.forward(x));
        self.output.forward(x)
    }

    /// Build the [batch, time_embed_dim] embedding matrix for a batch of
    /// integer timesteps. Timesteps carry no gradient, so the embedding is
    /// computed host-side and entered into the graph as a constant.
    fn embed_timesteps(&self, t: &Tensor<B, 1, Int>, device: &B::Device) -> Tensor<B, 2> {
        let data = t.to_data().convert::<i64>();
        let steps: &[i64] = data.as_slice().unwrap();

        let batch = steps.len();
        let mut emb = Vec::with_capacity(batch * self.time_embed_dim);
        for step in steps {
            emb.extend(sinusoidal_embedding(*step as usize, self.time_embed_dim));
        }

        Tensor::<B, 1>::from_floats(emb.as_slice(), device)
            .reshape([batch, self.time_embed_dim])
    }

    /// Save weights to `<path>.mpk`
    pub fn save(&self, path: &str) -> crate::Result<()>
    where
        B::FloatElem: serde::Serialize + serde::de::DeserializeOwned,
        B::IntElem: serde::Serialize + serde::de::DeserializeOwned,
    {
        let recorder = burn::record::NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        recorder
            .record(self.clone().into_record(), path.into())
            .map_err(|e| crate::BatcastError::Io(std::io::Error::other(e.to_string())))
    }

    /// Load weights from `<path>.mpk`. Only the parameter values are read;
    /// no trainer state is required.
    pub fn load(device: &B::Device, path: &str, config: DenoiserConfig) -> crate::Result<Self>
    where
        B::FloatElem: serde::Serialize + serde::de::DeserializeOwned,
        B::IntElem: serde::Serialize + serde::de::DeserializeOwned,
    {
        let recorder = burn::record::NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        let record = recorder
            .load(path.into(), device)
            .map_err(|_| crate::BatcastError::NoModel)?;

        let model = Self::new(device, config);
        Ok(model.load_record(record))
    }
}

impl<B: Backend> NoisePredictor<B> for Denoiser<B> {
    fn predict_noise(
        &self,
        y_t: Tensor<B, 2>,
        t: Tensor<B, 1, Int>,
        cond: Tensor<B, 2>,
    ) -> Tensor<B, 2> {
        self.forward(y_t, t, cond)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_forward_shapes() {
        let device = Default::default();
        let model = Denoiser::<TestBackend>::new(&device, DenoiserConfig::default());

        let y_t = Tensor::random([4, 2], Distribution::Normal(0.0, 1.0), &device);
        let cond = Tensor::random([4, 4], Distribution::Normal(0.0, 1.0), &device);
        let t = Tensor::<TestBackend, 1, Int>::from_ints([0, 10, 50, 99], &device);

        let eps = model.forward(y_t, t, cond);
        assert_eq!(eps.dims(), [4, 2]);
    }

    #[test]
    fn test_forward_single_row() {
        let device = Default::default();
        let model = Denoiser::<TestBackend>::new(&device, DenoiserConfig::default());

        let y_t = Tensor::random([1, 2], Distribution::Normal(0.0, 1.0), &device);
        let cond = Tensor::random([1, 4], Distribution::Normal(0.0, 1.0), &device);
        let t = Tensor::<TestBackend, 1, Int>::from_ints([42], &device);

        let eps = model.forward(y_t, t, cond);
        assert_eq!(eps.dims(), [1, 2]);
        let data = eps.to_data();
        for v in data.as_slice::<f32>().unwrap() {
            assert!(v.is_finite());
        }
    }

    #[test]
    fn test_rows_are_independent() {
        // The prediction for a row must not change when other rows change.
        let device = Default::default();
        let model = Denoiser::<TestBackend>::new(&device, DenoiserConfig::default());

        let y_row = Tensor::<TestBackend, 1>::from_floats([0.3, -0.7], &device).reshape([1, 2]);
        let cond_row =
            Tensor::<TestBackend, 1>::from_floats([0.1, 0.2, 0.3, 0.4], &device).reshape([1, 4]);
        let t_row = Tensor::<TestBackend, 1, Int>::from_ints([5], &device);

        let alone = model.forward(y_row.clone(), t_row.clone(), cond_row.clone());

        let other = Tensor::random([1, 2], Distribution::Normal(0.0, 1.0), &device);
        let other_cond = Tensor::random([1, 4], Distribution::Normal(0.0, 1.0), &device);
        let y_pair = Tensor::cat(vec![y_row, other], 0);
        let cond_pair = Tensor::cat(vec![cond_row, other_cond], 0);
        let t_pair = Tensor::<TestBackend, 1, Int>::from_ints([5, 80], &device);

        let paired = model.forward(y_pair, t_pair, cond_pair);

        let alone_data = alone.to_data();
        let paired_data = paired.to_data();
        let a: &[f32] = alone_data.as_slice().unwrap();
        let p: &[f32] = paired_data.as_slice().unwrap();
        assert!((a[0] - p[0]).abs() < 1e-6);
        assert!((a[1] - p[1]).abs() < 1e-6);
    }
}

//! Reverse diffusion sampling
//!
//! Walks the schedule backward from standard-normal noise. Each step
//! estimates the clean signal from the predicted noise, clips it, and
//! re-noises to the previous step reusing the same prediction - no fresh
//! noise enters after initialization, so the walk is deterministic given
//! the initial draw. The re-noising formula must match the schedule the
//! network was trained against exactly, or samples come out biased.

use burn::tensor::backend::Backend;
use burn::tensor::{Distribution, Int, Tensor};

use crate::features::condition::TARGET_DIM;
use crate::model::{NoisePredictor, NoiseSchedule};

/// Floor added to the sqrt(alpha_bar) denominator of the x0 estimate
const X0_DENOM_EPS: f64 = 1e-8;

/// Draw one model-space sample per conditioning row, starting from fresh
/// standard-normal noise.
pub fn sample<B: Backend, P: NoisePredictor<B>>(
    predictor: &P,
    schedule: &NoiseSchedule,
    cond: Tensor<B, 2>,
    clip_x0: f64,
) -> Tensor<B, 2> {
    let [batch, _] = cond.dims();
    let device = cond.device();
    let initial = Tensor::<B, 2>::random(
        [batch, TARGET_DIM],
        Distribution::Normal(0.0, 1.0),
        &device,
    );
    sample_from(predictor, schedule, initial, cond, clip_x0)
}

/// Run the full reverse chain from an explicit initial state. Exposed
/// separately so callers (and tests) can fix the starting noise.
pub fn sample_from<B: Backend, P: NoisePredictor<B>>(
    predictor: &P,
    schedule: &NoiseSchedule,
    initial: Tensor<B, 2>,
    cond: Tensor<B, 2>,
    clip_x0: f64,
) -> Tensor<B, 2> {
    let [batch, _] = cond.dims();
    let device = cond.device();

    let mut y = initial;
    for i in (0..schedule.steps()).rev() {
        let t = Tensor::<B, 1, Int>::full([batch], i as i32, &device);
        let eps = predictor.predict_noise(y.clone(), t, cond.clone());

        // Clean-signal estimate, clipped against runaway predictions
        let x0 = (y - eps.clone().mul_scalar(schedule.sqrt_one_minus_alpha_bar(i)))
            .div_scalar(schedule.sqrt_alpha_bar(i) + X0_DENOM_EPS);
        let x0 = x0.clamp(-clip_x0, clip_x0);

        y = if i == 0 {
            // Terminal estimate, no re-noising
            x0
        } else {
            // Deterministic step down: reuse the same predicted noise
            x0.mul_scalar(schedule.sqrt_alpha_bar(i - 1))
                + eps.mul_scalar(schedule.sqrt_one_minus_alpha_bar(i - 1))
        };
    }
    y
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Denoiser, DenoiserConfig};
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    /// Predicts zero noise for every input
    struct ZeroPredictor;

    impl NoisePredictor<TestBackend> for ZeroPredictor {
        fn predict_noise(
            &self,
            y_t: Tensor<TestBackend, 2>,
            _t: Tensor<TestBackend, 1, Int>,
            _cond: Tensor<TestBackend, 2>,
        ) -> Tensor<TestBackend, 2> {
            y_t.zeros_like()
        }
    }

    /// Predicts an absurdly large constant noise for every input
    struct HugePredictor;

    impl NoisePredictor<TestBackend> for HugePredictor {
        fn predict_noise(
            &self,
            y_t: Tensor<TestBackend, 2>,
            _t: Tensor<TestBackend, 1, Int>,
            _cond: Tensor<TestBackend, 2>,
        ) -> Tensor<TestBackend, 2> {
            y_t.ones_like().mul_scalar(1e6)
        }
    }

    fn schedule() -> NoiseSchedule {
        NoiseSchedule::linear(100, 1e-4, 1e-2)
    }

    #[test]
    fn test_output_shape() {
        let device = Default::default();
        let model = Denoiser::<TestBackend>::new(&device, DenoiserConfig::default());
        let cond = Tensor::zeros([8, 4], &device);
        let out = sample(&model, &schedule(), cond, 3.0);
        assert_eq!(out.dims(), [8, 2]);
    }

    #[test]
    fn test_deterministic_given_initial_noise() {
        let device = Default::default();
        let model = Denoiser::<TestBackend>::new(&device, DenoiserConfig::default());
        let schedule = schedule();

        let initial =
            Tensor::<TestBackend, 1>::from_floats([0.3, -0.8, 1.2, 0.1], &device).reshape([2, 2]);
        let cond =
            Tensor::<TestBackend, 1>::from_floats([0.1; 8], &device).reshape([2, 4]);

        let a = sample_from(&model, &schedule, initial.clone(), cond.clone(), 3.0);
        let b = sample_from(&model, &schedule, initial, cond, 3.0);

        let a_data = a.to_data();
        let b_data = b.to_data();
        assert_eq!(
            a_data.as_slice::<f32>().unwrap(),
            b_data.as_slice::<f32>().unwrap()
        );
    }

    #[test]
    fn test_zero_noise_prediction_collapses_to_closed_form() {
        // With eps_hat = 0 every step reduces to
        // y_{i-1} = sqrt(ab_{i-1}) * y_i / sqrt(ab_i), modulo the clip and
        // denominator floor. Verify the loop against that recurrence.
        let device = Default::default();
        let schedule = schedule();
        let clip = 3.0;

        let start = [0.5f64, -0.25];
        let initial =
            Tensor::<TestBackend, 1>::from_floats([start[0] as f32, start[1] as f32], &device)
                .reshape([1, 2]);
        let cond = Tensor::zeros([1, 4], &device);

        let out = sample_from(&ZeroPredictor, &schedule, initial, cond, clip);

        let mut expected = start;
        for i in (0..schedule.steps()).rev() {
            for v in expected.iter_mut() {
                let x0 = (*v / (schedule.sqrt_alpha_bar(i) + 1e-8)).clamp(-clip, clip);
                *v = if i == 0 {
                    x0
                } else {
                    schedule.sqrt_alpha_bar(i - 1) * x0
                };
            }
        }

        let data = out.to_data();
        let got: &[f32] = data.as_slice().unwrap();
        assert!((got[0] as f64 - expected[0]).abs() < 1e-4, "{} vs {}", got[0], expected[0]);
        assert!((got[1] as f64 - expected[1]).abs() < 1e-4, "{} vs {}", got[1], expected[1]);
    }

    #[test]
    fn test_final_output_bounded_by_clip() {
        // The terminal step emits the clipped x0 estimate, so even an
        // adversarially large network output stays inside the clip range.
        let device = Default::default();
        let cond = Tensor::zeros([4, 4], &device);
        let out = sample(&HugePredictor, &schedule(), cond, 3.0);

        let data = out.to_data();
        for v in data.as_slice::<f32>().unwrap() {
            assert!(v.abs() <= 3.0 + 1e-6, "sample {} escaped the clip", v);
        }
    }
}

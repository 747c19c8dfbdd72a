//! Training loop for the denoiser
//!
//! Per example: draw a uniform timestep and standard-normal noise, noise
//! the clean target forward through the schedule, and regress the
//! network's prediction onto the injected noise with MSE.

use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::record::{FullPrecisionSettings, Recorder};
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::{Distribution, ElementConversion, Int, Tensor};
use rand::Rng;

use crate::data::dataset::{DiffusionBatch, DiffusionBatcher, DiffusionDataset};
use crate::features::condition::TARGET_DIM;
use crate::model::{Denoiser, NoiseSchedule};
use crate::training::checkpoint::{best_stem, epoch_stem, CheckpointMeta};
use crate::training::metrics::{Metrics, TrainingHistory};
use crate::{Result, TrainingConfig};

/// Trainer for the denoiser
pub struct DiffusionTrainer<B: AutodiffBackend> {
    model: Denoiser<B>,
    optimizer: burn::optim::adaptor::OptimizerAdaptor<burn::optim::Adam, Denoiser<B>, B>,
    schedule: NoiseSchedule,
    config: TrainingConfig,
    device: B::Device,
}

impl<B: AutodiffBackend> DiffusionTrainer<B>
where
    B::FloatElem: serde::Serialize + serde::de::DeserializeOwned,
    B::IntElem: serde::Serialize + serde::de::DeserializeOwned,
{
    /// Create a new trainer. The schedule is built once at startup and
    /// moved in; it is never recomputed during training.
    pub fn new(
        model: Denoiser<B>,
        schedule: NoiseSchedule,
        config: TrainingConfig,
        device: B::Device,
    ) -> Self {
        let optimizer = AdamConfig::new().init();
        DiffusionTrainer {
            model,
            optimizer,
            schedule,
            config,
            device,
        }
    }

    /// Train the model, writing periodic and best-model checkpoints into
    /// `model_dir`. Without a validation split, training proceeds
    /// train-only and the final weights become the serving model.
    pub fn train(
        mut self,
        train_dataset: DiffusionDataset,
        val_dataset: Option<DiffusionDataset>,
        model_dir: &str,
    ) -> Result<(Denoiser<B>, TrainingHistory)> {
        use burn::data::dataloader::DataLoaderBuilder;

        std::fs::create_dir_all(model_dir)?;

        let batcher_train = DiffusionBatcher::<B>::new(self.device.clone());
        let train_loader = DataLoaderBuilder::new(batcher_train)
            .batch_size(self.config.batch_size)
            .shuffle(42)
            .build(train_dataset);

        let val_loader = val_dataset.map(|dataset| {
            let batcher_val = DiffusionBatcher::<B>::new(self.device.clone());
            DataLoaderBuilder::new(batcher_val)
                .batch_size(self.config.batch_size)
                .build(dataset)
        });
        if val_loader.is_none() {
            log::warn!("No validation rows - training train-only");
        }

        let mut history = TrainingHistory::new();

        log::info!("Starting training for {} epochs", self.config.epochs);

        for epoch in 0..self.config.epochs {
            let train_metrics = self.train_epoch(train_loader.iter());
            let val_metrics = val_loader.as_ref().map(|loader| self.validate_epoch(loader.iter()));

            match &val_metrics {
                Some(val) => log::info!(
                    "Epoch {}/{}: Train {} | Val {}",
                    epoch + 1,
                    self.config.epochs,
                    train_metrics,
                    val
                ),
                None => log::info!(
                    "Epoch {}/{}: Train {}",
                    epoch + 1,
                    self.config.epochs,
                    train_metrics
                ),
            }

            // Best-model checkpoint on validation improvement
            if let Some(val) = &val_metrics {
                if history.improves(val.avg_loss()) {
                    log::info!("  New best model (val_loss: {:.4})", val.avg_loss());
                    self.save_checkpoint(
                        &best_stem(model_dir).to_string_lossy(),
                        epoch,
                        train_metrics.avg_loss(),
                        Some(val.avg_loss()),
                    )?;
                }
            }

            history.record_epoch(epoch, &train_metrics, val_metrics.as_ref());

            // Periodic checkpoint
            let every = self.config.checkpoint_every.max(1);
            if epoch % every == 0 || epoch == self.config.epochs - 1 {
                let stem = epoch_stem(model_dir, epoch);
                self.save_checkpoint(
                    &stem.to_string_lossy(),
                    epoch,
                    train_metrics.avg_loss(),
                    val_metrics.as_ref().map(|v| v.avg_loss()),
                )?;
                log::info!("  Saved checkpoint: {}", stem.display());
            }
        }

        // A train-only run still needs a serving model
        if val_loader.is_none() {
            let last_loss = history.train_losses.last().copied().unwrap_or(f64::NAN);
            self.save_checkpoint(
                &best_stem(model_dir).to_string_lossy(),
                self.config.epochs.saturating_sub(1),
                last_loss,
                None,
            )?;
        }

        Ok((self.model, history))
    }

    /// Train one epoch
    fn train_epoch(&mut self, loader: impl Iterator<Item = DiffusionBatch<B>>) -> Metrics {
        let mut metrics = Metrics::new();
        let mut rng = rand::thread_rng();

        for batch in loader {
            let batch_size = batch.targets.dims()[0];

            let (y_t, t, noise) = self.noised_batch(&batch, batch_size, &mut rng);
            let pred = self.model.forward(y_t, t, batch.cond.clone());
            let loss = (pred - noise).powf_scalar(2.0).mean();

            let loss_val: f32 = loss.clone().into_scalar().elem();

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &self.model);
            self.model =
                self.optimizer
                    .step(self.config.learning_rate, self.model.clone(), grads);

            metrics.update(loss_val, batch_size);
        }

        metrics
    }

    /// Validate one epoch (no gradient updates)
    fn validate_epoch(&self, loader: impl Iterator<Item = DiffusionBatch<B>>) -> Metrics {
        let mut metrics = Metrics::new();
        let mut rng = rand::thread_rng();

        for batch in loader {
            let batch_size = batch.targets.dims()[0];

            let (y_t, t, noise) = self.noised_batch(&batch, batch_size, &mut rng);
            let pred = self.model.forward(y_t, t, batch.cond.clone());
            let loss = (pred - noise).powf_scalar(2.0).mean();
            let loss_val: f32 = loss.into_scalar().elem();

            metrics.update(loss_val, batch_size);
        }

        metrics
    }

    /// Draw per-example timesteps and noise, and forward-noise the targets
    fn noised_batch(
        &self,
        batch: &DiffusionBatch<B>,
        batch_size: usize,
        rng: &mut impl Rng,
    ) -> (Tensor<B, 2>, Tensor<B, 1, Int>, Tensor<B, 2>) {
        let t_vals: Vec<i32> = (0..batch_size)
            .map(|_| rng.gen_range(0..self.schedule.steps()) as i32)
            .collect();
        let t = Tensor::<B, 1, Int>::from_ints(t_vals.as_slice(), &self.device);

        let noise = Tensor::<B, 2>::random(
            [batch_size, TARGET_DIM],
            Distribution::Normal(0.0, 1.0),
            &self.device,
        );

        let y_t = self
            .schedule
            .q_sample(batch.targets.clone(), &t, noise.clone());

        (y_t, t, noise)
    }

    /// Write one checkpoint: model weights, optimizer state, and metadata
    fn save_checkpoint(
        &self,
        stem: &str,
        epoch: usize,
        train_loss: f64,
        val_loss: Option<f64>,
    ) -> Result<()> {
        self.model.save(stem)?;

        let recorder = burn::record::NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        recorder
            .record(self.optimizer.to_record(), format!("{}_optim", stem).into())
            .map_err(|e| crate::BatcastError::Io(std::io::Error::other(e.to_string())))?;

        CheckpointMeta {
            epoch,
            train_loss,
            val_loss,
        }
        .save(format!("{}.json", stem))?;

        Ok(())
    }

    /// Get the current model
    pub fn model(&self) -> &Denoiser<B> {
        &self.model
    }

    /// Get the model, consuming the trainer
    pub fn into_model(self) -> Denoiser<B> {
        self.model
    }
}

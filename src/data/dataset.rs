//! Burn Dataset implementation for season-change training pairs
//!
//! A training example is a pair of consecutive qualifying seasons for one
//! player: the earlier season becomes the conditioning vector, the change
//! between them becomes the 2-dim target. Splits are strictly by season
//! year so nothing from the predicted side of the temporal boundary leaks
//! into training.

use crate::features::condition::{condition_vector, target_delta, COND_DIM, TARGET_DIM};
use crate::features::Scaler;
use crate::{Result, SeasonRecord};
use burn::data::dataset::Dataset;
use std::collections::HashMap;

/// An unscaled training pair, tagged with the target season's year
#[derive(Debug, Clone)]
pub struct TrainingPair {
    /// Year of the later (target) season
    pub year: i32,
    pub cond: [f64; COND_DIM],
    pub target: [f64; TARGET_DIM],
}

/// Build training pairs from season records.
///
/// Eligibility: the two seasons must be consecutive years for the same
/// player (a gap year breaks the pair) and both must reach `min_pa`.
pub fn build_training_pairs(seasons: &[SeasonRecord], min_pa: u32) -> Vec<TrainingPair> {
    let mut by_player: HashMap<&str, Vec<&SeasonRecord>> = HashMap::new();
    for s in seasons {
        by_player.entry(s.player_id.0.as_str()).or_default().push(s);
    }

    let mut pairs = Vec::new();
    for history in by_player.values_mut() {
        history.sort_by_key(|s| s.year);
        for window in history.windows(2) {
            let (prev, cur) = (window[0], window[1]);
            if cur.year != prev.year + 1 {
                continue;
            }
            if !prev.qualifies(min_pa) || !cur.qualifies(min_pa) {
                continue;
            }
            pairs.push(TrainingPair {
                year: cur.year,
                cond: condition_vector(prev, cur.year),
                target: target_delta(prev, cur),
            });
        }
    }
    pairs.sort_by_key(|p| p.year);
    pairs
}

/// Year-based train/validation split
#[derive(Debug, Clone)]
pub struct YearSplit {
    pub train: Vec<TrainingPair>,
    pub val: Vec<TrainingPair>,
}

/// Split pairs by target-season year: training takes years up to
/// `train_end` minus the excluded years, validation takes exactly
/// `val_year`. Pairs outside both windows are dropped.
pub fn split_by_year(
    pairs: Vec<TrainingPair>,
    train_end: i32,
    val_year: i32,
    exclude_years: &[i32],
) -> YearSplit {
    let mut train = Vec::new();
    let mut val = Vec::new();
    for pair in pairs {
        if pair.year == val_year {
            val.push(pair);
        } else if pair.year <= train_end && !exclude_years.contains(&pair.year) {
            train.push(pair);
        }
    }
    YearSplit { train, val }
}

/// Conditioning rows as an n x 4 matrix for scaler fitting
pub fn cond_matrix(pairs: &[TrainingPair]) -> Vec<Vec<f64>> {
    pairs.iter().map(|p| p.cond.to_vec()).collect()
}

/// Target rows as an n x 2 matrix for scaler fitting
pub fn target_matrix(pairs: &[TrainingPair]) -> Vec<Vec<f64>> {
    pairs.iter().map(|p| p.target.to_vec()).collect()
}

/// A standardized training sample
#[derive(Debug, Clone)]
pub struct DiffusionSample {
    pub target: [f32; TARGET_DIM],
    pub cond: [f32; COND_DIM],
}

/// Dataset of standardized samples
#[derive(Debug, Clone)]
pub struct DiffusionDataset {
    samples: Vec<DiffusionSample>,
}

impl DiffusionDataset {
    /// Wrap already standardized samples
    pub fn from_samples(samples: Vec<DiffusionSample>) -> Self {
        DiffusionDataset { samples }
    }

    /// Standardize pairs with already fitted scalers
    pub fn from_pairs(
        pairs: &[TrainingPair],
        cond_scaler: &Scaler,
        target_scaler: &Scaler,
    ) -> Result<Self> {
        let samples = pairs
            .iter()
            .map(|p| {
                let cond = cond_scaler.transform(&p.cond);
                let target = target_scaler.transform(&p.target);
                DiffusionSample {
                    target: [target[0] as f32, target[1] as f32],
                    cond: [
                        cond[0] as f32,
                        cond[1] as f32,
                        cond[2] as f32,
                        cond[3] as f32,
                    ],
                }
            })
            .collect();
        Ok(DiffusionDataset { samples })
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl Dataset<DiffusionSample> for DiffusionDataset {
    fn get(&self, index: usize) -> Option<DiffusionSample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

/// Batch of standardized samples
#[derive(Debug, Clone)]
pub struct DiffusionBatch<B: burn::tensor::backend::Backend> {
    /// Clean targets: [batch, 2]
    pub targets: burn::tensor::Tensor<B, 2>,
    /// Conditioning vectors: [batch, 4]
    pub cond: burn::tensor::Tensor<B, 2>,
}

/// Batcher for creating training batches
#[derive(Clone)]
pub struct DiffusionBatcher<B: burn::tensor::backend::Backend> {
    device: B::Device,
}

impl<B: burn::tensor::backend::Backend> DiffusionBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        DiffusionBatcher { device }
    }
}

impl<B: burn::tensor::backend::Backend>
    burn::data::dataloader::batcher::Batcher<B, DiffusionSample, DiffusionBatch<B>>
    for DiffusionBatcher<B>
{
    fn batch(&self, items: Vec<DiffusionSample>, _device: &B::Device) -> DiffusionBatch<B> {
        let batch_size = items.len();

        let mut target_data = Vec::with_capacity(batch_size * TARGET_DIM);
        let mut cond_data = Vec::with_capacity(batch_size * COND_DIM);
        for sample in &items {
            target_data.extend_from_slice(&sample.target);
            cond_data.extend_from_slice(&sample.cond);
        }

        let targets =
            burn::tensor::Tensor::<B, 1>::from_floats(target_data.as_slice(), &self.device)
                .reshape([batch_size, TARGET_DIM]);
        let cond = burn::tensor::Tensor::<B, 1>::from_floats(cond_data.as_slice(), &self.device)
            .reshape([batch_size, COND_DIM]);

        DiffusionBatch { targets, cond }
    }
}

//! Prediction orchestration
//!
//! Resolves a player, builds their conditioning vector, draws a batch of
//! samples through the reverse sampler, and reduces the outcomes to
//! summary statistics in raw OBP/SLG space.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use std::path::Path;

use crate::data::Database;
use crate::features::condition::{
    condition_used, condition_vector, select_conditioning_season, COND_DIM,
};
use crate::features::scaler::{Scaler, COND_SCALER_FILE, TARGET_SCALER_FILE};
use crate::features::transform::{inv_logit, safe_exp};
use crate::model::{Denoiser, DenoiserConfig, NoiseSchedule};
use crate::predict::sampler;
use crate::predict::summary::summarize;
use crate::training::checkpoint::best_stem;
use crate::{BatcastError, Config, Player, PlayerForecast, Result};

/// Valid range for sampled OBP
const OBP_RANGE: (f64, f64) = (0.0, 1.0);
/// Valid range for sampled SLG
const SLG_RANGE: (f64, f64) = (0.0, 2.0);

/// Predictor for serving player forecasts
pub struct Predictor<B: Backend> {
    model: Denoiser<B>,
    schedule: NoiseSchedule,
    cond_scaler: Scaler,
    target_scaler: Scaler,
    db: Database,
    device: B::Device,
    n_samples: usize,
    target_year: i32,
    min_pa_history: u32,
    min_pa_search: u32,
    clip_x0: f64,
}

impl<B: Backend> Predictor<B>
where
    B::FloatElem: serde::Serialize + serde::de::DeserializeOwned,
    B::IntElem: serde::Serialize + serde::de::DeserializeOwned,
{
    /// Create a predictor from already loaded parts
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        model: Denoiser<B>,
        schedule: NoiseSchedule,
        cond_scaler: Scaler,
        target_scaler: Scaler,
        db: Database,
        device: B::Device,
        config: &Config,
    ) -> Self {
        Predictor {
            model,
            schedule,
            cond_scaler,
            target_scaler,
            db,
            device,
            n_samples: config.prediction.n_samples,
            target_year: config.prediction.target_year,
            min_pa_history: config.prediction.min_pa_history,
            min_pa_search: config.data.min_pa_search,
            clip_x0: config.diffusion.clip_x0,
        }
    }

    /// Load the serving model and both scalers from the model directory.
    /// Missing weights or scalers are uninitialized-state errors, fatal
    /// at startup rather than per-request.
    pub fn load(db: Database, config: &Config, device: B::Device) -> Result<Self> {
        let model_dir = Path::new(&config.data.model_dir);

        let model = Denoiser::load(
            &device,
            &best_stem(&config.data.model_dir).to_string_lossy(),
            DenoiserConfig::from_model_config(&config.model),
        )?;
        let cond_scaler = Scaler::load(model_dir.join(COND_SCALER_FILE))?;
        let target_scaler = Scaler::load(model_dir.join(TARGET_SCALER_FILE))?;
        let schedule = NoiseSchedule::from_config(&config.diffusion);

        Ok(Self::new(
            model,
            schedule,
            cond_scaler,
            target_scaler,
            db,
            device,
            config,
        ))
    }

    /// Forecast next-season OBP/SLG/OPS for a player by full name
    pub fn predict(&self, full_name: &str) -> Result<PlayerForecast> {
        let player = self
            .db
            .find_player_by_name(full_name)?
            .ok_or_else(|| BatcastError::PlayerNotFound(full_name.to_string()))?;

        let history = self.db.get_history_before(&player.id, self.target_year)?;
        let prev = select_conditioning_season(&history, self.min_pa_history).ok_or_else(|| {
            BatcastError::NoHistory {
                name: player.name.clone(),
                year: self.target_year,
            }
        })?;

        let cond_raw = condition_vector(prev, self.target_year);
        let cond_scaled = self.cond_scaler.transform(&cond_raw);

        log::debug!(
            "Conditioning {} on {} ({} PA), age {:.0} next season",
            player.name,
            prev.year,
            prev.pa,
            cond_raw[3]
        );

        // One conditioning row replicated across the sample batch
        let cond_f32: Vec<f32> = cond_scaled.iter().map(|v| *v as f32).collect();
        let cond = Tensor::<B, 1>::from_floats(cond_f32.as_slice(), &self.device)
            .reshape([1, COND_DIM])
            .repeat_dim(0, self.n_samples);

        let samples = sampler::sample(&self.model, &self.schedule, cond, self.clip_x0);
        let data = samples.to_data();
        let scaled: &[f32] = data
            .as_slice()
            .map_err(|e| BatcastError::Parse(format!("Failed to read samples: {:?}", e)))?;

        let deltas: Vec<[f64; 2]> = scaled
            .chunks_exact(2)
            .map(|pair| {
                let row = self.target_scaler.inverse(&[pair[0] as f64, pair[1] as f64]);
                [row[0], row[1]]
            })
            .collect();

        let (obp, slg, ops) = outcomes_from_deltas(cond_raw[0], cond_raw[1], &deltas);

        Ok(PlayerForecast {
            name: player.name,
            player_id: player.id,
            upcoming_year: self.target_year,
            condition_used: condition_used(prev, self.target_year),
            obp: summarize(&obp),
            slg: summarize(&slg),
            ops: summarize(&ops),
        })
    }

    /// Name-substring search over players eligible for forecasting
    pub fn search(&self, query: &str) -> Result<Vec<Player>> {
        self.db.search_players(query, self.min_pa_search)
    }

    /// Get the database
    pub fn database(&self) -> &Database {
        &self.db
    }
}

/// Turn model-space deltas into absolute next-season outcomes: add the
/// deltas back onto the previous season's transformed values, invert the
/// logit/log maps, and clip to the valid stat ranges.
pub fn outcomes_from_deltas(
    prev_zobp: f64,
    prev_logslg: f64,
    deltas: &[[f64; 2]],
) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let mut obp = Vec::with_capacity(deltas.len());
    let mut slg = Vec::with_capacity(deltas.len());
    let mut ops = Vec::with_capacity(deltas.len());

    for delta in deltas {
        let o = inv_logit(prev_zobp + delta[0]).clamp(OBP_RANGE.0, OBP_RANGE.1);
        let s = safe_exp(prev_logslg + delta[1]).clamp(SLG_RANGE.0, SLG_RANGE.1);
        obp.push(o);
        slg.push(s);
        ops.push(o + s);
    }

    (obp, slg, ops)
}

/// Format a forecast for terminal display
pub fn format_forecast(forecast: &PlayerForecast) -> String {
    let cond = &forecast.condition_used;
    let row = |label: &str, s: &crate::StatSummary| {
        format!(
            "│  {:<4} {:.3}   {:.3} / {:.3} / {:.3} / {:.3} / {:.3}\n",
            label, s.mean, s.p10, s.p25, s.p50, s.p75, s.p90
        )
    };

    format!(
        "\
┌─────────────────────────────────────────────────────────┐
│  {} {} projection
├─────────────────────────────────────────────────────────┤
│  Conditioned on {}: {:.3} OBP / {:.3} SLG, {} PA, age {:.0}
├─────────────────────────────────────────────────────────┤
│        mean    p10 / p25 / p50 / p75 / p90
{}{}{}└─────────────────────────────────────────────────────────┘",
        forecast.name,
        forecast.upcoming_year,
        cond.prev_year,
        cond.prev_obp,
        cond.prev_slg,
        cond.prev_pa,
        cond.age_next,
        row("OBP", &forecast.obp),
        row("SLG", &forecast.slg),
        row("OPS", &forecast.ops),
    )
}

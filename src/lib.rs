//! Next-season batting forecasts from a conditional diffusion model
//!
//! Learns the year-over-year change in a hitter's OBP and SLG and samples
//! a distribution of plausible next-season outcomes per player.

pub mod data;
pub mod features;
pub mod model;
pub mod predict;
pub mod training;

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Unique identifier for a player (Lahman-style string id)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub String);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A player with search metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub birth_year: Option<i32>,
}

/// One player-season batting line, derived once during ingestion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeasonRecord {
    pub player_id: PlayerId,
    pub year: i32,
    /// Plate appearances (AB + BB + HBP + SF)
    pub pa: u32,
    /// On-base percentage, clipped to [0, 1]
    pub obp: f64,
    /// Slugging percentage, clipped to [0, 2]
    pub slg: f64,
    /// Age during this season
    pub age: f64,
}

impl SeasonRecord {
    /// Whether this season meets a plate-appearance threshold
    pub fn qualifies(&self, min_pa: u32) -> bool {
        self.pa >= min_pa
    }
}

/// Summary of a sampled outcome distribution
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StatSummary {
    pub mean: f64,
    pub p10: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
}

/// The previous-season line a forecast was conditioned on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionUsed {
    pub prev_year: i32,
    #[serde(rename = "prev_OBP")]
    pub prev_obp: f64,
    #[serde(rename = "prev_SLG")]
    pub prev_slg: f64,
    #[serde(rename = "prev_PA")]
    pub prev_pa: u32,
    pub age_next: f64,
}

/// Full forecast response for one player
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerForecast {
    pub name: String,
    #[serde(rename = "playerID")]
    pub player_id: PlayerId,
    pub upcoming_year: i32,
    pub condition_used: ConditionUsed,
    #[serde(rename = "OBP")]
    pub obp: StatSummary,
    #[serde(rename = "SLG")]
    pub slg: StatSummary,
    #[serde(rename = "OPS")]
    pub ops: StatSummary,
}

/// Application-wide errors
#[derive(Debug, Error)]
pub enum BatcastError {
    #[error("No player found for name: {0}")]
    PlayerNotFound(String),

    #[error("No history for {name} before {year}")]
    NoHistory { name: String, year: i32 },

    #[error("Scaler used before fit - run `batcast train` first")]
    ScalerNotFitted,

    #[error("Model not trained - run `batcast train` first")]
    NoModel,

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl BatcastError {
    /// Whether this error is a user-facing not-found condition rather than
    /// an internal fault
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            BatcastError::PlayerNotFound(_) | BatcastError::NoHistory { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, BatcastError>;

/// Application configuration loaded from config.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub training: TrainingConfig,
    pub model: ModelConfig,
    pub diffusion: DiffusionConfig,
    pub prediction: PredictionConfig,
    pub data: DataConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    /// Write a checkpoint every N epochs
    pub checkpoint_every: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub time_embed_dim: usize,
    pub hidden_dim: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffusionConfig {
    pub steps: usize,
    pub beta_start: f64,
    pub beta_end: f64,
    /// Symmetric clip applied to the clean-signal estimate during sampling
    pub clip_x0: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionConfig {
    pub n_samples: usize,
    pub target_year: i32,
    /// Minimum PA for a season to be preferred as the conditioning season
    pub min_pa_history: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    pub database_path: String,
    pub model_dir: String,
    /// Both seasons of a training pair must reach this PA
    pub min_pa_train: u32,
    pub train_end_year: i32,
    pub val_year: i32,
    /// Years excluded from training (e.g. the shortened 2020 season)
    pub exclude_years: Vec<i32>,
    /// Minimum latest-season PA for a player to appear in search results
    pub min_pa_search: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            training: TrainingConfig {
                epochs: 1000,
                batch_size: 512,
                learning_rate: 1e-4,
                checkpoint_every: 50,
            },
            model: ModelConfig {
                time_embed_dim: 32,
                hidden_dim: 256,
            },
            diffusion: DiffusionConfig {
                steps: 100,
                beta_start: 1e-4,
                beta_end: 1e-2,
                clip_x0: 3.0,
            },
            prediction: PredictionConfig {
                n_samples: 4096,
                target_year: 2026,
                min_pa_history: 50,
            },
            data: DataConfig {
                database_path: "data/batcast.db".to_string(),
                model_dir: "model".to_string(),
                min_pa_train: 400,
                train_end_year: 2024,
                val_year: 2025,
                exclude_years: vec![2020],
                min_pa_search: 100,
            },
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            BatcastError::Config(format!("Failed to read config file {}: {}", path, e))
        })?;
        toml::from_str(&content)
            .map_err(|e| BatcastError::Config(format!("Failed to parse config: {}", e)))
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| BatcastError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

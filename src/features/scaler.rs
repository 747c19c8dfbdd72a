//! Per-feature standardization fitted over a training population
//!
//! A plain value type: fitting returns a new scaler, transform and inverse
//! are pure. Two instances exist in a trained system - one over conditioning
//! vectors, one over target deltas - persisted as JSON next to the model.

use crate::{BatcastError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Floor added to per-column standard deviations
const STD_EPS: f64 = 1e-8;

/// File name of the conditioning scaler inside the model directory
pub const COND_SCALER_FILE: &str = "cond_scaler.json";
/// File name of the target scaler inside the model directory
pub const TARGET_SCALER_FILE: &str = "target_scaler.json";

/// Column-wise mean/std scaler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scaler {
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
}

impl Scaler {
    /// Fit over an n x k matrix of rows. Requires at least one row.
    pub fn fit(rows: &[Vec<f64>]) -> Result<Self> {
        let n = rows.len();
        if n == 0 {
            return Err(BatcastError::ScalerNotFitted);
        }
        let k = rows[0].len();

        let mut mean = vec![0.0; k];
        for row in rows {
            for (j, v) in row.iter().enumerate() {
                mean[j] += v;
            }
        }
        for m in mean.iter_mut() {
            *m /= n as f64;
        }

        let mut std = vec![0.0; k];
        for row in rows {
            for (j, v) in row.iter().enumerate() {
                std[j] += (v - mean[j]) * (v - mean[j]);
            }
        }
        for s in std.iter_mut() {
            *s = (*s / n as f64).sqrt() + STD_EPS;
        }

        Ok(Scaler { mean, std })
    }

    /// (x - mean) / std per column
    pub fn transform(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.mean.iter().zip(self.std.iter()))
            .map(|(x, (m, s))| (x - m) / s)
            .collect()
    }

    /// x * std + mean per column
    pub fn inverse(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.mean.iter().zip(self.std.iter()))
            .map(|(x, (m, s))| x * s + m)
            .collect()
    }

    /// Number of feature columns
    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    /// Persist as JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| BatcastError::Parse(format!("Failed to serialize scaler: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load a previously fitted scaler. A missing file is the
    /// uninitialized-state error, fatal at startup.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(|_| BatcastError::ScalerNotFitted)?;
        serde_json::from_str(&content)
            .map_err(|e| BatcastError::Parse(format!("Failed to parse scaler: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_rows() -> Vec<Vec<f64>> {
        vec![
            vec![1.0, 10.0, -0.5],
            vec![2.0, 20.0, 0.0],
            vec![3.0, 30.0, 0.5],
            vec![4.0, 40.0, 1.0],
        ]
    }

    #[test]
    fn test_fit_means() {
        let scaler = Scaler::fit(&sample_rows()).unwrap();
        assert!((scaler.mean[0] - 2.5).abs() < 1e-12);
        assert!((scaler.mean[1] - 25.0).abs() < 1e-12);
        assert!((scaler.mean[2] - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_transform_inverse_roundtrip() {
        let scaler = Scaler::fit(&sample_rows()).unwrap();
        for row in sample_rows() {
            let back = scaler.inverse(&scaler.transform(&row));
            for (a, b) in back.iter().zip(row.iter()) {
                assert!((a - b).abs() < 1e-9, "roundtrip {} vs {}", a, b);
            }
        }
    }

    #[test]
    fn test_transform_centers_and_scales() {
        let scaler = Scaler::fit(&sample_rows()).unwrap();
        let z = scaler.transform(&[2.5, 25.0, 0.25]);
        for v in z {
            assert!(v.abs() < 1e-9);
        }
    }

    #[test]
    fn test_constant_column_gets_floored_std() {
        let rows = vec![vec![7.0], vec![7.0], vec![7.0]];
        let scaler = Scaler::fit(&rows).unwrap();
        assert!(scaler.std[0] > 0.0);
        // Transform stays finite on a zero-variance column
        assert!(scaler.transform(&[7.0])[0].is_finite());
    }

    #[test]
    fn test_empty_fit_is_uninitialized_error() {
        let err = Scaler::fit(&[]).unwrap_err();
        assert!(matches!(err, BatcastError::ScalerNotFitted));
    }

    #[test]
    fn test_load_missing_is_uninitialized_error() {
        let err = Scaler::load("/nonexistent/path/scaler.json").unwrap_err();
        assert!(matches!(err, BatcastError::ScalerNotFitted));
    }

    #[test]
    fn test_save_load_roundtrip() {
        let scaler = Scaler::fit(&sample_rows()).unwrap();
        let path = std::env::temp_dir().join("batcast_scaler_test.json");
        scaler.save(&path).unwrap();
        let loaded = Scaler::load(&path).unwrap();
        assert_eq!(loaded.mean, scaler.mean);
        assert_eq!(loaded.std, scaler.std);
        let _ = std::fs::remove_file(&path);
    }
}

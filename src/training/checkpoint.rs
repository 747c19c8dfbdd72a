//! Checkpoint metadata and file layout
//!
//! A checkpoint is three files sharing a stem: `<stem>.mpk` (model
//! weights), `<stem>_optim.mpk` (optimizer state), and `<stem>.json`
//! (this metadata record). Inference reads only the model weights.

use crate::{BatcastError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Stem of the best-validation-loss checkpoint
pub const BEST_MODEL: &str = "best_model";

/// Scalar state persisted next to the weight records
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckpointMeta {
    pub epoch: usize,
    pub train_loss: f64,
    pub val_loss: Option<f64>,
}

impl CheckpointMeta {
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| BatcastError::Parse(format!("Failed to serialize checkpoint: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| BatcastError::Parse(format!("Failed to parse checkpoint: {}", e)))
    }
}

/// Stem for the periodic checkpoint of a given epoch
pub fn epoch_stem(model_dir: &str, epoch: usize) -> PathBuf {
    Path::new(model_dir).join(format!("epoch_{:04}", epoch))
}

/// Stem for the best-model checkpoint
pub fn best_stem(model_dir: &str) -> PathBuf {
    Path::new(model_dir).join(BEST_MODEL)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meta_roundtrip() {
        let meta = CheckpointMeta {
            epoch: 150,
            train_loss: 0.4321,
            val_loss: Some(0.5678),
        };
        let path = std::env::temp_dir().join("batcast_ckpt_meta_test.json");
        meta.save(&path).unwrap();
        let loaded = CheckpointMeta::load(&path).unwrap();
        assert_eq!(loaded, meta);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_meta_without_validation() {
        let meta = CheckpointMeta {
            epoch: 0,
            train_loss: 1.0,
            val_loss: None,
        };
        let path = std::env::temp_dir().join("batcast_ckpt_meta_noval_test.json");
        meta.save(&path).unwrap();
        assert_eq!(CheckpointMeta::load(&path).unwrap().val_loss, None);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_stems() {
        assert_eq!(
            epoch_stem("model", 50).to_string_lossy(),
            "model/epoch_0050"
        );
        assert_eq!(best_stem("model").to_string_lossy(), "model/best_model");
    }
}

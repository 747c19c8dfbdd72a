//! Training metrics and history tracking

use std::fmt;

/// Loss accumulated over one epoch
#[derive(Debug, Clone, Default)]
pub struct Metrics {
    /// Summed batch losses
    pub total_loss: f64,
    /// Number of examples seen
    pub total_examples: usize,
    /// Number of batches accumulated
    pub batch_count: usize,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one batch result
    pub fn update(&mut self, loss: f32, batch_size: usize) {
        self.total_loss += loss as f64;
        self.total_examples += batch_size;
        self.batch_count += 1;
    }

    /// Average loss per batch
    pub fn avg_loss(&self) -> f64 {
        if self.batch_count == 0 {
            0.0
        } else {
            self.total_loss / self.batch_count as f64
        }
    }
}

impl fmt::Display for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "loss: {:.4} ({} examples)", self.avg_loss(), self.total_examples)
    }
}

/// Training history for tracking progress
#[derive(Debug, Clone, Default)]
pub struct TrainingHistory {
    pub train_losses: Vec<f64>,
    pub val_losses: Vec<f64>,
    pub best_val_loss: f64,
    pub best_epoch: usize,
}

impl TrainingHistory {
    pub fn new() -> Self {
        Self {
            best_val_loss: f64::INFINITY,
            ..Default::default()
        }
    }

    /// Record metrics for an epoch. Validation is optional; a train-only
    /// run never updates the best-epoch tracking.
    pub fn record_epoch(&mut self, epoch: usize, train: &Metrics, val: Option<&Metrics>) {
        self.train_losses.push(train.avg_loss());
        if let Some(val) = val {
            self.val_losses.push(val.avg_loss());
            if val.avg_loss() < self.best_val_loss {
                self.best_val_loss = val.avg_loss();
                self.best_epoch = epoch;
            }
        }
    }

    /// Whether the given validation loss improves on the best seen so far
    pub fn improves(&self, val_loss: f64) -> bool {
        val_loss < self.best_val_loss
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_avg_loss() {
        let mut m = Metrics::new();
        assert_eq!(m.avg_loss(), 0.0);
        m.update(1.0, 512);
        m.update(0.5, 512);
        assert!((m.avg_loss() - 0.75).abs() < 1e-12);
        assert_eq!(m.total_examples, 1024);
    }

    #[test]
    fn test_history_tracks_best_epoch() {
        let mut h = TrainingHistory::new();
        let losses = [0.9, 0.7, 0.8, 0.6, 0.65];
        for (epoch, loss) in losses.iter().enumerate() {
            let mut train = Metrics::new();
            train.update(1.0, 10);
            let mut val = Metrics::new();
            val.update(*loss, 10);
            h.record_epoch(epoch, &train, Some(&val));
        }
        assert_eq!(h.best_epoch, 3);
        assert!((h.best_val_loss - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_train_only_history() {
        let mut h = TrainingHistory::new();
        let mut train = Metrics::new();
        train.update(0.4, 10);
        h.record_epoch(0, &train, None);
        assert_eq!(h.train_losses.len(), 1);
        assert!(h.val_losses.is_empty());
        assert_eq!(h.best_val_loss, f64::INFINITY);
    }
}

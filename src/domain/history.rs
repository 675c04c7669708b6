// ============================================================
// Layer 3 — Training History
// ============================================================
// Everything a run records for the final report:
//
//   per epoch: train loss, train accuracy, val loss, val accuracy
//   per step:  the learning rate used for that optimizer step
//
// Losses are per-sample means, accuracies are fractions in [0, 1].
// The report layer (Layer 6) plots these series.

use serde::{Deserialize, Serialize};

/// One row of metrics for a single training epoch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// The epoch number (starts at 1)
    pub epoch: usize,

    /// Mean cross-entropy over every training sample seen this epoch
    pub train_loss: f64,

    /// Fraction of training samples whose argmax matched the label
    pub train_acc: f64,

    /// Mean cross-entropy over the whole evaluation split
    pub val_loss: f64,

    /// Fraction of evaluation samples predicted correctly
    pub val_acc: f64,
}

impl EpochMetrics {
    pub fn new(
        epoch:      usize,
        train_loss: f64,
        train_acc:  f64,
        val_loss:   f64,
        val_acc:    f64,
    ) -> Self {
        Self { epoch, train_loss, train_acc, val_loss, val_acc }
    }

    /// Returns true if this epoch's val accuracy beats the previous best
    pub fn is_improvement(&self, best_val_acc: f64) -> bool {
        self.val_acc > best_val_acc
    }
}

/// Series collected over a full run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    pub epochs:        Vec<EpochMetrics>,
    /// Learning rate of every optimizer step, in order
    pub learning_rates: Vec<f64>,
}

impl TrainingHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_lr(&mut self, lr: f64) {
        self.learning_rates.push(lr);
    }

    pub fn record_epoch(&mut self, metrics: EpochMetrics) {
        self.epochs.push(metrics);
    }

    pub fn train_loss(&self) -> Vec<f64> {
        self.epochs.iter().map(|m| m.train_loss).collect()
    }

    pub fn val_loss(&self) -> Vec<f64> {
        self.epochs.iter().map(|m| m.val_loss).collect()
    }

    pub fn train_acc(&self) -> Vec<f64> {
        self.epochs.iter().map(|m| m.train_acc).collect()
    }

    pub fn val_acc(&self) -> Vec<f64> {
        self.epochs.iter().map(|m| m.val_acc).collect()
    }

    pub fn best_val_acc(&self) -> Option<f64> {
        self.epochs
            .iter()
            .map(|m| m.val_acc)
            .fold(None, |best, acc| match best {
                Some(b) if b >= acc => Some(b),
                _ => Some(acc),
            })
    }
}

/// Final figures of a run, printed and stamped on the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub history:           TrainingHistory,
    /// Highest resident memory observed during the run, in bytes
    pub peak_memory_bytes: u64,
    /// Whole seconds from the first step to the end of the last evaluation
    pub duration_secs:     u64,
}

impl RunSummary {
    pub fn peak_memory_gb(&self) -> f64 {
        self.peak_memory_bytes as f64 / 1e9
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_improvement() {
        let m = EpochMetrics::new(2, 1.1, 0.6, 1.2, 0.55);
        assert!(m.is_improvement(0.5));
        assert!(!m.is_improvement(0.6));
    }

    #[test]
    fn test_series_follow_epoch_order() {
        let mut h = TrainingHistory::new();
        h.record_epoch(EpochMetrics::new(1, 2.0, 0.1, 1.9, 0.2));
        h.record_epoch(EpochMetrics::new(2, 1.5, 0.4, 1.6, 0.35));
        assert_eq!(h.train_loss(), vec![2.0, 1.5]);
        assert_eq!(h.val_acc(),    vec![0.2, 0.35]);
        assert_eq!(h.best_val_acc(), Some(0.35));
    }

    #[test]
    fn test_empty_history_has_no_best() {
        assert_eq!(TrainingHistory::new().best_val_acc(), None);
    }

    #[test]
    fn test_peak_memory_in_gigabytes() {
        let s = RunSummary {
            history:           TrainingHistory::new(),
            peak_memory_bytes: 2_500_000_000,
            duration_secs:     12,
        };
        assert!((s.peak_memory_gb() - 2.5).abs() < 1e-12);
    }
}

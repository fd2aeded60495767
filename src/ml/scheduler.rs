// ============================================================
// Layer 5 — Learning-Rate Schedule
// ============================================================
// Multi-step decay, stepped once per epoch:
//
//   lr(epoch) = base_lr × gamma^(number of milestones ≤ epoch)
//
// e.g. base_lr=1e-4, milestones=[2,4,6], gamma=0.8
//   epochs 0-1 → 1e-4, 2-3 → 8e-5, 4-5 → 6.4e-5, 6+ → 5.12e-5
//
// The schedule is plain data, so its state dict is just the
// bincode encoding of the struct.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::traits::StateDict;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiStepLr {
    base_lr:    f64,
    milestones: Vec<usize>,
    gamma:      f64,
    /// Number of completed `step` calls
    last_epoch: usize,
}

impl MultiStepLr {
    pub fn new(base_lr: f64, mut milestones: Vec<usize>, gamma: f64) -> Self {
        milestones.sort_unstable();
        Self { base_lr, milestones, gamma, last_epoch: 0 }
    }

    /// Learning rate for the current epoch
    pub fn lr(&self) -> f64 {
        let decays = self.milestones.iter().filter(|&&m| m <= self.last_epoch).count();
        self.base_lr * self.gamma.powi(decays as i32)
    }

    /// Advance one epoch and return the new learning rate
    pub fn step(&mut self) -> f64 {
        self.last_epoch += 1;
        self.lr()
    }

    pub fn last_epoch(&self) -> usize {
        self.last_epoch
    }
}

impl StateDict for MultiStepLr {
    fn state_dict(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).context("Failed to encode scheduler state")
    }

    fn load_state_dict(&mut self, state: &[u8]) -> Result<()> {
        *self = bincode::deserialize(state).context("Failed to decode scheduler state")?;
        Ok(())
    }
}

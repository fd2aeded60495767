// ============================================================
// Layer 6 — Checkpoint Store
// ============================================================
// Saves and restores training state for one run id.
//
// What gets saved per checkpoint (one bincode file):
//   1. epoch           — the next epoch to run
//   2. best_metric     — best test F1 seen so far
//   3. model_state     — burn record bytes of the classifier
//   4. optimizer_state — burn record bytes of the optimizer
//   5. scheduler_state — serialised learning-rate schedule
//   6. amp_state       — mixed-precision state, if any
//
// Two variants live side by side:
//   task_test_checkpoint_<id>.bin   ← latest, rewritten each epoch
//   task_test_model_best_<id>.bin   ← best, rewritten on improvement
//
// Restore policy:
//   load_best && best exists → best
//   else latest exists       → latest
//   else                     → cold start (epoch 0, metric 0)
//
// A missing file is a cold start, never an error. A file that
// exists but does not decode is always an error.
//
// Restoration is all or nothing: each target's current state is
// captured first, and when one target rejects its blob the ones
// already restored are put back before the error is returned.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use crate::application::train_use_case::TrainConfig;
use crate::domain::traits::StateDict;
use crate::infra::paths::{write_atomic, RunPaths};

/// Everything persisted for a resumable run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub epoch:           usize,
    pub best_metric:     f64,
    pub model_state:     Vec<u8>,
    pub optimizer_state: Vec<u8>,
    pub scheduler_state: Vec<u8>,
    pub amp_state:       Option<Vec<u8>>,
}

/// Where training picks up after `load_state`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResumePoint {
    pub start_epoch: usize,
    pub best_metric: f64,
    pub amp_state:   Option<Vec<u8>>,
}

impl ResumePoint {
    pub fn is_cold_start(&self) -> bool {
        self.start_epoch == 0 && self.amp_state.is_none()
    }
}

/// Reads and writes the checkpoint files of one run.
pub struct CheckpointStore {
    paths: RunPaths,
}

impl CheckpointStore {
    pub fn new(paths: RunPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &RunPaths {
        &self.paths
    }

    /// Restore `model` (and `optimizer` / `scheduler` when given) from
    /// the snapshot selected by `load_best`.
    pub fn load_state(
        &self,
        model:     &mut dyn StateDict,
        optimizer: Option<&mut dyn StateDict>,
        scheduler: Option<&mut dyn StateDict>,
        load_best: bool,
    ) -> Result<ResumePoint> {
        let best_path   = self.paths.best_checkpoint();
        let latest_path = self.paths.latest_checkpoint();

        let checkpoint = if load_best && best_path.is_file() {
            let ckpt = read_checkpoint(&best_path)?;
            tracing::info!("Loaded best model.");
            ckpt
        } else if latest_path.is_file() {
            let ckpt = read_checkpoint(&latest_path)?;
            tracing::info!("Loaded checkpoint model.");
            ckpt
        } else {
            tracing::debug!(
                "No checkpoint for run {} under '{}', starting fresh",
                self.paths.model_no(),
                self.paths.base_dir().display()
            );
            return Ok(ResumePoint::default());
        };

        let mut targets: Vec<(&str, &mut dyn StateDict, &[u8])> =
            vec![("model", model, checkpoint.model_state.as_slice())];
        if let Some(optimizer) = optimizer {
            targets.push(("optimizer", optimizer, checkpoint.optimizer_state.as_slice()));
        }
        if let Some(scheduler) = scheduler {
            targets.push(("scheduler", scheduler, checkpoint.scheduler_state.as_slice()));
        }
        restore_all(&mut targets)?;

        tracing::info!("Loaded model and optimizer.");

        Ok(ResumePoint {
            start_epoch: checkpoint.epoch,
            best_metric: checkpoint.best_metric,
            amp_state:   checkpoint.amp_state,
        })
    }

    /// Write the latest snapshot, and the best snapshot too when
    /// `is_best` is set.
    pub fn save_state(&self, checkpoint: &Checkpoint, is_best: bool) -> Result<()> {
        let bytes = bincode::serialize(checkpoint)
            .context("Failed to encode checkpoint")?;

        write_atomic(&self.paths.latest_checkpoint(), &bytes)?;
        tracing::debug!("Saved checkpoint: epoch {}", checkpoint.epoch);

        if is_best {
            write_atomic(&self.paths.best_checkpoint(), &bytes)?;
            tracing::info!(
                "Saved best model (epoch {}, metric {:.4})",
                checkpoint.epoch,
                checkpoint.best_metric
            );
        }
        Ok(())
    }

    /// Save the training configuration to JSON so `evaluate` can
    /// rebuild the exact architecture.
    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        let path = self.paths.train_config();
        let json = serde_json::to_string_pretty(cfg)?;
        write_atomic(&path, json.as_bytes())?;
        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }

    pub fn load_config(&self) -> Result<TrainConfig> {
        let path = self.paths.train_config();

        let json = fs::read_to_string(&path).with_context(|| {
            format!(
                "Cannot read config from '{}'. \
                 Make sure you have run 'train' for run {} first.",
                path.display(),
                self.paths.model_no()
            )
        })?;

        serde_json::from_str(&json)
            .with_context(|| format!("Malformed config '{}'", path.display()))
    }
}

/// Load every target from its blob, or none of them.
fn restore_all(targets: &mut [(&str, &mut dyn StateDict, &[u8])]) -> Result<()> {
    let backups = targets
        .iter()
        .map(|(_, target, _)| target.state_dict())
        .collect::<Result<Vec<_>>>()?;

    for i in 0..targets.len() {
        let (what, target, blob) = &mut targets[i];
        if let Err(err) = target.load_state_dict(*blob) {
            let err = err.context(format!("Checkpoint {what} state does not match the {what}"));
            for ((_, restored, _), backup) in targets[..i].iter_mut().zip(&backups) {
                restored
                    .load_state_dict(backup)
                    .context("Failed to roll back a partially restored checkpoint")?;
            }
            return Err(err);
        }
    }
    Ok(())
}

fn read_checkpoint(path: &Path) -> Result<Checkpoint> {
    let bytes = fs::read(path)
        .with_context(|| format!("Cannot read checkpoint '{}'", path.display()))?;

    bincode::deserialize(&bytes)
        .with_context(|| format!("Corrupt checkpoint '{}'", path.display()))
}

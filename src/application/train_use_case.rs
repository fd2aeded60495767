// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Install / load relation map (Layer 6 - infra)
//   Step 2: Load + validate samples     (Layer 4 - data)
//   Step 3: Resolve the test set        (Layer 4 - data)
//   Step 4: Build datasets              (Layer 4 - data)
//   Step 5: Save config                 (Layer 6 - infra)
//   Step 6: Run the resumable loop      (Layer 5 - ml)
//
// Reference: Rust Book §13 (Iterators and Closures)
//            Burn Book §5 (Training)

use anyhow::Result;
use burn::{data::dataset::Dataset, tensor::backend::AutodiffBackend};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::data::{dataset::RelationDataset, loader::JsonlLoader, splitter::split_train_test};
use crate::domain::{relation::RelationMap, sample::RelationSample, traits::SampleSource};
use crate::infra::{checkpoint::CheckpointStore, paths::RunPaths, relation_store::RelationStore};
use crate::ml::trainer::{run_training, TrainSummary};

// ─── Training Configuration ──────────────────────────────────────────────────
// All hyperparameters for a training run.
// Saved next to the checkpoints (train_config_<id>.json) so that
// `evaluate` can rebuild the exact architecture and test split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    /// JSON Lines file with the training samples
    pub train_path:     PathBuf,
    /// Separate test set; when absent the training file is split
    pub test_path:      Option<PathBuf>,
    /// Directory holding checkpoints, buffers and relations.json
    pub base_dir:       PathBuf,
    /// Relation map copied into base_dir before training; when
    /// absent the one already in base_dir is used
    pub relations_path: Option<PathBuf>,
    pub model_no:       u32,
    pub seed:           u64,
    pub train_fraction: f64,
    pub batch_size:     usize,
    pub epochs:         usize,
    pub lr:             f64,
    pub milestones:     Vec<usize>,
    pub gamma:          f64,
    /// Gradient norm clipping; None disables it
    pub grad_clip:      Option<f32>,
    pub d_model:        usize,
    pub num_heads:      usize,
    pub num_layers:     usize,
    pub d_ff:           usize,
    pub dropout:        f64,
    pub vocab_size:     usize,
    pub max_seq_len:    usize,
    pub pad_id:         u32,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            train_path:     PathBuf::from("data/train.jsonl"),
            test_path:      None,
            base_dir:       PathBuf::from("data"),
            relations_path: None,
            model_no:       0,
            seed:           42,
            train_fraction: 0.9,
            batch_size:     32,
            epochs:         11,
            lr:             7e-5,
            milestones:     vec![2, 4, 6, 8, 12, 15, 18, 20, 22, 24, 26, 30],
            gamma:          0.8,
            grad_clip:      Some(1.0),
            d_model:        256,
            num_heads:      8,
            num_layers:     6,
            d_ff:           1024,
            dropout:        0.1,
            vocab_size:     30522,
            max_seq_len:    512,
            pad_id:         0,
        }
    }
}

impl TrainConfig {
    pub fn run_paths(&self) -> RunPaths {
        RunPaths::new(&self.base_dir, self.model_no)
    }
}

/// Relation map of the run. An explicitly given map is installed
/// as the run directory's relations.json, so `evaluate` later reads
/// the same names.
pub fn resolve_relations(cfg: &TrainConfig) -> Result<RelationMap> {
    let installed = RelationStore::new(cfg.run_paths().relations());

    match &cfg.relations_path {
        Some(path) => {
            let relations = RelationStore::new(path).load()?;
            installed.save(&relations)?;
            tracing::info!("Installed relation map from '{}'", path.display());
            Ok(relations)
        }
        None => installed.load(),
    }
}

/// Load the training samples and resolve the test set: the
/// configured test file when there is one, otherwise a seeded
/// split of the training file. The same config always yields
/// the same split.
pub fn load_splits(
    cfg:       &TrainConfig,
    relations: &RelationMap,
) -> Result<(Vec<RelationSample>, Vec<RelationSample>)> {
    let loader = |path: &PathBuf| {
        JsonlLoader::new(path, cfg.max_seq_len, cfg.vocab_size, relations.num_classes())
    };
    let samples = loader(&cfg.train_path).load_all()?;

    match &cfg.test_path {
        Some(path) => Ok((samples, loader(path).load_all()?)),
        None => Ok(split_train_test(samples, cfg.train_fraction, cfg.seed)),
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
// Owns the config and runs the full training pipeline.
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Execute the full training pipeline end to end
    pub fn execute<B: AutodiffBackend>(&self, device: B::Device) -> Result<TrainSummary> {
        let cfg   = &self.config;
        let paths = cfg.run_paths();

        // ── Step 1: Relation map ──────────────────────────────────────────────
        let relations = resolve_relations(cfg)?;

        // ── Step 2 + 3: Samples and test set ──────────────────────────────────
        let (train_samples, test_samples) = load_splits(cfg, &relations)?;
        if test_samples.is_empty() {
            anyhow::bail!("Test set is empty; lower --train-fraction or pass --test-path");
        }

        // ── Step 4: Build Burn datasets ───────────────────────────────────────
        let train_dataset = RelationDataset::new(train_samples);
        let test_dataset  = RelationDataset::new(test_samples);
        tracing::info!(
            "Split: {} train ({} labelled), {} test ({} labelled)",
            train_dataset.len(),
            train_dataset.labelled_count(),
            test_dataset.len(),
            test_dataset.labelled_count()
        );

        // ── Step 5: Save config for evaluation ────────────────────────────────
        let store = CheckpointStore::new(paths);
        store.save_config(cfg)?;

        // ── Step 6: Run training loop (Layer 5) ───────────────────────────────
        run_training::<B>(cfg, relations, train_dataset, test_dataset, &store, device)
    }
}

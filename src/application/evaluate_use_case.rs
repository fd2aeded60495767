// ============================================================
// Layer 2 — EvaluateUseCase
// ============================================================
// Re-scores a trained run on its test set:
//
//   Step 1: Load the saved TrainConfig  (Layer 6 - infra)
//   Step 2: Load the relation map       (Layer 6 - infra)
//   Step 3: Rebuild the model           (Layer 5 - ml)
//   Step 4: Restore best / latest state (Layer 6 - infra)
//   Step 5: Resolve the test set        (Layer 4 - data)
//   Step 6: Evaluate                    (Layer 5 - ml)

use anyhow::Result;
use burn::{data::dataloader::DataLoaderBuilder, prelude::*};
use std::path::PathBuf;

use crate::application::train_use_case::load_splits;
use crate::data::{
    batcher::RelationBatcher, dataset::RelationDataset, loader::JsonlLoader,
};
use crate::domain::{metrics::EvaluationOutcome, traits::SampleSource};
use crate::infra::{checkpoint::CheckpointStore, paths::RunPaths, relation_store::RelationStore};
use crate::ml::{
    evaluator::Evaluator,
    model::{RelationClassifier, RelationClassifierConfig},
    state::ModuleState,
};

pub struct EvaluateUseCase {
    paths:     RunPaths,
    /// Overrides the run's own test set
    data_path: Option<PathBuf>,
    load_best: bool,
}

impl EvaluateUseCase {
    pub fn new(paths: RunPaths, data_path: Option<PathBuf>, load_best: bool) -> Self {
        Self { paths, data_path, load_best }
    }

    pub fn execute<B: Backend>(&self, device: B::Device) -> Result<EvaluationOutcome> {
        let store     = CheckpointStore::new(self.paths.clone());
        let cfg       = store.load_config()?;
        let relations = RelationStore::new(self.paths.relations()).load()?;

        // Dropout is inactive on a backend without autodiff
        let model_cfg = RelationClassifierConfig::new(
            cfg.vocab_size, cfg.max_seq_len, relations.num_classes(),
            cfg.d_model, cfg.num_heads, cfg.num_layers, cfg.d_ff, cfg.dropout,
        );
        let mut model = ModuleState::<B, RelationClassifier<B>>::new(
            model_cfg.init(&device),
            device.clone(),
        );

        let resume = store.load_state(&mut model, None, None, self.load_best)?;
        if resume.is_cold_start() {
            anyhow::bail!(
                "No checkpoint for run {} under '{}'",
                self.paths.model_no(),
                self.paths.base_dir().display()
            );
        }
        tracing::info!("Evaluating run {} after {} epochs", self.paths.model_no(), resume.start_epoch);

        let test_samples = match &self.data_path {
            Some(path) => {
                JsonlLoader::new(path, cfg.max_seq_len, cfg.vocab_size, relations.num_classes())
                    .load_all()?
            }
            None => load_splits(&cfg, &relations)?.1,
        };

        let test_loader = DataLoaderBuilder::new(RelationBatcher::<B>::new(device, cfg.pad_id))
            .batch_size(cfg.batch_size)
            .num_workers(1)
            .build(RelationDataset::new(test_samples));

        // Batches are built directly on `device`, so no transfer is needed
        Evaluator::new(relations).evaluate_inference::<B, _, _>(
            &model.module,
            test_loader.iter(),
            cfg.pad_id,
            None,
        )
    }
}

// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Resumable train + evaluate loop using Burn's DataLoader and Adam.
//
// Per run id:
//   1. restore model / optimizer / scheduler from the latest
//      checkpoint (cold start when none exists)
//   2. restore the nine per-epoch metric buffers
//   3. for each remaining epoch
//        train    → mean loss, mean batch accuracy
//        evaluate → Evaluator on model.valid()
//        append one EpochRecord, save the buffers
//        save latest checkpoint (and best when test F1 improves)
//        step the learning-rate schedule
//
// Key Burn insight:
//   - Training uses B (an AutodiffBackend) for gradients
//   - model.valid() returns the model on B::InnerBackend
//   - the test batcher must also use B::InnerBackend
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use anyhow::Result;
use burn::{
    data::dataloader::DataLoaderBuilder,
    grad_clipping::GradientClippingConfig,
    nn::loss::CrossEntropyLossConfig,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::application::train_use_case::TrainConfig;
use crate::data::{batcher::RelationBatcher, dataset::RelationDataset};
use crate::domain::{relation::RelationMap, sample::IGNORE_LABEL, traits::StateDict};
use crate::infra::{
    checkpoint::{Checkpoint, CheckpointStore},
    metrics::{load_results, save_results, EpochRecord, ResultsBuffer},
};
use crate::ml::{
    evaluator::{evaluate_batch, Evaluator},
    model::{RelationClassifier, RelationClassifierConfig, RelationInput},
    scheduler::MultiStepLr,
    state::{ModuleState, OptimizerState},
};

/// What a finished (or already complete) run leaves behind.
#[derive(Debug, Clone)]
pub struct TrainSummary {
    pub epochs_run:  usize,
    pub best_metric: f64,
    pub results:     ResultsBuffer,
}

pub fn run_training<B: AutodiffBackend>(
    cfg:          &TrainConfig,
    relations:    RelationMap,
    train_data:   RelationDataset,
    test_data:    RelationDataset,
    store:        &CheckpointStore,
    device:       B::Device,
) -> Result<TrainSummary> {
    tracing::info!("Using device: {:?}", device);

    // ── Build model ───────────────────────────────────────────────────────────
    let model_cfg = RelationClassifierConfig::new(
        cfg.vocab_size, cfg.max_seq_len, relations.num_classes(),
        cfg.d_model, cfg.num_heads, cfg.num_layers, cfg.d_ff, cfg.dropout,
    );
    let mut model = ModuleState::<B, RelationClassifier<B>>::new(
        model_cfg.init(&device),
        device.clone(),
    );
    tracing::info!(
        "Model ready: {} layers, d_model={}, {} classes",
        cfg.num_layers, cfg.d_model, relations.num_classes()
    );

    // ── Adam optimiser ────────────────────────────────────────────────────────
    // m = β1*m + (1-β1)*g        (mean)
    // v = β2*v + (1-β2)*g²       (variance)
    // θ = θ - lr * m / (√v + ε)  (update)
    let mut optim_cfg = AdamConfig::new().with_epsilon(1e-8);
    if let Some(max_norm) = cfg.grad_clip {
        optim_cfg = optim_cfg.with_grad_clipping(Some(GradientClippingConfig::Norm(max_norm)));
    }
    let mut optim = OptimizerState::<B, RelationClassifier<B>, _>::new(
        optim_cfg.init::<B, RelationClassifier<B>>(),
        device.clone(),
    );
    let mut scheduler = MultiStepLr::new(cfg.lr, cfg.milestones.clone(), cfg.gamma);

    // ── Resume ────────────────────────────────────────────────────────────────
    let resume = store.load_state(
        &mut model,
        Some(&mut optim as &mut dyn StateDict),
        Some(&mut scheduler as &mut dyn StateDict),
        false,
    )?;
    let mut results = load_results(store.paths())?;
    let mut best_metric = resume.best_metric;

    if results.len() != resume.start_epoch {
        tracing::warn!(
            "Metric history has {} epochs but the checkpoint resumes at epoch {}",
            results.len(),
            resume.start_epoch
        );
    }
    if resume.start_epoch >= cfg.epochs {
        tracing::info!("Run {} already trained for {} epochs", store.paths().model_no(), cfg.epochs);
        return Ok(TrainSummary { epochs_run: 0, best_metric, results });
    }

    // ── Training data loader (AutodiffBackend) ────────────────────────────────
    let train_batcher = RelationBatcher::<B>::new(device.clone(), cfg.pad_id);
    let train_loader  = DataLoaderBuilder::new(train_batcher)
        .batch_size(cfg.batch_size)
        .shuffle(cfg.seed)
        .num_workers(1)
        .build(train_data.labelled_only());

    // ── Test data loader (InnerBackend — no autodiff overhead) ────────────────
    let test_batcher = RelationBatcher::<B::InnerBackend>::new(device.clone(), cfg.pad_id);
    let test_loader  = DataLoaderBuilder::new(test_batcher)
        .batch_size(cfg.batch_size)
        .num_workers(1)
        .build(test_data);

    let evaluator = Evaluator::new(relations);
    let loss_fn   = CrossEntropyLossConfig::new().init(&device);

    // ── Epoch loop ────────────────────────────────────────────────────────────
    tracing::info!("Starting training process...");
    for epoch in resume.start_epoch..cfg.epochs {
        let lr = scheduler.lr();

        // ── Training phase ────────────────────────────────────────────────────
        let mut loss_sum     = 0.0f64;
        let mut accuracy_sum = 0.0f64;
        let mut batches      = 0usize;

        for batch in train_loader.iter() {
            let [batch_size, seq_len] = batch.input_ids.dims();
            let attention_mask = batch.input_ids.clone().not_equal_elem(cfg.pad_id as i64).float();
            let token_type_ids = Tensor::<B, 2, Int>::zeros([batch_size, seq_len], &device);

            let logits = model.module.forward(RelationInput {
                input_ids: batch.input_ids,
                token_type_ids,
                attention_mask,
                e1_e2_start: batch.e1_e2_start,
            });
            let loss = loss_fn.forward(logits.clone(), batch.labels.clone());

            loss_sum     += loss.clone().into_scalar().elem::<f64>();
            accuracy_sum += evaluate_batch(logits.detach(), batch.labels, IGNORE_LABEL).accuracy();
            batches      += 1;

            // Backward pass + Adam update
            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model.module);
            model.module = optim.optim.step(lr, model.module, grads);
        }

        let (train_loss, train_accuracy) = if batches > 0 {
            (loss_sum / batches as f64, accuracy_sum / batches as f64)
        } else {
            (f64::NAN, 0.0)
        };

        // ── Evaluation phase ──────────────────────────────────────────────────
        let outcome = evaluator.evaluate_results::<B, _, _>(
            &model.module,
            test_loader.iter(),
            cfg.pad_id,
            None,
        )?;

        results.push_epoch(EpochRecord {
            train_loss,
            train_accuracy,
            test_f1:       outcome.results.f1,
            f1_micro:      outcome.micro.f1,
            f1_macro:      outcome.macro_avg.f1,
            test_accuracy: outcome.label_accuracy,
            micro:         outcome.micro,
            macro_avg:     outcome.macro_avg,
            report:        outcome.report,
        });
        save_results(store.paths(), &results)?;

        tracing::info!(
            "Epoch {:>3}/{} | loss={:.4} | train_acc={:.3} | test_f1={:.3} | test_acc={:.3} | lr={:.2e}",
            epoch + 1, cfg.epochs, train_loss, train_accuracy,
            outcome.results.f1, outcome.label_accuracy, lr,
        );

        // ── Checkpoint ────────────────────────────────────────────────────────
        scheduler.step();
        let is_best = outcome.results.f1 > best_metric;
        if is_best {
            best_metric = outcome.results.f1;
        }
        let checkpoint = Checkpoint {
            epoch:           epoch + 1,
            best_metric,
            model_state:     model.state_dict()?,
            optimizer_state: optim.state_dict()?,
            scheduler_state: scheduler.state_dict()?,
            amp_state:       resume.amp_state.clone(),
        };
        store.save_state(&checkpoint, is_best)?;
    }

    tracing::info!("Finished Training!");
    Ok(TrainSummary {
        epochs_run: cfg.epochs - resume.start_epoch,
        best_metric,
        results,
    })
}

// ============================================================
// Layer 5 — Evaluator
// ============================================================
// Runs a held-out set through a relation model and scores it.
//
// One pass, in iteration order, no retries:
//
//   for each batch
//     attention_mask = input_ids != pad_id
//     token_type_ids = zeros
//     (optionally) move tensors to the accelerator
//     logits  = model.forward_relations(...)
//     predict = argmax(logits)
//     keep positions whose label != IGNORE_LABEL
//     batch accuracy = correct / eligible   (0 when none eligible)
//
//   accuracy        = mean of batch accuracies
//   sequence scores = span P/R/F1 over the per-batch label lists
//   report          = per-class breakdown, re-keyed id → name
//   micro / macro   = flat P/R/F1, computed independently
//   label accuracy  = flat correct / eligible over the whole set
//
// Key Burn insight (same as the trainer):
//   - model.valid() returns the module on the inner backend
//   - batches fed to it must already live on that inner backend
//   - argmax(1) returns [batch, 1], so flatten before reading
//
// Reference: Burn Book §5 (Inference)

use anyhow::Result;
use burn::{module::AutodiffModule, prelude::*, tensor::backend::AutodiffBackend};
use thiserror::Error;

use crate::data::batcher::RelationBatch;
use crate::domain::{
    metrics::{EvaluationOutcome, LabelMetrics, SequenceMetrics},
    relation::RelationMap,
    sample::IGNORE_LABEL,
};
use crate::ml::model::{RelationInput, RelationModel};
use crate::ml::scoring::{self, Average};

#[derive(Error, Debug, PartialEq)]
pub enum EvalError {
    #[error("test set produced no batches")]
    EmptyTestSet,
}

// ─── BatchOutcome ─────────────────────────────────────────────────────────────
/// Per-batch correctness after dropping ignored positions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutcome {
    pub correct:   usize,
    pub eligible:  usize,
    /// Predicted ids at the eligible positions
    pub predicted: Vec<i64>,
    /// True ids at the eligible positions
    pub truth:     Vec<i64>,
}

impl BatchOutcome {
    /// Compare predictions with labels, skipping every position whose
    /// label equals `ignore`.
    pub fn score(predicted: &[i64], labels: &[i64], ignore: i64) -> Self {
        let mut outcome = Self::default();
        for (&p, &l) in predicted.iter().zip(labels) {
            if l == ignore {
                continue;
            }
            outcome.eligible += 1;
            if p == l {
                outcome.correct += 1;
            }
            outcome.predicted.push(p);
            outcome.truth.push(l);
        }
        outcome
    }

    /// correct / eligible, or 0 when nothing was eligible
    pub fn accuracy(&self) -> f64 {
        if self.eligible == 0 {
            return 0.0;
        }
        self.correct as f64 / self.eligible as f64
    }
}

/// Argmax the logits and score them against `labels`.
pub fn evaluate_batch<B: Backend>(
    logits: Tensor<B, 2>,
    labels: Tensor<B, 1, Int>,
    ignore: i64,
) -> BatchOutcome {
    // argmax(1) → [batch, 1]; flatten to [batch]
    let predicted: Vec<i64> = logits
        .argmax(1)
        .flatten::<1>(0, 1)
        .into_data()
        .iter::<i64>()
        .collect();
    let labels: Vec<i64> = labels.into_data().iter::<i64>().collect();

    BatchOutcome::score(&predicted, &labels, ignore)
}

// ─── Evaluator ────────────────────────────────────────────────────────────────
pub struct Evaluator {
    relations: RelationMap,
}

impl Evaluator {
    pub fn new(relations: RelationMap) -> Self {
        Self { relations }
    }

    /// Evaluate a training-mode model. The model is switched to its
    /// inference form first, which disables dropout and gradient
    /// tracking; batches must already be on the inner backend.
    pub fn evaluate_results<B, M, I>(
        &self,
        model:   &M,
        batches: I,
        pad_id:  u32,
        device:  Option<&<B::InnerBackend as Backend>::Device>,
    ) -> Result<EvaluationOutcome>
    where
        B: AutodiffBackend,
        M: AutodiffModule<B>,
        M::InnerModule: RelationModel<B::InnerBackend>,
        I: IntoIterator<Item = RelationBatch<B::InnerBackend>>,
    {
        let model = model.valid();
        self.evaluate_inference(&model, batches, pad_id, device)
    }

    /// Evaluate a model that is already in inference form.
    pub fn evaluate_inference<B, M, I>(
        &self,
        model:   &M,
        batches: I,
        pad_id:  u32,
        device:  Option<&B::Device>,
    ) -> Result<EvaluationOutcome>
    where
        B: Backend,
        M: RelationModel<B>,
        I: IntoIterator<Item = RelationBatch<B>>,
    {
        tracing::info!("Evaluating test samples...");

        let mut accuracy_sum = 0.0f64;
        let mut batch_count  = 0usize;
        let mut out_labels:  Vec<Vec<String>> = Vec::new();
        let mut true_labels: Vec<Vec<String>> = Vec::new();

        for batch in batches {
            let RelationBatch { input_ids, e1_e2_start, labels } = batch;
            let [batch_size, seq_len] = input_ids.dims();

            let attention_mask = input_ids.clone().not_equal_elem(pad_id as i64).float();
            let token_type_ids =
                Tensor::<B, 2, Int>::zeros([batch_size, seq_len], &input_ids.device());

            let mut input = RelationInput { input_ids, token_type_ids, attention_mask, e1_e2_start };
            let mut labels = labels;
            if let Some(device) = device {
                input  = input.to_device(device);
                labels = labels.to_device(device);
            }

            let logits  = model.forward_relations(input);
            let outcome = evaluate_batch(logits, labels, IGNORE_LABEL);
            tracing::debug!(
                "batch {}: {}/{} correct",
                batch_count,
                outcome.correct,
                outcome.eligible
            );

            accuracy_sum += outcome.accuracy();
            batch_count  += 1;
            out_labels.push(outcome.predicted.iter().map(i64::to_string).collect());
            true_labels.push(outcome.truth.iter().map(i64::to_string).collect());
        }

        if batch_count == 0 {
            return Err(EvalError::EmptyTestSet.into());
        }

        let spans   = scoring::sequence_scores(&true_labels, &out_labels);
        let results = SequenceMetrics {
            accuracy:  accuracy_sum / batch_count as f64,
            precision: spans.precision,
            recall:    spans.recall,
            f1:        spans.f1,
        };

        let flat_true: Vec<String> = true_labels.into_iter().flatten().collect();
        let flat_pred: Vec<String> = out_labels.into_iter().flatten().collect();
        tracing::debug!("Labels seen: {:?}", scoring::label_set(&flat_true, &flat_pred));

        let report = scoring::classification_report(&flat_true, &flat_pred)
            .with_relation_names(&self.relations)?;
        let micro     = scoring::precision_recall_fscore(&flat_true, &flat_pred, Average::Micro);
        let macro_avg = scoring::precision_recall_fscore(&flat_true, &flat_pred, Average::Macro);
        let label_accuracy = scoring::accuracy_score(&flat_true, &flat_pred);

        log_summary(&results, &micro, &macro_avg);

        Ok(EvaluationOutcome { results, micro, macro_avg, label_accuracy, report })
    }
}

fn log_summary(results: &SequenceMetrics, micro: &LabelMetrics, macro_avg: &LabelMetrics) {
    tracing::info!("***** Eval results *****");
    tracing::info!("accuracy (training) = {:.3}", results.accuracy);
    tracing::info!("test f1(micro, macro) = ({:.3},{:.3})", micro.f1, macro_avg.f1);
    tracing::info!(
        "test precision(micro, macro) = ({:.3},{:.3})",
        micro.precision,
        macro_avg.precision
    );
    tracing::info!("test recall(micro, macro) = ({:.3},{:.3})", micro.recall, macro_avg.recall);
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::metrics::{MetricsError, MACRO_AVG_KEY};
    use crate::ml::model::RelationClassifierConfig;
    use burn::backend::{Autodiff, NdArray};
    use burn::tensor::TensorData;

    type TestBackend = NdArray<f32>;

    /// Predicts the class named by each row's first token id.
    struct FirstTokenModel {
        num_classes: usize,
    }

    impl<B: Backend> RelationModel<B> for FirstTokenModel {
        fn forward_relations(&self, input: RelationInput<B>) -> Tensor<B, 2> {
            let [batch_size, seq_len] = input.input_ids.dims();
            let device = input.input_ids.device();
            let ids: Vec<i64> = input.input_ids.into_data().iter::<i64>().collect();

            let mut logits = vec![0.0f32; batch_size * self.num_classes];
            for row in 0..batch_size {
                let class = ids[row * seq_len] as usize;
                logits[row * self.num_classes + class] = 1.0;
            }
            Tensor::from_data(TensorData::new(logits, [batch_size, self.num_classes]), &device)
        }
    }

    fn batch(ids: [i32; 4], labels: [i32; 2]) -> RelationBatch<TestBackend> {
        let device = Default::default();
        RelationBatch {
            input_ids: Tensor::<TestBackend, 1, Int>::from_ints(ids.as_slice(), &device)
                .reshape([2, 2]),
            e1_e2_start: Tensor::<TestBackend, 1, Int>::from_ints([0, 1, 0, 1].as_slice(), &device)
                .reshape([2, 2]),
            labels: Tensor::<TestBackend, 1, Int>::from_ints(labels.as_slice(), &device),
        }
    }

    fn relations() -> RelationMap {
        RelationMap::from_names(["Other", "Cause-Effect(e1,e2)\n", "Member-Collection(e2,e1)"])
    }

    #[test]
    fn test_batch_ignores_sentinel_positions() {
        let outcome = BatchOutcome::score(&[1, 0, 9, 2], &[1, 1, -1, 2], IGNORE_LABEL);
        assert_eq!(outcome.eligible, 3);
        assert_eq!(outcome.correct, 2);
        assert!((outcome.accuracy() - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(outcome.truth, vec![1, 1, 2]);
        assert_eq!(outcome.predicted, vec![1, 0, 2]);
    }

    #[test]
    fn test_all_ignored_batch_scores_zero() {
        let outcome = BatchOutcome::score(&[0, 1], &[-1, -1], IGNORE_LABEL);
        assert_eq!(outcome.eligible, 0);
        assert_eq!(outcome.accuracy(), 0.0);
    }

    #[test]
    fn test_single_eligible_label_is_plain_ratio() {
        assert_eq!(BatchOutcome::score(&[3], &[3], IGNORE_LABEL).accuracy(), 1.0);
        assert_eq!(BatchOutcome::score(&[2], &[3], IGNORE_LABEL).accuracy(), 0.0);
    }

    #[test]
    fn test_evaluate_batch_argmaxes_logits() {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 2>::from_data(
            TensorData::new(vec![0.1f32, 0.9, 0.8, 0.2, 0.3, 0.7], [3, 2]),
            &device,
        );
        let labels = Tensor::<TestBackend, 1, Int>::from_ints([1, 1, -1].as_slice(), &device);

        let outcome = evaluate_batch(logits, labels, IGNORE_LABEL);
        assert_eq!(outcome.predicted, vec![1, 0]);
        assert_eq!(outcome.correct, 1);
    }

    #[test]
    fn test_two_batches_average_per_batch() {
        let evaluator = Evaluator::new(relations());
        let model     = FirstTokenModel { num_classes: 3 };
        // batch 1: both right; batch 2: one of two right
        let batches = vec![batch([1, 5, 2, 5], [1, 2]), batch([0, 5, 2, 5], [1, 2])];

        let outcome = evaluator
            .evaluate_inference::<TestBackend, _, _>(&model, batches, 0, None)
            .unwrap();

        assert!((outcome.results.accuracy - 0.75).abs() < 1e-12);
        assert!((outcome.label_accuracy - 0.75).abs() < 1e-12);
        assert!((outcome.report.accuracy - 0.75).abs() < 1e-12);

        let keys: Vec<&str> = outcome.report.classes.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["Cause-Effect(e1,e2)", "Member-Collection(e2,e1)", "Other"]);
        assert!(outcome.report.row(MACRO_AVG_KEY).is_some());
    }

    #[test]
    fn test_empty_test_set_is_error() {
        let evaluator = Evaluator::new(relations());
        let model     = FirstTokenModel { num_classes: 3 };

        let err = evaluator
            .evaluate_inference::<TestBackend, _, _>(&model, Vec::new(), 0, None)
            .unwrap_err();
        assert_eq!(err.downcast_ref::<EvalError>(), Some(&EvalError::EmptyTestSet));
    }

    #[test]
    fn test_unknown_relation_id_is_error() {
        let evaluator = Evaluator::new(RelationMap::from_names(["Other", "Cause-Effect(e1,e2)"]));
        let model     = FirstTokenModel { num_classes: 3 };

        let err = evaluator
            .evaluate_inference::<TestBackend, _, _>(&model, vec![batch([1, 5, 2, 5], [1, 2])], 0, None)
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<MetricsError>(),
            Some(&MetricsError::UnknownRelation(2))
        );
    }

    #[test]
    fn test_autodiff_model_is_evaluated_in_inference_form() {
        let device = Default::default();
        let model  = RelationClassifierConfig::new(16, 8, 3, 8, 2, 1, 16, 0.1)
            .init::<Autodiff<TestBackend>>(&device);
        let evaluator = Evaluator::new(relations());

        let outcome = evaluator
            .evaluate_results::<Autodiff<TestBackend>, _, _>(
                &model,
                vec![batch([1, 5, 2, 5], [0, 2]), batch([3, 4, 1, 6], [1, -1])],
                0,
                None,
            )
            .unwrap();

        assert!((0.0..=1.0).contains(&outcome.results.accuracy));
        assert!((0.0..=1.0).contains(&outcome.micro.f1));
    }
}

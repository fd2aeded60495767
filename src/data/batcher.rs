// ============================================================
// Layer 4 — Relation Batcher
// ============================================================
// Implements Burn's Batcher trait to turn a Vec<RelationSample>
// into tensors.
//
// Samples arrive unpadded, so each batch is padded to its own
// longest sequence with the tokenizer's pad id:
//
//   [101, 7, 8, 102]          → [101, 7, 8, 102, 0, 0]
//   [101, 4, 5, 6, 9, 102]    → [101, 4, 5, 6, 9, 102]
//
// The attention mask and token type ids are derived later from
// input_ids by the consumer, so they are not built here.
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::domain::sample::RelationSample;

// ─── RelationBatch ────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct RelationBatch<B: Backend> {
    /// Padded token ids — shape: [batch_size, max_len]
    pub input_ids: Tensor<B, 2, Int>,

    /// Entity marker positions — shape: [batch_size, 2]
    pub e1_e2_start: Tensor<B, 2, Int>,

    /// Relation labels — shape: [batch_size]
    pub labels: Tensor<B, 1, Int>,
}

// ─── RelationBatcher ──────────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct RelationBatcher<B: Backend> {
    pub device: B::Device,
    pub pad_id: u32,
}

impl<B: Backend> RelationBatcher<B> {
    pub fn new(device: B::Device, pad_id: u32) -> Self {
        Self { device, pad_id }
    }
}

impl<B: Backend> Batcher<RelationSample, RelationBatch<B>> for RelationBatcher<B> {
    fn batch(&self, items: Vec<RelationSample>) -> RelationBatch<B> {
        let batch_size = items.len();
        let max_len    = items.iter().map(RelationSample::len).max().unwrap_or(0);

        // ── Flatten + pad input_ids ───────────────────────────────────────────
        let input_flat: Vec<i32> = items
            .iter()
            .flat_map(|s| {
                s.input_ids
                    .iter()
                    .map(|&x| x as i32)
                    .chain(std::iter::repeat(self.pad_id as i32))
                    .take(max_len)
            })
            .collect();

        let starts: Vec<i32> = items
            .iter()
            .flat_map(|s| s.e1_e2_start.map(|p| p as i32))
            .collect();

        let labels: Vec<i32> = items.iter().map(|s| s.label as i32).collect();

        let input_ids = Tensor::<B, 1, Int>::from_ints(
            input_flat.as_slice(), &self.device
        ).reshape([batch_size, max_len]);

        let e1_e2_start = Tensor::<B, 1, Int>::from_ints(
            starts.as_slice(), &self.device
        ).reshape([batch_size, 2]);

        let labels = Tensor::<B, 1, Int>::from_ints(labels.as_slice(), &self.device);

        RelationBatch { input_ids, e1_e2_start, labels }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    fn ints<const D: usize>(t: Tensor<TestBackend, D, Int>) -> Vec<i64> {
        t.into_data().iter::<i64>().collect()
    }

    #[test]
    fn test_pads_to_longest_sample() {
        let batcher = RelationBatcher::<TestBackend>::new(Default::default(), 0);
        let batch = batcher.batch(vec![
            RelationSample::new(vec![101, 7, 8, 102], [1, 2], 3),
            RelationSample::new(vec![101, 4, 5, 6, 9, 102], [1, 4], -1),
        ]);

        assert_eq!(batch.input_ids.dims(), [2, 6]);
        assert_eq!(
            ints(batch.input_ids),
            vec![101, 7, 8, 102, 0, 0, 101, 4, 5, 6, 9, 102]
        );
        assert_eq!(ints(batch.e1_e2_start), vec![1, 2, 1, 4]);
        assert_eq!(ints(batch.labels), vec![3, -1]);
    }

    #[test]
    fn test_uses_configured_pad_id() {
        let batcher = RelationBatcher::<TestBackend>::new(Default::default(), 1);
        let batch = batcher.batch(vec![
            RelationSample::new(vec![5], [0, 0], 0),
            RelationSample::new(vec![5, 6, 7], [0, 2], 1),
        ]);
        assert_eq!(ints(batch.input_ids), vec![5, 1, 1, 5, 6, 7]);
    }
}

use burn::data::dataset::Dataset;

use crate::domain::sample::RelationSample;

/// In-memory relation samples behind burn's Dataset trait.
pub struct RelationDataset {
    samples: Vec<RelationSample>,
}

impl RelationDataset {
    pub fn new(samples: Vec<RelationSample>) -> Self { Self { samples } }

    /// Number of samples that count towards scoring
    pub fn labelled_count(&self) -> usize {
        self.samples.iter().filter(|s| s.is_labelled()).count()
    }

    /// Drop samples carrying the ignore label
    pub fn labelled_only(self) -> Self {
        Self::new(self.samples.into_iter().filter(RelationSample::is_labelled).collect())
    }
}

impl Dataset<RelationSample> for RelationDataset {
    fn get(&self, index: usize) -> Option<RelationSample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

// ============================================================
// Layer 3 — RelationSample Domain Type
// ============================================================
// One tokenised sentence annotated with a relation between two
// marked entities.
//
// Example (token view):
//   [CLS] the [E1] fire [/E1] was caused by [E2] arson [/E2] [SEP]
//   e1_e2_start = [2, 8]  → positions of the [E1] and [E2] markers
//   label       = 3       → "Cause-Effect(e2,e1)"
//
// A label equal to IGNORE_LABEL marks a sample that takes part
// in the forward pass but not in accuracy or scoring.

use serde::{Deserialize, Serialize};

/// Label value excluded from accuracy and scoring
pub const IGNORE_LABEL: i64 = -1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationSample {
    /// Token ids, unpadded
    pub input_ids: Vec<u32>,

    /// Positions of the entity-start markers [E1] and [E2]
    /// inside input_ids
    pub e1_e2_start: [usize; 2],

    /// Relation class id, or IGNORE_LABEL
    pub label: i64,
}

impl RelationSample {
    pub fn new(input_ids: Vec<u32>, e1_e2_start: [usize; 2], label: i64) -> Self {
        Self { input_ids, e1_e2_start, label }
    }

    pub fn len(&self) -> usize {
        self.input_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.input_ids.is_empty()
    }

    /// True when the sample counts towards accuracy and scoring
    pub fn is_labelled(&self) -> bool {
        self.label != IGNORE_LABEL
    }

    /// Both entity markers point inside the token sequence
    pub fn markers_in_bounds(&self) -> bool {
        self.e1_e2_start.iter().all(|&p| p < self.input_ids.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markers_in_bounds() {
        let ok = RelationSample::new(vec![101, 5, 6, 7, 102], [1, 3], 2);
        assert!(ok.markers_in_bounds());
        let bad = RelationSample::new(vec![101, 5, 102], [1, 3], 2);
        assert!(!bad.markers_in_bounds());
    }

    #[test]
    fn test_ignore_label() {
        let s = RelationSample::new(vec![1, 2], [0, 1], IGNORE_LABEL);
        assert!(!s.is_labelled());
    }
}

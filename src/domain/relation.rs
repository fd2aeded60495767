// ============================================================
// Layer 3 — Relation Map
// ============================================================
// Mapping from integer relation classes to their human-readable
// names (e.g. 3 → "Cause-Effect(e1,e2)").
//
// The model only ever sees class ids; names are needed when a
// classification report is presented to a person.
//
// Serialised as:
//   { "idx2rel": { "0": "Other", "1": "Cause-Effect(e1,e2)", ... } }

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelationMap {
    idx2rel: BTreeMap<usize, String>,
}

impl RelationMap {
    /// Build from (id, name) pairs
    pub fn from_pairs(pairs: impl IntoIterator<Item = (usize, String)>) -> Self {
        Self { idx2rel: pairs.into_iter().collect() }
    }

    /// Build with ids assigned in iteration order, starting at 0
    pub fn from_names<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        Self::from_pairs(names.into_iter().map(Into::into).enumerate())
    }

    pub fn name(&self, id: usize) -> Option<&str> {
        self.idx2rel.get(&id).map(String::as_str)
    }

    /// Number of output classes the classifier needs: one past the
    /// largest id, so sparse id sets still index correctly.
    pub fn num_classes(&self) -> usize {
        self.idx2rel.keys().next_back().map_or(0, |max| max + 1)
    }

    pub fn len(&self) -> usize {
        self.idx2rel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.idx2rel.is_empty()
    }
}

// ============================================================
// Layer 3 — Metric Records
// ============================================================
// Fixed-shape result records produced by the evaluator and
// accumulated per epoch in the results buffer.
//
//   SequenceMetrics     — entity-level (span) scores + accuracy
//   LabelMetrics        — flat label-level precision/recall/F1
//   ClassMetrics        — one row of a classification report
//   ClassificationReport — per-class rows + three aggregate rows
//   EvaluationOutcome   — everything one evaluation call returns
//
// Reference: Rust Book §5 (Structs), §9 (Error Handling)

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::domain::relation::RelationMap;

/// Report key of the flat accuracy row
pub const ACCURACY_KEY: &str = "accuracy";
/// Report key of the unweighted per-class mean row
pub const MACRO_AVG_KEY: &str = "macro avg";
/// Report key of the support-weighted per-class mean row
pub const WEIGHTED_AVG_KEY: &str = "weighted avg";

#[derive(Error, Debug, PartialEq)]
pub enum MetricsError {
    #[error("report class key '{0}' is not an integer relation id")]
    InvalidClassKey(String),

    #[error("relation id {0} has no name in the relation map")]
    UnknownRelation(usize),

    #[error("relation name '{0}' is mapped from more than one id")]
    DuplicateRelation(String),
}

/// Entity-level scores plus the batch-averaged token accuracy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SequenceMetrics {
    pub accuracy:  f64,
    pub precision: f64,
    pub recall:    f64,
    pub f1:        f64,
}

/// Flat (not sequence-aware) precision / recall / F1.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LabelMetrics {
    pub precision: f64,
    pub recall:    f64,
    pub f1:        f64,
}

/// One row of a classification report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall:    f64,
    pub f1_score:  f64,
    /// Number of true occurrences of the class (or total for aggregates)
    pub support:   usize,
}

/// Per-class breakdown with the three aggregate rows kept apart
/// from the class rows so re-keying can never touch them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    /// Class label (relation id before re-keying, relation name after)
    pub classes:      BTreeMap<String, ClassMetrics>,
    pub accuracy:     f64,
    pub macro_avg:    ClassMetrics,
    pub weighted_avg: ClassMetrics,
}

impl ClassificationReport {
    /// Look up a row by key, resolving the aggregate row names.
    /// `accuracy` is a scalar and has no row.
    pub fn row(&self, key: &str) -> Option<&ClassMetrics> {
        match key {
            MACRO_AVG_KEY    => Some(&self.macro_avg),
            WEIGHTED_AVG_KEY => Some(&self.weighted_avg),
            ACCURACY_KEY     => None,
            _                => self.classes.get(key),
        }
    }

    /// Replace every class key (an integer relation id) with the
    /// relation's name. Aggregate rows are carried over unchanged.
    /// A key that is not an id, or an id the map does not know,
    /// is an error rather than a silent skip.
    pub fn with_relation_names(self, relations: &RelationMap) -> Result<Self, MetricsError> {
        let mut classes = BTreeMap::new();

        for (key, row) in self.classes {
            let id: usize = key
                .trim()
                .parse()
                .map_err(|_| MetricsError::InvalidClassKey(key.clone()))?;

            let name = relations
                .name(id)
                .ok_or(MetricsError::UnknownRelation(id))?
                .replace('\n', "");

            if classes.insert(name.clone(), row).is_some() {
                return Err(MetricsError::DuplicateRelation(name));
            }
        }

        Ok(Self { classes, ..self })
    }
}

/// Everything a single evaluation pass produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationOutcome {
    /// Sequence-aware scores; `accuracy` is averaged over batches
    pub results:        SequenceMetrics,
    pub micro:          LabelMetrics,
    pub macro_avg:      LabelMetrics,
    /// Flat accuracy over every eligible label
    pub label_accuracy: f64,
    pub report:         ClassificationReport,
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn row(p: f64, support: usize) -> ClassMetrics {
        ClassMetrics { precision: p, recall: p, f1_score: p, support }
    }

    fn report() -> ClassificationReport {
        let mut classes = BTreeMap::new();
        classes.insert("0".to_string(), row(0.5, 2));
        classes.insert("2".to_string(), row(1.0, 3));
        ClassificationReport {
            classes,
            accuracy:     0.8,
            macro_avg:    row(0.75, 5),
            weighted_avg: row(0.8, 5),
        }
    }

    fn relations() -> RelationMap {
        RelationMap::from_names(["Other", "Cause-Effect(e1,e2)\n", "Member-Collection(e2,e1)\n"])
    }

    #[test]
    fn test_rekey_renames_classes() {
        let cr = report().with_relation_names(&relations()).unwrap();
        let keys: Vec<&str> = cr.classes.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["Member-Collection(e2,e1)", "Other"]);
        assert_eq!(cr.row("Other"), Some(&row(0.5, 2)));
    }

    #[test]
    fn test_rekey_keeps_aggregates() {
        let before = report();
        let after  = before.clone().with_relation_names(&relations()).unwrap();
        assert_eq!(after.accuracy, before.accuracy);
        assert_eq!(after.row(MACRO_AVG_KEY), before.row(MACRO_AVG_KEY));
        assert_eq!(after.row(WEIGHTED_AVG_KEY), before.row(WEIGHTED_AVG_KEY));
        assert!(after.row(ACCURACY_KEY).is_none());
    }

    #[test]
    fn test_rekey_mapping_miss_is_error() {
        let mut cr = report();
        cr.classes.insert("7".to_string(), row(0.0, 0));
        assert_eq!(
            cr.with_relation_names(&relations()),
            Err(MetricsError::UnknownRelation(7))
        );
    }

    #[test]
    fn test_rekey_rejects_non_integer_key() {
        let mut cr = report();
        cr.classes.insert("B-PER".to_string(), row(0.0, 0));
        assert!(matches!(
            cr.with_relation_names(&relations()),
            Err(MetricsError::InvalidClassKey(_))
        ));
    }
}

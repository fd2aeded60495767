// ============================================================
// Layer 5 — Scoring
// ============================================================
// Label-sequence metrics used by the evaluator. Two families:
//
// Sequence-aware (entity span) scoring
//   Labels are read as IOBES chunk tags: the first character is
//   the chunk prefix, the text after the first '-' of the rest
//   is the entity type ("_" when empty). Sequences are joined
//   with an "O" separator, chunks are extracted as
//   (type, start, end) and predicted chunks count as correct
//   only when an identical true chunk exists.
//
// Flat (per-label) scoring
//   Every label is its own class. The class set is the sorted
//   union of true and predicted labels. Ratios with a zero
//   denominator are 0.
//
//   micro — pool tp / fp / fn over all classes, then divide
//   macro — divide per class, then take the unweighted mean

use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::domain::metrics::{ClassMetrics, ClassificationReport, LabelMetrics};

/// Averaging mode for flat scoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Average {
    Micro,
    Macro,
}

// ─── Sequence-aware scoring ───────────────────────────────────────────────────

/// One labelled span: (entity type, first index, last index)
pub type Chunk = (String, usize, usize);

/// Split a tag into its prefix character and entity type
fn split_tag(tag: &str) -> (char, &str) {
    let mut chars = tag.chars();
    let prefix = chars.next().unwrap_or('O');
    let rest   = chars.as_str();
    let ty     = match rest.split_once('-') {
        Some((_, ty)) => ty,
        None          => rest,
    };
    (prefix, if ty.is_empty() { "_" } else { ty })
}

fn end_of_chunk(prev_tag: char, tag: char, prev_type: &str, ty: &str) -> bool {
    matches!(prev_tag, 'E' | 'S')
        || (matches!(prev_tag, 'B' | 'I') && matches!(tag, 'B' | 'S' | 'O'))
        || (prev_tag != 'O' && prev_tag != '.' && prev_type != ty)
}

fn start_of_chunk(prev_tag: char, tag: char, prev_type: &str, ty: &str) -> bool {
    matches!(tag, 'B' | 'S')
        || (matches!(prev_tag, 'E' | 'S' | 'O') && matches!(tag, 'E' | 'I'))
        || (tag != 'O' && tag != '.' && prev_type != ty)
}

/// Extract chunks from a list of tag sequences. Sequences are
/// concatenated with an "O" after each, so offsets are global.
pub fn get_entities<S: AsRef<str>>(sequences: &[Vec<S>]) -> Vec<Chunk> {
    let flat: Vec<&str> = sequences
        .iter()
        .flat_map(|seq| seq.iter().map(|s| s.as_ref()).chain(std::iter::once("O")))
        .chain(std::iter::once("O"))
        .collect();

    let mut chunks    = Vec::new();
    let mut prev_tag  = 'O';
    let mut prev_type = "";
    let mut begin     = 0usize;

    for (i, label) in flat.iter().enumerate() {
        let (tag, ty) = split_tag(label);

        if end_of_chunk(prev_tag, tag, prev_type, ty) {
            chunks.push((prev_type.to_string(), begin, i - 1));
        }
        if start_of_chunk(prev_tag, tag, prev_type, ty) {
            begin = i;
        }
        prev_tag  = tag;
        prev_type = ty;
    }
    chunks
}

/// Micro-averaged span precision / recall / F1.
pub fn sequence_scores<S: AsRef<str>>(y_true: &[Vec<S>], y_pred: &[Vec<S>]) -> LabelMetrics {
    let true_chunks: HashSet<Chunk> = get_entities(y_true).into_iter().collect();
    let pred_chunks: HashSet<Chunk> = get_entities(y_pred).into_iter().collect();

    let tp = true_chunks.intersection(&pred_chunks).count();
    prf(tp, pred_chunks.len(), true_chunks.len())
}

// ─── Flat scoring ─────────────────────────────────────────────────────────────

/// Per-class tp / predicted / actual counts
#[derive(Debug, Clone, Copy, Default)]
struct Counts {
    tp:   usize,
    pred: usize,
    act:  usize,
}

fn class_counts<S: AsRef<str>>(y_true: &[S], y_pred: &[S]) -> BTreeMap<String, Counts> {
    let mut counts: BTreeMap<String, Counts> = BTreeMap::new();

    for (t, p) in y_true.iter().zip(y_pred) {
        let (t, p) = (t.as_ref(), p.as_ref());
        counts.entry(t.to_string()).or_default().act += 1;
        counts.entry(p.to_string()).or_default().pred += 1;
        if t == p {
            counts.entry(t.to_string()).or_default().tp += 1;
        }
    }
    counts
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

fn f_score(precision: f64, recall: f64) -> f64 {
    if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}

fn prf(tp: usize, pred: usize, act: usize) -> LabelMetrics {
    let precision = ratio(tp, pred);
    let recall    = ratio(tp, act);
    LabelMetrics { precision, recall, f1: f_score(precision, recall) }
}

fn class_row(c: &Counts) -> ClassMetrics {
    let m = prf(c.tp, c.pred, c.act);
    ClassMetrics { precision: m.precision, recall: m.recall, f1_score: m.f1, support: c.act }
}

/// Fraction of positions where the prediction equals the label.
/// Empty input scores 0.
pub fn accuracy_score<S: AsRef<str>>(y_true: &[S], y_pred: &[S]) -> f64 {
    let correct = y_true
        .iter()
        .zip(y_pred)
        .filter(|&(t, p)| t.as_ref() == p.as_ref())
        .count();
    ratio(correct, y_true.len().min(y_pred.len()))
}

/// Flat precision / recall / F1 with the given averaging.
pub fn precision_recall_fscore<S: AsRef<str>>(
    y_true:  &[S],
    y_pred:  &[S],
    average: Average,
) -> LabelMetrics {
    let counts = class_counts(y_true, y_pred);

    match average {
        Average::Micro => {
            let (tp, pred, act) = counts
                .values()
                .fold((0, 0, 0), |(tp, pred, act), c| (tp + c.tp, pred + c.pred, act + c.act));
            prf(tp, pred, act)
        }
        Average::Macro => {
            let rows: Vec<ClassMetrics> = counts.values().map(class_row).collect();
            let n = rows.len().max(1) as f64;
            LabelMetrics {
                precision: rows.iter().map(|r| r.precision).sum::<f64>() / n,
                recall:    rows.iter().map(|r| r.recall).sum::<f64>() / n,
                f1:        rows.iter().map(|r| r.f1_score).sum::<f64>() / n,
            }
        }
    }
}

/// Per-class rows plus accuracy, macro and support-weighted averages.
pub fn classification_report<S: AsRef<str>>(y_true: &[S], y_pred: &[S]) -> ClassificationReport {
    let counts  = class_counts(y_true, y_pred);
    let classes: BTreeMap<String, ClassMetrics> = counts
        .iter()
        .map(|(label, c)| (label.clone(), class_row(c)))
        .collect();

    let total: usize = classes.values().map(|r| r.support).sum();
    let n = classes.len().max(1) as f64;

    let macro_avg = ClassMetrics {
        precision: classes.values().map(|r| r.precision).sum::<f64>() / n,
        recall:    classes.values().map(|r| r.recall).sum::<f64>() / n,
        f1_score:  classes.values().map(|r| r.f1_score).sum::<f64>() / n,
        support:   total,
    };

    let weighted = |f: fn(&ClassMetrics) -> f64| -> f64 {
        if total == 0 {
            return 0.0;
        }
        classes.values().map(|r| f(r) * r.support as f64).sum::<f64>() / total as f64
    };
    let weighted_avg = ClassMetrics {
        precision: weighted(|r| r.precision),
        recall:    weighted(|r| r.recall),
        f1_score:  weighted(|r| r.f1_score),
        support:   total,
    };

    ClassificationReport {
        classes,
        accuracy: accuracy_score(y_true, y_pred),
        macro_avg,
        weighted_avg,
    }
}

/// Sorted set of labels appearing on either side
pub fn label_set<S: AsRef<str>>(y_true: &[S], y_pred: &[S]) -> BTreeSet<String> {
    y_true
        .iter()
        .chain(y_pred)
        .map(|s| s.as_ref().to_string())
        .collect()
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn seqs(v: &[&[&str]]) -> Vec<Vec<String>> {
        v.iter().map(|s| s.iter().map(|t| t.to_string()).collect()).collect()
    }

    #[test]
    fn test_bio_entities() {
        let chunks = get_entities(&seqs(&[&["B-PER", "I-PER", "O", "B-LOC"]]));
        assert_eq!(
            chunks,
            vec![("PER".to_string(), 0, 1), ("LOC".to_string(), 3, 3)]
        );
    }

    #[test]
    fn test_sequences_do_not_merge_across_boundary() {
        let chunks = get_entities(&seqs(&[&["B-PER", "I-PER"], &["I-PER"]]));
        assert_eq!(
            chunks,
            vec![("PER".to_string(), 0, 1), ("PER".to_string(), 3, 3)]
        );
    }

    #[test]
    fn test_type_comes_from_text_after_first_dash() {
        assert_eq!(split_tag("B-PER"), ('B', "PER"));
        assert_eq!(split_tag("I-ORG-X"), ('I', "ORG-X"));
        assert_eq!(split_tag("O"), ('O', "_"));
        assert_eq!(split_tag("12"), ('1', "2"));
    }

    #[test]
    fn test_sequence_scores_partial_match() {
        let y_true = seqs(&[&["B-PER", "I-PER", "O", "B-LOC"]]);
        let y_pred = seqs(&[&["B-PER", "I-PER", "O", "O"]]);
        let m = sequence_scores(&y_true, &y_pred);
        assert!(close(m.precision, 1.0));
        assert!(close(m.recall, 0.5));
        assert!(close(m.f1, 2.0 / 3.0));
    }

    #[test]
    fn test_sequence_scores_boundary_mismatch_is_wrong() {
        let y_true = seqs(&[&["B-PER", "I-PER", "O"]]);
        let y_pred = seqs(&[&["B-PER", "O", "O"]]);
        let m = sequence_scores(&y_true, &y_pred);
        assert_eq!(m, LabelMetrics::default());
    }

    #[test]
    fn test_sequence_scores_no_entities() {
        let empty: Vec<Vec<String>> = Vec::new();
        assert_eq!(sequence_scores(&empty, &empty), LabelMetrics::default());
    }

    #[test]
    fn test_micro_and_macro_differ_on_imbalance() {
        let y_true = ["a", "a", "a", "a", "b"];
        let y_pred = ["a", "a", "a", "a", "a"];

        let micro = precision_recall_fscore(&y_true, &y_pred, Average::Micro);
        let macro_ = precision_recall_fscore(&y_true, &y_pred, Average::Macro);

        assert!(close(micro.f1, 0.8));
        // class a: p=0.8 r=1.0 f1=8/9, class b: all zero
        assert!(close(macro_.f1, 4.0 / 9.0));
        assert!(close(macro_.recall, 0.5));
        assert!(!close(micro.f1, macro_.f1));
    }

    #[test]
    fn test_report_rows_and_aggregates() {
        let y_true = ["0", "0", "1", "2", "2", "2"];
        let y_pred = ["0", "1", "1", "2", "2", "0"];
        let cr = classification_report(&y_true, &y_pred);

        let keys: Vec<&str> = cr.classes.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["0", "1", "2"]);

        let zero = cr.classes["0"];
        assert!(close(zero.precision, 0.5));
        assert!(close(zero.recall, 0.5));
        assert_eq!(zero.support, 2);

        let two = cr.classes["2"];
        assert!(close(two.precision, 1.0));
        assert!(close(two.recall, 2.0 / 3.0));

        assert!(close(cr.accuracy, 4.0 / 6.0));
        assert_eq!(cr.macro_avg.support, 6);
        assert!(close(cr.macro_avg.recall, (0.5 + 1.0 + 2.0 / 3.0) / 3.0));
        // weighted recall equals accuracy
        assert!(close(cr.weighted_avg.recall, cr.accuracy));
    }

    #[test]
    fn test_report_sorts_labels_as_strings() {
        let cr = classification_report(&["10", "2", "9"], &["10", "2", "9"]);
        let keys: Vec<&str> = cr.classes.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["10", "2", "9"]);
    }

    #[test]
    fn test_predicted_only_label_has_zero_support() {
        let cr = classification_report(&["a", "a"], &["a", "z"]);
        assert_eq!(cr.classes["z"].support, 0);
        assert_eq!(cr.classes["z"].precision, 0.0);
        assert_eq!(label_set(&["a", "a"], &["a", "z"]).len(), 2);
    }

    #[test]
    fn test_accuracy_score_empty_is_zero() {
        let empty: [&str; 0] = [];
        assert_eq!(accuracy_score(&empty, &empty), 0.0);
        assert!(close(accuracy_score(&["x", "y"], &["x", "x"]), 0.5));
    }
}

// ============================================================
// Layer 6 — Results Buffer
// ============================================================
// Per-epoch metric history of one run, kept as nine parallel
// sequences and persisted as nine bincode files:
//
//   task_test_losses_per_epoch_<id>.bin              f64
//   task_train_accuracy_per_epoch_<id>.bin           f64
//   task_test_f1_per_epoch_<id>.bin                  f64
//   task_test_f1_nonseq_micro_per_epoch_<id>.bin     f64
//   task_test_f1_nonseq_macro_per_epoch_<id>.bin     f64
//   task_test_accuracy_per_epoch_<id>.bin            f64
//   task_test_precision_recall_micro_per_epoch_<id>  LabelMetrics
//   task_test_precision_recall_macro_per_epoch_<id>  LabelMetrics
//   task_report_per_epoch_<id>.bin                   ClassificationReport
//
// Every sequence is read from its own file. All nine must exist
// for a load to count; otherwise the buffer starts empty.
//
// The scalar columns can also be exported as CSV for plotting:
//   epoch,train_loss,train_acc,test_f1,f1_micro,f1_macro,test_acc

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs,
    io::Write,
    path::Path,
};
use thiserror::Error;

use crate::domain::metrics::{ClassificationReport, LabelMetrics};
use crate::infra::paths::{write_atomic, RunPaths};

const LOSSES:        &str = "task_test_losses";
const TRAIN_ACCURACY: &str = "task_train_accuracy";
const F1:            &str = "task_test_f1";
const F1_MICRO:      &str = "task_test_f1_nonseq_micro";
const F1_MACRO:      &str = "task_test_f1_nonseq_macro";
const TEST_ACCURACY: &str = "task_test_accuracy";
const PR_MICRO:      &str = "task_test_precision_recall_micro";
const PR_MACRO:      &str = "task_test_precision_recall_macro";
const REPORT:        &str = "task_report";

/// File stems of the nine sequences, in field order
pub const BUFFER_STEMS: [&str; 9] = [
    LOSSES, TRAIN_ACCURACY, F1, F1_MICRO, F1_MACRO,
    TEST_ACCURACY, PR_MICRO, PR_MACRO, REPORT,
];

#[derive(Error, Debug, PartialEq)]
pub enum BufferError {
    #[error("results buffer sequences have different lengths: {0:?}")]
    LengthMismatch([usize; 9]),
}

/// Metrics of one completed epoch, appended as a unit.
#[derive(Debug, Clone)]
pub struct EpochRecord {
    pub train_loss:     f64,
    pub train_accuracy: f64,
    pub test_f1:        f64,
    pub f1_micro:       f64,
    pub f1_macro:       f64,
    pub test_accuracy:  f64,
    pub micro:          LabelMetrics,
    pub macro_avg:      LabelMetrics,
    pub report:         ClassificationReport,
}

/// Nine aligned per-epoch sequences.
///
/// Fields are private so the only way to grow the buffer is
/// `push_epoch`, which keeps the lengths equal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultsBuffer {
    losses_per_epoch:                 Vec<f64>,
    accuracy_per_epoch:               Vec<f64>,
    f1_per_epoch:                     Vec<f64>,
    f1_micro_per_epoch:               Vec<f64>,
    f1_macro_per_epoch:               Vec<f64>,
    test_accuracy_per_epoch:          Vec<f64>,
    precision_recall_micro_per_epoch: Vec<LabelMetrics>,
    precision_recall_macro_per_epoch: Vec<LabelMetrics>,
    report_per_epoch:                 Vec<ClassificationReport>,
}

impl ResultsBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_epoch(&mut self, r: EpochRecord) {
        self.losses_per_epoch.push(r.train_loss);
        self.accuracy_per_epoch.push(r.train_accuracy);
        self.f1_per_epoch.push(r.test_f1);
        self.f1_micro_per_epoch.push(r.f1_micro);
        self.f1_macro_per_epoch.push(r.f1_macro);
        self.test_accuracy_per_epoch.push(r.test_accuracy);
        self.precision_recall_micro_per_epoch.push(r.micro);
        self.precision_recall_macro_per_epoch.push(r.macro_avg);
        self.report_per_epoch.push(r.report);
    }

    /// Number of recorded epochs
    pub fn len(&self) -> usize {
        self.losses_per_epoch.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn losses(&self) -> &[f64] { &self.losses_per_epoch }
    pub fn train_accuracy(&self) -> &[f64] { &self.accuracy_per_epoch }
    pub fn f1(&self) -> &[f64] { &self.f1_per_epoch }
    pub fn f1_micro(&self) -> &[f64] { &self.f1_micro_per_epoch }
    pub fn f1_macro(&self) -> &[f64] { &self.f1_macro_per_epoch }
    pub fn test_accuracy(&self) -> &[f64] { &self.test_accuracy_per_epoch }
    pub fn precision_recall_micro(&self) -> &[LabelMetrics] { &self.precision_recall_micro_per_epoch }
    pub fn precision_recall_macro(&self) -> &[LabelMetrics] { &self.precision_recall_macro_per_epoch }
    pub fn reports(&self) -> &[ClassificationReport] { &self.report_per_epoch }

    fn lengths(&self) -> [usize; 9] {
        [
            self.losses_per_epoch.len(),
            self.accuracy_per_epoch.len(),
            self.f1_per_epoch.len(),
            self.f1_micro_per_epoch.len(),
            self.f1_macro_per_epoch.len(),
            self.test_accuracy_per_epoch.len(),
            self.precision_recall_micro_per_epoch.len(),
            self.precision_recall_macro_per_epoch.len(),
            self.report_per_epoch.len(),
        ]
    }

    /// Write the scalar columns as CSV, one row per epoch (1-based)
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut f = fs::File::create(path)
            .with_context(|| format!("Cannot create '{}'", path.display()))?;

        writeln!(f, "epoch,train_loss,train_acc,test_f1,f1_micro,f1_macro,test_acc")?;
        for i in 0..self.len() {
            writeln!(
                f,
                "{},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6}",
                i + 1,
                self.losses_per_epoch[i],
                self.accuracy_per_epoch[i],
                self.f1_per_epoch[i],
                self.f1_micro_per_epoch[i],
                self.f1_macro_per_epoch[i],
                self.test_accuracy_per_epoch[i],
            )?;
        }

        tracing::debug!("Exported {} epochs to '{}'", self.len(), path.display());
        Ok(())
    }
}

/// Load the results buffer of a run.
///
/// Returns an empty buffer when any of the nine files is missing.
/// Fails when a file does not decode or the lengths disagree.
pub fn load_results(paths: &RunPaths) -> Result<ResultsBuffer> {
    let all_present = BUFFER_STEMS
        .iter()
        .all(|stem| paths.buffer(stem).is_file());

    if !all_present {
        tracing::debug!("No complete results buffer for run {}", paths.model_no());
        return Ok(ResultsBuffer::new());
    }

    let buffer = ResultsBuffer {
        losses_per_epoch:                 read_sequence(paths, LOSSES)?,
        accuracy_per_epoch:               read_sequence(paths, TRAIN_ACCURACY)?,
        f1_per_epoch:                     read_sequence(paths, F1)?,
        f1_micro_per_epoch:               read_sequence(paths, F1_MICRO)?,
        f1_macro_per_epoch:               read_sequence(paths, F1_MACRO)?,
        test_accuracy_per_epoch:          read_sequence(paths, TEST_ACCURACY)?,
        precision_recall_micro_per_epoch: read_sequence(paths, PR_MICRO)?,
        precision_recall_macro_per_epoch: read_sequence(paths, PR_MACRO)?,
        report_per_epoch:                 read_sequence(paths, REPORT)?,
    };

    let lengths = buffer.lengths();
    if lengths.iter().any(|&n| n != lengths[0]) {
        return Err(BufferError::LengthMismatch(lengths).into());
    }

    tracing::info!("Loaded results buffer");
    Ok(buffer)
}

/// Persist all nine sequences of the buffer.
pub fn save_results(paths: &RunPaths, buffer: &ResultsBuffer) -> Result<()> {
    write_sequence(paths, LOSSES, &buffer.losses_per_epoch)?;
    write_sequence(paths, TRAIN_ACCURACY, &buffer.accuracy_per_epoch)?;
    write_sequence(paths, F1, &buffer.f1_per_epoch)?;
    write_sequence(paths, F1_MICRO, &buffer.f1_micro_per_epoch)?;
    write_sequence(paths, F1_MACRO, &buffer.f1_macro_per_epoch)?;
    write_sequence(paths, TEST_ACCURACY, &buffer.test_accuracy_per_epoch)?;
    write_sequence(paths, PR_MICRO, &buffer.precision_recall_micro_per_epoch)?;
    write_sequence(paths, PR_MACRO, &buffer.precision_recall_macro_per_epoch)?;
    write_sequence(paths, REPORT, &buffer.report_per_epoch)?;

    tracing::debug!("Saved results buffer ({} epochs)", buffer.len());
    Ok(())
}

fn read_sequence<T: DeserializeOwned>(paths: &RunPaths, stem: &str) -> Result<Vec<T>> {
    let path  = paths.buffer(stem);
    let bytes = fs::read(&path)
        .with_context(|| format!("Cannot read '{}'", path.display()))?;
    bincode::deserialize(&bytes)
        .with_context(|| format!("Corrupt results file '{}'", path.display()))
}

fn write_sequence<T: Serialize>(paths: &RunPaths, stem: &str, seq: &[T]) -> Result<()> {
    let bytes = bincode::serialize(seq)?;
    write_atomic(&paths.buffer(stem), &bytes)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn record(epoch: usize) -> EpochRecord {
        let x = epoch as f64 / 10.0;
        EpochRecord {
            train_loss:     1.0 - x,
            train_accuracy: x,
            test_f1:        x,
            f1_micro:       x,
            f1_macro:       x / 2.0,
            test_accuracy:  x,
            micro:          LabelMetrics { precision: x, recall: x, f1: x },
            macro_avg:      LabelMetrics { precision: x, recall: x, f1: x / 2.0 },
            report:         ClassificationReport { accuracy: x, ..Default::default() },
        }
    }

    fn filled(epochs: usize) -> ResultsBuffer {
        let mut buffer = ResultsBuffer::new();
        for e in 1..=epochs {
            buffer.push_epoch(record(e));
        }
        buffer
    }

    #[test]
    fn test_missing_files_give_empty_buffer() {
        let dir   = tempfile::tempdir().unwrap();
        let paths = RunPaths::new(dir.path(), 0);
        let buffer = load_results(&paths).unwrap();
        assert!(buffer.is_empty());
        assert!(buffer.lengths().iter().all(|&n| n == 0));
    }

    #[test]
    fn test_save_then_load_keeps_lengths_equal() {
        let dir   = tempfile::tempdir().unwrap();
        let paths = RunPaths::new(dir.path(), 1);

        for epochs in [0, 1, 4] {
            let buffer = filled(epochs);
            save_results(&paths, &buffer).unwrap();
            let loaded = load_results(&paths).unwrap();
            assert_eq!(loaded.lengths(), [epochs; 9]);
            assert_eq!(loaded, buffer);
        }
    }

    #[test]
    fn test_each_sequence_reads_its_own_file() {
        let dir   = tempfile::tempdir().unwrap();
        let paths = RunPaths::new(dir.path(), 0);
        save_results(&paths, &filled(2)).unwrap();

        let loaded = load_results(&paths).unwrap();
        assert_eq!(loaded.f1(), &[0.1, 0.2]);
        assert_eq!(loaded.f1_macro(), &[0.05, 0.1]);
        assert_ne!(loaded.f1_macro(), loaded.f1());
    }

    #[test]
    fn test_one_missing_file_resets_everything() {
        let dir   = tempfile::tempdir().unwrap();
        let paths = RunPaths::new(dir.path(), 0);
        save_results(&paths, &filled(3)).unwrap();
        fs::remove_file(paths.buffer(REPORT)).unwrap();

        assert!(load_results(&paths).unwrap().is_empty());
    }

    #[test]
    fn test_length_mismatch_is_error() {
        let dir   = tempfile::tempdir().unwrap();
        let paths = RunPaths::new(dir.path(), 0);
        save_results(&paths, &filled(3)).unwrap();
        write_sequence(&paths, LOSSES, &[0.5f64]).unwrap();

        let err = load_results(&paths).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BufferError>(),
            Some(BufferError::LengthMismatch(_))
        ));
    }

    #[test]
    fn test_corrupt_file_is_error() {
        let dir   = tempfile::tempdir().unwrap();
        let paths = RunPaths::new(dir.path(), 0);
        save_results(&paths, &filled(1)).unwrap();
        fs::write(paths.buffer(PR_MICRO), b"\x01").unwrap();

        assert!(load_results(&paths).is_err());
    }

    #[test]
    fn test_csv_has_one_row_per_epoch() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.csv");
        filled(3).write_csv(&path).unwrap();

        let csv = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[1].starts_with("1,0.900000,0.100000"));
    }
}

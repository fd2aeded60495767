// ============================================================
// Layer 2 — HistoryUseCase
// ============================================================
// Reads back the per-epoch metric buffers of a run and
// optionally exports them as CSV for plotting.

use anyhow::Result;
use std::path::PathBuf;

use crate::infra::{
    metrics::{load_results, ResultsBuffer},
    paths::RunPaths,
};

pub struct HistoryUseCase {
    paths: RunPaths,
    csv:   Option<PathBuf>,
}

impl HistoryUseCase {
    pub fn new(paths: RunPaths, csv: Option<PathBuf>) -> Self {
        Self { paths, csv }
    }

    pub fn execute(&self) -> Result<ResultsBuffer> {
        let results = load_results(&self.paths)?;

        if results.is_empty() {
            tracing::info!("No recorded epochs for run {}", self.paths.model_no());
            return Ok(results);
        }

        if let Some(csv) = &self.csv {
            results.write_csv(csv)?;
            tracing::info!("Wrote {} epochs to '{}'", results.len(), csv.display());
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::metrics::{ClassificationReport, LabelMetrics};
    use crate::infra::metrics::{save_results, EpochRecord};
    use std::fs;

    fn record(loss: f64) -> EpochRecord {
        EpochRecord {
            train_loss:     loss,
            train_accuracy: 0.5,
            test_f1:        0.4,
            f1_micro:       0.6,
            f1_macro:       0.3,
            test_accuracy:  0.6,
            micro:          LabelMetrics::default(),
            macro_avg:      LabelMetrics::default(),
            report:         ClassificationReport::default(),
        }
    }

    #[test]
    fn test_exports_csv() {
        let dir   = tempfile::tempdir().unwrap();
        let paths = RunPaths::new(dir.path(), 1);
        let mut buffer = ResultsBuffer::new();
        buffer.push_epoch(record(1.2));
        buffer.push_epoch(record(0.9));
        save_results(&paths, &buffer).unwrap();

        let csv = dir.path().join("history.csv");
        let out = HistoryUseCase::new(paths, Some(csv.clone())).execute().unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(fs::read_to_string(csv).unwrap().lines().count(), 3);
    }

    #[test]
    fn test_empty_run_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("history.csv");
        let out = HistoryUseCase::new(RunPaths::new(dir.path(), 0), Some(csv.clone()))
            .execute()
            .unwrap();
        assert!(out.is_empty());
        assert!(!csv.exists());
    }
}

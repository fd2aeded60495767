// ============================================================
// Layer 6 — Run File Layout
// ============================================================
// Every persisted artifact of a run lives under one base
// directory and carries the run id (model_no) in its name, so
// several configurations can share the directory:
//
//   data/
//     task_test_checkpoint_0.bin          ← latest checkpoint
//     task_test_model_best_0.bin          ← best checkpoint
//     task_test_losses_per_epoch_0.bin    ← results buffer (×9)
//     ...
//     train_config_0.json                 ← architecture + hparams
//     relations.json                      ← id → relation name

use anyhow::{Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Resolves file paths for one run id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPaths {
    base_dir: PathBuf,
    model_no: u32,
}

impl RunPaths {
    pub fn new(base_dir: impl Into<PathBuf>, model_no: u32) -> Self {
        Self { base_dir: base_dir.into(), model_no }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn model_no(&self) -> u32 {
        self.model_no
    }

    /// Snapshot written after every epoch
    pub fn latest_checkpoint(&self) -> PathBuf {
        self.run_file("task_test_checkpoint", "bin")
    }

    /// Snapshot written when the tracked metric improves
    pub fn best_checkpoint(&self) -> PathBuf {
        self.run_file("task_test_model_best", "bin")
    }

    /// One results-buffer sequence, e.g. `task_test_f1`
    pub fn buffer(&self, stem: &str) -> PathBuf {
        self.run_file(&format!("{stem}_per_epoch"), "bin")
    }

    pub fn train_config(&self) -> PathBuf {
        self.run_file("train_config", "json")
    }

    /// Shared by every run in the directory
    pub fn relations(&self) -> PathBuf {
        self.base_dir.join("relations.json")
    }

    fn run_file(&self, stem: &str, ext: &str) -> PathBuf {
        self.base_dir.join(format!("{stem}_{}.{ext}", self.model_no))
    }
}

/// Write `bytes` to a sibling temp file, then rename over `path`,
/// so readers never observe a half-written file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Cannot create directory '{}'", parent.display()))?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, bytes)
        .with_context(|| format!("Cannot write '{}'", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("Cannot move '{}' into place", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_names_carry_run_id() {
        let paths = RunPaths::new("./data", 3);
        assert_eq!(
            paths.latest_checkpoint(),
            PathBuf::from("./data/task_test_checkpoint_3.bin")
        );
        assert_eq!(
            paths.best_checkpoint(),
            PathBuf::from("./data/task_test_model_best_3.bin")
        );
        assert_eq!(
            paths.buffer("task_report"),
            PathBuf::from("./data/task_report_per_epoch_3.bin")
        );
        assert_eq!(paths.relations(), PathBuf::from("./data/relations.json"));
    }

    #[test]
    fn test_write_atomic_replaces_content() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("file.bin");
        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"second");
        assert!(!dir.path().join("nested").join("file.bin.tmp").exists());
    }
}

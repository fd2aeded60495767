// ============================================================
// Layer 4 — Sample Loader
// ============================================================
// Loads pre-tokenised relation samples from a JSON Lines file,
// one sample per line:
//
//   {"input_ids":[101,2054,...,102],"e1_e2_start":[3,9],"label":4}
//
// Blank lines are skipped. Every other line must parse and pass
// validation; a bad line is an error naming its line number,
// not a silent skip, because a partially loaded test set would
// skew every metric computed from it.
//
// Validation per sample:
//   - input_ids is non-empty
//   - input_ids fits the model's position table (max_seq_len)
//   - every token id is inside the embedding table (vocab_size)
//   - both entity markers point inside input_ids
//   - label is a known relation id or IGNORE_LABEL

use anyhow::{Context, Result};
use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::PathBuf,
};

use crate::domain::sample::{RelationSample, IGNORE_LABEL};
use crate::domain::traits::SampleSource;

pub struct JsonlLoader {
    path:        PathBuf,
    max_seq_len: usize,
    vocab_size:  usize,
    num_classes: usize,
}

impl JsonlLoader {
    pub fn new(
        path:        impl Into<PathBuf>,
        max_seq_len: usize,
        vocab_size:  usize,
        num_classes: usize,
    ) -> Self {
        Self { path: path.into(), max_seq_len, vocab_size, num_classes }
    }

    fn validate(&self, sample: &RelationSample) -> Result<()> {
        if sample.is_empty() {
            anyhow::bail!("empty input_ids");
        }
        if sample.len() > self.max_seq_len {
            anyhow::bail!(
                "{} tokens exceed max_seq_len {}",
                sample.len(),
                self.max_seq_len
            );
        }
        if let Some(&id) = sample.input_ids.iter().find(|&&id| id as usize >= self.vocab_size) {
            anyhow::bail!("token id {} outside a vocabulary of {}", id, self.vocab_size);
        }
        if !sample.markers_in_bounds() {
            anyhow::bail!(
                "entity markers {:?} outside a sequence of {} tokens",
                sample.e1_e2_start,
                sample.len()
            );
        }
        let known = (0..self.num_classes as i64).contains(&sample.label);
        if !known && sample.label != IGNORE_LABEL {
            anyhow::bail!("unknown relation label {}", sample.label);
        }
        Ok(())
    }
}

impl SampleSource for JsonlLoader {
    fn load_all(&self) -> Result<Vec<RelationSample>> {
        let file = File::open(&self.path)
            .with_context(|| format!("Cannot open dataset '{}'", self.path.display()))?;

        let mut samples = Vec::new();
        for (i, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            let sample: RelationSample = serde_json::from_str(&line).with_context(|| {
                format!("'{}' line {}: malformed sample", self.path.display(), i + 1)
            })?;
            self.validate(&sample).with_context(|| {
                format!("'{}' line {}: invalid sample", self.path.display(), i + 1)
            })?;

            samples.push(sample);
        }

        tracing::info!(
            "Loaded {} samples from '{}'",
            samples.len(),
            self.path.display()
        );
        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(lines: &str) -> (tempfile::TempDir, PathBuf) {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.jsonl");
        fs::write(&path, lines).unwrap();
        (dir, path)
    }

    #[test]
    fn test_loads_valid_lines_and_skips_blanks() {
        let (_dir, path) = write(concat!(
            r#"{"input_ids":[101,5,6,102],"e1_e2_start":[1,2],"label":2}"#, "\n",
            "\n",
            r#"{"input_ids":[101,7,102],"e1_e2_start":[0,1],"label":-1}"#, "\n",
        ));
        let samples = JsonlLoader::new(path, 16, 1000, 3).load_all().unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].e1_e2_start, [1, 2]);
        assert!(!samples[1].is_labelled());
    }

    #[test]
    fn test_rejects_out_of_bounds_marker() {
        let (_dir, path) = write(r#"{"input_ids":[101,102],"e1_e2_start":[0,5],"label":0}"#);
        let err = JsonlLoader::new(path, 16, 1000, 3).load_all().unwrap_err();
        assert!(format!("{err:#}").contains("line 1"));
    }

    #[test]
    fn test_rejects_unknown_label() {
        let (_dir, path) = write(r#"{"input_ids":[101,102],"e1_e2_start":[0,1],"label":3}"#);
        assert!(JsonlLoader::new(path, 16, 1000, 3).load_all().is_err());
    }

    #[test]
    fn test_rejects_token_beyond_vocab() {
        let (_dir, path) = write(r#"{"input_ids":[1,500,2],"e1_e2_start":[0,1],"label":0}"#);
        let err = JsonlLoader::new(path, 16, 32, 3).load_all().unwrap_err();
        assert!(format!("{err:#}").contains("token id 500"));
    }

    #[test]
    fn test_rejects_too_long_sequence() {
        let (_dir, path) = write(r#"{"input_ids":[1,2,3,4,5],"e1_e2_start":[0,1],"label":0}"#);
        assert!(JsonlLoader::new(path, 4, 1000, 3).load_all().is_err());
    }
}

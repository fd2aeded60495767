// ============================================================
// Layer 6 — Relation Store
// ============================================================
// Loads and saves the relation id ↔ name mapping shared by all
// runs in a base directory (relations.json).
//
// The evaluator receives the loaded map at construction time;
// nothing reads this file behind the caller's back.

use anyhow::{Context, Result};
use std::{fs, path::PathBuf};

use crate::domain::relation::RelationMap;
use crate::infra::paths::write_atomic;

pub struct RelationStore {
    path: PathBuf,
}

impl RelationStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn load(&self) -> Result<RelationMap> {
        let json = fs::read_to_string(&self.path).with_context(|| {
            format!("Cannot read relation map '{}'", self.path.display())
        })?;

        let map: RelationMap = serde_json::from_str(&json)
            .with_context(|| format!("Malformed relation map '{}'", self.path.display()))?;

        if map.is_empty() {
            anyhow::bail!("Relation map '{}' has no relations", self.path.display());
        }

        tracing::info!("Loaded {} relations", map.len());
        Ok(map)
    }

    pub fn save(&self, map: &RelationMap) -> Result<()> {
        let json = serde_json::to_string_pretty(map)?;
        write_atomic(&self.path, json.as_bytes())?;
        tracing::debug!("Saved {} relations to '{}'", map.len(), self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_then_load() {
        let dir   = tempfile::tempdir().unwrap();
        let store = RelationStore::new(dir.path().join("relations.json"));
        let map   = RelationMap::from_names(["Other", "Entity-Origin(e1,e2)"]);
        store.save(&map).unwrap();
        assert_eq!(store.load().unwrap(), map);
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir   = tempfile::tempdir().unwrap();
        let store = RelationStore::new(dir.path().join("relations.json"));
        assert!(store.load().is_err());
    }

    #[test]
    fn test_empty_map_is_error() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("relations.json");
        fs::write(&path, r#"{"idx2rel":{}}"#).unwrap();
        assert!(RelationStore::new(path).load().is_err());
    }
}

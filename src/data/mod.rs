// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// From a JSON Lines file to tensor batches:
//
//   samples.jsonl
//       │
//       ▼
//   JsonlLoader       → parses + validates RelationSamples
//       │
//       ▼
//   split_train_test  → seeded shuffle into train / test
//       │
//       ▼
//   RelationDataset   → implements Burn's Dataset trait
//       │
//       ▼
//   RelationBatcher   → pads and stacks into tensors
//       │
//       ▼
//   DataLoader        → feeds batches to trainer / evaluator
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Reads pre-tokenised samples from JSON Lines
pub mod loader;

/// Implements Burn's Dataset trait for relation samples
pub mod dataset;

/// Implements Burn's Batcher trait with per-batch padding
pub mod batcher;

/// Seeded train/test split
pub mod splitter;

// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Everything that touches the filesystem:
//
//   paths.rs          — file naming per run id, atomic writes
//
//   checkpoint.rs     — latest / best training snapshots
//                       (load_state, save_state) and the saved
//                       TrainConfig
//
//   metrics.rs        — the nine per-epoch results sequences
//                       (load_results, save_results, CSV export)
//
//   relation_store.rs — relation id ↔ name mapping
//
// Reference: Rust Book §7 (Modules)
//            Rust Book §9 (Error Handling with anyhow)

/// Run file layout and atomic writes
pub mod paths;

/// Model/optimizer/scheduler checkpoints
pub mod checkpoint;

/// Per-epoch results buffer
pub mod metrics;

/// Relation map persistence
pub mod relation_store;

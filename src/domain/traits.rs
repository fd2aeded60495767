// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// Seams between the use cases and their collaborators:
//
//   SampleSource — anything that yields labelled samples
//   StateDict    — anything whose internal state can be
//                  captured as an opaque blob and restored
//                  in place (model, optimizer, scheduler)
//
// The checkpoint loader only ever sees `dyn StateDict`, so it
// restores burn modules, burn optimizers and plain serde
// structs through the same path.

use anyhow::Result;
use crate::domain::sample::RelationSample;

// ─── SampleSource ─────────────────────────────────────────────────────────────
/// Any component that can load relation samples.
///
/// Implementations:
///   - JsonlLoader → one JSON sample per line
pub trait SampleSource {
    fn load_all(&self) -> Result<Vec<RelationSample>>;
}

// ─── StateDict ────────────────────────────────────────────────────────────────
/// A component whose state round-trips through an opaque byte blob.
///
/// `load_state_dict` mutates `self` in place. Implementations must
/// fully decode the blob before touching `self`, so a corrupt blob
/// leaves the target unchanged.
pub trait StateDict {
    /// Capture the current state
    fn state_dict(&self) -> Result<Vec<u8>>;

    /// Restore state previously produced by `state_dict`
    fn load_state_dict(&mut self, state: &[u8]) -> Result<()>;
}

// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust structs and traits that define what the system
// works with. No burn types and no file I/O in this layer.
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// Result records produced by evaluation
pub mod metrics;

// Relation id ↔ name mapping
pub mod relation;

// A tokenised, entity-marked training sample
pub mod sample;

// Core abstractions (traits) that other layers implement
pub mod traits;

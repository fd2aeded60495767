// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// Burn-specific code: the model, its training loop and the
// evaluator, plus the adapters that let the checkpoint store
// restore burn state through the StateDict trait.
//
//   model.rs     — transformer encoder with an entity-marker
//                  classification head
//                  • token, position and token-type embeddings
//                  • padding-aware multi-head self-attention
//                  • feed-forward networks (GELU activation)
//                  • [E1] ⊕ [E2] hidden states → relation logits
//
//   state.rs     — ModuleState / OptimizerState (StateDict)
//
//   scheduler.rs — multi-step learning-rate decay
//
//   scoring.rs   — span-level and flat label metrics
//
//   evaluator.rs — test-set pass → EvaluationOutcome
//
//   trainer.rs   — resumable train + evaluate loop
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Soares et al. (2019) Matching the Blanks

/// Relation classifier architecture
pub mod model;

/// Burn record adapters for checkpointing
pub mod state;

/// Learning-rate schedule
pub mod scheduler;

/// Label and span metrics
pub mod scoring;

/// Test-set evaluation
pub mod evaluator;

/// Resumable training loop
pub mod trainer;

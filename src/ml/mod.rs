// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All tensor code lives here.
//
//   t5.rs         — T5 encoder-decoder: shared embeddings,
//                   relative position buckets, RMS norm,
//                   ReLU feed-forward, tied LM head
//
//   pretrained.rs — HuggingFace config.json + pytorch_model.bin
//                   import through burn-import
//
//   loss.rs       — token cross-entropy that skips -100 labels
//
//   model.rs      — SummaryModel: forward → (loss, logits) and
//                   the training / validation / test steps
//
//   generation.rs — beam search with repetition and length
//                   penalties
//
//   trainer.rs    — epoch loop: AdamW, per-step logging,
//                   validation, best-checkpoint saving
//
//   inferencer.rs — checkpoint → summary text

/// T5 encoder-decoder architecture
pub mod t5;

/// Pretrained weight import
pub mod pretrained;

/// Masked cross-entropy loss
pub mod loss;

/// Summarization model wrapper with step functions
pub mod model;

/// Beam search decoding
pub mod generation;

/// Full training loop with validation and checkpointing
pub mod trainer;

/// Loads a checkpoint and generates summaries
pub mod inferencer;

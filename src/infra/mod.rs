// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Persistence shared by training and inference:
//
//   checkpoint.rs      — Best-model checkpoint (full-precision gzip MessagePack),
//                        train/model configs as JSON, and the
//                        raw parameter state export.
//
//   tokenizer_store.rs — Loads the pretrained tokenizer.json, or
//                        builds a word-level one from the corpus
//                        when training from scratch; copies the
//                        active tokenizer next to the checkpoint.
//
//   metrics.rs         — Versioned run directories with step and
//                        epoch loss CSVs.

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Tokenizer loading, building, and saving
pub mod tokenizer_store;

/// Training metrics CSV logger
pub mod metrics;

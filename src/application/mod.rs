// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Orchestrates the other layers for one goal each:
//
//   train_use_case     — CSV → split → fine-tune → best checkpoint
//   summarize_use_case — checkpoint or exported state → summary
//   evaluate_use_case  — mean test_loss of the best checkpoint
//   stats_use_case     — token length statistics of the corpus
//
// Rules for this layer:
//   - No ML math or model code here
//   - No printing here (that's Layer 1)
//   - Only workflow coordination and backend selection

use serde::{Deserialize, Serialize};

pub mod train_use_case;
pub mod summarize_use_case;
pub mod evaluate_use_case;
pub mod stats_use_case;

/// Compute device for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Accelerator {
    /// wgpu backend on the default adapter
    Gpu,
    /// ndarray backend
    Cpu,
}

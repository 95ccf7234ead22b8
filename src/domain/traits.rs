// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The application layer programs against these traits so the
// concrete loader and model can be swapped without touching
// the use cases.

use anyhow::Result;
use crate::domain::example::SummaryExample;

// ─── ExampleSource ────────────────────────────────────────────────────────────
/// Any component that can produce (article, summary) examples.
///
/// Implementations:
///   - CsvLoader → reads two columns of a CSV file
pub trait ExampleSource {
    /// Load every usable example from this source.
    fn load_all(&self) -> Result<Vec<SummaryExample>>;
}

// ─── Summarizer ───────────────────────────────────────────────────────────────
/// Maps an input article to a generated summary.
///
/// Implementations:
///   - Inferencer → fine-tuned T5 with beam search
pub trait Summarizer {
    fn summarize(&self, text: &str) -> Result<String>;
}

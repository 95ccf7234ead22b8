// ============================================================
// Layer 3 — SummaryExample Domain Type
// ============================================================
// One training example: the full article text and the
// human-written summary the model should learn to produce.
//
// By the time a SummaryExample exists the CSV columns have
// already been renamed to `text` / `summary` and rows with
// missing values have been dropped.

use serde::{Deserialize, Serialize};

/// An (article text, reference summary) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryExample {
    /// The full news article
    pub text: String,

    /// The reference summary for `text`
    pub summary: String,
}

impl SummaryExample {
    /// Create a new example. Accepts anything convertible to String.
    ///
    /// Example:
    ///   let ex = SummaryExample::new("Markets rallied ...", "Stocks up");
    pub fn new(text: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            text:    text.into(),
            summary: summary.into(),
        }
    }
}

// ============================================================
// Layer 2 — StatsUseCase
// ============================================================
// Token length statistics for the training split, used to pick
// text_max_token_len / summary_max_token_len before training.
//
//   Step 1: Load + split exactly as training would; a tokenizer
//           built here is never written to disk
//   Step 2: Count untruncated tokens per article and per summary
//   Step 3: Summarize each distribution against its limit

use anyhow::Result;
use std::sync::Arc;

use crate::application::train_use_case::{prepare_data, TrainConfig};
use crate::data::encoder::SequenceEncoder;

/// Distribution of token counts for one column.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenStats {
    pub count:      usize,
    pub min:        usize,
    pub max:        usize,
    pub mean:       f64,
    pub median:     usize,
    pub p95:        usize,
    /// Sequences that would be truncated at `limit`
    pub over_limit: usize,
    pub limit:      usize,
}

impl TokenStats {
    /// None for an empty slice.
    pub fn from_counts(counts: &[usize], limit: usize) -> Option<Self> {
        if counts.is_empty() {
            return None;
        }
        let mut sorted = counts.to_vec();
        sorted.sort_unstable();

        let count = sorted.len();
        let sum: usize = sorted.iter().sum();

        Some(Self {
            count,
            min:        sorted[0],
            max:        sorted[count - 1],
            mean:       sum as f64 / count as f64,
            median:     percentile(&sorted, 0.5),
            p95:        percentile(&sorted, 0.95),
            over_limit: sorted.iter().filter(|&&n| n > limit).count(),
            limit,
        })
    }
}

// nearest-rank on an ascending, non-empty slice
fn percentile(sorted: &[usize], q: f64) -> usize {
    let rank = (q * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

#[derive(Debug, Clone)]
pub struct StatsReport {
    pub text:    Option<TokenStats>,
    pub summary: Option<TokenStats>,
}

pub struct StatsUseCase {
    config: TrainConfig,
}

impl StatsUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<StatsReport> {
        let cfg = &self.config;

        // ── Step 1: Same split as training ────────────────────────────────────
        let prepared  = prepare_data(cfg, false)?;
        let tokenizer = Arc::clone(&prepared.tokenizer);

        // ── Step 2: Token counts ──────────────────────────────────────────────
        let text_encoder    = SequenceEncoder::new(Arc::clone(&tokenizer), cfg.text_max_token_len)?;
        let summary_encoder = SequenceEncoder::new(tokenizer, cfg.summary_max_token_len)?;

        let text_counts = prepared
            .train
            .iter()
            .map(|e| text_encoder.count_tokens(&e.text))
            .collect::<Result<Vec<_>>>()?;
        let summary_counts = prepared
            .train
            .iter()
            .map(|e| summary_encoder.count_tokens(&e.summary))
            .collect::<Result<Vec<_>>>()?;

        // ── Step 3: Distributions ─────────────────────────────────────────────
        let report = StatsReport {
            text:    TokenStats::from_counts(&text_counts, cfg.text_max_token_len),
            summary: TokenStats::from_counts(&summary_counts, cfg.summary_max_token_len),
        };
        if let Some(text) = &report.text {
            tracing::info!(
                "Articles: {} over {} tokens out of {}",
                text.over_limit, text.limit, text.count
            );
        }
        Ok(report)
    }
}
